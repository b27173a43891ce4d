//! Main simulator harness for deterministic simulation testing.
//!
//! This module runs a generated workload against a [`BPlusTree`] and a
//! `BTreeMap` model side by side, comparing every result and checking the
//! tree's structural invariants as it goes.

use std::collections::BTreeMap;

use crate::config::{ConfigError, TreeConfig};
use crate::index::{BPlusTree, TreeError};

use super::workload::{Operation, WorkloadConfig, WorkloadGenerator};

/// Configuration for the simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Capacities of the tree under test.
    pub tree: TreeConfig,
    /// Operation generation configuration.
    pub workload: WorkloadConfig,
    /// Check structural invariants after every `check_interval` operations.
    pub check_interval: usize,
    /// Delete every remaining key once the workload is done.
    pub drain: bool,
}

impl SimulatorConfig {
    /// Create a new simulator config with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            tree: TreeConfig::default(),
            workload: WorkloadConfig::default(),
            check_interval: 1,
            drain: false,
        }
    }

    /// Set the tree capacities.
    #[must_use]
    pub const fn with_tree_config(mut self, tree: TreeConfig) -> Self {
        self.tree = tree;
        self
    }

    /// Set the workload configuration.
    #[must_use]
    pub const fn with_workload(mut self, workload: WorkloadConfig) -> Self {
        self.workload = workload;
        self
    }

    /// Set the key space of the workload.
    #[must_use]
    pub const fn with_key_space(mut self, key_space: i64) -> Self {
        self.workload.key_space = key_space;
        self
    }

    /// Check invariants only every `interval` operations (for faster runs).
    #[must_use]
    pub const fn with_check_interval(mut self, interval: usize) -> Self {
        self.check_interval = interval;
        self
    }

    /// Empty the tree at the end of the run.
    #[must_use]
    pub const fn with_drain(mut self) -> Self {
        self.drain = true;
        self
    }
}

/// Per-kind operation counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationStats {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    /// Deletes of keys that were not present.
    pub delete_misses: u64,
    pub searches: u64,
    pub ranges: u64,
}

/// A point where the tree stopped agreeing with the model or with itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrepancy {
    /// Index of the operation after which it was detected.
    pub operation_index: usize,
    /// The operation, if a single one is to blame.
    pub operation: Option<Operation>,
    pub description: String,
}

/// Results from a simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The seed used for this simulation.
    pub seed: u64,
    /// Number of operations applied, including drain deletes.
    pub operations_run: u64,
    pub stats: OperationStats,
    /// Keys left in the tree at the end.
    pub final_len: usize,
    pub final_height: usize,
    /// Model mismatches and invariant violations.
    pub discrepancies: Vec<Discrepancy>,
    /// Whether every tree operation returned `Ok`.
    pub completed_successfully: bool,
    /// Error message if a tree operation failed.
    pub error: Option<String>,
}

impl SimulationResult {
    /// Check if the simulation passed (no errors, no discrepancies).
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.completed_successfully && self.discrepancies.is_empty()
    }
}

/// The main simulator harness.
pub struct Simulator {
    config: SimulatorConfig,
    generator: WorkloadGenerator,
    tree: BPlusTree<i64, u64>,
    model: BTreeMap<i64, u64>,
    stats: OperationStats,
    operations_run: u64,
    discrepancies: Vec<Discrepancy>,
}

impl Simulator {
    /// Create a new simulator with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree capacities are invalid.
    pub fn new(config: SimulatorConfig) -> Result<Self, ConfigError> {
        let tree = BPlusTree::with_config(config.tree)?;
        let generator = WorkloadGenerator::with_config(config.seed, config.workload.clone());

        Ok(Self {
            config,
            generator,
            tree,
            model: BTreeMap::new(),
            stats: OperationStats::default(),
            operations_run: 0,
            discrepancies: Vec::new(),
        })
    }

    /// Run the simulation for a given number of operations.
    ///
    /// Stops at the first discrepancy or failed tree operation.
    pub fn run(&mut self, operation_count: usize) -> SimulationResult {
        tracing::debug!(
            seed = self.config.seed,
            operations = operation_count,
            max_internal_fanout = self.config.tree.max_internal_fanout,
            max_leaf_entries = self.config.tree.max_leaf_entries,
            "starting simulation"
        );

        let interval = self.config.check_interval.max(1);
        for index in 0..operation_count {
            let operation = self.generator.next_operation();
            if let Err(e) = self.step(index, operation) {
                return self.finish(Some(&e));
            }
            let last = index + 1 == operation_count;
            if (index % interval == 0 || last) && !self.check_structure(index) {
                return self.finish(None);
            }
            if !self.discrepancies.is_empty() {
                return self.finish(None);
            }
        }

        if self.config.drain
            && let Err(e) = self.drain(operation_count)
        {
            return self.finish(Some(&e));
        }

        self.finish(None)
    }

    /// Apply one operation to tree and model and compare the outcomes.
    fn step(&mut self, index: usize, operation: Operation) -> Result<(), TreeError> {
        self.operations_run += 1;
        let mismatch = match operation {
            Operation::Insert { key, value } => {
                let got = self.tree.insert(key, value)?;
                let expected = self.model.insert(key, value);
                if got.is_some() {
                    self.stats.updates += 1;
                } else {
                    self.stats.inserts += 1;
                }
                (got != expected).then(|| format!("returned {got:?}, model {expected:?}"))
            }
            Operation::Delete { key } => {
                let got = self.tree.delete(&key)?;
                let expected = self.model.remove(&key);
                if got.is_some() {
                    self.stats.deletes += 1;
                } else {
                    self.stats.delete_misses += 1;
                }
                (got != expected).then(|| format!("returned {got:?}, model {expected:?}"))
            }
            Operation::Search { key } => {
                self.stats.searches += 1;
                let got = self.tree.search(&key).copied();
                let expected = self.model.get(&key).copied();
                (got != expected).then(|| format!("found {got:?}, model {expected:?}"))
            }
            Operation::Range { start, end } => {
                self.stats.ranges += 1;
                let got: Vec<(i64, u64)> =
                    self.tree.range(start..end).map(|(k, v)| (*k, *v)).collect();
                let expected: Vec<(i64, u64)> =
                    self.model.range(start..end).map(|(k, v)| (*k, *v)).collect();
                (got != expected).then(|| {
                    format!(
                        "yielded {} entries, model {}",
                        got.len(),
                        expected.len()
                    )
                })
            }
        };

        if let Some(description) = mismatch {
            self.record(index, Some(operation), description);
        } else if self.tree.len() != self.model.len() {
            let description = format!(
                "tree holds {} keys, model {}",
                self.tree.len(),
                self.model.len()
            );
            self.record(index, Some(operation), description);
        }
        Ok(())
    }

    /// Delete every key still in the model, in ascending order.
    fn drain(&mut self, first_index: usize) -> Result<(), TreeError> {
        let keys: Vec<i64> = self.model.keys().copied().collect();
        for (offset, key) in keys.into_iter().enumerate() {
            self.step(first_index + offset, Operation::Delete { key })?;
            if !self.discrepancies.is_empty() {
                return Ok(());
            }
        }

        if !self.tree.is_empty() {
            self.record(
                first_index,
                None,
                "tree not empty after deleting every key".to_string(),
            );
        }
        self.check_structure(first_index);
        Ok(())
    }

    /// Check invariants and full-content equality with the model.
    fn check_structure(&mut self, index: usize) -> bool {
        if let Err(violation) = self.tree.check_invariants() {
            self.record(index, None, format!("invariant violated: {violation}"));
            return false;
        }

        let same = self
            .tree
            .iter()
            .map(|(k, v)| (*k, *v))
            .eq(self.model.iter().map(|(k, v)| (*k, *v)));
        if !same {
            self.record(index, None, "contents differ from model".to_string());
            return false;
        }
        true
    }

    fn record(&mut self, operation_index: usize, operation: Option<Operation>, description: String) {
        tracing::warn!(
            seed = self.config.seed,
            operation_index,
            ?operation,
            "simulation discrepancy: {description}"
        );
        self.discrepancies.push(Discrepancy {
            operation_index,
            operation,
            description,
        });
    }

    fn finish(&self, error: Option<&TreeError>) -> SimulationResult {
        SimulationResult {
            seed: self.config.seed,
            operations_run: self.operations_run,
            stats: self.stats,
            final_len: self.tree.len(),
            final_height: self.tree.height(),
            discrepancies: self.discrepancies.clone(),
            completed_successfully: error.is_none(),
            error: error.map(ToString::to_string),
        }
    }

    /// The tree under test.
    #[must_use]
    pub const fn tree(&self) -> &BPlusTree<i64, u64> {
        &self.tree
    }

    #[must_use]
    pub const fn stats(&self) -> OperationStats {
        self.stats
    }
}
