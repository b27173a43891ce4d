//! Operation generator for deterministic simulation testing.
//!
//! This module generates random but reproducible sequences of tree
//! operations. Keys come from a bounded key space so that updates, deletes of
//! present keys and merges happen often.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Configuration for operation generation.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    /// Keys are drawn from `0..key_space`.
    pub key_space: i64,
    /// Probability of an insert (or update of a present key).
    pub insert_rate: f64,
    /// Probability of a delete.
    pub delete_rate: f64,
    /// Probability of a range scan. The remainder are point searches.
    pub range_rate: f64,
    /// Maximum number of keys a range scan spans.
    pub max_range_width: i64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            key_space: 2_000,
            insert_rate: 0.5,
            delete_rate: 0.35,
            range_rate: 0.05,
            max_range_width: 64,
        }
    }
}

/// A single generated tree operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert { key: i64, value: u64 },
    Delete { key: i64 },
    Search { key: i64 },
    /// Scan of the half-open range `start..end`.
    Range { start: i64, end: i64 },
}

/// Generator for random [`Operation`]s.
///
/// Produces the same sequence for the same seed and configuration.
pub struct WorkloadGenerator {
    rng: StdRng,
    config: WorkloadConfig,
    /// Next value to insert; every insert carries a fresh value so that a
    /// stale read is visible.
    next_value: u64,
}

impl WorkloadGenerator {
    /// Create a new generator with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_config(seed, WorkloadConfig::default())
    }

    /// Create a new generator with custom configuration.
    #[must_use]
    pub fn with_config(seed: u64, config: WorkloadConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            config,
            next_value: 1,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// Generate the next operation.
    pub fn next_operation(&mut self) -> Operation {
        let key = self.random_key();
        let roll = self.rng.random::<f64>();
        let config = &self.config;

        if roll < config.insert_rate {
            let value = self.next_value;
            self.next_value += 1;
            Operation::Insert { key, value }
        } else if roll < config.insert_rate + config.delete_rate {
            Operation::Delete { key }
        } else if roll < config.insert_rate + config.delete_rate + config.range_rate {
            let width = self.rng.random_range(0..=config.max_range_width.max(0));
            Operation::Range {
                start: key,
                end: key.saturating_add(width),
            }
        } else {
            Operation::Search { key }
        }
    }

    fn random_key(&mut self) -> i64 {
        self.rng.random_range(0..self.config.key_space.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_generator_deterministic() {
        let mut generator1 = WorkloadGenerator::new(12345);
        let mut generator2 = WorkloadGenerator::new(12345);

        for _ in 0..200 {
            assert_eq!(generator1.next_operation(), generator2.next_operation());
        }
    }

    #[test]
    fn test_workload_generator_seeds_differ() {
        let mut generator1 = WorkloadGenerator::new(1);
        let mut generator2 = WorkloadGenerator::new(2);

        let ops1: Vec<Operation> = (0..50).map(|_| generator1.next_operation()).collect();
        let ops2: Vec<Operation> = (0..50).map(|_| generator2.next_operation()).collect();
        assert_ne!(ops1, ops2);
    }

    #[test]
    fn test_keys_stay_in_key_space() {
        let config = WorkloadConfig {
            key_space: 10,
            ..Default::default()
        };
        let mut generator = WorkloadGenerator::with_config(7, config);

        for _ in 0..500 {
            match generator.next_operation() {
                Operation::Insert { key, .. }
                | Operation::Delete { key }
                | Operation::Search { key } => assert!((0..10).contains(&key)),
                Operation::Range { start, end } => {
                    assert!((0..10).contains(&start));
                    assert!(end >= start && end - start <= 64);
                }
            }
        }
    }

    #[test]
    fn test_insert_only_workload() {
        let config = WorkloadConfig {
            insert_rate: 1.0,
            delete_rate: 0.0,
            range_rate: 0.0,
            ..Default::default()
        };
        let mut generator = WorkloadGenerator::with_config(99, config);

        let values: Vec<u64> = (0..5)
            .map(|_| match generator.next_operation() {
                Operation::Insert { value, .. } => value,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }
}
