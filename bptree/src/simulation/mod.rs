//! Deterministic Simulation Testing (DST) infrastructure.
//!
//! This module provides tools for testing the tree with:
//! - Reproducible random operation generation
//! - A reference model (`std::collections::BTreeMap`) compared after every step
//! - Invariant checking after each operation
//!
//! # Design Principles
//!
//! 1. All randomness is seeded for reproducibility
//! 2. Given the same seed and configuration, execution is identical
//! 3. The first discrepancy stops the run and is reported with its
//!    operation index, so it can be replayed
//!
//! # Usage
//!
//! ```
//! use bptree::config::TreeConfig;
//! use bptree::simulation::{Simulator, SimulatorConfig};
//!
//! let config = SimulatorConfig::new(12345) // seed
//!     .with_tree_config(TreeConfig::new(4, 4))
//!     .with_key_space(200);
//!
//! let mut sim = Simulator::new(config).expect("valid config");
//! let result = sim.run(1000); // Run 1000 operations
//!
//! assert!(result.passed());
//! ```

mod simulator;
mod workload;

pub use simulator::{Discrepancy, OperationStats, SimulationResult, Simulator, SimulatorConfig};
pub use workload::{Operation, WorkloadConfig, WorkloadGenerator};
