//! Ordered in-memory index built on a B+ tree.
//!
//! System components:
//!  - `index`: the tree itself (arena-backed nodes, split and merge
//!    propagation, leaf-chain iteration, Graphviz export, self-check)
//!  - `config`: capacity parameters and their environment loading
//!  - `simulation`: seeded randomized workloads checked against a model

pub mod config;
pub mod index;
pub mod simulation;

pub use config::{ConfigError, TreeConfig};
pub use index::{BPlusTree, InvariantViolation, TreeError};
