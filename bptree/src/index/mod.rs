//! In-memory B+ tree index.
//!
//! This module provides an ordered map from unique keys to values, with
//! logarithmic search, insertion and deletion and ordered range scans.
//!
//! # Structure
//!
//! The tree consists of:
//! - Internal nodes: store separator keys and child handles
//! - Leaf nodes: store key-value pairs, doubly-linked for range scans
//!
//! Nodes live in an arena and point at each other (parent, next, prev) by
//! [`NodeId`] handle, never by ownership.
//!
//! # Usage
//!
//! ```
//! use bptree::config::TreeConfig;
//! use bptree::index::BPlusTree;
//!
//! let mut tree = BPlusTree::with_config(TreeConfig::new(3, 3)).expect("valid config");
//! for key in [1, 5, 12, 18, 21, 22, 23] {
//!     tree.insert(key, key.to_string()).expect("insert");
//! }
//!
//! assert_eq!(tree.search(&12), Some(&"12".to_string()));
//! let keys: Vec<i32> = tree.range(5..21).map(|(k, _)| *k).collect();
//! assert_eq!(keys, vec![5, 12, 18]);
//! ```

mod arena;
mod graph;
mod invariants;
mod iter;
mod node;
mod tree;

#[cfg(test)]
mod scenario_tests;

pub use graph::Dot;
pub use invariants::InvariantViolation;
pub use iter::{Iter, LeafRef, Leaves, Range};
pub use node::{InternalNode, LeafEntry, LeafNode, Node, NodeError, NodeId, NodeKind};
pub use tree::{BPlusTree, TreeError};
