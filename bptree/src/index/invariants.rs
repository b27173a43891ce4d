//! Structural self-check of a tree.
//!
//! Verified after every completed operation by the tests and the simulation:
//! - sort order: leaf keys strictly increase, separators strictly increase
//! - range: every key lies within the bounds its ancestors' separators imply
//! - fill factor: non-root nodes hold `[max / 2, max]` entries, the root at
//!   least one
//! - parent handles point at the node that actually holds the child
//! - height balance: all leaves at the same depth
//! - leaf chain: `next`/`prev` follow the in-order sequence of leaves
//! - bookkeeping: the key count and the number of live arena nodes match the
//!   reachable structure

use crate::index::node::{Node, NodeId, NodeKind};
use crate::index::tree::BPlusTree;

/// Accumulated state of one invariant walk.
#[derive(Default)]
struct Walk {
    leaves: Vec<NodeId>,
    leaf_depth: Option<usize>,
    entries: usize,
    reachable: usize,
}

impl<K: Ord + Clone, V> BPlusTree<K, V> {
    /// Verify every structural invariant, reporting the first violation found.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let Some(root) = self.root else {
            let recorded = self.len();
            if recorded != 0 || !self.nodes.is_empty() {
                return Err(InvariantViolation::CountMismatch {
                    recorded,
                    counted: 0,
                    live_nodes: self.nodes.len(),
                    reachable_nodes: 0,
                });
            }
            return Ok(());
        };

        let mut walk = Walk::default();
        self.check_node(root, None, None, None, 1, &mut walk)?;
        self.check_leaf_chain(&walk.leaves)?;

        if walk.entries != self.len() || walk.reachable != self.nodes.len() {
            return Err(InvariantViolation::CountMismatch {
                recorded: self.len(),
                counted: walk.entries,
                live_nodes: self.nodes.len(),
                reachable_nodes: walk.reachable,
            });
        }
        Ok(())
    }

    /// Check the subtree at `id`, whose keys must lie in `[lower, upper)`.
    fn check_node<'a>(
        &'a self,
        id: NodeId,
        parent: Option<NodeId>,
        lower: Option<&'a K>,
        upper: Option<&'a K>,
        depth: usize,
        walk: &mut Walk,
    ) -> Result<(), InvariantViolation> {
        let node = self
            .nodes
            .get(id)
            .ok_or(InvariantViolation::DanglingHandle(id))?;
        walk.reachable += 1;

        if node.parent() != parent {
            return Err(InvariantViolation::ParentMismatch {
                node: id,
                expected: parent,
                found: node.parent(),
            });
        }
        self.check_fill(id, node)?;

        let in_range =
            |key: &K| lower.is_none_or(|l| l <= key) && upper.is_none_or(|u| key < u);

        match node {
            Node::Leaf(leaf) => {
                if !leaf.entries().is_sorted_by(|a, b| a.key < b.key) {
                    return Err(InvariantViolation::UnsortedKeys(id));
                }
                if !leaf.entries().iter().all(|e| in_range(&e.key)) {
                    return Err(InvariantViolation::KeyOutOfRange(id));
                }

                let expected = *walk.leaf_depth.get_or_insert(depth);
                if expected != depth {
                    return Err(InvariantViolation::UnevenDepth {
                        leaf: id,
                        depth,
                        expected,
                    });
                }
                walk.entries += leaf.len();
                walk.leaves.push(id);
            }
            Node::Internal(internal) => {
                let separators = internal.separators();
                if separators.len() + 1 != internal.len() {
                    return Err(InvariantViolation::SeparatorCount {
                        node: id,
                        separators: separators.len(),
                        children: internal.len(),
                    });
                }
                if !separators.is_sorted_by(|a, b| a < b) {
                    return Err(InvariantViolation::UnsortedKeys(id));
                }
                if !separators.iter().all(in_range) {
                    return Err(InvariantViolation::KeyOutOfRange(id));
                }

                for (i, &child) in internal.children().iter().enumerate() {
                    let child_lower = if i == 0 { lower } else { internal.separator(i) };
                    let child_upper = internal.separator(i + 1).or(upper);
                    self.check_node(child, Some(id), child_lower, child_upper, depth + 1, walk)?;
                }
            }
        }
        Ok(())
    }

    fn check_fill(&self, id: NodeId, node: &Node<K, V>) -> Result<(), InvariantViolation> {
        let configured = match node.kind() {
            NodeKind::Internal => self.config().max_internal_fanout,
            NodeKind::Leaf => self.config().max_leaf_entries,
        };
        let (len, max) = (node.len(), node.max_size());
        let min = if node.is_root() { 1 } else { node.min_size() };

        if max != configured || len > max || len < min {
            return Err(InvariantViolation::FillFactor {
                node: id,
                kind: node.kind(),
                len,
                min,
                max: configured,
            });
        }
        Ok(())
    }

    fn check_leaf_chain(&self, leaves: &[NodeId]) -> Result<(), InvariantViolation> {
        let mut prev = None;
        for (i, &id) in leaves.iter().enumerate() {
            let leaf = self
                .leaf_node(id)
                .ok_or(InvariantViolation::DanglingHandle(id))?;
            if leaf.prev() != prev || leaf.next() != leaves.get(i + 1).copied() {
                return Err(InvariantViolation::BrokenLeafChain(id));
            }
            prev = Some(id);
        }
        Ok(())
    }
}

/// A structural invariant that does not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A reachable handle refers to a freed slot.
    DanglingHandle(NodeId),
    /// A node's parent handle does not name the node that holds it.
    ParentMismatch {
        node: NodeId,
        expected: Option<NodeId>,
        found: Option<NodeId>,
    },
    /// A node's size is outside its allowed range, or its capacity differs
    /// from the tree's configuration.
    FillFactor {
        node: NodeId,
        kind: NodeKind,
        len: usize,
        min: usize,
        max: usize,
    },
    /// An internal node's separators and children disagree in number.
    SeparatorCount {
        node: NodeId,
        separators: usize,
        children: usize,
    },
    UnsortedKeys(NodeId),
    /// A key escapes the range its ancestors route to this node.
    KeyOutOfRange(NodeId),
    UnevenDepth {
        leaf: NodeId,
        depth: usize,
        expected: usize,
    },
    /// `next`/`prev` of this leaf do not match the in-order leaf sequence.
    BrokenLeafChain(NodeId),
    /// Key count or node count disagrees with the reachable structure.
    CountMismatch {
        recorded: usize,
        counted: usize,
        live_nodes: usize,
        reachable_nodes: usize,
    },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DanglingHandle(id) => write!(f, "handle {id} refers to a freed node"),
            Self::ParentMismatch {
                node,
                expected,
                found,
            } => write!(
                f,
                "node {node} has parent {found:?}, expected {expected:?}"
            ),
            Self::FillFactor {
                node,
                kind,
                len,
                min,
                max,
            } => write!(
                f,
                "{kind} node {node} holds {len} entries, allowed {min}..={max}"
            ),
            Self::SeparatorCount {
                node,
                separators,
                children,
            } => write!(
                f,
                "internal node {node} has {separators} separators for {children} children"
            ),
            Self::UnsortedKeys(id) => write!(f, "keys of node {id} are not strictly increasing"),
            Self::KeyOutOfRange(id) => write!(f, "node {id} holds a key outside its range"),
            Self::UnevenDepth {
                leaf,
                depth,
                expected,
            } => write!(f, "leaf {leaf} at depth {depth}, expected {expected}"),
            Self::BrokenLeafChain(id) => write!(f, "leaf chain broken at leaf {id}"),
            Self::CountMismatch {
                recorded,
                counted,
                live_nodes,
                reachable_nodes,
            } => write!(
                f,
                "tree records {recorded} keys and {live_nodes} nodes, \
                 found {counted} keys in {reachable_nodes} reachable nodes"
            ),
        }
    }
}

impl std::error::Error for InvariantViolation {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;
    use crate::index::node::LeafNode;

    fn tree_with(range: std::ops::RangeInclusive<i64>) -> BPlusTree<i64, i64> {
        let mut tree = BPlusTree::with_config(TreeConfig::new(4, 4)).expect("config");
        for key in range {
            tree.insert(key, key).expect("insert");
        }
        tree
    }

    fn leaf_mut(tree: &mut BPlusTree<i64, i64>, key: i64) -> &mut LeafNode<i64, i64> {
        let id = tree.find_leaf(&key).expect("leaf");
        tree.nodes
            .get_mut(id)
            .and_then(Node::as_leaf_mut)
            .expect("leaf node")
    }

    #[test]
    fn test_valid_trees_pass() {
        let empty: BPlusTree<i64, i64> = BPlusTree::new();
        assert_eq!(empty.check_invariants(), Ok(()));
        assert_eq!(tree_with(1..=1).check_invariants(), Ok(()));
        assert_eq!(tree_with(1..=200).check_invariants(), Ok(()));
    }

    #[test]
    fn test_detects_unsorted_leaf() {
        let mut tree = tree_with(1..=20);
        leaf_mut(&mut tree, 1).entries.swap(0, 1);

        assert!(matches!(
            tree.check_invariants(),
            Err(InvariantViolation::UnsortedKeys(_))
        ));
    }

    #[test]
    fn test_detects_key_outside_separator_range() {
        let mut tree = tree_with(1..=20);
        leaf_mut(&mut tree, 1).entries[0].key = 19;

        assert!(tree.check_invariants().is_err());
    }

    #[test]
    fn test_detects_broken_leaf_chain() {
        let mut tree = tree_with(1..=20);
        let first = tree.find_leaf(&1).expect("first leaf");
        leaf_mut(&mut tree, 1).next = None;

        assert_eq!(
            tree.check_invariants(),
            Err(InvariantViolation::BrokenLeafChain(first))
        );
    }

    #[test]
    fn test_detects_wrong_parent() {
        let mut tree = tree_with(1..=20);
        let leaf = tree.find_leaf(&20).expect("leaf");
        let root = tree.root_id().expect("root");
        tree.nodes
            .get_mut(leaf)
            .expect("leaf")
            .set_parent(Some(root));

        assert!(matches!(
            tree.check_invariants(),
            Err(InvariantViolation::ParentMismatch { node, .. }) if node == leaf
        ));
    }

    #[test]
    fn test_detects_underfull_leaf() {
        let mut tree = tree_with(1..=20);
        leaf_mut(&mut tree, 20).entries.truncate(1);

        assert!(matches!(
            tree.check_invariants(),
            Err(InvariantViolation::FillFactor {
                kind: NodeKind::Leaf,
                len: 1,
                min: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_detects_leaked_node() {
        let mut tree = tree_with(1..=20);
        tree.nodes.alloc(Node::Leaf(LeafNode::new(4)));

        assert!(matches!(
            tree.check_invariants(),
            Err(InvariantViolation::CountMismatch { .. })
        ));
    }

    #[test]
    fn test_violation_display() {
        let violation = InvariantViolation::FillFactor {
            node: NodeId(3),
            kind: NodeKind::Leaf,
            len: 1,
            min: 2,
            max: 4,
        };
        assert_eq!(
            violation.to_string(),
            "leaf node 3 holds 1 entries, allowed 2..=4"
        );
    }
}
