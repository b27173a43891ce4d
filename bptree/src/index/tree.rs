//! In-memory B+ tree.
//!
//! All operations enter here: descent to a leaf through the internal nodes,
//! mutation of the leaf, then a walk back up through parent handles to
//! repair the fill-factor invariants, possibly growing or shrinking the root.
//!
//! Fatal invariant breaks abort the operation with an error and poison the
//! tree. Every later mutation returns [`TreeError::Poisoned`].

use crate::config::{ConfigError, TreeConfig};
use crate::index::arena::NodeArena;
use crate::index::node::{InternalNode, LeafNode, Node, NodeError, NodeId, NodeKind};

/// An ordered index mapping unique keys to values.
#[derive(Debug, Clone)]
pub struct BPlusTree<K, V> {
    pub(crate) nodes: NodeArena<K, V>,
    pub(crate) root: Option<NodeId>,
    config: TreeConfig,
    /// Distinct keys stored.
    len: usize,
    poisoned: bool,
}

impl<K: Ord + Clone, V> Default for BPlusTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone, V> BPlusTree<K, V> {
    /// Create an empty tree with the default capacities (511 / 255).
    #[must_use]
    pub const fn new() -> Self {
        Self::from_validated(TreeConfig::new(
            TreeConfig::DEFAULT_MAX_INTERNAL_FANOUT,
            TreeConfig::DEFAULT_MAX_LEAF_ENTRIES,
        ))
    }

    /// Create an empty tree with the given capacities.
    ///
    /// # Errors
    ///
    /// Returns an error if either capacity is below 2.
    pub fn with_config(config: TreeConfig) -> Result<Self, ConfigError> {
        let config = config.validate()?;
        tracing::debug!(
            max_internal_fanout = config.max_internal_fanout,
            max_leaf_entries = config.max_leaf_entries,
            "created tree"
        );
        Ok(Self::from_validated(config))
    }

    const fn from_validated(config: TreeConfig) -> Self {
        Self {
            nodes: NodeArena::new(),
            root: None,
            config,
            len: 0,
            poisoned: false,
        }
    }

    #[must_use]
    pub const fn config(&self) -> TreeConfig {
        self.config
    }

    /// Number of distinct keys.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Whether an earlier operation hit a fatal invariant break.
    #[must_use]
    pub const fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Handle of the root node, if any.
    #[must_use]
    pub const fn root_id(&self) -> Option<NodeId> {
        self.root
    }

    /// Inspect a node by handle.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node<K, V>> {
        self.nodes.get(id)
    }

    /// Number of levels, 0 for an empty tree.
    #[must_use]
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut current = self.root;
        while let Some(id) = current {
            height += 1;
            current = self
                .nodes
                .get(id)
                .and_then(Node::as_internal)
                .and_then(|node| node.child_at(0));
        }
        height
    }

    /// Look up the value stored for `key`.
    #[must_use]
    pub fn search(&self, key: &K) -> Option<&V> {
        let leaf_id = self.find_leaf(key)?;
        self.nodes.get(leaf_id)?.as_leaf()?.get(key)
    }

    /// Alias of [`search`](Self::search).
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.search(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let leaf_id = self.find_leaf(key)?;
        self.nodes.get_mut(leaf_id)?.as_leaf_mut()?.get_mut(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.search(key).is_some()
    }

    /// Insert or update a key-value pair.
    ///
    /// Returns the old value if updating, None if inserting.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, TreeError> {
        self.ensure_usable()?;
        let result = self.insert_entry(key, value);
        self.poison_on_error(result)
    }

    /// Remove a key. Absent keys are a no-op.
    ///
    /// Returns the removed value if found.
    pub fn delete(&mut self, key: &K) -> Result<Option<V>, TreeError> {
        self.ensure_usable()?;
        let result = self.delete_entry(key);
        self.poison_on_error(result)
    }

    /// Drop every entry. Also clears a poisoned state.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.len = 0;
        self.poisoned = false;
        tracing::debug!("cleared tree");
    }

    const fn ensure_usable(&self) -> Result<(), TreeError> {
        if self.poisoned {
            return Err(TreeError::Poisoned);
        }
        Ok(())
    }

    fn poison_on_error<T>(&mut self, result: Result<T, TreeError>) -> Result<T, TreeError> {
        if let Err(error) = &result {
            tracing::error!(%error, "tree invariant broken, refusing further mutations");
            self.poisoned = true;
        }
        result
    }

    fn insert_entry(&mut self, key: K, value: V) -> Result<Option<V>, TreeError> {
        if self.root.is_none() {
            self.start_root(key, value);
            return Ok(None);
        }

        let leaf_id = self.descend(&key)?;
        let leaf = self.leaf_mut(leaf_id)?;
        if let Some(old) = leaf.insert(key, value) {
            return Ok(Some(old));
        }
        let needs_split = leaf.is_full();
        self.len += 1;

        if needs_split {
            self.split_leaf(leaf_id)?;
        }
        Ok(None)
    }

    fn start_root(&mut self, key: K, value: V) {
        let mut leaf = LeafNode::new(self.config.max_leaf_entries);
        leaf.insert(key, value);
        self.root = Some(self.nodes.alloc(Node::Leaf(leaf)));
        self.len = 1;
    }

    /// Split a full leaf and hand its first key to the parent.
    fn split_leaf(&mut self, leaf_id: NodeId) -> Result<(), TreeError> {
        let right = self.leaf_mut(leaf_id)?.split();
        let promotion_key = right
            .first_key()
            .cloned()
            .ok_or(NodeError::TooFewEntries { len: 0, needed: 1 })?;
        let old_next = right.next();

        let right_id = self.nodes.alloc(Node::Leaf(right));
        self.leaf_mut(right_id)?.prev = Some(leaf_id);
        self.leaf_mut(leaf_id)?.next = Some(right_id);
        if let Some(next) = old_next {
            self.leaf_mut(next)?.prev = Some(right_id);
        }

        tracing::trace!(leaf = %leaf_id, right = %right_id, "split leaf");
        self.insert_into_parent(leaf_id, right_id, promotion_key)
    }

    /// Install `right` next to `left` under `left`'s parent, splitting
    /// ancestors as long as they overflow.
    fn insert_into_parent(
        &mut self,
        left: NodeId,
        right: NodeId,
        key: K,
    ) -> Result<(), TreeError> {
        let Some(parent_id) = self.node_ref(left)?.parent() else {
            return self.grow_root(left, right, key);
        };

        self.set_parent(right, Some(parent_id))?;
        let parent = self.internal_mut(parent_id)?;
        parent.insert(key, right)?;
        if !parent.is_full() {
            return Ok(());
        }

        let (sibling, promoted) = parent.split()?;
        let moved = sibling.children().to_vec();
        let sibling_id = self.nodes.alloc(Node::Internal(sibling));
        for child in moved {
            self.set_parent(child, Some(sibling_id))?;
        }

        tracing::trace!(node = %parent_id, sibling = %sibling_id, "split internal node");
        self.insert_into_parent(parent_id, sibling_id, promoted)
    }

    fn grow_root(&mut self, left: NodeId, right: NodeId, key: K) -> Result<(), TreeError> {
        if self.root != Some(left) {
            return Err(TreeError::StructuralInconsistency(format!(
                "node {left} has no parent but is not the root"
            )));
        }

        let root = InternalNode::with_children(self.config.max_internal_fanout, left, key, right);
        let root_id = self.nodes.alloc(Node::Internal(root));
        self.set_parent(left, Some(root_id))?;
        self.set_parent(right, Some(root_id))?;
        self.root = Some(root_id);

        tracing::trace!(root = %root_id, "tree grew a level");
        Ok(())
    }

    fn delete_entry(&mut self, key: &K) -> Result<Option<V>, TreeError> {
        if self.root.is_none() {
            return Ok(None);
        }

        let leaf_id = self.descend(key)?;
        let Some(removed) = self.leaf_mut(leaf_id)?.remove(key) else {
            return Ok(None);
        };
        self.len -= 1;

        self.coalesce_or_redistribute(leaf_id)?;
        Ok(Some(removed))
    }

    /// Restore the fill factor of `node_id` after it lost an entry.
    ///
    /// Only one sibling is considered: the right one for a first child,
    /// otherwise the left one.
    fn coalesce_or_redistribute(&mut self, node_id: NodeId) -> Result<(), TreeError> {
        let node = self.node_ref(node_id)?;
        let Some(parent_id) = node.parent() else {
            return self.adjust_root(node_id);
        };
        if node.is_half_full() {
            return Ok(());
        }
        let (node_len, max) = (node.len(), node.max_size());

        if self.internal(parent_id)?.len() == 1 {
            return self.rebalance_sole_child(node_id, parent_id, node_len);
        }

        let (index, sibling_id) = self.sibling_of(node_id, parent_id)?;
        let sibling_len = self.node_ref(sibling_id)?.len();

        if node_len + sibling_len >= max {
            return self.redistribute(sibling_id, node_id, parent_id, index);
        }

        if index == 0 {
            self.coalesce(sibling_id, node_id, parent_id)
        } else {
            self.coalesce(node_id, sibling_id, parent_id)
        }
    }

    /// Underflow of a node that has no sibling to borrow from.
    ///
    /// Happens only under internal nodes of capacity 2 or 3, whose underflow
    /// threshold is a single child.
    fn rebalance_sole_child(
        &mut self,
        node_id: NodeId,
        parent_id: NodeId,
        node_len: usize,
    ) -> Result<(), TreeError> {
        if node_len == 0 {
            return self.detach_empty(node_id, parent_id);
        }

        self.widen(parent_id)?;
        self.coalesce_or_redistribute(node_id)
    }

    /// Give a single-child internal node a second child by borrowing from or
    /// merging with its sibling. A single-child root is collapsed instead.
    fn widen(&mut self, node_id: NodeId) -> Result<(), TreeError> {
        let Some(parent_id) = self.node_ref(node_id)?.parent() else {
            return self.adjust_root(node_id);
        };

        if self.internal(parent_id)?.len() == 1 {
            self.widen(parent_id)?;
            return self.widen(node_id);
        }

        let (index, sibling_id) = self.sibling_of(node_id, parent_id)?;
        let sibling = self.node_ref(sibling_id)?;
        if sibling.len() > sibling.min_size() {
            return self.redistribute(sibling_id, node_id, parent_id, index);
        }

        if index == 0 {
            self.coalesce(sibling_id, node_id, parent_id)
        } else {
            self.coalesce(node_id, sibling_id, parent_id)
        }
    }

    /// Position of `node_id` under `parent_id` and the sibling to pair it with.
    fn sibling_of(&self, node_id: NodeId, parent_id: NodeId) -> Result<(usize, NodeId), TreeError> {
        let parent = self.internal(parent_id)?;
        let index = parent
            .value_index(node_id)
            .ok_or(NodeError::ChildNotFound(node_id))?;
        let sibling_index = if index == 0 { 1 } else { index - 1 };
        let sibling_id = parent.child_at(sibling_index).ok_or_else(|| {
            TreeError::StructuralInconsistency(format!(
                "node {parent_id} has no child at {sibling_index}"
            ))
        })?;
        Ok((index, sibling_id))
    }

    /// Move one entry from `sibling_id` into `node_id` and fix the parent's
    /// separator between them. `index` is `node_id`'s position in the parent.
    fn redistribute(
        &mut self,
        sibling_id: NodeId,
        node_id: NodeId,
        parent_id: NodeId,
        index: usize,
    ) -> Result<(), TreeError> {
        // The separator sitting between the two siblings.
        let boundary_index = if index == 0 { 1 } else { index };
        let separator = self
            .internal(parent_id)?
            .separator(boundary_index)
            .cloned()
            .ok_or(NodeError::KeyIndexOutOfRange(boundary_index))?;

        let (sibling, node) = self
            .nodes
            .get_pair_mut(sibling_id, node_id)
            .ok_or(TreeError::DanglingNode(sibling_id))?;

        let (boundary, moved) = match (sibling, node) {
            (Node::Leaf(sibling), Node::Leaf(node)) => {
                let first = if index == 0 {
                    sibling.move_first_to_end_of(node)?;
                    sibling.first_key()
                } else {
                    sibling.move_last_to_front_of(node)?;
                    node.first_key()
                };
                let boundary = first
                    .cloned()
                    .ok_or(NodeError::TooFewEntries { len: 0, needed: 1 })?;
                (boundary, None)
            }
            (Node::Internal(sibling), Node::Internal(node)) => {
                let (moved, boundary) = if index == 0 {
                    sibling.move_first_to_end_of(node, separator)?
                } else {
                    sibling.move_last_to_front_of(node, separator)?
                };
                (boundary, Some(moved))
            }
            _ => {
                return Err(TreeError::StructuralInconsistency(format!(
                    "siblings {sibling_id} and {node_id} are different kinds"
                )));
            }
        };

        if let Some(child) = moved {
            self.set_parent(child, Some(node_id))?;
        }
        self.internal_mut(parent_id)?
            .set_key_at(boundary_index, boundary)?;

        tracing::trace!(node = %node_id, sibling = %sibling_id, "redistributed");
        Ok(())
    }

    /// Merge `source_id` into `target_id`, its left neighbour, drop it from
    /// the parent and rebalance the parent in turn.
    fn coalesce(
        &mut self,
        source_id: NodeId,
        target_id: NodeId,
        parent_id: NodeId,
    ) -> Result<(), TreeError> {
        let parent = self.internal(parent_id)?;
        let source_index = parent
            .value_index(source_id)
            .ok_or(NodeError::ChildNotFound(source_id))?;
        let separator = parent
            .separator(source_index)
            .cloned()
            .ok_or(NodeError::KeyIndexOutOfRange(source_index))?;

        let (source, target) = self
            .nodes
            .get_pair_mut(source_id, target_id)
            .ok_or(TreeError::DanglingNode(source_id))?;

        let (moved, next_leaf) = match (source, target) {
            (Node::Leaf(source), Node::Leaf(target)) => {
                source.move_all_to(target);
                target.next = source.next;
                (Vec::new(), source.next)
            }
            (Node::Internal(source), Node::Internal(target)) => {
                (source.move_all_to(target, separator), None)
            }
            _ => {
                return Err(TreeError::StructuralInconsistency(format!(
                    "siblings {source_id} and {target_id} are different kinds"
                )));
            }
        };

        for child in moved {
            self.set_parent(child, Some(target_id))?;
        }
        if let Some(next) = next_leaf {
            self.leaf_mut(next)?.prev = Some(target_id);
        }

        self.internal_mut(parent_id)?.remove(source_id)?;
        self.nodes.free(source_id);

        tracing::trace!(source = %source_id, target = %target_id, "merged");
        self.coalesce_or_redistribute(parent_id)
    }

    /// Unlink an empty node that is its parent's only child.
    fn detach_empty(&mut self, node_id: NodeId, parent_id: NodeId) -> Result<(), TreeError> {
        if let Some(leaf) = self.node_ref(node_id)?.as_leaf() {
            let (prev, next) = (leaf.prev(), leaf.next());
            if let Some(prev) = prev {
                self.leaf_mut(prev)?.next = next;
            }
            if let Some(next) = next {
                self.leaf_mut(next)?.prev = prev;
            }
        }

        self.internal_mut(parent_id)?.remove(node_id)?;
        self.nodes.free(node_id);

        tracing::trace!(node = %node_id, parent = %parent_id, "detached empty node");
        self.coalesce_or_redistribute(parent_id)
    }

    /// Shrink the tree when the root is down to one child, or empty it when
    /// the root has nothing left.
    fn adjust_root(&mut self, root_id: NodeId) -> Result<(), TreeError> {
        if self.root != Some(root_id) {
            return Err(TreeError::StructuralInconsistency(format!(
                "node {root_id} has no parent but is not the root"
            )));
        }

        let root = self.node_ref(root_id)?;
        let only_child = match root {
            Node::Internal(node) if node.len() == 1 => node.child_at(0),
            _ => None,
        };

        if let Some(child) = only_child {
            self.set_parent(child, None)?;
            self.root = Some(child);
            self.nodes.free(root_id);
            tracing::trace!(root = %child, "tree shrank a level");
        } else if root.is_empty() {
            self.root = None;
            self.nodes.free(root_id);
            tracing::trace!("tree emptied");
        }
        Ok(())
    }

    /// Leaf that owns `key`, for read paths.
    pub(crate) fn find_leaf(&self, key: &K) -> Option<NodeId> {
        self.root?;
        self.descend(key).ok()
    }

    /// Walk from the root to the leaf whose key range contains `key`.
    fn descend(&self, key: &K) -> Result<NodeId, TreeError> {
        let mut current = self.root.ok_or_else(|| {
            TreeError::StructuralInconsistency("descent into an empty tree".to_string())
        })?;

        loop {
            match self.node_ref(current)? {
                Node::Leaf(_) => return Ok(current),
                Node::Internal(node) => {
                    current = node
                        .lookup(key)
                        .ok_or(NodeError::TooFewEntries { len: 0, needed: 1 })?;
                }
            }
        }
    }

    /// Leftmost (`last == false`) or rightmost leaf.
    pub(crate) fn edge_leaf(&self, last: bool) -> Option<NodeId> {
        let mut current = self.root?;
        loop {
            match self.nodes.get(current)? {
                Node::Leaf(_) => return Some(current),
                Node::Internal(node) => {
                    current = if last {
                        *node.children().last()?
                    } else {
                        node.child_at(0)?
                    };
                }
            }
        }
    }

    pub(crate) fn leaf_node(&self, id: NodeId) -> Option<&LeafNode<K, V>> {
        self.nodes.get(id)?.as_leaf()
    }

    fn node_ref(&self, id: NodeId) -> Result<&Node<K, V>, TreeError> {
        self.nodes.get(id).ok_or(TreeError::DanglingNode(id))
    }

    fn internal(&self, id: NodeId) -> Result<&InternalNode<K>, TreeError> {
        self.node_ref(id)?
            .as_internal()
            .ok_or(TreeError::Node(NodeError::WrongNodeKind {
                expected: NodeKind::Internal,
            }))
    }

    fn internal_mut(&mut self, id: NodeId) -> Result<&mut InternalNode<K>, TreeError> {
        self.nodes
            .get_mut(id)
            .ok_or(TreeError::DanglingNode(id))?
            .as_internal_mut()
            .ok_or(TreeError::Node(NodeError::WrongNodeKind {
                expected: NodeKind::Internal,
            }))
    }

    fn leaf_mut(&mut self, id: NodeId) -> Result<&mut LeafNode<K, V>, TreeError> {
        self.nodes
            .get_mut(id)
            .ok_or(TreeError::DanglingNode(id))?
            .as_leaf_mut()
            .ok_or(TreeError::Node(NodeError::WrongNodeKind {
                expected: NodeKind::Leaf,
            }))
    }

    fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) -> Result<(), TreeError> {
        self.nodes
            .get_mut(id)
            .ok_or(TreeError::DanglingNode(id))?
            .set_parent(parent);
        Ok(())
    }
}

/// Errors that can occur during tree operations.
///
/// None of these is caused by the caller's keys; each one means the tree's
/// structure is broken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Node-level operation failed.
    Node(NodeError),
    /// A handle refers to a freed arena slot.
    DanglingNode(NodeId),
    /// Parent links, root or sibling kinds contradict each other.
    StructuralInconsistency(String),
    /// An earlier operation failed; the tree refuses further mutations.
    Poisoned,
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node(e) => write!(f, "node error: {e}"),
            Self::DanglingNode(id) => write!(f, "dangling node handle {id}"),
            Self::StructuralInconsistency(message) => {
                write!(f, "structural inconsistency: {message}")
            }
            Self::Poisoned => write!(f, "tree is poisoned by an earlier failure"),
        }
    }
}

impl std::error::Error for TreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Node(e) => Some(e),
            _ => None,
        }
    }
}

impl From<NodeError> for TreeError {
    fn from(e: NodeError) -> Self {
        Self::Node(e)
    }
}
