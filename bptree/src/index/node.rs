//! B+ tree node types.
//!
//! Nodes live in a [`NodeArena`](super::arena::NodeArena) and refer to each
//! other through [`NodeId`] handles:
//! - Internal nodes: store separator keys and child handles
//! - Leaf nodes: store key-value pairs, doubly-linked for range scans
//!
//! A node never dereferences another node. Anything that has to touch a
//! neighbour (re-parenting, leaf-chain repair, separator updates) is done by
//! the tree, which owns the arena.

/// Handle of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Slot index inside the arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node kind discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Internal,
    Leaf,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Internal => write!(f, "internal"),
            Self::Leaf => write!(f, "leaf"),
        }
    }
}

/// A tree node: the capability set shared by both kinds, dispatched by tag.
#[derive(Debug, Clone)]
pub enum Node<K, V> {
    Internal(InternalNode<K>),
    Leaf(LeafNode<K, V>),
}

impl<K, V> Node<K, V> {
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Internal(_) => NodeKind::Internal,
            Self::Leaf(_) => NodeKind::Leaf,
        }
    }

    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    /// Number of entries (key-value pairs or separator-child pairs).
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::Internal(node) => node.len(),
            Self::Leaf(node) => node.len(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn max_size(&self) -> usize {
        match self {
            Self::Internal(node) => node.max_size(),
            Self::Leaf(node) => node.max_size(),
        }
    }

    #[must_use]
    pub const fn min_size(&self) -> usize {
        self.max_size() / 2
    }

    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.len() >= self.max_size()
    }

    /// Whether the node is at or above the underflow threshold.
    #[must_use]
    pub const fn is_half_full(&self) -> bool {
        self.len() >= self.min_size()
    }

    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        match self {
            Self::Internal(node) => node.parent,
            Self::Leaf(node) => node.parent,
        }
    }

    pub const fn set_parent(&mut self, parent: Option<NodeId>) {
        match self {
            Self::Internal(node) => node.parent = parent,
            Self::Leaf(node) => node.parent = parent,
        }
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    #[must_use]
    pub const fn as_leaf(&self) -> Option<&LeafNode<K, V>> {
        match self {
            Self::Leaf(node) => Some(node),
            Self::Internal(_) => None,
        }
    }

    pub const fn as_leaf_mut(&mut self) -> Option<&mut LeafNode<K, V>> {
        match self {
            Self::Leaf(node) => Some(node),
            Self::Internal(_) => None,
        }
    }

    #[must_use]
    pub const fn as_internal(&self) -> Option<&InternalNode<K>> {
        match self {
            Self::Internal(node) => Some(node),
            Self::Leaf(_) => None,
        }
    }

    pub const fn as_internal_mut(&mut self) -> Option<&mut InternalNode<K>> {
        match self {
            Self::Internal(node) => Some(node),
            Self::Leaf(_) => None,
        }
    }
}

/// An internal (non-leaf) node.
///
/// Logically an ordered list of `(separator, child)` pairs whose first
/// separator is a sentinel standing for negative infinity. The sentinel is
/// not stored: `keys[i - 1]` is the separator of pair `i`.
///
/// `Child[0]` contains keys < `Key[1]`
/// `Child[i]` contains keys >= `Key[i]` and < `Key[i+1]`
#[derive(Debug, Clone)]
pub struct InternalNode<K> {
    /// Separators of pairs `1..len()`. `keys.len() + 1 == children.len()`
    /// unless the node is empty.
    pub(crate) keys: Vec<K>,
    pub(crate) children: Vec<NodeId>,
    max: usize,
    pub(crate) parent: Option<NodeId>,
}

impl<K> InternalNode<K> {
    /// Create a new empty internal node.
    #[must_use]
    pub const fn new(max: usize) -> Self {
        Self {
            keys: Vec::new(),
            children: Vec::new(),
            max,
            parent: None,
        }
    }

    /// Create the two-child node that becomes a new root after a split.
    #[must_use]
    pub fn with_children(max: usize, left: NodeId, key: K, right: NodeId) -> Self {
        Self {
            keys: vec![key],
            children: vec![left, right],
            max,
            parent: None,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max
    }

    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.len() >= self.max
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Separators of pairs `1..len()`, in order.
    #[must_use]
    pub fn separators(&self) -> &[K] {
        &self.keys
    }

    #[must_use]
    pub fn child_at(&self, index: usize) -> Option<NodeId> {
        self.children.get(index).copied()
    }

    /// Separator of pair `index`. The sentinel (pair 0) has none.
    #[must_use]
    pub fn separator(&self, index: usize) -> Option<&K> {
        index.checked_sub(1).and_then(|i| self.keys.get(i))
    }

    /// Position of `child` among this node's pairs.
    #[must_use]
    pub fn value_index(&self, child: NodeId) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }
}

impl<K: Ord> InternalNode<K> {
    /// Binary search over the separators of pairs `1..`.
    ///
    /// `Ok(i)` is the pair whose separator equals `key`; `Err(i)` is the
    /// first pair whose separator exceeds it (`len()` if none does).
    pub fn find(&self, key: &K) -> Result<usize, usize> {
        match self.keys.binary_search(key) {
            Ok(i) => Ok(i + 1),
            Err(i) => Err(i + 1),
        }
    }

    /// Index of the child to descend into for `key`.
    ///
    /// This is the last pair whose separator is <= `key`: an exact match
    /// routes to that separator's child, a key below every separator to
    /// child 0, a key above every separator to the last child.
    #[must_use]
    pub fn child_index(&self, key: &K) -> usize {
        self.keys.partition_point(|separator| separator <= key)
    }

    /// Child to descend into for `key`. `None` only for an empty node.
    #[must_use]
    pub fn lookup(&self, key: &K) -> Option<NodeId> {
        self.children.get(self.child_index(key)).copied()
    }

    /// Insert a `(key, child)` pair in sorted position, after any pairs
    /// carrying an equal separator.
    ///
    /// The node holds `max` pairs plus one overflow slot that lives until the
    /// caller splits it. Inserting past that slot means a split was skipped.
    pub fn insert(&mut self, key: K, child: NodeId) -> Result<(), NodeError> {
        if self.len() > self.max {
            return Err(NodeError::CapacityViolation {
                kind: NodeKind::Internal,
                capacity: self.max,
            });
        }

        if self.children.is_empty() {
            // The only pair of a node is its sentinel pair.
            self.children.push(child);
            return Ok(());
        }

        let pos = self.child_index(&key);
        self.keys.insert(pos, key);
        self.children.insert(pos + 1, child);
        Ok(())
    }

    /// Split at the midpoint, returning the new right node and the promoted
    /// separator.
    ///
    /// The separator of the right node's first pair moves up to the parent;
    /// the right node keeps it only implicitly, as its sentinel.
    pub fn split(&mut self) -> Result<(Self, K), NodeError> {
        let len = self.len();
        if len < 2 {
            return Err(NodeError::TooFewEntries { len, needed: 2 });
        }
        let mid = len / 2;

        let right_children = self.children.split_off(mid);
        let right_keys = self.keys.split_off(mid);
        let promoted = self
            .keys
            .pop()
            .ok_or(NodeError::TooFewEntries { len, needed: 2 })?;

        let right = Self {
            keys: right_keys,
            children: right_children,
            max: self.max,
            parent: self.parent,
        };

        Ok((right, promoted))
    }

    /// Remove the pair whose child is `child`, returning its former index.
    ///
    /// Removing pair 0 promotes pair 1 to sentinel; its separator is dropped.
    pub fn remove(&mut self, child: NodeId) -> Result<usize, NodeError> {
        let index = self
            .value_index(child)
            .ok_or(NodeError::ChildNotFound(child))?;

        self.children.remove(index);
        if index > 0 {
            self.keys.remove(index - 1);
        } else if !self.keys.is_empty() {
            self.keys.remove(0);
        }

        Ok(index)
    }

    /// Replace the separator of pair `index` (which must be >= 1).
    pub fn set_key_at(&mut self, index: usize, key: K) -> Result<(), NodeError> {
        let slot = index
            .checked_sub(1)
            .and_then(|i| self.keys.get_mut(i))
            .ok_or(NodeError::KeyIndexOutOfRange(index))?;
        *slot = key;
        Ok(())
    }

    /// Move this node's first pair to the end of `other`, its left sibling.
    ///
    /// `separator` is the parent's separator for this node; it becomes the
    /// separator of the moved pair in `other`. Returns the moved child (to be
    /// re-parented) and this node's new lower bound (for the parent).
    pub fn move_first_to_end_of(
        &mut self,
        other: &mut Self,
        separator: K,
    ) -> Result<(NodeId, K), NodeError> {
        if self.len() < 2 {
            return Err(NodeError::TooFewEntries {
                len: self.len(),
                needed: 2,
            });
        }

        let child = self.children.remove(0);
        let boundary = self.keys.remove(0);

        if !other.children.is_empty() {
            other.keys.push(separator);
        }
        other.children.push(child);

        Ok((child, boundary))
    }

    /// Move this node's last pair to the front of `other`, its right sibling.
    ///
    /// `separator` is the parent's separator for `other`; it ends up between
    /// the moved child and `other`'s former first child. Returns the moved
    /// child and `other`'s new lower bound.
    pub fn move_last_to_front_of(
        &mut self,
        other: &mut Self,
        separator: K,
    ) -> Result<(NodeId, K), NodeError> {
        if self.len() < 2 {
            return Err(NodeError::TooFewEntries {
                len: self.len(),
                needed: 2,
            });
        }

        let (Some(child), Some(boundary)) = (self.children.pop(), self.keys.pop()) else {
            return Err(NodeError::TooFewEntries {
                len: self.len(),
                needed: 2,
            });
        };

        if !other.children.is_empty() {
            other.keys.insert(0, separator);
        }
        other.children.insert(0, child);

        Ok((child, boundary))
    }

    /// Append all pairs to `other`, the left sibling, leaving this node empty.
    ///
    /// `separator` is the parent's separator for this node. Returns the moved
    /// children.
    pub fn move_all_to(&mut self, other: &mut Self, separator: K) -> Vec<NodeId> {
        if self.children.is_empty() {
            return Vec::new();
        }

        let moved = self.children.clone();
        if other.children.is_empty() {
            other.keys = std::mem::take(&mut self.keys);
            other.children = std::mem::take(&mut self.children);
        } else {
            other.keys.push(separator);
            other.keys.append(&mut self.keys);
            other.children.append(&mut self.children);
        }
        moved
    }
}

/// A key-value entry in a leaf node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafEntry<K, V> {
    pub key: K,
    pub value: V,
}

/// A leaf node.
///
/// Stores key-value pairs in strictly increasing key order and links to the
/// neighbouring leaves.
#[derive(Debug, Clone)]
pub struct LeafNode<K, V> {
    /// Entries in sorted order by key.
    pub(crate) entries: Vec<LeafEntry<K, V>>,
    max: usize,
    pub(crate) parent: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
    pub(crate) prev: Option<NodeId>,
}

impl<K, V> LeafNode<K, V> {
    /// Create a new empty leaf node.
    #[must_use]
    pub const fn new(max: usize) -> Self {
        Self {
            entries: Vec::new(),
            max,
            parent: None,
            next: None,
            prev: None,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max
    }

    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.len() >= self.max
    }

    #[must_use]
    pub fn entries(&self) -> &[LeafEntry<K, V>] {
        &self.entries
    }

    #[must_use]
    pub const fn next(&self) -> Option<NodeId> {
        self.next
    }

    #[must_use]
    pub const fn prev(&self) -> Option<NodeId> {
        self.prev
    }

    #[must_use]
    pub fn first_key(&self) -> Option<&K> {
        self.entries.first().map(|e| &e.key)
    }
}

impl<K: Ord, V> LeafNode<K, V> {
    /// Find the index where a key should be inserted (or exists).
    pub fn find(&self, key: &K) -> Result<usize, usize> {
        self.entries.binary_search_by(|e| e.key.cmp(key))
    }

    /// Get a value by key.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.find(key).ok().map(|i| &self.entries[i].value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.find(key).ok().map(|i| &mut self.entries[i].value)
    }

    /// Insert or update an entry. Never rejects; the caller splits when the
    /// leaf is full afterwards.
    ///
    /// Returns the old value if updating, None if inserting.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.find(&key) {
            Ok(i) => Some(std::mem::replace(&mut self.entries[i].value, value)),
            Err(i) => {
                self.entries.insert(i, LeafEntry { key, value });
                None
            }
        }
    }

    /// Remove an entry by key.
    ///
    /// Returns the removed value if found.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.find(key).ok().map(|i| self.entries.remove(i).value)
    }

    /// Split at `len() / 2`, returning the new right leaf with the upper half.
    ///
    /// The right leaf inherits this leaf's parent and `next`; the caller
    /// points `self.next` (and the old successor's `prev`) at it once it has
    /// a handle.
    #[must_use]
    pub fn split(&mut self) -> Self {
        let mid = self.entries.len() / 2;
        let right_entries = self.entries.split_off(mid);

        Self {
            entries: right_entries,
            max: self.max,
            parent: self.parent,
            next: self.next,
            prev: None,
        }
    }

    /// Move this leaf's first entry to the end of `other`, its left sibling.
    pub fn move_first_to_end_of(&mut self, other: &mut Self) -> Result<(), NodeError> {
        if self.entries.is_empty() {
            return Err(NodeError::TooFewEntries { len: 0, needed: 1 });
        }
        let entry = self.entries.remove(0);
        other.entries.push(entry);
        Ok(())
    }

    /// Move this leaf's last entry to the front of `other`, its right sibling.
    pub fn move_last_to_front_of(&mut self, other: &mut Self) -> Result<(), NodeError> {
        let entry = self
            .entries
            .pop()
            .ok_or(NodeError::TooFewEntries { len: 0, needed: 1 })?;
        other.entries.insert(0, entry);
        Ok(())
    }

    /// Append every entry to `other`, the left sibling, leaving this leaf
    /// empty. The caller detaches it.
    pub fn move_all_to(&mut self, other: &mut Self) {
        other.entries.append(&mut self.entries);
    }
}

/// Errors raised by node-level operations. All of them mean the tree surgery
/// went wrong, never that the caller passed a bad key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Insert into a node that should already have been split.
    CapacityViolation { kind: NodeKind, capacity: usize },
    /// A child handle is not among the node's children.
    ChildNotFound(NodeId),
    /// A separator index is the sentinel or past the end.
    KeyIndexOutOfRange(usize),
    /// The node has too few entries for the requested transfer or split.
    TooFewEntries { len: usize, needed: usize },
    /// A handle refers to the other kind of node.
    WrongNodeKind { expected: NodeKind },
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapacityViolation { kind, capacity } => {
                write!(f, "{kind} node over capacity (max {capacity})")
            }
            Self::ChildNotFound(child) => write!(f, "child {child} not found in parent"),
            Self::KeyIndexOutOfRange(index) => {
                write!(f, "separator index {index} out of range")
            }
            Self::TooFewEntries { len, needed } => {
                write!(f, "node has {len} entries, needs at least {needed}")
            }
            Self::WrongNodeKind { expected } => write!(f, "expected {expected} node"),
        }
    }
}

impl std::error::Error for NodeError {}
