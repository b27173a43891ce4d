//! Ordered traversal over the leaf chain.
//!
//! Iteration never re-descends the tree: it finds a starting leaf once and then
//! follows the `next` (or `prev`) handles, so each step is O(1) amortized.

use std::iter::FusedIterator;
use std::ops::{Bound, RangeBounds};

use crate::index::node::{LeafEntry, LeafNode, NodeId};
use crate::index::tree::BPlusTree;

/// Borrowed view of a single leaf, able to step along the leaf chain.
pub struct LeafRef<'a, K, V> {
    tree: &'a BPlusTree<K, V>,
    id: NodeId,
    leaf: &'a LeafNode<K, V>,
}

impl<K, V> Clone for LeafRef<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for LeafRef<'_, K, V> {}

impl<'a, K: Ord + Clone, V> LeafRef<'a, K, V> {
    fn new(tree: &'a BPlusTree<K, V>, id: NodeId) -> Option<Self> {
        let leaf = tree.leaf_node(id)?;
        Some(Self { tree, id, leaf })
    }

    #[must_use]
    pub const fn id(self) -> NodeId {
        self.id
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.leaf.len()
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.leaf.is_empty()
    }

    #[must_use]
    pub fn entries(self) -> &'a [LeafEntry<K, V>] {
        self.leaf.entries()
    }

    #[must_use]
    pub fn keys(self) -> impl DoubleEndedIterator<Item = &'a K> {
        self.leaf.entries().iter().map(|e| &e.key)
    }

    #[must_use]
    pub fn values(self) -> impl DoubleEndedIterator<Item = &'a V> {
        self.leaf.entries().iter().map(|e| &e.value)
    }

    /// The following leaf in key order.
    #[must_use]
    pub fn next_leaf(self) -> Option<Self> {
        Self::new(self.tree, self.leaf.next()?)
    }

    /// The preceding leaf in key order.
    #[must_use]
    pub fn prev_leaf(self) -> Option<Self> {
        Self::new(self.tree, self.leaf.prev()?)
    }
}

/// Iterator over all leaves, left to right.
pub struct Leaves<'a, K, V> {
    next: Option<LeafRef<'a, K, V>>,
}

impl<'a, K: Ord + Clone, V> Iterator for Leaves<'a, K, V> {
    type Item = LeafRef<'a, K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.next_leaf();
        Some(current)
    }
}

impl<K: Ord + Clone, V> FusedIterator for Leaves<'_, K, V> {}

/// Iterator over every entry in key order. Double-ended.
pub struct Iter<'a, K, V> {
    tree: &'a BPlusTree<K, V>,
    /// Leaf and index of the next entry from the front.
    front: Option<(NodeId, usize)>,
    /// Leaf and index one past the next entry from the back.
    back: Option<(NodeId, usize)>,
    remaining: usize,
}

impl<'a, K: Ord + Clone, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let tree = self.tree;
        loop {
            let (id, index) = self.front?;
            let leaf = tree.leaf_node(id)?;
            if let Some(entry) = leaf.entries().get(index) {
                self.front = Some((id, index + 1));
                self.remaining -= 1;
                return Some((&entry.key, &entry.value));
            }
            self.front = leaf.next().map(|next| (next, 0));
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K: Ord + Clone, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let tree = self.tree;
        loop {
            let (id, end) = self.back?;
            let leaf = tree.leaf_node(id)?;
            if let Some(entry) = end.checked_sub(1).and_then(|i| leaf.entries().get(i)) {
                self.back = Some((id, end - 1));
                self.remaining -= 1;
                return Some((&entry.key, &entry.value));
            }
            self.back = leaf
                .prev()
                .and_then(|prev| Some((prev, tree.leaf_node(prev)?.len())));
        }
    }
}

impl<K: Ord + Clone, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K: Ord + Clone, V> FusedIterator for Iter<'_, K, V> {}

/// Iterator over the entries inside a key range, in ascending order.
pub struct Range<'a, K, V> {
    tree: &'a BPlusTree<K, V>,
    front: Option<(NodeId, usize)>,
    end: Bound<K>,
}

impl<K: Ord + Clone, V> Range<'_, K, V> {
    fn before_end(&self, key: &K) -> bool {
        match &self.end {
            Bound::Included(end) => key <= end,
            Bound::Excluded(end) => key < end,
            Bound::Unbounded => true,
        }
    }
}

impl<'a, K: Ord + Clone, V> Iterator for Range<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        loop {
            let (id, index) = self.front?;
            let leaf = tree.leaf_node(id)?;
            match leaf.entries().get(index) {
                Some(entry) if self.before_end(&entry.key) => {
                    self.front = Some((id, index + 1));
                    return Some((&entry.key, &entry.value));
                }
                Some(_) => {
                    self.front = None;
                    return None;
                }
                None => self.front = leaf.next().map(|next| (next, 0)),
            }
        }
    }
}

impl<K: Ord + Clone, V> FusedIterator for Range<'_, K, V> {}

impl<K: Ord + Clone, V> BPlusTree<K, V> {
    /// Iterate over all entries in key order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, V> {
        let back = self
            .edge_leaf(true)
            .and_then(|id| Some((id, self.leaf_node(id)?.len())));
        Iter {
            tree: self,
            front: self.edge_leaf(false).map(|id| (id, 0)),
            back,
            remaining: self.len(),
        }
    }

    /// Iterate over the entries whose keys fall in `bounds`.
    ///
    /// The start leaf is located by descent; the rest of the range is read
    /// off the leaf chain.
    pub fn range<R: RangeBounds<K>>(&self, bounds: R) -> Range<'_, K, V> {
        let front = match bounds.start_bound() {
            Bound::Unbounded => self.edge_leaf(false).map(|id| (id, 0)),
            Bound::Included(key) => self.position_of(key, false),
            Bound::Excluded(key) => self.position_of(key, true),
        };
        Range {
            tree: self,
            front,
            end: bounds.end_bound().cloned(),
        }
    }

    /// First entry position at or after `key` (strictly after if `exclusive`).
    fn position_of(&self, key: &K, exclusive: bool) -> Option<(NodeId, usize)> {
        let id = self.find_leaf(key)?;
        let index = match self.leaf_node(id)?.find(key) {
            Ok(i) if exclusive => i + 1,
            Ok(i) | Err(i) => i,
        };
        Some((id, index))
    }

    /// The leftmost leaf, if the tree is not empty.
    #[must_use]
    pub fn first_leaf(&self) -> Option<LeafRef<'_, K, V>> {
        LeafRef::new(self, self.edge_leaf(false)?)
    }

    /// The rightmost leaf, if the tree is not empty.
    #[must_use]
    pub fn last_leaf(&self) -> Option<LeafRef<'_, K, V>> {
        LeafRef::new(self, self.edge_leaf(true)?)
    }

    /// Walk the leaf chain from left to right.
    #[must_use]
    pub fn leaves(&self) -> Leaves<'_, K, V> {
        Leaves {
            next: self.first_leaf(),
        }
    }

    #[must_use]
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        let entry = self.first_leaf()?.entries().first()?;
        Some((&entry.key, &entry.value))
    }

    #[must_use]
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        let entry = self.last_leaf()?.entries().last()?;
        Some((&entry.key, &entry.value))
    }
}

impl<'a, K: Ord + Clone, V> IntoIterator for &'a BPlusTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
