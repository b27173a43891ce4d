//! Slot storage for tree nodes.
//!
//! Nodes are owned by the arena and addressed by [`NodeId`]. Parent links and
//! the leaf chain are plain handles, so the node graph has no ownership
//! cycles. Freed slots are recycled through a free list.
//!
//! # Invariants
//!
//! - `live + free.len() == slots.len()`
//! - a handle on the free list refers to an empty slot

use super::node::{Node, NodeId};

/// Two distinct nodes borrowed mutably at once.
pub type NodePair<'a, K, V> = (&'a mut Node<K, V>, &'a mut Node<K, V>);

#[derive(Debug, Clone)]
pub struct NodeArena<K, V> {
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<NodeId>,
    live: usize,
}

impl<K, V> Default for NodeArena<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> NodeArena<K, V> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Number of allocated nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Store a node, reusing a freed slot when one is available.
    pub fn alloc(&mut self, node: Node<K, V>) -> NodeId {
        self.live += 1;
        if let Some(id) = self.free.pop() {
            self.slots[id.0] = Some(node);
            id
        } else {
            let id = NodeId(self.slots.len());
            self.slots.push(Some(node));
            id
        }
    }

    /// Release a node, returning it. `None` for a stale handle.
    pub fn free(&mut self, id: NodeId) -> Option<Node<K, V>> {
        let node = self.slots.get_mut(id.0)?.take()?;
        self.live -= 1;
        self.free.push(id);
        Some(node)
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node<K, V>> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<K, V>> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Borrow two distinct nodes mutably at once.
    pub fn get_pair_mut(
        &mut self,
        a: NodeId,
        b: NodeId,
    ) -> Option<NodePair<'_, K, V>> {
        if a == b || a.0 >= self.slots.len() || b.0 >= self.slots.len() {
            return None;
        }

        if a.0 < b.0 {
            let (low, high) = self.slots.split_at_mut(b.0);
            Some((low[a.0].as_mut()?, high[0].as_mut()?))
        } else {
            let (low, high) = self.slots.split_at_mut(a.0);
            Some((high[0].as_mut()?, low[b.0].as_mut()?))
        }
    }

    /// Drop every node.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }
}
