//! Arena storage for wiring-diagram nodes.
//!
//! Provides `NodeIdx` (a dense, total-orderable index) and `NodeArena`
//! (contiguous, append-only storage). Diagrams are immutable once built, so
//! the arena never frees slots; edges refer to nodes by index pairs.
//!
//! # Determinism
//! - `NodeIdx` ordering is by its inner `u32`.
//! - Iteration order over slots is allocation order (0..len).
//!
//! # Citations
//! - Region allocation: Hanson, "Fast allocation and deallocation of memory
//!   based on object lifetimes", Software: Practice and Experience 20 (1990)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

/// Dense node index for arena-allocated diagrams.
///
/// `NodeIdx(u32)` is `Copy`, `Eq`, `Ord`, `Hash`. The inner value is an index
/// into the arena's slot array and is only meaningful for the arena that
/// produced it.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeIdx(u32);

impl NodeIdx {
    /// Creates a new `NodeIdx` from a raw `u32`.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw `u32` index.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns the index as a `usize`, for slice access.
    #[inline]
    pub const fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Append-only contiguous storage for node data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeArena<T> {
    slots: Vec<T>,
}

impl<T> NodeArena<T> {
    /// Creates a new empty arena.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Creates an empty arena with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    /// Allocates a new slot holding `data` and returns its index.
    pub fn allocate(&mut self, data: T) -> NodeIdx {
        let idx = self.slots.len() as u32;
        self.slots.push(data);
        NodeIdx(idx)
    }

    /// Returns a reference to the data stored at `id`, if present.
    pub fn get(&self, id: NodeIdx) -> Option<&T> {
        self.slots.get(id.as_usize())
    }

    /// Returns the number of allocated nodes.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no node has been allocated.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates over all nodes in allocation order.
    ///
    /// Yields `(NodeIdx, &T)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIdx, &T)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(idx, data)| (NodeIdx(idx as u32), data))
    }

    /// Iterates over all valid indices in allocation order.
    pub fn indices(&self) -> impl Iterator<Item = NodeIdx> {
        (0..self.slots.len() as u32).map(NodeIdx)
    }
}

impl<T> Default for NodeArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<NodeIdx> for NodeArena<T> {
    type Output = T;

    fn index(&self, id: NodeIdx) -> &T {
        &self.slots[id.as_usize()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_basic() {
        let mut arena: NodeArena<&'static str> = NodeArena::new();
        assert!(arena.is_empty());

        let id1 = arena.allocate("self");
        assert_eq!(id1.as_u32(), 0);
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get(id1), Some(&"self"));

        let id2 = arena.allocate("pred");
        assert_eq!(id2.as_u32(), 1);
        assert_eq!(arena[id2], "pred");
        assert_eq!(arena.get(NodeIdx::new(7)), None);
    }

    #[test]
    fn deterministic_iteration() {
        let mut arena: NodeArena<i32> = NodeArena::with_capacity(4);
        for i in 0..4 {
            arena.allocate(i * 10);
        }
        let collected: Vec<_> = arena.iter().map(|(id, &val)| (id.as_u32(), val)).collect();
        assert_eq!(collected, vec![(0, 0), (1, 10), (2, 20), (3, 30)]);
        let indices: Vec<_> = arena.indices().map(|i| i.as_u32()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(NodeIdx::new(3).to_string(), "#3");
    }
}
