//! A single BGRT node and the arena handle that addresses it.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::idset::SortedIdSet;

/// 32-bit arena handle for a [`BgrtNode`], replacing the original's raw
/// `parent`/`next`/`first_child` pointers (see the crate's design notes on
/// pointer graphs).
pub type NodeHandle = u32;

#[derive(Debug)]
pub struct BgrtNode {
    /// IDs covered incrementally by this node — present here but not on
    /// any ancestor on the path from its root-array slot.
    pub(crate) species: SortedIdSet,
    /// Canonical signature strings stored at this node.
    pub(crate) signatures: Vec<String>,
    /// Per-signature supposed-outgroup-match count, same index as
    /// `signatures`.
    pub(crate) supposed_outgroup_matches: Vec<u32>,
    /// Children ordered by `min(species)`, no duplicate minimums.
    pub(crate) children: Vec<NodeHandle>,
    pub(crate) parent: Option<NodeHandle>,
    /// Traversal scratch: best ingroup count seen so far at each tree
    /// depth, defaulting to 0 for depths never visited. [`UNDEF_INGROUP`]
    /// marks a depth this subtree is known unable to improve. Pre-sized to
    /// the tree's `max_depth + 1` by [`BgrtNode::reset_scratch`] before any
    /// traversal run, so concurrent workers can update cells through a
    /// shared `&Bgrt` — different roots' subtrees never share a node, so
    /// no two workers ever race on the same cell.
    pub(crate) ingroup_array: Vec<AtomicU32>,
}

/// Sentinel stored in [`BgrtNode::ingroup_array`] meaning "this BGRT
/// subtree cannot beat the current best at this tree depth" — distinct
/// from the default `0`, which just means "not evaluated yet".
pub const UNDEF_INGROUP: u32 = u32::MAX;

impl Clone for BgrtNode {
    fn clone(&self) -> Self {
        Self {
            species: self.species.clone(),
            signatures: self.signatures.clone(),
            supposed_outgroup_matches: self.supposed_outgroup_matches.clone(),
            children: self.children.clone(),
            parent: self.parent,
            ingroup_array: self.ingroup_array.iter().map(|v| AtomicU32::new(v.load(Ordering::Relaxed))).collect(),
        }
    }
}

impl BgrtNode {
    pub(crate) fn new(species: SortedIdSet, parent: Option<NodeHandle>) -> Self {
        debug_assert!(!species.is_empty(), "a BGRT node must never hold an empty species set");
        Self {
            species,
            signatures: Vec::new(),
            supposed_outgroup_matches: Vec::new(),
            children: Vec::new(),
            parent,
            ingroup_array: Vec::new(),
        }
    }

    #[must_use]
    pub fn species(&self) -> &SortedIdSet {
        &self.species
    }

    #[must_use]
    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }

    #[must_use]
    pub fn supposed_outgroup_matches(&self) -> &[u32] {
        &self.supposed_outgroup_matches
    }

    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    pub(crate) fn ingroup_at(&self, depth: usize) -> u32 {
        self.ingroup_array.get(depth).map_or(0, |v| v.load(Ordering::Relaxed))
    }

    /// Monotonic update: only ever raises a cell, so concurrent writers
    /// converge regardless of interleaving. Requires `depth` to already be
    /// in bounds — callers pre-size via [`BgrtNode::reset_scratch`].
    pub(crate) fn set_ingroup_at(&self, depth: usize, value: u32) {
        self.ingroup_array[depth].store(value, Ordering::Relaxed);
    }

    /// Pre-size the scratch array to `capacity` cells, all reset to `0`.
    pub(crate) fn reset_scratch(&mut self, capacity: usize) {
        self.ingroup_array = (0..capacity).map(|_| AtomicU32::new(0)).collect();
    }
}
