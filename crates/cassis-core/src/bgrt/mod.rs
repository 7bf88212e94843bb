//! The Bipartite Graph Representation Tree: a trie over sorted ID sets with
//! shared-prefix factoring, indexed by a root array keyed on `min(species)`.

pub mod io;
mod node;

pub use node::{BgrtNode, NodeHandle, UNDEF_INGROUP};

use crate::error::{BgrtErrorKind, CassisResult};
use crate::id::Id;
use crate::idset::SortedIdSet;

/// Parameters embedded in a BGRT file header (§6), carried alongside the
/// node arena so `info` can report them without re-deriving anything.
#[derive(Debug, Clone, PartialEq)]
pub struct BgrtParams {
    pub base4_compressed: bool,
    pub num_species: u32,
    pub ingroup_mismatch_distance: u32,
    pub outgroup_mismatch_distance: u32,
    pub min_len: u32,
    pub max_len: u32,
    pub min_gc: f32,
    pub max_gc: f32,
    pub min_temp: f32,
    pub max_temp: f32,
    pub comment: String,
}

impl Default for BgrtParams {
    fn default() -> Self {
        Self {
            base4_compressed: false,
            num_species: 0,
            ingroup_mismatch_distance: 0,
            outgroup_mismatch_distance: 0,
            min_len: 0,
            max_len: 0,
            min_gc: 0.0,
            max_gc: 0.0,
            min_temp: 0.0,
            max_temp: 0.0,
            comment: String::new(),
        }
    }
}

/// The BGRT: an arena of [`BgrtNode`]s plus a root array of length
/// `num_species`, entry `i` pointing at the subtree whose matched-id sets
/// all have minimum element `i`.
#[derive(Debug, Clone)]
pub struct Bgrt {
    pub params: BgrtParams,
    nodes: Vec<BgrtNode>,
    roots: Vec<Option<NodeHandle>>,
}

enum OverlapCase {
    /// Neither side is a subset of the other: split into a new overlap
    /// parent with two children.
    Split { overlap: SortedIdSet, existing_left: SortedIdSet, new_left: SortedIdSet },
    /// The existing node's species is a strict superset of the incoming
    /// set: the incoming set becomes the new parent, existing the child.
    ExistingSuperset { overlap: SortedIdSet, existing_left: SortedIdSet },
    /// The incoming set is a strict superset of the existing node: recurse
    /// into the existing node's children with the leftover.
    NewSuperset { new_left: SortedIdSet },
    /// Exact match: attach here.
    Exact,
}

fn classify(incoming: &SortedIdSet, existing: &SortedIdSet) -> OverlapCase {
    let (new_left, existing_left, overlap) = SortedIdSet::diff(incoming, existing);
    match (existing_left.is_empty(), new_left.is_empty()) {
        (false, false) => OverlapCase::Split { overlap, existing_left, new_left },
        (false, true) => OverlapCase::ExistingSuperset { overlap, existing_left },
        (true, false) => OverlapCase::NewSuperset { new_left },
        (true, true) => OverlapCase::Exact,
    }
}

impl Bgrt {
    #[must_use]
    pub fn new(params: BgrtParams) -> Self {
        let num_species = params.num_species as usize;
        Self {
            params,
            nodes: Vec::new(),
            roots: vec![None; num_species],
        }
    }

    /// Rebuild a `Bgrt` from an already-constructed arena and root array
    /// (used by [`io::read`] once deserialisation has produced both).
    #[must_use]
    pub(crate) fn from_parts(params: BgrtParams, nodes: Vec<BgrtNode>, roots: Vec<Option<NodeHandle>>) -> Self {
        Self { params, nodes, roots }
    }

    #[must_use]
    pub fn node(&self, handle: NodeHandle) -> &BgrtNode {
        &self.nodes[handle as usize]
    }

    #[must_use]
    pub fn roots(&self) -> &[Option<NodeHandle>] {
        &self.roots
    }

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn alloc(&mut self, species: SortedIdSet, parent: Option<NodeHandle>) -> NodeHandle {
        self.nodes.push(BgrtNode::new(species, parent));
        (self.nodes.len() - 1) as NodeHandle
    }

    /// Place one `(signature, matched_ids, outgroup_count)` triple.
    pub fn insert(&mut self, signature: String, matched_ids: SortedIdSet, outgroup_count: u32) -> CassisResult<()> {
        if matched_ids.is_empty() {
            return Err(BgrtErrorKind::EmptyMatchedIds.into());
        }
        let handle = self.insert_at_root(matched_ids);
        self.nodes[handle as usize].signatures.push(signature);
        self.nodes[handle as usize].supposed_outgroup_matches.push(outgroup_count);
        Ok(())
    }

    /// Place several signatures that all share the same matched-id set, in
    /// one tree-shape update (mirrors the batch overload of the original
    /// insertion routine).
    pub fn insert_many(
        &mut self,
        signatures: Vec<String>,
        matched_ids: SortedIdSet,
        outgroup_counts: Vec<u32>,
    ) -> CassisResult<()> {
        if matched_ids.is_empty() {
            return Err(BgrtErrorKind::EmptyMatchedIds.into());
        }
        debug_assert_eq!(signatures.len(), outgroup_counts.len());
        let handle = self.insert_at_root(matched_ids);
        self.nodes[handle as usize].signatures.extend(signatures);
        self.nodes[handle as usize].supposed_outgroup_matches.extend(outgroup_counts);
        Ok(())
    }

    fn insert_at_root(&mut self, species: SortedIdSet) -> NodeHandle {
        let m = species.min().expect("checked non-empty by caller").index();
        match self.roots[m] {
            None => {
                let handle = self.alloc(species, None);
                self.roots[m] = Some(handle);
                handle
            }
            Some(existing) => {
                let case = classify(&species, &self.nodes[existing as usize].species);
                match case {
                    OverlapCase::Split { overlap, existing_left, new_left } => {
                        let overlap_node = self.alloc(overlap, None);
                        self.nodes[existing as usize].parent = Some(overlap_node);
                        self.nodes[existing as usize].species = existing_left;
                        self.nodes[overlap_node as usize].children.push(existing);
                        self.roots[m] = Some(overlap_node);
                        self.insert_into_children(overlap_node, new_left)
                    }
                    OverlapCase::ExistingSuperset { overlap, existing_left } => {
                        let overlap_node = self.alloc(overlap, None);
                        self.nodes[existing as usize].parent = Some(overlap_node);
                        self.nodes[existing as usize].species = existing_left;
                        self.nodes[overlap_node as usize].children.push(existing);
                        self.roots[m] = Some(overlap_node);
                        overlap_node
                    }
                    OverlapCase::NewSuperset { new_left } => self.insert_into_children(existing, new_left),
                    OverlapCase::Exact => existing,
                }
            }
        }
    }

    /// Find (or create) the place for `species` among `parent`'s children,
    /// recursing through overlap splits exactly as the top-level dispatch
    /// does, but operating on a `Vec` slot instead of the root array.
    fn insert_into_children(&mut self, parent: NodeHandle, species: SortedIdSet) -> NodeHandle {
        let first = species.min().expect("checked non-empty by caller");
        let children = &self.nodes[parent as usize].children;
        let mut idx = 0;
        while idx < children.len() && self.nodes[children[idx] as usize].species.min().unwrap() < first {
            idx += 1;
        }
        let slot_matches = idx < children.len() && self.nodes[children[idx] as usize].species.min().unwrap() == first;

        if !slot_matches {
            let handle = self.alloc(species, Some(parent));
            self.nodes[parent as usize].children.insert(idx, handle);
            return handle;
        }

        let existing = self.nodes[parent as usize].children[idx];
        let case = classify(&species, &self.nodes[existing as usize].species);
        match case {
            OverlapCase::Split { overlap, existing_left, new_left } => {
                let overlap_node = self.alloc(overlap, Some(parent));
                self.nodes[existing as usize].parent = Some(overlap_node);
                self.nodes[existing as usize].species = existing_left;
                self.nodes[overlap_node as usize].children.push(existing);
                self.nodes[parent as usize].children[idx] = overlap_node;
                self.insert_into_children(overlap_node, new_left)
            }
            OverlapCase::ExistingSuperset { overlap, existing_left } => {
                let overlap_node = self.alloc(overlap, Some(parent));
                self.nodes[existing as usize].parent = Some(overlap_node);
                self.nodes[existing as usize].species = existing_left;
                self.nodes[overlap_node as usize].children.push(existing);
                self.nodes[parent as usize].children[idx] = overlap_node;
                overlap_node
            }
            OverlapCase::NewSuperset { new_left } => self.insert_into_children(existing, new_left),
            OverlapCase::Exact => existing,
        }
    }

    /// Reset every node's traversal scratch before a new branch-and-bound
    /// run, pre-sizing each node's `ingroup_array` to `depth_capacity`
    /// cells so concurrent workers can update them through a shared
    /// `&Bgrt` without ever needing to resize under that shared reference.
    pub(crate) fn reset_scratch(&mut self, depth_capacity: usize) {
        for node in &mut self.nodes {
            node.reset_scratch(depth_capacity);
        }
    }

    pub(crate) fn ingroup_at(&self, handle: NodeHandle, depth: usize) -> u32 {
        self.nodes[handle as usize].ingroup_at(depth)
    }

    /// Update one scratch cell. Takes `&self`: different BGRT roots are
    /// disjoint subtrees (see the module doc), so two workers processing
    /// different roots never touch the same node's cell, and the cell
    /// itself is an atomic for the benefit of the borrow checker, not for
    /// resolving a genuine race.
    pub(crate) fn set_ingroup_at(&self, handle: NodeHandle, depth: usize, value: u32) {
        self.nodes[handle as usize].set_ingroup_at(depth, value);
    }

    pub(crate) fn parent_of(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.nodes[handle as usize].parent
    }

    pub(crate) fn children_of(&self, handle: NodeHandle) -> &[NodeHandle] {
        &self.nodes[handle as usize].children
    }

    #[must_use]
    pub fn path_union(&self, mut handle: NodeHandle) -> SortedIdSet {
        let mut chain = vec![handle];
        while let Some(parent) = self.nodes[handle as usize].parent {
            chain.push(parent);
            handle = parent;
        }
        let mut ids: Vec<Id> = Vec::new();
        for &h in chain.iter().rev() {
            ids.extend(self.nodes[h as usize].species.iter());
        }
        ids.sort_unstable();
        SortedIdSet::from_sorted(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: u32) -> Id {
        Id::from_index(i)
    }

    fn set(vals: &[u32]) -> SortedIdSet {
        vals.iter().map(|&v| id(v)).collect()
    }

    fn bgrt(num_species: u32) -> Bgrt {
        Bgrt::new(BgrtParams { num_species, ..BgrtParams::default() })
    }

    #[test]
    fn scenario_c_three_overlapping_sets() {
        let mut tree = bgrt(4);
        tree.insert("s1".into(), set(&[0, 1, 2]), 0).unwrap();
        tree.insert("s2".into(), set(&[0, 1, 3]), 0).unwrap();
        tree.insert("s3".into(), set(&[0, 1]), 0).unwrap();

        let root = tree.roots()[0].expect("root[0] must exist");
        assert_eq!(tree.node(root).species(), &set(&[0, 1]));
        assert_eq!(tree.node(root).signatures(), ["s3"]);

        let children: Vec<_> = tree.node(root).children().to_vec();
        assert_eq!(children.len(), 2);
        let species_sets: Vec<SortedIdSet> = children.iter().map(|&c| tree.node(c).species().clone()).collect();
        assert!(species_sets.contains(&set(&[2])));
        assert!(species_sets.contains(&set(&[3])));

        for &c in &children {
            let n = tree.node(c);
            if n.species() == &set(&[2]) {
                assert_eq!(n.signatures(), ["s1"]);
            } else {
                assert_eq!(n.signatures(), ["s2"]);
            }
        }
    }

    #[test]
    fn insert_into_empty_root_creates_leaf() {
        let mut tree = bgrt(4);
        tree.insert("s".into(), set(&[2]), 0).unwrap();
        let root = tree.roots()[2].unwrap();
        assert_eq!(tree.node(root).species(), &set(&[2]));
    }

    #[test]
    fn duplicate_exact_set_appends_to_same_node() {
        let mut tree = bgrt(4);
        tree.insert("s1".into(), set(&[0, 1]), 0).unwrap();
        tree.insert("s2".into(), set(&[0, 1]), 0).unwrap();
        let root = tree.roots()[0].unwrap();
        assert_eq!(tree.node(root).signatures(), ["s1", "s2"]);
        assert_eq!(tree.num_nodes(), 1);
    }

    #[test]
    fn empty_matched_ids_is_rejected() {
        let mut tree = bgrt(4);
        let err = tree.insert("s".into(), SortedIdSet::new(), 0).unwrap_err();
        assert!(matches!(err.into_inner(), crate::error::CassisErrorKind::Bgrt(BgrtErrorKind::EmptyMatchedIds)));
    }

    #[test]
    fn path_union_is_the_node_own_species_when_at_root() {
        let mut tree = bgrt(4);
        tree.insert("s".into(), set(&[0, 1, 2]), 0).unwrap();
        let root = tree.roots()[0].unwrap();
        assert_eq!(tree.path_union(root), set(&[0, 1, 2]));
    }
}
