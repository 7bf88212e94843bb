//! The CaSSiS phylogenetic tree: a binary tree over organisms with a
//! one-pass matching-propagation algorithm and an O(1) LCA structure.

pub mod lca;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{CassisResult, TreeErrorKind};
use crate::id::Id;
use crate::idset::SortedIdSet;
use crate::namemap::NameMap;
use crate::tree::lca::EulerLca;

/// 32-bit arena handle for a [`TreeNode`].
pub type TreeHandle = u32;

/// External-parser input: a binary tree of organism names, consumed by
/// [`CassisTree::build`]. Produced by a Newick (or other format) reader
/// that lives outside this crate.
#[derive(Debug, Clone)]
pub enum TreeSpec {
    Leaf {
        name: String,
        branch_length: f64,
    },
    Internal {
        left: Box<TreeSpec>,
        right: Box<TreeSpec>,
        name: Option<String>,
        branch_length: f64,
    },
}

/// The aggregate fields a branch-and-bound traversal (§4.6) mutates as it
/// finds matches for a node: kept behind this one node's own [`Mutex`] so
/// that workers processing disjoint BGRT roots against the *same* CaSSiS
/// node only ever contend on this small bundle, never on the rest of the
/// tree.
#[derive(Debug, Clone)]
struct NodeAggregate {
    num_matches: Vec<u32>,
    signatures: Vec<Vec<Arc<str>>>,
    best_ingroup_coverage: u32,
    /// Cache of the BGRT root-array index that produced this node's best
    /// result during the traversal engine (§4.6); unused by the tree
    /// itself.
    starting_solution: Option<u32>,
}

impl NodeAggregate {
    fn new(k: u32) -> Self {
        Self {
            num_matches: vec![0; k as usize + 1],
            signatures: vec![Vec::new(); k as usize + 1],
            best_ingroup_coverage: 0,
            starting_solution: None,
        }
    }

    fn record_match(&mut self, total_outgroup: usize, ingroup: u32, signature: &Arc<str>) -> bool {
        if ingroup == 0 {
            return false;
        }
        match ingroup.cmp(&self.num_matches[total_outgroup]) {
            std::cmp::Ordering::Greater => {
                self.num_matches[total_outgroup] = ingroup;
                self.signatures[total_outgroup].clear();
                self.signatures[total_outgroup].push(Arc::clone(signature));
                self.best_ingroup_coverage = self.best_ingroup_coverage.max(ingroup);
                true
            }
            std::cmp::Ordering::Equal => {
                if !self.signatures[total_outgroup].iter().any(|s| Arc::ptr_eq(s, signature)) {
                    self.signatures[total_outgroup].push(Arc::clone(signature));
                }
                true
            }
            std::cmp::Ordering::Less => false,
        }
    }
}

#[derive(Debug)]
pub struct TreeNode {
    left: Option<TreeHandle>,
    right: Option<TreeHandle>,
    parent: Option<TreeHandle>,
    this_id: Id,
    leftmost_id: Id,
    rightmost_id: Id,
    depth: u32,
    branch_length: f64,
    group: SortedIdSet,
    aggregate: Mutex<NodeAggregate>,
}

impl Clone for TreeNode {
    fn clone(&self) -> Self {
        Self {
            left: self.left,
            right: self.right,
            parent: self.parent,
            this_id: self.this_id,
            leftmost_id: self.leftmost_id,
            rightmost_id: self.rightmost_id,
            depth: self.depth,
            branch_length: self.branch_length,
            group: self.group.clone(),
            aggregate: Mutex::new(self.aggregate.lock().clone()),
        }
    }
}

impl TreeNode {
    fn leaf(this_id: Id, branch_length: f64, k: u32) -> Self {
        Self {
            left: None,
            right: None,
            parent: None,
            this_id,
            leftmost_id: this_id,
            rightmost_id: this_id,
            depth: 0,
            branch_length,
            group: std::iter::once(this_id).collect(),
            aggregate: Mutex::new(NodeAggregate::new(k)),
        }
    }

    fn internal(left: TreeHandle, right: TreeHandle, branch_length: f64, k: u32, group_id: Id) -> Self {
        Self {
            left: Some(left),
            right: Some(right),
            parent: None,
            this_id: group_id,
            leftmost_id: Id::UNDEF,
            rightmost_id: Id::UNDEF,
            depth: 0,
            branch_length,
            group: SortedIdSet::new(),
            aggregate: Mutex::new(NodeAggregate::new(k)),
        }
    }

    #[must_use]
    pub fn left(&self) -> Option<TreeHandle> {
        self.left
    }

    #[must_use]
    pub fn right(&self) -> Option<TreeHandle> {
        self.right
    }

    #[must_use]
    pub fn parent(&self) -> Option<TreeHandle> {
        self.parent
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// For a leaf, the organism id. For an internal node, the group-name id
    /// (a separate namespace minted by the `group_names` map passed to
    /// [`CassisTree::build`]) if the node carried a Newick label, otherwise
    /// [`Id::UNDEF`].
    #[must_use]
    pub fn this_id(&self) -> Id {
        self.this_id
    }

    #[must_use]
    pub fn leftmost_id(&self) -> Id {
        self.leftmost_id
    }

    #[must_use]
    pub fn rightmost_id(&self) -> Id {
        self.rightmost_id
    }

    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[must_use]
    pub fn branch_length(&self) -> f64 {
        self.branch_length
    }

    #[must_use]
    pub fn group(&self) -> &SortedIdSet {
        &self.group
    }

    /// Snapshot of the per-outgroup-count best ingroup coverage.
    #[must_use]
    pub fn num_matches(&self) -> Vec<u32> {
        self.aggregate.lock().num_matches.clone()
    }

    /// Snapshot of the best-coverage signatures recorded at outgroup count
    /// `k`.
    #[must_use]
    pub fn signatures_at(&self, k: usize) -> Vec<Arc<str>> {
        self.aggregate.lock().signatures[k].clone()
    }

    #[must_use]
    pub fn best_ingroup_coverage(&self) -> u32 {
        self.aggregate.lock().best_ingroup_coverage
    }

    #[must_use]
    pub fn starting_solution(&self) -> Option<u32> {
        self.aggregate.lock().starting_solution
    }

    pub fn set_starting_solution(&self, root_index: u32) {
        self.aggregate.lock().starting_solution = Some(root_index);
    }

    fn record_match(&self, total_outgroup: usize, ingroup: u32, signature: &Arc<str>) -> bool {
        self.aggregate.lock().record_match(total_outgroup, ingroup, signature)
    }
}

/// A binary tree over organisms plus the Euler-tour/sparse-table structure
/// that answers `lca(u, v)` in O(1).
#[derive(Debug)]
pub struct CassisTree {
    nodes: Vec<TreeNode>,
    root: Option<TreeHandle>,
    k: u32,
    leaf_handle_of: Vec<TreeHandle>,
    lca: EulerLca,
    /// Behind a [`Mutex`] so the parallel traversal engine (§4.6) can
    /// intern newly-matched signatures from any worker through a shared
    /// `&CassisTree`, without taking a lock any wider than this pool.
    signature_pool: Mutex<HashSet<Arc<str>>>,
    max_depth: u32,
}

impl CassisTree {
    /// Build from an externally-parsed tree. `leaf_names` receives leaf
    /// names in left-to-right order, which is what guarantees the
    /// `leftmost_id..rightmost_id` contiguous-range invariant. `group_names`
    /// is a separate namespace: internal nodes that carried a Newick label
    /// are minted an id in it, independent of `leaf_names`' organism ids.
    pub fn build(spec: &TreeSpec, k: u32, leaf_names: &mut NameMap, group_names: &mut NameMap) -> CassisResult<Self> {
        let mut nodes = Vec::new();
        let mut leaf_handle_of = Vec::new();
        let root = Self::build_recursive(spec, k, leaf_names, group_names, &mut nodes, &mut leaf_handle_of);

        let mut tree = Self {
            nodes,
            root: Some(root),
            k,
            leaf_handle_of,
            lca: EulerLca::build(Vec::new(), Vec::new(), Vec::new()),
            signature_pool: Mutex::new(HashSet::new()),
            max_depth: 0,
        };
        tree.assign_depths(root, 0);
        tree.max_depth = tree.nodes.iter().map(|n| n.depth).max().unwrap_or(0);
        tree.build_lca();
        Ok(tree)
    }

    fn build_recursive(
        spec: &TreeSpec,
        k: u32,
        leaf_names: &mut NameMap,
        group_names: &mut NameMap,
        nodes: &mut Vec<TreeNode>,
        leaf_handle_of: &mut Vec<TreeHandle>,
    ) -> TreeHandle {
        match spec {
            TreeSpec::Leaf { name, branch_length } => {
                let id = leaf_names.append(name);
                let handle = nodes.len() as TreeHandle;
                nodes.push(TreeNode::leaf(id, *branch_length, k));
                if leaf_handle_of.len() <= id.index() {
                    leaf_handle_of.resize(id.index() + 1, 0);
                }
                leaf_handle_of[id.index()] = handle;
                handle
            }
            TreeSpec::Internal { left, right, name, branch_length } => {
                let left_handle = Self::build_recursive(left, k, leaf_names, group_names, nodes, leaf_handle_of);
                let right_handle = Self::build_recursive(right, k, leaf_names, group_names, nodes, leaf_handle_of);
                let group_id = name.as_deref().map_or(Id::UNDEF, |n| group_names.append(n));
                let handle = nodes.len() as TreeHandle;
                nodes.push(TreeNode::internal(left_handle, right_handle, *branch_length, k, group_id));
                nodes[left_handle as usize].parent = Some(handle);
                nodes[right_handle as usize].parent = Some(handle);

                let mut group: SortedIdSet = nodes[left_handle as usize].group.iter().collect();
                for id in nodes[right_handle as usize].group.iter() {
                    group.insert(id);
                }
                nodes[handle as usize].leftmost_id = group.min().unwrap_or(Id::UNDEF);
                nodes[handle as usize].rightmost_id = group.max().unwrap_or(Id::UNDEF);
                nodes[handle as usize].group = group;
                handle
            }
        }
    }

    /// Depth-reduction rebalance (§4.5): a node with exactly one leaf
    /// child keeps that leaf at the parent's depth (and moves it to the
    /// left), so single-leaf combs do not inflate the scratch array used
    /// by the traversal engine.
    fn assign_depths(&mut self, handle: TreeHandle, depth: u32) {
        self.nodes[handle as usize].depth = depth;
        let (left, right) = (self.nodes[handle as usize].left, self.nodes[handle as usize].right);
        match (left, right) {
            (Some(l), Some(r)) => {
                let l_leaf = self.nodes[l as usize].is_leaf();
                let r_leaf = self.nodes[r as usize].is_leaf();
                if l_leaf && !r_leaf {
                    self.nodes[l as usize].depth = depth;
                    self.assign_depths(r, depth + 1);
                } else if r_leaf && !l_leaf {
                    self.nodes[handle as usize].left = Some(r);
                    self.nodes[handle as usize].right = Some(l);
                    self.nodes[r as usize].depth = depth;
                    self.assign_depths(l, depth + 1);
                } else {
                    self.assign_depths(l, depth + 1);
                    self.assign_depths(r, depth + 1);
                }
            }
            (Some(l), None) => self.assign_depths(l, depth + 1),
            (None, Some(r)) => self.assign_depths(r, depth + 1),
            (None, None) => {}
        }
    }

    fn build_lca(&mut self) {
        let Some(root) = self.root else {
            self.lca = EulerLca::build(Vec::new(), Vec::new(), Vec::new());
            return;
        };
        let mut euler_tour = Vec::new();
        let mut level = Vec::new();
        let mut first_visit = vec![None; self.leaf_handle_of.len()];
        self.euler_visit(root, &mut euler_tour, &mut level, &mut first_visit);
        self.lca = EulerLca::build(euler_tour, level, first_visit);
    }

    fn euler_visit(&self, handle: TreeHandle, euler_tour: &mut Vec<TreeHandle>, level: &mut Vec<u32>, first_visit: &mut [Option<usize>]) {
        let node = &self.nodes[handle as usize];
        euler_tour.push(handle);
        level.push(node.depth);
        if node.is_leaf() {
            if first_visit[node.this_id.index()].is_none() {
                first_visit[node.this_id.index()] = Some(euler_tour.len() - 1);
            }
            return;
        }
        if let Some(l) = node.left {
            self.euler_visit(l, euler_tour, level, first_visit);
            euler_tour.push(handle);
            level.push(node.depth);
        }
        if let Some(r) = node.right {
            self.euler_visit(r, euler_tour, level, first_visit);
            euler_tour.push(handle);
            level.push(node.depth);
        }
    }

    #[must_use]
    pub fn node(&self, handle: TreeHandle) -> &TreeNode {
        &self.nodes[handle as usize]
    }

    #[must_use]
    pub fn root(&self) -> Option<TreeHandle> {
        self.root
    }

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Deepest `depth` value among all nodes, after depth reduction.
    #[must_use]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    #[must_use]
    pub fn leaf_handle(&self, id: Id) -> TreeHandle {
        self.leaf_handle_of[id.index()]
    }

    /// Lowest common ancestor of leaves `u` and `v`.
    #[must_use]
    pub fn lca(&self, u: Id, v: Id) -> TreeHandle {
        self.lca.lca(u, v)
    }

    /// Record a candidate directly at `handle` without propagation — used
    /// by the traversal engine (§4.6 step 5), which has already walked to
    /// the right tree node by other means. Takes `&self`: the only shared
    /// mutable state this touches is `handle`'s own [`NodeAggregate`] and
    /// the signature pool, each guarded by its own lock.
    pub(crate) fn record_match_at(&self, handle: TreeHandle, total_outgroup: usize, ingroup: u32, signature: &str) -> bool {
        let sig = self.intern(signature);
        self.nodes[handle as usize].record_match(total_outgroup, ingroup, &sig)
    }

    fn intern(&self, signature: &str) -> Arc<str> {
        let mut pool = self.signature_pool.lock();
        if let Some(existing) = pool.get(signature) {
            return Arc::clone(existing);
        }
        let rc: Arc<str> = Arc::from(signature);
        pool.insert(Arc::clone(&rc));
        rc
    }

    /// One-pass matching propagation (§4.5).
    pub fn add_matching(&mut self, signature: &str, matched_ids: &SortedIdSet, extra_outgroup: u32) -> CassisResult<()> {
        if extra_outgroup > self.k {
            return Err(TreeErrorKind::OutgroupBudgetExceeded(extra_outgroup, self.k).into());
        }
        let Some(min_id) = matched_ids.min() else {
            return Ok(());
        };
        let max_id = matched_ids.max().unwrap_or(min_id);
        let lca = self.lca(min_id, max_id);

        let sig = self.intern(signature);
        self.propagate_down(lca, matched_ids, extra_outgroup, &sig);

        let mut cursor = self.nodes[lca as usize].parent;
        let ingroup = matched_ids.len() as u32;
        while let Some(handle) = cursor {
            self.nodes[handle as usize].record_match(extra_outgroup as usize, ingroup, &sig);
            cursor = self.nodes[handle as usize].parent;
        }
        Ok(())
    }

    fn propagate_down(&mut self, handle: TreeHandle, matched_ids: &SortedIdSet, extra_outgroup: u32, signature: &Arc<str>) {
        let (leftmost, rightmost) = {
            let node = &self.nodes[handle as usize];
            (node.leftmost_id, node.rightmost_id)
        };
        let slice = matched_ids.as_slice();
        let out_left = slice.partition_point(|&id| id < leftmost);
        let out_right = slice.len() - slice.partition_point(|&id| id <= rightmost);
        let total_outgroup = extra_outgroup + out_left as u32 + out_right as u32;
        if total_outgroup > self.k {
            return;
        }
        let ingroup = matched_ids.len() as u32 - out_left as u32 - out_right as u32;
        self.nodes[handle as usize].record_match(total_outgroup as usize, ingroup, signature);

        let (left, right) = {
            let node = &self.nodes[handle as usize];
            (node.left, node.right)
        };
        if let Some(l) = left {
            self.propagate_down(l, matched_ids, extra_outgroup, signature);
        }
        if let Some(r) = right {
            self.propagate_down(r, matched_ids, extra_outgroup, signature);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str) -> TreeSpec {
        TreeSpec::Leaf { name: name.to_owned(), branch_length: 1.0 }
    }

    fn internal(left: TreeSpec, right: TreeSpec) -> TreeSpec {
        TreeSpec::Internal { left: Box::new(left), right: Box::new(right), name: None, branch_length: 1.0 }
    }

    fn four_leaf_tree(k: u32) -> (CassisTree, NameMap) {
        let spec = internal(internal(leaf("A"), leaf("B")), internal(leaf("C"), leaf("D")));
        let mut names = NameMap::new();
        let mut groups = NameMap::new();
        let tree = CassisTree::build(&spec, k, &mut names, &mut groups).unwrap();
        (tree, names)
    }

    fn ids(set: &[u32]) -> SortedIdSet {
        set.iter().map(|&v| Id::from_index(v)).collect()
    }

    #[test]
    fn scenario_a_tiny_four_leaf_tree_perfect_match() {
        let (mut tree, names) = four_leaf_tree(0);
        assert_eq!(names.name_of(Id::from_index(0)), "A");
        assert_eq!(names.name_of(Id::from_index(3)), "D");

        tree.add_matching("AAAA", &ids(&[0, 1]), 0).unwrap();

        let ab = tree.node(tree.leaf_handle(Id::from_index(0))).parent().unwrap();
        assert_eq!(tree.node(ab).num_matches()[0], 2);
        assert_eq!(tree.node(ab).signatures_at(0).len(), 1);
        assert_eq!(tree.node(ab).signatures_at(0)[0].as_ref(), "AAAA");

        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).num_matches()[0], 2);
        assert_eq!(tree.node(root).signatures_at(0)[0].as_ref(), "AAAA");

        let cd = tree.node(tree.leaf_handle(Id::from_index(2))).parent().unwrap();
        assert_eq!(tree.node(cd).num_matches()[0], 0);
        assert_eq!(tree.node(tree.leaf_handle(Id::from_index(2))).num_matches()[0], 0);
        assert_eq!(tree.node(tree.leaf_handle(Id::from_index(3))).num_matches()[0], 0);
    }

    #[test]
    fn scenario_b_outgroup_allowed() {
        let (mut tree, _names) = four_leaf_tree(1);
        tree.add_matching("CCCC", &ids(&[0, 1, 2]), 0).unwrap();

        let ab = tree.node(tree.leaf_handle(Id::from_index(0))).parent().unwrap();
        assert_eq!(tree.node(ab).num_matches()[1], 2);
        assert_eq!(tree.node(ab).num_matches()[0], 0);

        let cd = tree.node(tree.leaf_handle(Id::from_index(2))).parent().unwrap();
        assert_eq!(tree.node(cd).num_matches(), [0, 0]);

        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).num_matches()[0], 3);
        assert_eq!(tree.node(root).signatures_at(0)[0].as_ref(), "CCCC");
        assert_eq!(tree.node(root).num_matches()[1], 0);
    }

    #[test]
    fn rejects_outgroup_budget_over_k() {
        let (mut tree, _names) = four_leaf_tree(0);
        let err = tree.add_matching("AAAA", &ids(&[0, 1]), 1).unwrap_err();
        assert!(matches!(err.into_inner(), crate::error::CassisErrorKind::Tree(TreeErrorKind::OutgroupBudgetExceeded(1, 0))));
    }

    #[test]
    fn idempotent_insertion_does_not_duplicate_signature() {
        let (mut tree, _names) = four_leaf_tree(0);
        tree.add_matching("AAAA", &ids(&[0, 1]), 0).unwrap();
        tree.add_matching("AAAA", &ids(&[0, 1]), 0).unwrap();
        let ab = tree.node(tree.leaf_handle(Id::from_index(0))).parent().unwrap();
        assert_eq!(tree.node(ab).num_matches()[0], 2);
        assert_eq!(tree.node(ab).signatures_at(0).len(), 1);
    }

    #[test]
    fn scenario_e_lca_on_five_leaf_tree() {
        let spec = internal(internal(leaf("A"), leaf("B")), internal(leaf("C"), internal(leaf("D"), leaf("E"))));
        let mut names = NameMap::new();
        let mut groups = NameMap::new();
        let tree = CassisTree::build(&spec, 0, &mut names, &mut groups).unwrap();

        let a = names.id_of("A").unwrap();
        let b = names.id_of("B").unwrap();
        let c = names.id_of("C").unwrap();
        let d = names.id_of("D").unwrap();
        let e = names.id_of("E").unwrap();

        assert_eq!(tree.lca(a, e), tree.root().unwrap());
        assert_eq!(tree.lca(d, e), tree.node(tree.leaf_handle(d)).parent().unwrap());
        assert_eq!(tree.lca(a, b), tree.node(tree.leaf_handle(a)).parent().unwrap());
        assert_eq!(tree.lca(b, c), tree.root().unwrap());
    }

    #[test]
    fn leaves_have_contiguous_id_ranges() {
        let (tree, _names) = four_leaf_tree(0);
        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).leftmost_id(), Id::from_index(0));
        assert_eq!(tree.node(root).rightmost_id(), Id::from_index(3));
    }

    #[test]
    fn internal_node_group_names_are_threaded_into_a_separate_namespace() {
        let spec = TreeSpec::Internal {
            left: Box::new(TreeSpec::Internal {
                left: Box::new(leaf("A")),
                right: Box::new(leaf("B")),
                name: Some("ab".to_owned()),
                branch_length: 0.3,
            }),
            right: Box::new(internal(leaf("C"), leaf("D"))),
            name: Some("root".to_owned()),
            branch_length: 0.0,
        };
        let mut names = NameMap::new();
        let mut groups = NameMap::new();
        let tree = CassisTree::build(&spec, 0, &mut names, &mut groups).unwrap();

        let root = tree.root().unwrap();
        assert_eq!(groups.name_of(tree.node(root).this_id()), "root");

        let ab = tree.node(tree.leaf_handle(names.id_of("A").unwrap())).parent().unwrap();
        assert_eq!(groups.name_of(tree.node(ab).this_id()), "ab");

        // the unnamed `(C,D)` node got no label, so it stays UNDEF
        let cd = tree.node(tree.leaf_handle(names.id_of("C").unwrap())).parent().unwrap();
        assert!(tree.node(cd).this_id().is_undef());

        // group ids live in their own namespace, independent of organism ids
        assert_eq!(groups.id_of("A"), None);
    }
}
