//! BGRT-vs-tree branch-and-bound traversal (§4.6): reproduces the same
//! per-node signature lists the one-pass algorithm (§4.5) would have
//! produced, by matching an already-built BGRT against a CaSSiS tree
//! whose `num_matches` all start at zero.
//!
//! The cut-off bookkeeping (`ingroup_array`/`cutoff_array`) is carried
//! over from the node-level matcher this was ported from: a BGRT node's
//! `ingroup_array[d]` caches the best ingroup count it has ever achieved
//! against a tree node at depth `d`, or [`UNDEF_INGROUP`] once a branch is
//! known unable to help at that depth. `cutoff_array` is local to a
//! single tree node's pass over the BGRT and counts, for each shallower
//! depth, how many BGRT ancestors on the current path are themselves
//! marked `UNDEF_INGROUP`.
//!
//! A BGRT's root-array entries are independent subtrees of a forest (see
//! `bgrt::insert_at_root`): climbing ancestors never crosses from one
//! root's subtree into another's. That structural disjointness is what
//! lets [`process_tree_node_parallel`] hand different roots to different
//! workers through a shared `&Bgrt` — `ingroup_array` cells are atomics
//! (for the borrow checker's benefit, not because two workers ever touch
//! the same cell), and the only state every worker in a batch genuinely
//! contends on is the one target [`CassisTree`] node's aggregate fields,
//! which that node's own lock already serialises (see `tree::TreeNode`).

use crate::bgrt::{Bgrt, NodeHandle, UNDEF_INGROUP};
use crate::tree::{CassisTree, TreeHandle};

/// Run the traversal over the whole tree, starting from its root.
pub fn traverse(bgrt: &mut Bgrt, tree: &mut CassisTree) {
    bgrt.reset_scratch(tree.max_depth() as usize + 1);
    let k = tree.k();
    if let Some(root) = tree.root() {
        process_tree_node(bgrt, tree, root, k);
    }
}

/// Same result as [`traverse`], but for every CaSSiS tree node whose
/// outgroup budget is nonzero (so there is more than one plausible
/// starting root), the per-root loop is handed out to `workers` rayon
/// tasks from a shared cursor instead of run on the calling thread.
///
/// Different BGRT roots are disjoint subtrees, so workers processing
/// different roots need only a shared `&Bgrt`; the single CaSSiS node
/// they all update is protected by its own lock rather than one taken
/// for the whole walk. `workers <= 1` falls back to the plain sequential
/// walk.
pub fn traverse_parallel(bgrt: &mut Bgrt, tree: &mut CassisTree, workers: usize) {
    if workers <= 1 {
        traverse(bgrt, tree);
        return;
    }
    bgrt.reset_scratch(tree.max_depth() as usize + 1);
    let k = tree.k();
    if let Some(root) = tree.root() {
        process_tree_node_parallel(bgrt, tree, root, k, workers);
    }
}

fn process_tree_node(bgrt: &Bgrt, tree: &CassisTree, node: TreeHandle, k: u32) {
    let num_roots = bgrt.roots().len();
    if num_roots > 0 {
        let mut cutoff_array = vec![0u32; tree.max_depth() as usize + 1];
        for root_idx in candidate_roots(tree, node, num_roots) {
            if let Some(handle) = bgrt.roots()[root_idx] {
                traverse_bgrt_recursion(root_idx as u32, bgrt, handle, tree, node, k, &mut cutoff_array, 0, 0);
            }
        }
    }

    let (left, right) = (tree.node(node).left(), tree.node(node).right());
    if let Some(l) = left {
        process_tree_node(bgrt, tree, l, k);
    }
    if let Some(r) = right {
        process_tree_node(bgrt, tree, r, k);
    }
}

fn process_tree_node_parallel(bgrt: &Bgrt, tree: &CassisTree, node: TreeHandle, k: u32, workers: usize) {
    let num_roots = bgrt.roots().len();
    if num_roots > 0 {
        let order = candidate_roots(tree, node, num_roots);
        if k == 0 || order.len() < workers {
            let mut cutoff_array = vec![0u32; tree.max_depth() as usize + 1];
            for root_idx in order {
                if let Some(handle) = bgrt.roots()[root_idx] {
                    traverse_bgrt_recursion(root_idx as u32, bgrt, handle, tree, node, k, &mut cutoff_array, 0, 0);
                }
            }
        } else {
            let max_depth = tree.max_depth();
            rayon::scope(|s| {
                for chunk in split_round_robin(&order, workers) {
                    s.spawn(move |_| {
                        let mut cutoff_array = vec![0u32; max_depth as usize + 1];
                        for root_idx in chunk {
                            if let Some(handle) = bgrt.roots()[root_idx] {
                                traverse_bgrt_recursion(root_idx as u32, bgrt, handle, tree, node, k, &mut cutoff_array, 0, 0);
                            }
                        }
                    });
                }
            });
        }
    }

    let (left, right) = (tree.node(node).left(), tree.node(node).right());
    if let Some(l) = left {
        process_tree_node_parallel(bgrt, tree, l, k, workers);
    }
    if let Some(r) = right {
        process_tree_node_parallel(bgrt, tree, r, k, workers);
    }
}

/// Split `order` into up to `workers` interleaved chunks, so each worker's
/// slice stays roughly balanced regardless of where the expensive roots
/// happen to land.
fn split_round_robin(order: &[usize], workers: usize) -> Vec<Vec<usize>> {
    let mut chunks = vec![Vec::new(); workers];
    for (i, &root_idx) in order.iter().enumerate() {
        chunks[i % workers].push(root_idx);
    }
    chunks.retain(|c| !c.is_empty());
    chunks
}

/// §4.6 "starting solution selection": for `K = 0` only root entries that
/// can possibly reach this node are worth visiting; for `K > 0` every root
/// entry is tried, starting from the parent's best guess.
fn candidate_roots(tree: &CassisTree, node: TreeHandle, num_roots: usize) -> Vec<usize> {
    if tree.k() == 0 {
        tree.node(node).group().iter().map(|id| id.index()).filter(|&i| i < num_roots).collect()
    } else {
        let start = tree
            .node(node)
            .parent()
            .and_then(|p| tree.node(p).starting_solution())
            .map(|s| s as usize % num_roots)
            .unwrap_or(0);
        (0..num_roots).map(|i| (start + i) % num_roots).collect()
    }
}

#[allow(clippy::too_many_arguments)]
fn traverse_bgrt_recursion(
    starting_solution: u32,
    bgrt: &Bgrt,
    bgr_handle: NodeHandle,
    tree: &CassisTree,
    cassis_node: TreeHandle,
    max_outgroup_hits: u32,
    cutoff_array: &mut [u32],
    parent_ingroup: u32,
    parent_outgroup: u32,
) {
    let phy_depth = tree.node(cassis_node).depth() as usize;
    let has_children = tree.node(cassis_node).left().is_some() || tree.node(cassis_node).right().is_some();

    for i in 0..phy_depth {
        if bgrt.ingroup_at(bgr_handle, i) == UNDEF_INGROUP {
            cutoff_array[i] += 1;
        }
    }

    if phy_depth > 0 {
        let mut cut_depth = phy_depth - 1;
        while cut_depth > 0 && cutoff_array[cut_depth] != 0 {
            cut_depth -= 1;
        }

        if bgrt.ingroup_at(bgr_handle, cut_depth) == UNDEF_INGROUP {
            decrement_cutoff(bgrt, bgr_handle, phy_depth, cutoff_array);
            return;
        }

        let num_matches = tree.node(cassis_node).num_matches();
        let upper = (max_outgroup_hits as usize).min(num_matches.len().saturating_sub(1));
        let mut min_match = u32::MAX;
        for slot in &num_matches[..=upper] {
            min_match = min_match.min(*slot);
        }
        if min_match == 0 {
            min_match = 1;
        }

        let cached = bgrt.ingroup_at(bgr_handle, cut_depth);
        if cached < min_match {
            if has_children {
                propagate_cutoff(bgrt, bgr_handle, phy_depth, cached);
            }
            decrement_cutoff(bgrt, bgr_handle, phy_depth, cutoff_array);
            return;
        }
    }

    let (ingroup_counter, outgroup_counter) = {
        let mut ingroup_counter = parent_ingroup;
        let mut outgroup_counter = parent_outgroup;
        let species = bgrt.node(bgr_handle).species().as_slice();
        let group = tree.node(cassis_node).group().as_slice();
        let (mut i1, mut i2) = (0usize, 0usize);
        while i1 < species.len() && i2 < group.len() {
            match species[i1].cmp(&group[i2]) {
                std::cmp::Ordering::Greater => i2 += 1,
                std::cmp::Ordering::Less => {
                    outgroup_counter += 1;
                    i1 += 1;
                }
                std::cmp::Ordering::Equal => {
                    ingroup_counter += 1;
                    i1 += 1;
                    i2 += 1;
                }
            }
        }
        outgroup_counter += (species.len() - i1) as u32;
        (ingroup_counter, outgroup_counter)
    };

    if outgroup_counter > max_outgroup_hits {
        if has_children {
            bgrt.set_ingroup_at(bgr_handle, phy_depth, UNDEF_INGROUP);
        }
        decrement_cutoff(bgrt, bgr_handle, phy_depth, cutoff_array);
        return;
    }

    if ingroup_counter > 0 {
        let so_counts = bgrt.node(bgr_handle).supposed_outgroup_matches().to_vec();
        let signatures = bgrt.node(bgr_handle).signatures().to_vec();
        for (signature, outgroup_hits) in signatures.iter().zip(so_counts.iter()) {
            let outgroup_sum = outgroup_hits + outgroup_counter;
            if outgroup_sum <= max_outgroup_hits {
                if ingroup_counter > tree.node(cassis_node).best_ingroup_coverage() {
                    tree.node(cassis_node).set_starting_solution(starting_solution);
                }
                tree.record_match_at(cassis_node, outgroup_sum as usize, ingroup_counter, signature);
            }
        }
    }

    if has_children {
        bgrt.set_ingroup_at(bgr_handle, phy_depth, ingroup_counter);
        let mut ancestor = bgrt.parent_of(bgr_handle);
        while let Some(handle) = ancestor {
            if bgrt.ingroup_at(handle, phy_depth) < ingroup_counter {
                bgrt.set_ingroup_at(handle, phy_depth, ingroup_counter);
                ancestor = bgrt.parent_of(handle);
            } else {
                break;
            }
        }
    }

    for child in bgrt.children_of(bgr_handle).to_vec() {
        traverse_bgrt_recursion(
            starting_solution,
            bgrt,
            child,
            tree,
            cassis_node,
            max_outgroup_hits,
            cutoff_array,
            ingroup_counter,
            outgroup_counter,
        );
    }

    decrement_cutoff(bgrt, bgr_handle, phy_depth, cutoff_array);
}

fn decrement_cutoff(bgrt: &Bgrt, bgr_handle: NodeHandle, phy_depth: usize, cutoff_array: &mut [u32]) {
    for (i, slot) in cutoff_array.iter_mut().enumerate().take(phy_depth) {
        if bgrt.ingroup_at(bgr_handle, i) == UNDEF_INGROUP {
            *slot -= 1;
        }
    }
}

fn propagate_cutoff(bgrt: &Bgrt, bgr_handle: NodeHandle, phy_depth: usize, upper_limit: u32) {
    let mut ancestor = bgrt.parent_of(bgr_handle);
    while let Some(handle) = ancestor {
        if bgrt.ingroup_at(handle, phy_depth) < upper_limit {
            bgrt.set_ingroup_at(handle, phy_depth, upper_limit);
            ancestor = bgrt.parent_of(handle);
        } else {
            break;
        }
    }
    bgrt.set_ingroup_at(bgr_handle, phy_depth, UNDEF_INGROUP);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgrt::BgrtParams;
    use crate::id::Id;
    use crate::idset::SortedIdSet;
    use crate::namemap::NameMap;
    use crate::tree::TreeSpec;

    fn leaf(name: &str) -> TreeSpec {
        TreeSpec::Leaf { name: name.to_owned(), branch_length: 1.0 }
    }

    fn internal(left: TreeSpec, right: TreeSpec) -> TreeSpec {
        TreeSpec::Internal { left: Box::new(left), right: Box::new(right), name: None, branch_length: 1.0 }
    }

    fn ids(vals: &[u32]) -> SortedIdSet {
        vals.iter().map(|&v| Id::from_index(v)).collect()
    }

    /// The traversal engine, run over a BGRT built directly (bypassing
    /// one-pass `add_matching`), must reproduce the same `num_matches`
    /// that Scenario A's one-pass insertion produced.
    #[test]
    fn traversal_matches_one_pass_result_for_scenario_a() {
        let spec = internal(internal(leaf("A"), leaf("B")), internal(leaf("C"), leaf("D")));
        let mut names = NameMap::new();
        let mut groups = NameMap::new();
        let mut tree = CassisTree::build(&spec, 0, &mut names, &mut groups).unwrap();

        let mut bgrt = Bgrt::new(BgrtParams { num_species: 4, ..BgrtParams::default() });
        bgrt.insert("AAAA".into(), ids(&[0, 1]), 0).unwrap();

        traverse(&mut bgrt, &mut tree);

        let ab = tree.node(tree.leaf_handle(Id::from_index(0))).parent().unwrap();
        assert_eq!(tree.node(ab).num_matches()[0], 2);
        assert_eq!(tree.node(ab).signatures_at(0)[0].as_ref(), "AAAA");

        let root = tree.root().unwrap();
        assert_eq!(tree.node(root).num_matches()[0], 2);
    }

    #[test]
    fn traversal_respects_outgroup_budget() {
        let spec = internal(internal(leaf("A"), leaf("B")), internal(leaf("C"), leaf("D")));
        let mut names = NameMap::new();
        let mut groups = NameMap::new();
        let mut tree = CassisTree::build(&spec, 1, &mut names, &mut groups).unwrap();

        let mut bgrt = Bgrt::new(BgrtParams { num_species: 4, ..BgrtParams::default() });
        bgrt.insert("CCCC".into(), ids(&[0, 1, 2]), 0).unwrap();

        traverse(&mut bgrt, &mut tree);

        let ab = tree.node(tree.leaf_handle(Id::from_index(0))).parent().unwrap();
        assert_eq!(tree.node(ab).num_matches()[1], 2);

        let cd = tree.node(tree.leaf_handle(Id::from_index(2))).parent().unwrap();
        assert_eq!(cd, tree.node(tree.leaf_handle(Id::from_index(3))).parent().unwrap());
        assert_eq!(tree.node(cd).num_matches(), [0, 0]);
    }

    /// Threaded dispatch must reach the same fixed point as the
    /// sequential walk — only the pruning schedule, never the outcome,
    /// is allowed to depend on worker count.
    #[test]
    fn parallel_traversal_matches_sequential_result() {
        let spec = internal(internal(leaf("A"), leaf("B")), internal(leaf("C"), leaf("D")));
        let mut names = NameMap::new();
        let mut groups = NameMap::new();
        let mut tree_seq = CassisTree::build(&spec, 1, &mut names, &mut groups).unwrap();
        let mut names2 = NameMap::new();
        let mut groups2 = NameMap::new();
        let mut tree_par = CassisTree::build(&spec, 1, &mut names2, &mut groups2).unwrap();

        let mut bgrt_seq = Bgrt::new(BgrtParams { num_species: 4, ..BgrtParams::default() });
        bgrt_seq.insert("CCCC".into(), ids(&[0, 1, 2]), 0).unwrap();
        let mut bgrt_par = Bgrt::new(BgrtParams { num_species: 4, ..BgrtParams::default() });
        bgrt_par.insert("CCCC".into(), ids(&[0, 1, 2]), 0).unwrap();

        traverse(&mut bgrt_seq, &mut tree_seq);
        traverse_parallel(&mut bgrt_par, &mut tree_par, 4);

        for id in [0u32, 1, 2, 3] {
            let seq_node = tree_seq.node(tree_seq.leaf_handle(Id::from_index(id))).parent().unwrap();
            let par_node = tree_par.node(tree_par.leaf_handle(Id::from_index(id))).parent().unwrap();
            assert_eq!(tree_seq.node(seq_node).num_matches(), tree_par.node(par_node).num_matches());
        }
    }
}
