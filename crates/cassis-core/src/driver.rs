//! Orchestrates the two supported pipelines (§2 data flow):
//!
//! - **one-pass**: enumerate candidates, filter, match against the index,
//!   feed straight into [`CassisTree::add_matching`].
//! - **two-pass**: same front end, but matches land in a [`Bgrt`] first;
//!   [`crate::traversal::traverse`] replays it against the tree later,
//!   possibly from a file saved in between (`create` + `process`).
//!
//! Both pipelines share the enumerate/filter/match front end below; only
//! the sink differs.

use log::{debug, trace};

use crate::bgrt::Bgrt;
use crate::enumerator::SignatureEnumerator;
use crate::error::{CassisResult, SequenceIndexErrorKind};
use crate::idset::SortedIdSet;
use crate::index::SequenceIndex;
use crate::thermo::Thermodynamics;
use crate::traversal;
use crate::tree::CassisTree;

/// Matching parameters shared by both pipelines, independent of which
/// index backend or result emitter is wired in on top (§6 CLI options).
#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    /// Inclusive signature-length range to enumerate (`--len MIN-MAX`).
    pub min_len: u32,
    pub max_len: u32,
    /// DNA vs RNA alphabet for enumeration.
    pub is_rna: bool,
    /// Mismatches tolerated for an ingroup hit (`--mm`).
    pub mismatches: u32,
    /// Mismatch distance up to which a hit still counts towards the
    /// "supposed outgroup" window (`--dist`).
    pub outgroup_mismatch_distance: u32,
    /// Use the index's weighted-mismatch scoring instead of plain Hamming
    /// distance (`--wm`).
    pub use_weighted: bool,
    /// Reject a candidate whose reverse complement hits organisms the
    /// forward strand didn't (`--rc`).
    pub reject_reverse_complement_hits: bool,
    /// Enumerate every possible oligonucleotide (`--all`) rather than
    /// streaming only the candidates the index already knows about.
    pub enumerate_all: bool,
    /// Worker count for the two-pass traversal; `<= 1` runs sequentially.
    pub workers: usize,
}

/// Complement of a single base; bases outside {A,C,G,T,U} (and their
/// lowercase forms) pass through unchanged, matching the thermodynamics
/// filter's treatment of ambiguity codes.
fn complement(base: char) -> char {
    match base {
        'A' => 'T',
        'T' => 'A',
        'C' => 'G',
        'G' => 'C',
        'U' => 'A',
        'a' => 't',
        't' => 'a',
        'c' => 'g',
        'g' => 'c',
        'u' => 'a',
        other => other,
    }
}

/// Reverse complement of `signature`, complementing `seq[len - 1 - i]` at
/// each position `i` — not the off-by-one `seq[len - i]` the routine this
/// was grounded on used, which read one byte past the string.
fn reverse_complement(signature: &str) -> String {
    signature.chars().rev().map(complement).collect()
}

/// One candidate that survived the thermodynamics filter and had at
/// least one ingroup hit.
struct Candidate {
    matched_ids: SortedIdSet,
    outgroup_count: u32,
}

/// Run `signature` through the thermodynamics filter, the index match,
/// and (if requested) the reverse-complement specificity check. Returns
/// `None` if the candidate should be dropped silently — per §7, filter
/// rejection and "no hits" are both recoverable, non-fatal outcomes.
fn evaluate_candidate<I: SequenceIndex>(
    index: &I,
    thermo: &Thermodynamics,
    opts: &MatchOptions,
    signature: &str,
) -> Option<Candidate> {
    if !thermo.accepts(signature) {
        trace!("{signature}: rejected by thermodynamics filter");
        return None;
    }

    let mut matched_ids = SortedIdSet::new();
    let mut outgroup_count = 0u32;
    let matched = index.match_signature(
        &mut matched_ids,
        signature,
        opts.mismatches,
        opts.outgroup_mismatch_distance,
        &mut outgroup_count,
        opts.use_weighted,
    );
    if !matched || matched_ids.is_empty() {
        return None;
    }

    if opts.reject_reverse_complement_hits {
        let rc = reverse_complement(signature);
        let mut rc_matched = SortedIdSet::new();
        let mut rc_outgroup_count = 0u32;
        let rc_hit = index.match_signature(
            &mut rc_matched,
            &rc,
            opts.mismatches,
            opts.outgroup_mismatch_distance,
            &mut rc_outgroup_count,
            opts.use_weighted,
        );
        if rc_hit && rc_matched.iter().any(|id| !matched_ids.as_slice().contains(&id)) {
            debug!("{signature}: rejected, reverse complement hits additional organisms");
            return None;
        }
    }

    Some(Candidate { matched_ids, outgroup_count })
}

/// Walk every candidate signature of every configured length, calling
/// `sink` for each one that survives filtering. `sink` receives the raw
/// candidate string alongside its match — the one-pass driver interns it
/// straight into the tree, the two-pass builder clones it into the BGRT.
fn for_each_candidate<I: SequenceIndex>(
    index: &mut I,
    thermo: &Thermodynamics,
    opts: &MatchOptions,
    mut sink: impl FnMut(&str, Candidate) -> CassisResult<()>,
) -> CassisResult<()> {
    for length in opts.min_len..=opts.max_len {
        let mut enumerator = opts.enumerate_all.then(|| SignatureEnumerator::new(length, opts.is_rna));
        if enumerator.is_none() && !index.init_fetch_signature(length, opts.is_rna) {
            return Err(SequenceIndexErrorKind::NotComputed.into());
        }
        loop {
            let candidate = match enumerator.as_mut() {
                Some(e) => e.fetch_next(),
                None => index.fetch_next_signature(),
            };
            let Some(signature) = candidate else { break };
            if let Some(hit) = evaluate_candidate(index, thermo, opts, &signature) {
                sink(&signature, hit)?;
            }
        }
    }
    Ok(())
}

/// One-pass pipeline: every surviving candidate is absorbed directly by
/// the CaSSiS tree's one-pass matcher (§4.5).
pub fn run_one_pass<I: SequenceIndex>(
    index: &mut I,
    thermo: &Thermodynamics,
    tree: &mut CassisTree,
    opts: &MatchOptions,
) -> CassisResult<()> {
    for_each_candidate(index, thermo, opts, |signature, hit| {
        tree.add_matching(signature, &hit.matched_ids, hit.outgroup_count)
    })
}

/// Two-pass pipeline, first half: every surviving candidate is placed in
/// the BGRT (§4.4) instead of a tree, so it can be saved and replayed
/// against any number of trees later.
pub fn run_build_bgrt<I: SequenceIndex>(
    index: &mut I,
    thermo: &Thermodynamics,
    bgrt: &mut Bgrt,
    opts: &MatchOptions,
) -> CassisResult<()> {
    for_each_candidate(index, thermo, opts, |signature, hit| {
        bgrt.insert(signature.to_owned(), hit.matched_ids, hit.outgroup_count)
    })
}

/// Two-pass pipeline, second half: replay an already-built (or
/// freshly-loaded) BGRT against `tree`, producing the same per-node
/// signature lists the one-pass pipeline would have. Uses the
/// [`MatchOptions::workers`]-wide parallel traversal when more than one
/// worker is configured.
pub fn run_process_bgrt(bgrt: &mut Bgrt, tree: &mut CassisTree, workers: usize) {
    traversal::traverse_parallel(bgrt, tree, workers);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgrt::BgrtParams;
    use crate::id::Id;
    use crate::namemap::NameMap;
    use crate::thermo::ThermoEnvironment;
    use crate::tree::TreeSpec;

    fn leaf(name: &str) -> TreeSpec {
        TreeSpec::Leaf { name: name.to_owned(), branch_length: 1.0 }
    }

    fn internal(left: TreeSpec, right: TreeSpec) -> TreeSpec {
        TreeSpec::Internal { left: Box::new(left), right: Box::new(right), name: None, branch_length: 1.0 }
    }

    #[test]
    fn reverse_complement_is_correct_not_off_by_one() {
        assert_eq!(reverse_complement("AAGG"), "CCTT");
        assert_eq!(reverse_complement("A"), "T");
        assert_eq!(reverse_complement(""), "");
    }

    /// A brute-force in-memory index over a handful of fixed sequences,
    /// just enough to exercise the front end end-to-end without a real
    /// search engine.
    struct FixedIndex {
        sequences: Vec<(Id, String)>,
        fetch_pos: Option<(Vec<String>, usize)>,
    }

    impl FixedIndex {
        fn new(sequences: Vec<(Id, String)>) -> Self {
            Self { sequences, fetch_pos: None }
        }
    }

    impl SequenceIndex for FixedIndex {
        fn add_sequence(&mut self, seq: &str, id: Id) -> bool {
            self.sequences.push((id, seq.to_owned()));
            true
        }

        fn compute_index(&mut self) -> bool {
            true
        }

        fn init_fetch_signature(&mut self, length: u32, _is_rna: bool) -> bool {
            let mut candidates = Vec::new();
            for (_, seq) in &self.sequences {
                let bytes = seq.as_bytes();
                if bytes.len() >= length as usize {
                    for window in bytes.windows(length as usize) {
                        let s = String::from_utf8_lossy(window).into_owned();
                        if !candidates.contains(&s) {
                            candidates.push(s);
                        }
                    }
                }
            }
            self.fetch_pos = Some((candidates, 0));
            true
        }

        fn fetch_next_signature(&mut self) -> Option<String> {
            let (candidates, pos) = self.fetch_pos.as_mut()?;
            let next = candidates.get(*pos).cloned();
            *pos += 1;
            next
        }

        fn match_signature(
            &self,
            matched_ids: &mut SortedIdSet,
            signature: &str,
            mm: u32,
            mm_dist: u32,
            og_count: &mut u32,
            _use_weighted: bool,
        ) -> bool {
            *og_count = 0;
            for (id, seq) in &self.sequences {
                let Some(best) = best_hamming_window(seq, signature) else { continue };
                if best <= mm {
                    matched_ids.insert(*id);
                } else if best <= mm_dist {
                    *og_count += 1;
                }
            }
            true
        }
    }

    fn best_hamming_window(haystack: &str, needle: &str) -> Option<u32> {
        let h = haystack.as_bytes();
        let n = needle.as_bytes();
        if n.len() > h.len() {
            return None;
        }
        h.windows(n.len())
            .map(|w| w.iter().zip(n).filter(|(a, b)| a != b).count() as u32)
            .min()
    }

    #[test]
    fn one_pass_pipeline_matches_add_matching_directly() {
        let spec = internal(internal(leaf("A"), leaf("B")), internal(leaf("C"), leaf("D")));
        let mut names = NameMap::new();
        let mut groups = NameMap::new();
        let mut tree = CassisTree::build(&spec, 0, &mut names, &mut groups).unwrap();

        let mut index = FixedIndex::new(vec![
            (Id::from_index(0), "AAAA".to_owned()),
            (Id::from_index(1), "AAAA".to_owned()),
            (Id::from_index(2), "GGGG".to_owned()),
            (Id::from_index(3), "GGGG".to_owned()),
        ]);
        index.compute_index();

        let thermo = Thermodynamics::new(ThermoEnvironment::default());
        let opts = MatchOptions {
            min_len: 4,
            max_len: 4,
            is_rna: false,
            mismatches: 0,
            outgroup_mismatch_distance: 0,
            use_weighted: false,
            reject_reverse_complement_hits: false,
            enumerate_all: false,
            workers: 1,
        };

        run_one_pass(&mut index, &thermo, &mut tree, &opts).unwrap();

        let ab = tree.node(tree.leaf_handle(Id::from_index(0))).parent().unwrap();
        assert_eq!(tree.node(ab).num_matches()[0], 2);
        assert!(tree.node(ab).signatures_at(0).iter().any(|s| s.as_ref() == "AAAA"));
    }

    #[test]
    fn two_pass_pipeline_reaches_the_same_result_as_one_pass() {
        let spec = internal(internal(leaf("A"), leaf("B")), internal(leaf("C"), leaf("D")));
        let mut names = NameMap::new();
        let mut groups = NameMap::new();
        let mut tree = CassisTree::build(&spec, 0, &mut names, &mut groups).unwrap();

        let mut index = FixedIndex::new(vec![
            (Id::from_index(0), "AAAA".to_owned()),
            (Id::from_index(1), "AAAA".to_owned()),
            (Id::from_index(2), "GGGG".to_owned()),
            (Id::from_index(3), "GGGG".to_owned()),
        ]);
        index.compute_index();

        let thermo = Thermodynamics::new(ThermoEnvironment::default());
        let opts = MatchOptions {
            min_len: 4,
            max_len: 4,
            is_rna: false,
            mismatches: 0,
            outgroup_mismatch_distance: 0,
            use_weighted: false,
            reject_reverse_complement_hits: false,
            enumerate_all: false,
            workers: 1,
        };

        let mut bgrt = Bgrt::new(BgrtParams { num_species: 4, ..BgrtParams::default() });
        run_build_bgrt(&mut index, &thermo, &mut bgrt, &opts).unwrap();
        run_process_bgrt(&mut bgrt, &mut tree, opts.workers);

        let ab = tree.node(tree.leaf_handle(Id::from_index(0))).parent().unwrap();
        assert_eq!(tree.node(ab).num_matches()[0], 2);
        assert!(tree.node(ab).signatures_at(0).iter().any(|s| s.as_ref() == "AAAA"));
    }
}
