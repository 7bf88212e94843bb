//! The sequence-index contract (§6): consumed by the driver, implemented
//! by whatever index backend the CLI wires in (`minipt`, `arbpt`,
//! `ptpan`, or the in-memory reference implementation).

use crate::id::Id;
use crate::idset::SortedIdSet;

/// A sequence index built once from a set of (sequence, organism id)
/// pairs, then queried for signature candidates and their matches.
///
/// Implementations are free to build the index eagerly or lazily, but
/// must treat [`SequenceIndex::add_sequence`] as invalid once
/// [`SequenceIndex::compute_index`] has run.
pub trait SequenceIndex {
    /// Register one sequence under `id`. Returns `false` if called after
    /// [`Self::compute_index`].
    fn add_sequence(&mut self, seq: &str, id: Id) -> bool;

    /// Finalise the index. Idempotent: a second call is a no-op that
    /// returns `true`.
    fn compute_index(&mut self) -> bool;

    /// Start a fresh signature-enumeration pass over all length-`length`
    /// oligonucleotides. Returns `false` if the index is not yet computed.
    fn init_fetch_signature(&mut self, length: u32, is_rna: bool) -> bool;

    /// Next candidate signature in the current enumeration pass, or
    /// `None` once exhausted.
    fn fetch_next_signature(&mut self) -> Option<String>;

    /// Match `signature` against every indexed sequence, allowing up to
    /// `mm` mismatches for ingroup hits and counting hits in
    /// `(mm, mm_dist]` mismatches into `og_count` (the "supposed
    /// outgroup" window). `matched_ids` is filled with the ingroup hits
    /// in sorted order. Returns `false` if the signature contains
    /// characters the index cannot search for.
    fn match_signature(
        &self,
        matched_ids: &mut SortedIdSet,
        signature: &str,
        mm: u32,
        mm_dist: u32,
        og_count: &mut u32,
        use_weighted: bool,
    ) -> bool;
}
