//! Reference, brute-force [`SequenceIndex`] implementation (§6 consumed
//! interface; not a substitute for `minipt`/`arbpt`/`ptpan`). Grounded on
//! `indexinterface.h`'s contract: sequences are added, then the index is
//! "computed" (here: just frozen against further additions), then
//! candidates are streamed per length and matched by brute-force sliding
//! Hamming distance over every indexed sequence.

use cassis_core::{Id, SequenceIndex, SortedIdSet};

/// In-memory index over a handful of named sequences. `O(sequences *
/// signature length)` per match and per candidate emitted, which is fine
/// for demonstration and tests but not for production-scale searches —
/// the CLI's `--index` flag names the real backends this stands in for.
#[derive(Debug, Default)]
pub struct NaiveIndex {
    sequences: Vec<(Id, String)>,
    computed: bool,
    fetch: Option<FetchState>,
}

#[derive(Debug)]
struct FetchState {
    candidates: Vec<String>,
    pos: usize,
}

impl NaiveIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Smallest Hamming distance between `needle` and any length-matching
/// window of `haystack`; `None` if `needle` is longer than `haystack`.
fn best_hamming_window(haystack: &[u8], needle: &[u8]) -> Option<u32> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .map(|window| window.iter().zip(needle).filter(|(a, b)| a != b).count() as u32)
        .min()
}

impl SequenceIndex for NaiveIndex {
    fn add_sequence(&mut self, seq: &str, id: Id) -> bool {
        if self.computed {
            return false;
        }
        self.sequences.push((id, seq.to_ascii_uppercase()));
        true
    }

    fn compute_index(&mut self) -> bool {
        self.computed = true;
        true
    }

    fn init_fetch_signature(&mut self, length: u32, _is_rna: bool) -> bool {
        if !self.computed || length == 0 {
            return false;
        }
        let length = length as usize;
        let mut candidates: Vec<String> = Vec::new();
        for (_, seq) in &self.sequences {
            let bytes = seq.as_bytes();
            if bytes.len() < length {
                continue;
            }
            for window in bytes.windows(length) {
                // SAFETY substitute: sequences were upper-cased ASCII on
                // insertion, so every window is valid UTF-8.
                let candidate = std::str::from_utf8(window).expect("ASCII window is valid UTF-8").to_owned();
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }
        self.fetch = Some(FetchState { candidates, pos: 0 });
        true
    }

    fn fetch_next_signature(&mut self) -> Option<String> {
        let state = self.fetch.as_mut()?;
        let next = state.candidates.get(state.pos).cloned();
        state.pos += 1;
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
        if !self.computed {
            return false;
        }
        *og_count = 0;
        let needle = signature.to_ascii_uppercase();
        let needle = needle.as_bytes();
        for (id, seq) in &self.sequences {
            let Some(distance) = best_hamming_window(seq.as_bytes(), needle) else { continue };
            if distance <= mm {
                matched_ids.insert(*id);
            } else if distance <= mm_dist {
                *og_count += 1;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sequence_fails_after_compute() {
        let mut index = NaiveIndex::new();
        index.compute_index();
        assert!(!index.add_sequence("AAAA", Id::from_index(0)));
    }

    #[test]
    fn matches_exact_and_counts_outgroup_window() {
        let mut index = NaiveIndex::new();
        index.add_sequence("AAAA", Id::from_index(0));
        index.add_sequence("AAAT", Id::from_index(1));
        index.add_sequence("GGGG", Id::from_index(2));
        index.compute_index();

        let mut matched = SortedIdSet::new();
        let mut og = 0;
        let ok = index.match_signature(&mut matched, "AAAA", 0, 1, &mut og, false);
        assert!(ok);
        assert_eq!(matched.as_slice(), &[Id::from_index(0)]);
        assert_eq!(og, 1);
    }

    #[test]
    fn streams_unique_candidates_of_the_requested_length() {
        let mut index = NaiveIndex::new();
        index.add_sequence("AAAA", Id::from_index(0));
        index.add_sequence("AAAA", Id::from_index(1));
        index.compute_index();
        assert!(index.init_fetch_signature(4, false));
        assert_eq!(index.fetch_next_signature().as_deref(), Some("AAAA"));
        assert_eq!(index.fetch_next_signature(), None);
    }
}
