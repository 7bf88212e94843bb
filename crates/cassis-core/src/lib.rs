/*!
The combinatorial engine behind CaSSiS ("Comprehensive and Sensitive
Signature Search"): given a phylogenetic tree and, for each candidate
oligonucleotide signature, the set of organisms it hybridises with, this
crate computes, per tree node and per tolerated outgroup-match count `k`,
the signatures achieving the highest ingroup coverage.

# Overview

Two pipelines share the same front end (candidate enumeration →
thermodynamics filter → index match) and differ only in the sink:

*   **one-pass** — [`tree::CassisTree::add_matching`] absorbs each match
    directly, propagating it to every tree node where it is optimal.
*   **two-pass** — matches are first collected into a [`bgrt::Bgrt`]
    (so they can be serialised and replayed later); [`traversal::traverse`]
    then walks the BGRT against a tree to the same effect.

[`driver`] wires both pipelines to anything implementing
[`index::SequenceIndex`]. Everything outside that trait — sequence
parsing, tree-file parsing, the actual k-mer search index, result
emitters — is the CLI crate's concern, not this one's.

# Crate features

This crate has no optional features: the combinatorial engine is always
fully available. Sequence-index implementations, Newick parsing and result
emitters live in the `cassis-cli` binary crate instead.
*/

#![allow(dead_code)]
#![forbid(unsafe_code)]
#![warn(
    // unreachable_pub, // frequently check
    // TODO: Activate and create better docs
    // missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications,
    // TODO: Activate if you're feeling like fixing stuff 
    // clippy::pedantic,
    // clippy::correctness,
    // clippy::suspicious,
    // clippy::complexity,
    // clippy::perf,
    clippy::nursery,
    bad_style,
    dead_code,
    improper_ctypes,
    missing_copy_implementations,
    missing_debug_implementations,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    private_in_public,
    trivial_numeric_casts,
    unused_results,
    trivial_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unconditional_recursion,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    clippy::cast_lossless,
    clippy::default_trait_access,
    clippy::doc_markdown,
    clippy::manual_string_new,
    clippy::match_same_arms,
    clippy::semicolon_if_nothing_returned,
    clippy::trivially_copy_pass_by_ref
)]
#![allow(clippy::module_name_repetitions, clippy::redundant_pub_crate)]
#![allow(clippy::missing_const_for_fn)]

pub(crate) mod bgrt;
pub(crate) mod driver;
pub(crate) mod enumerator;
pub(crate) mod error;
pub(crate) mod id;
pub(crate) mod idset;
pub(crate) mod index;
pub(crate) mod namemap;
pub(crate) mod thermo;
pub(crate) mod traversal;
pub(crate) mod tree;

// cassis-core public API
pub use crate::{
    bgrt::{io as bgrt_io, Bgrt, BgrtNode, BgrtParams, NodeHandle},
    driver::{run_build_bgrt, run_one_pass, run_process_bgrt, MatchOptions},
    enumerator::SignatureEnumerator,
    error::{CassisError, CassisErrorKind, CassisResult, NewickErrorKind, SequenceIndexErrorKind},
    id::Id,
    idset::{SortedIdSet, UnorderedIdMultiset},
    index::SequenceIndex,
    namemap::NameMap,
    thermo::{ThermoEnvironment, ThermoReport, Thermodynamics},
    traversal::{traverse, traverse_parallel},
    tree::{lca::EulerLca, CassisTree, TreeHandle, TreeNode, TreeSpec},
};
