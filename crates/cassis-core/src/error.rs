//! Error types and Result module.

use displaydoc::Display;
use thiserror::Error;

use crate::id::Id;

/// Result type that is being returned from methods that can fail and thus
/// have [`CassisError`]s.
pub type CassisResult<T> = Result<T, CassisError>;

// [`CassisError`] is public, but opaque and easy to keep compatible.
#[derive(Error, Debug)]
#[error(transparent)]
/// Errors that can result from cassis-core.
pub struct CassisError(#[from] CassisErrorKind);

impl CassisError {
    /// Expose the inner error kind.
    ///
    /// This is useful for matching on the error kind.
    pub fn into_inner(self) -> CassisErrorKind {
        self.0
    }
}

/// [`CassisErrorKind`] describes the errors that can happen while running
/// the signature-search engine.
///
/// This is a non-exhaustive enum, so additional variants may be added in
/// future. It is recommended to match against the wildcard `_` instead of
/// listing all possible variants, to avoid problems when new variants are
/// added.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CassisErrorKind {
    /// [`IdSetErrorKind`] describes the errors that can be returned by the sorted/unordered ID set
    #[error(transparent)]
    IdSet(#[from] IdSetErrorKind),

    /// [`NameMapErrorKind`] describes the errors that can be returned by the name/id bijection
    #[error(transparent)]
    NameMap(#[from] NameMapErrorKind),

    /// [`ThermoErrorKind`] describes the errors that can be returned by the thermodynamics filter
    #[error(transparent)]
    Thermo(#[from] ThermoErrorKind),

    /// [`BgrtErrorKind`] describes the errors that can be returned while building or reading a BGRT
    #[error(transparent)]
    Bgrt(#[from] BgrtErrorKind),

    /// [`TreeErrorKind`] describes the errors that can be returned while building or matching a CaSSiS tree
    #[error(transparent)]
    Tree(#[from] TreeErrorKind),

    /// [`TraversalErrorKind`] describes the errors that can be returned by the BGRT-vs-tree traversal
    #[error(transparent)]
    Traversal(#[from] TraversalErrorKind),

    /// [`SerializeErrorKind`] describes the errors that can be returned while reading or writing a BGRT file
    #[error(transparent)]
    Serialize(#[from] SerializeErrorKind),

    /// [`NewickErrorKind`] describes the errors that can be returned while parsing a Newick tree
    #[error(transparent)]
    Newick(#[from] NewickErrorKind),

    /// [`SequenceIndexErrorKind`] describes the errors that can be returned by a [`crate::index::SequenceIndex`] backend
    #[error(transparent)]
    SequenceIndex(#[from] SequenceIndexErrorKind),

    /// [`std::io::Error`]
    #[error(transparent)]
    StdIo(#[from] std::io::Error),
}

/// Marker for leaf error-kind types that convert into [`CassisError`] in a
/// single hop. `thiserror`'s `#[from]` only generates one level of `From`
/// per `#[from]` field, so without this, `SomeLeafKind::Variant.into()`
/// would need an explicit intermediate `CassisErrorKind::from(...)` at every
/// call site. Implement this for every leaf kind enum listed in
/// [`CassisErrorKind`] and nothing else.
trait CassisErrorMarker {}

impl<E> From<E> for CassisError
where
    E: CassisErrorMarker,
    CassisErrorKind: From<E>,
{
    fn from(value: E) -> Self {
        Self(CassisErrorKind::from(value))
    }
}

impl CassisErrorMarker for IdSetErrorKind {}
impl CassisErrorMarker for NameMapErrorKind {}
impl CassisErrorMarker for ThermoErrorKind {}
impl CassisErrorMarker for BgrtErrorKind {}
impl CassisErrorMarker for TreeErrorKind {}
impl CassisErrorMarker for TraversalErrorKind {}
impl CassisErrorMarker for SerializeErrorKind {}
impl CassisErrorMarker for NewickErrorKind {}
impl CassisErrorMarker for SequenceIndexErrorKind {}
impl CassisErrorMarker for std::io::Error {}

/// [`IdSetErrorKind`] describes the errors that can be returned by the sorted/unordered ID set
#[derive(Error, Debug, Display, Copy, Clone)]
pub enum IdSetErrorKind {
    /// index {0} out of bounds for id set of length {1}
    IndexOutOfBounds(usize, usize),
}

/// [`NameMapErrorKind`] describes the errors that can be returned by the name/id bijection
#[derive(Error, Debug, Display, Clone)]
pub enum NameMapErrorKind {
    /// id {0:?} is not present in this name map
    UnknownId(Id),
    /// name {0:?} is not present in this name map
    UnknownName(String),
}

/// [`ThermoErrorKind`] describes the errors that can be returned by the thermodynamics filter
#[derive(Error, Debug, Display, Copy, Clone)]
pub enum ThermoErrorKind {
    /// candidate signature is empty after ambiguous bases were dropped
    EmptyAfterFiltering,
    /// configured range is empty: min {0} > max {1}
    EmptyRange(f64, f64),
}

/// [`BgrtErrorKind`] describes the errors that can be returned while building or reading a BGRT
#[derive(Error, Debug, Display, Clone)]
pub enum BgrtErrorKind {
    /// cannot insert a signature with an empty matched-id set
    EmptyMatchedIds,
    /// invalid node handle {0}
    InvalidHandle(u32),
    /// node {0} has no species (would have been merged away)
    EmptySpeciesOnNode(u32),
}

/// [`TreeErrorKind`] describes the errors that can come up dealing with the CaSSiS tree
#[derive(Error, Debug, Display, Clone)]
pub enum TreeErrorKind {
    /// outgroup budget exceeded: extra_outgroup {0} > K {1}
    OutgroupBudgetExceeded(u32, u32),
}

/// [`TraversalErrorKind`] describes the errors that can be returned by the BGRT-vs-tree traversal
#[derive(Error, Debug, Display, Clone, Copy)]
pub enum TraversalErrorKind {
    /// outgroup budget K={0} must fit in the per-node `num_matches` arrays
    OutgroupBudgetTooLarge(u32),
}

/// [`SerializeErrorKind`] describes the errors that can be returned while reading or writing a BGRT file
#[derive(Error, Debug, Display, Clone)]
pub enum SerializeErrorKind {
    /// bad magic bytes: expected "BGRT", found {0:?}
    BadMagic([u8; 4]),
    /// unsupported format version {0}, this build supports up to {1}
    UnsupportedVersion(u8, u8),
    /// Adler-32 checksum mismatch: expected {0:#010x}, computed {1:#010x}
    ChecksumMismatch(u32, u32),
    /// variable-length integer exceeds 5 bytes / 2^32-1
    VarUintTooLarge,
    /// unexpected end of input while reading {0}
    UnexpectedEof(&'static str),
    /// string is not valid UTF-8: {0}
    InvalidUtf8(String),
}

/// [`NewickErrorKind`] describes the errors that can be returned while parsing a Newick tree
#[derive(Error, Debug, Display, Clone)]
pub enum NewickErrorKind {
    /// unexpected end of input while parsing {0}
    UnexpectedEof(&'static str),
    /// expected {expected:?}, found {found:?}
    Expected { expected: char, found: char },
    /// tree is not a valid binary Newick tree: more than one root-level node
    NotBinary,
    /// branch length {0:?} is not a valid number
    BadBranchLength(String),
}

/// [`SequenceIndexErrorKind`] describes the errors that can be returned by a [`crate::index::SequenceIndex`] backend
#[derive(Error, Debug, Display, Clone, Copy)]
pub enum SequenceIndexErrorKind {
    /// candidate fetch requested before the index was computed
    NotComputed,
    /// zero-length signatures cannot be enumerated
    ZeroLength,
}
