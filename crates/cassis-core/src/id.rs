use derive_more::{Constructor, Display};

/// Dense organism identifier, assigned by [`crate::namemap::NameMap`] in
/// first-seen insertion order.
///
/// `Id` is used throughout the crate wherever the original system keeps a
/// plain `unsigned int`: as the key space for sorted ID sets, as the
/// per-leaf label of the phylogenetic tree, and as the index into the BGRT
/// root array.
#[derive(Constructor, Display, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display(fmt = "{}", "_0")]
pub struct Id(u32);

impl Id {
    /// Sentinel meaning "no id" — used for unassigned group names and for
    /// unmapped organisms during external-mapping enforcement.
    pub const UNDEF: Self = Self(u32::MAX);

    /// Build an `Id` from a raw dense index.
    #[must_use]
    pub const fn from_index(index: u32) -> Self {
        Self(index)
    }

    /// The raw dense index, usable to index parallel arrays sized `[0, N)`.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// `true` for [`Id::UNDEF`].
    #[must_use]
    pub const fn is_undef(self) -> bool {
        self.0 == u32::MAX
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_undef() {
            write!(f, "Id(UNDEF)")
        } else {
            write!(f, "Id({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undef_is_not_a_valid_index() {
        assert!(Id::UNDEF.is_undef());
        assert!(!Id::from_index(0).is_undef());
    }

    #[test]
    fn ordering_matches_raw_index() {
        assert!(Id::from_index(1) > Id::from_index(0));
        assert!(Id::from_index(0) < Id::UNDEF);
    }
}
