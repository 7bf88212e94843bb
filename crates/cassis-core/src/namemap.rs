//! Bijection between organism names and dense [`Id`]s.

use std::collections::HashMap;

use crate::id::Id;

/// Maps organism names to dense ids assigned in first-seen order, and back.
///
/// [`Id::UNDEF`] always maps to the empty name; it is never assigned by
/// [`NameMap::append`].
#[derive(Debug, Clone, Default)]
pub struct NameMap {
    names: Vec<String>,
    ids: HashMap<String, Id>,
}

impl NameMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct names currently assigned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Look up `name`, minting a new dense id in append order if it has not
    /// been seen before.
    pub fn append(&mut self, name: &str) -> Id {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = Id::from_index(self.names.len() as u32);
        self.names.push(name.to_owned());
        self.ids.insert(name.to_owned(), id);
        id
    }

    /// Look up an existing id for `name` without minting a new one.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<Id> {
        self.ids.get(name).copied()
    }

    /// The name for `id`; [`Id::UNDEF`] and any id outside the currently
    /// assigned range map to the empty string.
    #[must_use]
    pub fn name_of(&self, id: Id) -> &str {
        if id.is_undef() {
            return "";
        }
        self.names.get(id.index()).map_or("", String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (Id::from_index(i as u32), name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_dense_ids_in_first_seen_order() {
        let mut map = NameMap::new();
        let a = map.append("alpha");
        let b = map.append("beta");
        let a_again = map.append("alpha");
        assert_eq!(a, a_again);
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn undef_maps_to_empty_name() {
        let map = NameMap::new();
        assert_eq!(map.name_of(Id::UNDEF), "");
    }

    #[test]
    fn round_trips_name_to_id() {
        let mut map = NameMap::new();
        let id = map.append("organism-7");
        assert_eq!(map.name_of(id), "organism-7");
        assert_eq!(map.id_of("organism-7"), Some(id));
        assert_eq!(map.id_of("missing"), None);
    }
}
