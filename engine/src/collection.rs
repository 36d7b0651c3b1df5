//! Ordered, id-unique storage backing a rendered list.

use crate::error::{Error, Result};
use crate::record::TableRecord;
use crate::EntityId;
use std::collections::HashMap;

/// How an upsert landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The id was new; the row was appended.
    Appended,
    /// The id existed; the row was replaced in place.
    Replaced,
}

/// An ordered sequence of entities, ordered by local observation and keyed
/// by id for uniqueness. Positions are stable under replacement; removal
/// closes the gap.
#[derive(Debug, Clone, Default)]
pub struct LocalCollection<T> {
    entries: Vec<T>,
    index: HashMap<EntityId, usize>,
}

impl<T: TableRecord> LocalCollection<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Load the initial query result. Order is preserved as given.
    pub fn hydrate(rows: Vec<T>) -> Result<Self> {
        let mut collection = Self::new();
        for row in rows {
            if let Upsert::Replaced = collection.upsert_inner(row, true)? {
                unreachable!("duplicate check precedes replacement");
            }
        }
        Ok(collection)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&pos| &self.entries[pos])
    }

    /// Position of an entity in display order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    /// All rows in display order.
    pub fn rows(&self) -> &[T] {
        &self.entries
    }

    /// Insert semantics: replace in place when the id exists (duplicate
    /// delivery or optimistic echo), append otherwise.
    pub fn upsert(&mut self, row: T) -> Upsert {
        match self.upsert_inner(row, false) {
            Ok(outcome) => outcome,
            Err(_) => unreachable!("upsert never rejects duplicates"),
        }
    }

    fn upsert_inner(&mut self, row: T, reject_duplicate: bool) -> Result<Upsert> {
        let id = row.entity_id().to_owned();
        match self.index.get(&id) {
            Some(&pos) => {
                if reject_duplicate {
                    return Err(Error::DuplicateEntity(id));
                }
                self.entries[pos] = row;
                Ok(Upsert::Replaced)
            }
            None => {
                self.index.insert(id, self.entries.len());
                self.entries.push(row);
                Ok(Upsert::Appended)
            }
        }
    }

    /// Update semantics: replace in place, `false` when the id is unknown.
    pub fn replace(&mut self, row: T) -> bool {
        match self.index.get(row.entity_id()) {
            Some(&pos) => {
                self.entries[pos] = row;
                true
            }
            None => false,
        }
    }

    /// Delete semantics: remove and return the row with its position,
    /// `None` when the id is unknown.
    pub fn remove(&mut self, id: &str) -> Option<(usize, T)> {
        let pos = self.index.remove(id)?;
        let row = self.entries.remove(pos);
        for idx in self.index.values_mut() {
            if *idx > pos {
                *idx -= 1;
            }
        }
        Some((pos, row))
    }

    /// Reinsert a row at a prior position, clamped to the current length.
    /// Used to restore an optimistically deleted entity.
    pub fn insert_at(&mut self, position: usize, row: T) -> Result<()> {
        let id = row.entity_id().to_owned();
        if self.index.contains_key(&id) {
            return Err(Error::DuplicateEntity(id));
        }
        let pos = position.min(self.entries.len());
        for idx in self.index.values_mut() {
            if *idx >= pos {
                *idx += 1;
            }
        }
        self.index.insert(id, pos);
        self.entries.insert(pos, row);
        Ok(())
    }

    /// Ids in display order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|row| row.entity_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::Comment;

    fn comment(id: &str, content: &str) -> Comment {
        Comment::new(id, "p-1", "u-1", content)
    }

    #[test]
    fn upsert_appends_then_replaces_in_place() {
        let mut collection = LocalCollection::new();
        assert_eq!(collection.upsert(comment("c-1", "first")), Upsert::Appended);
        assert_eq!(collection.upsert(comment("c-2", "second")), Upsert::Appended);

        let outcome = collection.upsert(comment("c-1", "edited"));
        assert_eq!(outcome, Upsert::Replaced);
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.position("c-1"), Some(0));
        assert_eq!(collection.get("c-1").unwrap().content, "edited");
    }

    #[test]
    fn replace_misses_unknown_id() {
        let mut collection = LocalCollection::new();
        collection.upsert(comment("c-1", "first"));

        assert!(!collection.replace(comment("c-9", "ghost")));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn remove_closes_the_gap() {
        let mut collection = LocalCollection::new();
        collection.upsert(comment("c-1", "a"));
        collection.upsert(comment("c-2", "b"));
        collection.upsert(comment("c-3", "c"));

        let (pos, removed) = collection.remove("c-2").unwrap();
        assert_eq!(pos, 1);
        assert_eq!(removed.id, "c-2");
        assert_eq!(collection.position("c-3"), Some(1));
        assert!(collection.remove("c-2").is_none());
    }

    #[test]
    fn insert_at_restores_position() {
        let mut collection = LocalCollection::new();
        collection.upsert(comment("c-1", "a"));
        collection.upsert(comment("c-2", "b"));
        collection.upsert(comment("c-3", "c"));

        let (pos, row) = collection.remove("c-2").unwrap();
        collection.insert_at(pos, row).unwrap();

        let ids: Vec<_> = collection.ids().collect();
        assert_eq!(ids, vec!["c-1", "c-2", "c-3"]);
    }

    #[test]
    fn insert_at_clamps_past_the_end() {
        let mut collection = LocalCollection::new();
        collection.upsert(comment("c-1", "a"));

        collection.insert_at(10, comment("c-2", "b")).unwrap();
        assert_eq!(collection.position("c-2"), Some(1));
    }

    #[test]
    fn hydrate_rejects_duplicate_ids() {
        let err = LocalCollection::hydrate(vec![comment("c-1", "a"), comment("c-1", "b")])
            .unwrap_err();
        assert_eq!(err, Error::DuplicateEntity("c-1".into()));
    }

    #[test]
    fn hydrate_preserves_given_order() {
        let collection =
            LocalCollection::hydrate(vec![comment("c-3", "x"), comment("c-1", "y")]).unwrap();
        let ids: Vec<_> = collection.ids().collect();
        assert_eq!(ids, vec!["c-3", "c-1"]);
    }
}
