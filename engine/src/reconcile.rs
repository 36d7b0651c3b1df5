//! Reconciliation of change events into a local collection.
//!
//! This is the core of consistency. Delivery is at-least-once and unordered
//! relative to optimistic application, so every rule here must tolerate
//! duplicates and echoes of the client's own writes.
//!
//! # Rules
//!
//! 1. Insert: replace in place when the id exists (echo or duplicate),
//!    append otherwise
//! 2. Update: replace in place, ignore when the id is unknown
//! 3. Delete: remove, no-op when the id is unknown
//! 4. Rows outside the collection's scope are ignored
//!
//! Visual order is insertion order as observed locally, never timestamp
//! order.

use crate::collection::{LocalCollection, Upsert};
use crate::event::ChangeEvent;
use crate::record::TableRecord;

/// Outcome of applying one change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Insert appended a new entity.
    Appended,
    /// Insert or update replaced an existing entity in place.
    Replaced,
    /// Delete removed an entity.
    Removed,
    /// Update for an unknown id, or a repeated delete. No change.
    NoMatch,
    /// Insert or update for a row outside this collection's scope. No change.
    OutOfScope,
}

impl Applied {
    /// Whether the collection changed.
    pub fn changed(&self) -> bool {
        matches!(self, Applied::Appended | Applied::Replaced | Applied::Removed)
    }
}

/// Apply one typed change event to a collection.
///
/// `scope` is the parent key the collection is bound to, if any. Inserts
/// and updates for rows with a different parent are ignored. Deletes carry
/// no scope (the notifier may only know the id), so they apply by id alone;
/// removing an id that was never in scope is a harmless no-op.
pub fn apply_event<T: TableRecord>(
    collection: &mut LocalCollection<T>,
    scope: Option<&str>,
    event: ChangeEvent<T>,
) -> Applied {
    match event {
        ChangeEvent::Insert(row) => {
            if out_of_scope(scope, &row) {
                return Applied::OutOfScope;
            }
            match collection.upsert(row) {
                Upsert::Appended => Applied::Appended,
                Upsert::Replaced => Applied::Replaced,
            }
        }
        ChangeEvent::Update(row) => {
            if out_of_scope(scope, &row) {
                return Applied::OutOfScope;
            }
            if collection.replace(row) {
                Applied::Replaced
            } else {
                Applied::NoMatch
            }
        }
        ChangeEvent::Delete(id) => {
            if collection.remove(&id).is_some() {
                Applied::Removed
            } else {
                Applied::NoMatch
            }
        }
    }
}

fn out_of_scope<T: TableRecord>(scope: Option<&str>, row: &T) -> bool {
    match scope {
        Some(key) => row.scope_key() != Some(key),
        None => false,
    }
}
