//! Optimistic mutation bookkeeping: tickets, revert snapshots, toggle
//! generations, and the cleanup work failures leave behind.
//!
//! The host projects a mutation locally, issues the remote write, and feeds
//! the outcome back through the ticket it was handed. Outcomes for tickets
//! that were already settled, abandoned, or superseded resolve to
//! [`Resolution::Stale`] and must not touch state.

use crate::record::{TableRecord, UploadRef};
use crate::{EntityId, Generation};
use std::collections::HashMap;

/// Handle for one in-flight row mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationTicket(pub(crate) u64);

/// Follow-up action the host owes after a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cleanup {
    /// Delete an uploaded blob no row references anymore.
    RemoveUpload(UploadRef),
}

/// What a resolved outcome did to local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The latest intent stands confirmed. Cleanups come from completed
    /// deletes whose rows carried an upload.
    Confirmed(Vec<Cleanup>),
    /// The mutation failed or was abandoned; local state was reverted to
    /// its pre-mutation value. Cleanups come from uploads staged for a row
    /// that never materialized.
    Reverted(Vec<Cleanup>),
    /// Outcome for a superseded or already-settled request. Discarded.
    Stale,
}

impl Resolution {
    pub fn is_stale(&self) -> bool {
        matches!(self, Resolution::Stale)
    }
}

/// Snapshot held while a row mutation is in flight.
#[derive(Debug, Clone)]
pub(crate) enum Staged<T> {
    Insert {
        id: EntityId,
        upload: Option<UploadRef>,
    },
    Update {
        previous: T,
    },
    Delete {
        row: T,
        position: usize,
    },
}

impl<T: TableRecord> Staged<T> {
    pub(crate) fn entity_id(&self) -> &str {
        match self {
            Staged::Insert { id, .. } => id,
            Staged::Update { previous } => previous.entity_id(),
            Staged::Delete { row, .. } => row.entity_id(),
        }
    }
}

/// Tickets outstanding for a single collection. One mutation per entity at
/// a time; a second stage on the same id is refused until the first
/// settles.
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingSet<T> {
    entries: HashMap<u64, Staged<T>>,
    by_id: HashMap<EntityId, u64>,
    next: u64,
}

impl<T: TableRecord> PendingSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            by_id: HashMap::new(),
            next: 0,
        }
    }

    pub(crate) fn stage(&mut self, staged: Staged<T>) -> MutationTicket {
        let ticket = self.next;
        self.next += 1;
        self.by_id.insert(staged.entity_id().to_owned(), ticket);
        self.entries.insert(ticket, staged);
        MutationTicket(ticket)
    }

    pub(crate) fn take(&mut self, ticket: MutationTicket) -> Option<Staged<T>> {
        let staged = self.entries.remove(&ticket.0)?;
        self.by_id.remove(staged.entity_id());
        Some(staged)
    }

    /// Settle a pending insert when its confirmed counterpart arrives as an
    /// Insert event before the direct response does. Updates and deletes
    /// keep their snapshots; an event echo cannot be attributed to them.
    pub(crate) fn confirm_insert(&mut self, id: &str) -> bool {
        let Some(&ticket) = self.by_id.get(id) else {
            return false;
        };
        if matches!(self.entries.get(&ticket), Some(Staged::Insert { .. })) {
            self.entries.remove(&ticket);
            self.by_id.remove(id);
            true
        } else {
            false
        }
    }

    pub(crate) fn is_pending(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Handle for one in-flight toggle request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleTicket {
    pub(crate) id: EntityId,
    pub(crate) generation: Generation,
}

impl ToggleTicket {
    /// Entity the toggle concerns.
    pub fn entity_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy)]
struct ToggleState {
    desired: bool,
    confirmed: bool,
    generation: Generation,
    in_flight: bool,
}

/// Boolean memberships (liked, saved, following) keyed by entity, with a
/// per-entity generation counter. Rapid toggles serialize through the
/// generation: only the outcome of the latest request may mutate state,
/// earlier outcomes resolve stale. This is what keeps a like/unlike burst
/// from settling on the wrong value.
#[derive(Debug, Clone, Default)]
pub struct ToggleSet {
    states: HashMap<EntityId, ToggleState>,
}

impl ToggleSet {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
        }
    }

    /// Seed the confirmed state from an initial query.
    pub fn hydrate(&mut self, id: impl Into<EntityId>, engaged: bool) {
        self.states.insert(
            id.into(),
            ToggleState {
                desired: engaged,
                confirmed: engaged,
                generation: 0,
                in_flight: false,
            },
        );
    }

    /// Current intent, optimistic state included.
    pub fn get(&self, id: &str) -> bool {
        self.states.get(id).map(|s| s.desired).unwrap_or(false)
    }

    /// Last state the remote confirmed or echoed.
    pub fn confirmed(&self, id: &str) -> bool {
        self.states.get(id).map(|s| s.confirmed).unwrap_or(false)
    }

    /// Contribution of the pending intent to a derived counter: +1 for an
    /// unconfirmed engage, -1 for an unconfirmed disengage, 0 otherwise.
    pub fn pending_delta(&self, id: &str) -> i64 {
        match self.states.get(id) {
            Some(state) => match (state.desired, state.confirmed) {
                (true, false) => 1,
                (false, true) => -1,
                _ => 0,
            },
            None => 0,
        }
    }

    /// Record a new intent and hand back the ticket for the remote call.
    /// Returns `None` when the intent matches the current one.
    pub fn set(&mut self, id: impl Into<EntityId>, desired: bool) -> Option<ToggleTicket> {
        let id = id.into();
        let state = self.states.entry(id.clone()).or_insert(ToggleState {
            desired: false,
            confirmed: false,
            generation: 0,
            in_flight: false,
        });
        if state.desired == desired {
            return None;
        }
        state.desired = desired;
        state.generation += 1;
        state.in_flight = true;
        Some(ToggleTicket {
            id,
            generation: state.generation,
        })
    }

    /// Feed back the outcome of the remote call for `ticket`.
    pub fn resolve(&mut self, ticket: &ToggleTicket, success: bool) -> Resolution {
        let Some(state) = self.states.get_mut(&ticket.id) else {
            return Resolution::Stale;
        };
        if state.generation != ticket.generation {
            return Resolution::Stale;
        }
        state.in_flight = false;
        if success {
            state.confirmed = state.desired;
            Resolution::Confirmed(Vec::new())
        } else {
            state.desired = state.confirmed;
            Resolution::Reverted(Vec::new())
        }
    }

    /// Give up on an in-flight request (host-side deadline). Reverts like a
    /// failure; a later outcome for the same ticket resolves stale.
    pub fn abandon(&mut self, ticket: &ToggleTicket) -> Resolution {
        let resolution = self.resolve(ticket, false);
        if let Some(state) = self.states.get_mut(&ticket.id) {
            if state.generation == ticket.generation {
                // Retire the generation so the eventual response is stale.
                state.generation += 1;
                state.in_flight = false;
            }
        }
        resolution
    }

    /// Fold in a membership change observed on the realtime channel. The
    /// confirmed state always follows the remote; the local intent follows
    /// too unless a request is still in flight.
    pub fn observe(&mut self, id: impl Into<EntityId>, engaged: bool) {
        let state = self.states.entry(id.into()).or_insert(ToggleState {
            desired: engaged,
            confirmed: engaged,
            generation: 0,
            in_flight: false,
        });
        state.confirmed = engaged;
        if !state.in_flight {
            state.desired = engaged;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_round_trip() {
        let mut likes = ToggleSet::new();
        likes.hydrate("p-1", false);

        let ticket = likes.set("p-1", true).unwrap();
        assert!(likes.get("p-1"));
        assert!(!likes.confirmed("p-1"));
        assert_eq!(likes.pending_delta("p-1"), 1);

        let resolution = likes.resolve(&ticket, true);
        assert_eq!(resolution, Resolution::Confirmed(Vec::new()));
        assert!(likes.confirmed("p-1"));
        assert_eq!(likes.pending_delta("p-1"), 0);
    }

    #[test]
    fn failed_toggle_reverts_to_confirmed_state() {
        let mut likes = ToggleSet::new();
        likes.hydrate("p-1", false);

        let ticket = likes.set("p-1", true).unwrap();
        let resolution = likes.resolve(&ticket, false);

        assert_eq!(resolution, Resolution::Reverted(Vec::new()));
        assert!(!likes.get("p-1"));
        assert_eq!(likes.pending_delta("p-1"), 0);
    }

    #[test]
    fn stale_response_cannot_overwrite_newer_intent() {
        let mut likes = ToggleSet::new();
        likes.hydrate("p-1", false);

        let first = likes.set("p-1", true).unwrap();
        let second = likes.set("p-1", false).unwrap();

        assert_eq!(likes.resolve(&first, true), Resolution::Stale);
        assert!(!likes.get("p-1"), "stale success must not flip the state");

        assert_eq!(
            likes.resolve(&second, true),
            Resolution::Confirmed(Vec::new())
        );
        assert!(!likes.get("p-1"));
        assert!(!likes.confirmed("p-1"));
    }

    #[test]
    fn redundant_intent_issues_no_ticket() {
        let mut likes = ToggleSet::new();
        likes.hydrate("p-1", true);

        assert!(likes.set("p-1", true).is_none());
    }

    #[test]
    fn abandoned_ticket_reverts_and_retires_the_generation() {
        let mut likes = ToggleSet::new();
        likes.hydrate("p-1", false);

        let ticket = likes.set("p-1", true).unwrap();
        assert_eq!(likes.abandon(&ticket), Resolution::Reverted(Vec::new()));
        assert!(!likes.get("p-1"));

        // The response that eventually arrives is discarded.
        assert_eq!(likes.resolve(&ticket, true), Resolution::Stale);
        assert!(!likes.get("p-1"));
    }

    #[test]
    fn observe_confirms_without_clobbering_in_flight_intent() {
        let mut likes = ToggleSet::new();
        likes.hydrate("p-1", false);

        let ticket = likes.set("p-1", true).unwrap();
        likes.observe("p-1", true);

        assert!(likes.get("p-1"));
        assert!(likes.confirmed("p-1"));
        assert_eq!(likes.pending_delta("p-1"), 0);

        // Direct response after the echo settles quietly.
        assert_eq!(
            likes.resolve(&ticket, true),
            Resolution::Confirmed(Vec::new())
        );
        assert!(likes.get("p-1"));
    }

    #[test]
    fn observe_follows_foreign_changes_when_idle() {
        let mut likes = ToggleSet::new();
        likes.hydrate("p-1", true);

        likes.observe("p-1", false);
        assert!(!likes.get("p-1"));
        assert!(!likes.confirmed("p-1"));
    }

    #[test]
    fn unknown_entity_defaults_to_disengaged() {
        let likes = ToggleSet::new();
        assert!(!likes.get("p-404"));
        assert_eq!(likes.pending_delta("p-404"), 0);
    }
}
