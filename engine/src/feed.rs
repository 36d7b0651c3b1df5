//! The per-screen view model: one collection, its pending mutations, and
//! the change events that keep it consistent.
//!
//! A `Feed` is created when a screen mounts, hydrated from the initial
//! query, mutated by staged user actions and incoming notifications, and
//! dropped on unmount. It is synchronous; the host owns all IO and feeds
//! outcomes back through tickets.

use crate::collection::LocalCollection;
use crate::error::{Error, Result};
use crate::event::{ChangeEvent, ChangeNotification};
use crate::optimistic::{Cleanup, MutationTicket, PendingSet, Resolution, Staged};
use crate::reconcile::{apply_event, Applied};
use crate::record::{TableRecord, UploadRef};
use crate::ScopeKey;

/// Ordered view over one table, optionally bound to a parent scope.
#[derive(Debug, Clone)]
pub struct Feed<T: TableRecord> {
    collection: LocalCollection<T>,
    scope: Option<ScopeKey>,
    pending: PendingSet<T>,
}

impl<T: TableRecord> Feed<T> {
    /// Feed over every row of the table the subscription delivers.
    pub fn unscoped() -> Self {
        Self {
            collection: LocalCollection::new(),
            scope: None,
            pending: PendingSet::new(),
        }
    }

    /// Feed bound to one parent key (a conversation, a post). Inserts and
    /// updates for rows with a different parent are ignored.
    pub fn scoped(key: impl Into<ScopeKey>) -> Self {
        Self {
            collection: LocalCollection::new(),
            scope: Some(key.into()),
            pending: PendingSet::new(),
        }
    }

    /// Load the initial query result, dropping any previous state. Rows
    /// keep the order the query returned them in.
    pub fn hydrate(&mut self, rows: Vec<T>) -> Result<()> {
        self.collection = LocalCollection::hydrate(rows)?;
        self.pending = PendingSet::new();
        Ok(())
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn rows(&self) -> &[T] {
        self.collection.rows()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.collection.get(id)
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.collection.contains(id)
    }

    /// Position of an entity in display order.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.collection.position(id)
    }

    /// Whether a mutation is still in flight for this entity.
    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.is_pending(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Apply a raw notification from the realtime channel.
    ///
    /// An Insert event whose id matches a pending optimistic insert settles
    /// that entry: the confirmed row replaces the provisional one in place
    /// and the eventual direct response resolves stale.
    pub fn apply(&mut self, notification: ChangeNotification) -> Result<Applied> {
        let event = notification.into_typed::<T>()?;
        Ok(self.apply_typed(event))
    }

    /// Apply an already-typed change event.
    pub fn apply_typed(&mut self, event: ChangeEvent<T>) -> Applied {
        let confirmed_insert = match &event {
            ChangeEvent::Insert(row) => Some(row.entity_id().to_owned()),
            _ => None,
        };

        let applied = apply_event(&mut self.collection, self.scope.as_deref(), event);

        if applied.changed() {
            if let Some(id) = confirmed_insert {
                self.pending.confirm_insert(&id);
            }
        }
        applied
    }

    /// Project an insert immediately and hand back the ticket for the
    /// remote write. The row is assumed to carry this feed's scope.
    pub fn stage_insert(&mut self, row: T) -> Result<MutationTicket> {
        self.stage_insert_inner(row, None)
    }

    /// Like [`Feed::stage_insert`], for a row whose media was already
    /// uploaded. If the write fails, the revert names the upload so the
    /// host can delete the orphaned blob.
    pub fn stage_insert_with_upload(
        &mut self,
        row: T,
        upload: UploadRef,
    ) -> Result<MutationTicket> {
        self.stage_insert_inner(row, Some(upload))
    }

    fn stage_insert_inner(&mut self, row: T, upload: Option<UploadRef>) -> Result<MutationTicket> {
        let id = row.entity_id().to_owned();
        if self.pending.is_pending(&id) {
            return Err(Error::MutationPending(id));
        }
        if self.collection.contains(&id) {
            return Err(Error::DuplicateEntity(id));
        }
        self.collection.upsert(row);
        Ok(self.pending.stage(Staged::Insert { id, upload }))
    }

    /// Project an update immediately, snapshotting the previous row for a
    /// possible revert.
    pub fn stage_update(&mut self, row: T) -> Result<MutationTicket> {
        let id = row.entity_id().to_owned();
        if self.pending.is_pending(&id) {
            return Err(Error::MutationPending(id));
        }
        let Some(previous) = self.collection.get(&id).cloned() else {
            return Err(Error::EntityNotFound(id));
        };
        self.collection.replace(row);
        Ok(self.pending.stage(Staged::Update { previous }))
    }

    /// Project a delete immediately, snapshotting the row and its position
    /// for a possible revert.
    pub fn stage_delete(&mut self, id: &str) -> Result<MutationTicket> {
        if self.pending.is_pending(id) {
            return Err(Error::MutationPending(id.to_owned()));
        }
        let Some((position, row)) = self.collection.remove(id) else {
            return Err(Error::EntityNotFound(id.to_owned()));
        };
        Ok(self.pending.stage(Staged::Delete { row, position }))
    }

    /// The remote write succeeded. For inserts and updates, `confirmed`
    /// carries the row as the server stored it (timestamps filled in) and
    /// replaces the provisional one.
    pub fn resolve_success(&mut self, ticket: MutationTicket, confirmed: Option<T>) -> Resolution {
        let Some(staged) = self.pending.take(ticket) else {
            return Resolution::Stale;
        };
        match staged {
            Staged::Insert { .. } | Staged::Update { .. } => {
                if let Some(row) = confirmed {
                    self.collection.upsert(row);
                }
                Resolution::Confirmed(Vec::new())
            }
            Staged::Delete { row, .. } => {
                let cleanups = row
                    .attached_upload()
                    .map(Cleanup::RemoveUpload)
                    .into_iter()
                    .collect();
                Resolution::Confirmed(cleanups)
            }
        }
    }

    /// The remote write failed. Reverts the projection to its pre-mutation
    /// value and names any upload the host must delete.
    pub fn resolve_failure(&mut self, ticket: MutationTicket) -> Resolution {
        let Some(staged) = self.pending.take(ticket) else {
            return Resolution::Stale;
        };
        match staged {
            Staged::Insert { id, upload } => {
                self.collection.remove(&id);
                let cleanups = upload.map(Cleanup::RemoveUpload).into_iter().collect();
                Resolution::Reverted(cleanups)
            }
            Staged::Update { previous } => {
                self.collection.replace(previous);
                Resolution::Reverted(Vec::new())
            }
            Staged::Delete { row, position } => {
                if !self.collection.contains(row.entity_id()) {
                    // Position is clamped; the collection may have shrunk.
                    let _ = self.collection.insert_at(position, row);
                }
                Resolution::Reverted(Vec::new())
            }
        }
    }

    /// Give up waiting for a remote write (host-side deadline). Reverts
    /// like a failure; the outcome that eventually arrives resolves stale.
    pub fn abandon(&mut self, ticket: MutationTicket) -> Resolution {
        self.resolve_failure(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Table;
    use crate::tables::{Message, MessageKind};
    use serde_json::json;

    fn thread() -> Feed<Message> {
        let mut feed = Feed::scoped("c-1");
        feed.hydrate(vec![
            Message::text("m-1", "c-1", "u-1", "hello"),
            Message::text("m-2", "c-1", "u-2", "hey"),
        ])
        .unwrap();
        feed
    }

    fn confirmed(mut message: Message) -> Message {
        message.created_at = "2024-03-01T10:00:00Z".into();
        message
    }

    #[test]
    fn staged_insert_projects_immediately() {
        let mut feed = thread();

        feed.stage_insert(Message::text("m-3", "c-1", "u-1", "on my way"))
            .unwrap();

        assert_eq!(feed.len(), 3);
        assert!(feed.is_pending("m-3"));
        assert_eq!(feed.rows()[2].content.as_deref(), Some("on my way"));
    }

    #[test]
    fn direct_response_settles_a_staged_insert() {
        let mut feed = thread();
        let row = Message::text("m-3", "c-1", "u-1", "on my way");
        let ticket = feed.stage_insert(row.clone()).unwrap();

        let resolution = feed.resolve_success(ticket, Some(confirmed(row)));

        assert_eq!(resolution, Resolution::Confirmed(Vec::new()));
        assert!(!feed.is_pending("m-3"));
        assert_eq!(feed.get("m-3").unwrap().created_at, "2024-03-01T10:00:00Z");
        assert_eq!(feed.len(), 3);
    }

    #[test]
    fn insert_echo_settles_before_the_direct_response() {
        let mut feed = thread();
        let row = Message::text("m-3", "c-1", "u-1", "on my way");
        let ticket = feed.stage_insert(row.clone()).unwrap();

        let applied = feed
            .apply(ChangeNotification::insert(
                Table::Messages,
                serde_json::to_value(confirmed(row)).unwrap(),
            ))
            .unwrap();

        assert_eq!(applied, Applied::Replaced);
        assert_eq!(feed.len(), 3);
        assert!(!feed.is_pending("m-3"));

        // The direct response arrives second and must change nothing.
        let resolution = feed.resolve_success(ticket, None);
        assert_eq!(resolution, Resolution::Stale);
        assert_eq!(feed.len(), 3);
    }

    #[test]
    fn failed_insert_reverts_and_reports_the_orphaned_upload() {
        let mut feed = thread();
        let row = Message::image("m-3", "c-1", "u-1", "https://cdn/pic.png", "c-1/pic.png");
        let ticket = feed
            .stage_insert_with_upload(row, UploadRef::new("conversations", "c-1/pic.png"))
            .unwrap();

        let resolution = feed.resolve_failure(ticket);

        assert_eq!(
            resolution,
            Resolution::Reverted(vec![Cleanup::RemoveUpload(UploadRef::new(
                "conversations",
                "c-1/pic.png"
            ))])
        );
        assert_eq!(feed.len(), 2);
        assert!(!feed.contains("m-3"));
    }

    #[test]
    fn failed_update_restores_the_previous_row() {
        let mut feed = thread();
        let mut edited = feed.get("m-1").unwrap().clone();
        edited.content = Some("hello!".into());
        let ticket = feed.stage_update(edited).unwrap();

        assert_eq!(feed.get("m-1").unwrap().content.as_deref(), Some("hello!"));

        feed.resolve_failure(ticket);
        assert_eq!(feed.get("m-1").unwrap().content.as_deref(), Some("hello"));
        assert_eq!(feed.position_of("m-1"), Some(0));
    }

    #[test]
    fn failed_delete_restores_the_row_at_its_position() {
        let mut feed = thread();
        let ticket = feed.stage_delete("m-1").unwrap();
        assert_eq!(feed.len(), 1);

        feed.resolve_failure(ticket);

        assert_eq!(feed.len(), 2);
        assert_eq!(feed.rows()[0].id, "m-1");
    }

    #[test]
    fn deleting_an_image_message_names_the_blob() {
        let mut feed = thread();
        feed.apply_typed(ChangeEvent::Insert(Message::image(
            "m-3",
            "c-1",
            "u-2",
            "https://cdn/pic.png",
            "c-1/pic.png",
        )));
        let ticket = feed.stage_delete("m-3").unwrap();

        let resolution = feed.resolve_success(ticket, None);

        assert_eq!(
            resolution,
            Resolution::Confirmed(vec![Cleanup::RemoveUpload(UploadRef::new(
                "conversations",
                "c-1/pic.png"
            ))])
        );
    }

    #[test]
    fn second_mutation_on_same_entity_is_refused_until_settled() {
        let mut feed = thread();
        let _ticket = feed.stage_delete("m-1").unwrap();

        let err = feed
            .stage_insert(Message::text("m-1", "c-1", "u-1", "again"))
            .unwrap_err();
        assert_eq!(err, Error::MutationPending("m-1".into()));
    }

    #[test]
    fn abandoned_mutation_reverts_and_outcome_resolves_stale() {
        let mut feed = thread();
        let ticket = feed
            .stage_insert(Message::text("m-3", "c-1", "u-1", "slow network"))
            .unwrap();

        let resolution = feed.abandon(ticket);
        assert_eq!(resolution, Resolution::Reverted(Vec::new()));
        assert!(!feed.contains("m-3"));

        assert_eq!(feed.resolve_success(ticket, None), Resolution::Stale);
        assert!(!feed.contains("m-3"));
    }

    #[test]
    fn foreign_scope_events_do_not_touch_the_thread() {
        let mut feed = thread();

        let applied = feed
            .apply(ChangeNotification::insert(
                Table::Messages,
                json!({"id": "m-9", "conversation_id": "c-2", "sender_id": "u-3",
                       "message_type": "text", "content": "wrong room"}),
            ))
            .unwrap();

        assert_eq!(applied, Applied::OutOfScope);
        assert_eq!(feed.len(), 2);
    }

    #[test]
    fn wrong_table_notification_is_a_typed_error() {
        let mut feed = thread();

        let err = feed
            .apply(ChangeNotification::delete(Table::Posts, json!({"id": "p-1"})))
            .unwrap_err();

        assert_eq!(
            err,
            Error::TableMismatch {
                expected: Table::Messages,
                got: Table::Posts,
            }
        );
    }

    #[test]
    fn shared_post_messages_round_trip_through_events() {
        let mut feed = thread();
        let post = crate::tables::Post {
            id: "p-7".into(),
            user_id: "u-2".into(),
            caption: Some("sunset".into()),
            media: Some("https://cdn/sunset.png".into()),
            media_type: Some(crate::tables::MediaType::Image),
            likes: 3,
            created_at: "2024-02-28T18:00:00Z".into(),
        };
        let shared = Message::shared_post("m-3", "c-1", "u-2", post);

        let applied = feed
            .apply(ChangeNotification::insert(
                Table::Messages,
                serde_json::to_value(&shared).unwrap(),
            ))
            .unwrap();

        assert_eq!(applied, Applied::Appended);
        let row = feed.get("m-3").unwrap();
        assert_eq!(row.message_type, MessageKind::Post);
        assert_eq!(row.post.as_ref().unwrap().caption.as_deref(), Some("sunset"));
    }
}
