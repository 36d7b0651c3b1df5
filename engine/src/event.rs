//! Change events: the wire envelope delivered by the realtime channel and
//! its typed, table-checked form.

use crate::error::{Error, Result};
use crate::record::{Table, TableRecord};
use crate::EntityId;
use serde::{Deserialize, Serialize};

/// Event discriminant as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Insert,
    Update,
    Delete,
}

/// Raw change notification as delivered by the realtime channel.
///
/// `new` carries the full row for inserts and updates. `old` is only
/// guaranteed to carry the row id for deletes; subscribers must not expect
/// more. Delivery is at-least-once and unordered relative to local
/// optimistic application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNotification {
    pub event_type: EventKind,
    pub table: Table,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<serde_json::Value>,
}

impl ChangeNotification {
    /// Notification for a newly inserted row.
    pub fn insert(table: Table, row: serde_json::Value) -> Self {
        Self {
            event_type: EventKind::Insert,
            table,
            new: Some(row),
            old: None,
        }
    }

    /// Notification for an updated row.
    pub fn update(table: Table, row: serde_json::Value) -> Self {
        Self {
            event_type: EventKind::Update,
            table,
            new: Some(row),
            old: None,
        }
    }

    /// Notification for a deleted row. `old` needs at least an `id`.
    pub fn delete(table: Table, old: serde_json::Value) -> Self {
        Self {
            event_type: EventKind::Delete,
            table,
            new: None,
            old: Some(old),
        }
    }

    /// Convert the raw envelope into a typed event for table `T`.
    ///
    /// Fails when the envelope names a different table, lacks the row the
    /// event kind requires, or carries a row that does not deserialize.
    pub fn into_typed<T: TableRecord>(self) -> Result<ChangeEvent<T>> {
        if self.table != T::TABLE {
            return Err(Error::TableMismatch {
                expected: T::TABLE,
                got: self.table,
            });
        }

        match self.event_type {
            EventKind::Insert => {
                let row = self.new.ok_or_else(|| Error::MissingRow("INSERT.new".into()))?;
                Ok(ChangeEvent::Insert(parse_row(row)?))
            }
            EventKind::Update => {
                let row = self.new.ok_or_else(|| Error::MissingRow("UPDATE.new".into()))?;
                Ok(ChangeEvent::Update(parse_row(row)?))
            }
            EventKind::Delete => {
                let old = self.old.ok_or_else(|| Error::MissingRow("DELETE.old".into()))?;
                let id = old
                    .get("id")
                    .and_then(serde_json::Value::as_str)
                    .ok_or(Error::MissingId)?;
                Ok(ChangeEvent::Delete(id.to_owned()))
            }
        }
    }

    /// Row value used for scope matching: `new` for inserts and updates,
    /// `old` for deletes.
    pub fn scope_row(&self) -> Option<&serde_json::Value> {
        match self.event_type {
            EventKind::Insert | EventKind::Update => self.new.as_ref(),
            EventKind::Delete => self.old.as_ref(),
        }
    }
}

fn parse_row<T: TableRecord>(row: serde_json::Value) -> Result<T> {
    serde_json::from_value(row).map_err(|e| Error::InvalidPayload(e.to_string()))
}

/// A typed change event for table `T`.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<T> {
    /// A new row. Replaces in place when the id is already present.
    Insert(T),
    /// A changed row. Ignored when the id is unknown.
    Update(T),
    /// A removed row, identified by id only.
    Delete(EntityId),
}

impl<T: TableRecord> ChangeEvent<T> {
    /// Id of the entity the event concerns.
    pub fn entity_id(&self) -> &str {
        match self {
            ChangeEvent::Insert(row) | ChangeEvent::Update(row) => row.entity_id(),
            ChangeEvent::Delete(id) => id,
        }
    }
}
