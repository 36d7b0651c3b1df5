//! Table identities and the trait shared by all typed rows.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The tables exposed by the remote collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    Posts,
    Comments,
    Conversations,
    Messages,
    Follows,
    UserLikes,
    UserSaves,
}

impl Table {
    /// All tables, in schema order.
    pub const ALL: [Table; 8] = [
        Table::Profiles,
        Table::Posts,
        Table::Comments,
        Table::Conversations,
        Table::Messages,
        Table::Follows,
        Table::UserLikes,
        Table::UserSaves,
    ];

    /// Wire name of the table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::Posts => "posts",
            Table::Comments => "comments",
            Table::Conversations => "conversations",
            Table::Messages => "messages",
            Table::Follows => "follows",
            Table::UserLikes => "user_likes",
            Table::UserSaves => "user_saves",
        }
    }

    /// Parse a wire name back into a table.
    pub fn parse(name: &str) -> Option<Table> {
        Table::ALL.iter().copied().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to an uploaded blob attached to a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRef {
    /// Storage bucket the object lives in.
    pub bucket: String,
    /// Object path within the bucket.
    pub path: String,
}

impl UploadRef {
    pub fn new(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            path: path.into(),
        }
    }
}

/// Behavior shared by every typed row: identity, parent scope, and any
/// storage object that travels with the row.
pub trait TableRecord: Clone + Serialize + serde::de::DeserializeOwned {
    /// Table this record type belongs to.
    const TABLE: Table;

    /// Stable unique id.
    fn entity_id(&self) -> &str;

    /// Parent-scope value used for subscription filtering, if the table
    /// has a canonical parent (a message's conversation, a comment's post).
    fn scope_key(&self) -> Option<&str> {
        None
    }

    /// Uploaded blob that should be removed when this row is deleted.
    fn attached_upload(&self) -> Option<UploadRef> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_roundtrip() {
        for table in Table::ALL {
            assert_eq!(Table::parse(table.as_str()), Some(table));
        }
        assert_eq!(Table::parse("unknown"), None);
    }

    #[test]
    fn table_serde_uses_wire_names() {
        let json = serde_json::to_string(&Table::UserLikes).unwrap();
        assert_eq!(json, "\"user_likes\"");

        let parsed: Table = serde_json::from_str("\"messages\"").unwrap();
        assert_eq!(parsed, Table::Messages);
    }
}
