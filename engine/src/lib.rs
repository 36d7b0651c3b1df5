//! # Tidepool Engine
//!
//! A deterministic client-side view-model engine for realtime applications.
//!
//! This crate keeps a locally rendered collection consistent with a remote
//! source of truth under three concurrent influences: the initial bulk
//! fetch, local optimistic mutations, and asynchronous change events that
//! may echo this client's own writes or carry other clients' writes.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine has no knowledge of sockets, HTTP, or storage
//! - **Deterministic**: the same inputs always produce the same state
//! - **Testable**: pure logic, no mocks needed
//! - **Injected**: no globals; every feed, toggle set, and hub is a value
//!   the host constructs and owns
//!
//! ## Core Concepts
//!
//! ### Feeds
//!
//! A [`Feed`] is the screen-scoped ordered collection behind a rendered
//! list. Entities are unique by id; visual order is insertion order as
//! observed locally. Mutations are staged optimistically and settle when
//! the host feeds back the remote outcome through a [`MutationTicket`].
//!
//! ### Change Events
//!
//! The realtime channel delivers raw [`ChangeNotification`] envelopes,
//! at-least-once and unordered relative to optimistic application. Typed
//! conversion is explicit and fallible; reconciliation tolerates
//! duplicates and echoes:
//!
//! - Insert: replace in place when the id exists, append otherwise
//! - Update: replace in place, ignore unknown ids
//! - Delete: remove, no-op for unknown ids
//!
//! ### Toggles
//!
//! Boolean memberships (liked, saved, following) live in a [`ToggleSet`]
//! with a per-entity generation counter: rapid toggles serialize so the
//! last intent wins and stale responses are discarded.
//!
//! ### Subscriptions
//!
//! A [`RealtimeHub`] routes notifications to scope-matched
//! [`Subscription`] handles. Dropping a handle cancels delivery, so
//! unsubscription is guaranteed on every exit path.
//!
//! ## Quick Start
//!
//! ```rust
//! use tidepool_engine::{ChangeNotification, Feed, Message, Table};
//!
//! // Screen mounts: hydrate from the initial query.
//! let mut thread: Feed<Message> = Feed::scoped("c-1");
//! thread
//!     .hydrate(vec![Message::text("m-1", "c-1", "u-2", "hey")])
//!     .unwrap();
//!
//! // The user sends a message: project it first, then issue the write.
//! let row = Message::text("m-2", "c-1", "u-1", "on my way");
//! let ticket = thread.stage_insert(row.clone()).unwrap();
//! assert_eq!(thread.len(), 2);
//!
//! // The realtime channel echoes the committed row before the direct
//! // response arrives. Replaced in place, never duplicated.
//! let echo = ChangeNotification::insert(Table::Messages, serde_json::to_value(&row).unwrap());
//! thread.apply(echo).unwrap();
//! assert_eq!(thread.len(), 2);
//!
//! // The direct response arrives second and settles quietly.
//! let resolution = thread.resolve_success(ticket, None);
//! assert!(resolution.is_stale());
//! ```

pub mod collection;
pub mod error;
pub mod event;
pub mod feed;
pub mod identity;
pub mod optimistic;
pub mod projection;
pub mod reconcile;
pub mod record;
pub mod subscription;
pub mod tables;

// Re-export main types at crate root
pub use collection::{LocalCollection, Upsert};
pub use error::{Error, Result};
pub use event::{ChangeEvent, ChangeNotification, EventKind};
pub use feed::Feed;
pub use identity::{Identity, SessionEvent, SessionTracker};
pub use optimistic::{Cleanup, MutationTicket, Resolution, ToggleSet, ToggleTicket};
pub use projection::{
    can_delete_comment, conversation_partner, engagement, profile_stats, Engagement, ProfileStats,
};
pub use reconcile::{apply_event, Applied};
pub use record::{Table, TableRecord, UploadRef};
pub use subscription::{RealtimeHub, ScopeFilter, Subscription};
pub use tables::{
    Comment, Conversation, Follow, Like, MediaType, Message, MessageKind, Post, Profile, Save,
    AVATARS_BUCKET, CONVERSATIONS_BUCKET, POSTS_BUCKET,
};

/// Type aliases for clarity
pub type EntityId = String;
pub type ScopeKey = String;
pub type Generation = u64;
