//! Current-user identity and session transitions.
//!
//! Projections that depend on who is looking (is-liked flags, own-content
//! affordances) take the identity as an input. The tracker keeps the
//! current one across the session-change notifications the auth interface
//! delivers.

use crate::EntityId;
use serde::{Deserialize, Serialize};

/// The signed-in user as reported by the auth interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<EntityId>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }
}

/// A change of session reported by the auth interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Identity),
    SignedOut,
}

/// Tracks the current identity across session events.
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    current: Option<Identity>,
}

impl SessionTracker {
    /// Start with no session.
    pub fn new() -> Self {
        Self { current: None }
    }

    /// Start from a persisted session, if one survived a restart.
    pub fn with_identity(identity: Option<Identity>) -> Self {
        Self { current: identity }
    }

    pub fn current(&self) -> Option<&Identity> {
        self.current.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.current.as_ref().map(|identity| identity.user_id.as_str())
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.is_some()
    }

    /// Apply a session event. Returns whether the identity changed, which
    /// is the host's cue to rebuild identity-derived projections.
    pub fn transition(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::SignedIn(identity) => {
                if self.current.as_ref() == Some(&identity) {
                    false
                } else {
                    self.current = Some(identity);
                    true
                }
            }
            SessionEvent::SignedOut => self.current.take().is_some(),
        }
    }
}
