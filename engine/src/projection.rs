//! Presentation-ready values derived from collections, toggles, and the
//! current-user identity.
//!
//! Every function here recomputes from its inputs. Nothing accumulates
//! between calls, so a projection can never drift from the state it is
//! derived from.

use crate::optimistic::ToggleSet;
use crate::tables::{Comment, Conversation, Post};

/// Engagement header for one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Engagement {
    /// Like count including the viewer's unconfirmed intent.
    pub likes: i64,
    pub liked: bool,
    pub saved: bool,
}

/// Derive a post's engagement from the denormalized counter plus the
/// viewer's toggle state. The pending delta keeps the counter honest while
/// a like or unlike is in flight; once the server echoes the updated row,
/// the delta returns to zero and the counter carries the truth.
pub fn engagement(post: &Post, likes: &ToggleSet, saves: &ToggleSet) -> Engagement {
    Engagement {
        likes: (post.likes + likes.pending_delta(&post.id)).max(0),
        liked: likes.get(&post.id),
        saved: saves.get(&post.id),
    }
}

/// Profile header numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileStats {
    pub posts: i64,
    /// Follower count including the viewer's unconfirmed intent.
    pub followers: i64,
    pub following: i64,
    pub is_following: bool,
}

/// Derive the stats shown on a profile screen. `follows` is the viewer's
/// follow toggle set, keyed by the followed profile's id.
pub fn profile_stats(
    profile_id: &str,
    posts: i64,
    followers: i64,
    following: i64,
    follows: &ToggleSet,
) -> ProfileStats {
    ProfileStats {
        posts,
        followers: (followers + follows.pending_delta(profile_id)).max(0),
        following,
        is_following: follows.get(profile_id),
    }
}

/// The other participant of a two-party conversation.
pub fn conversation_partner<'a>(conversation: &'a Conversation, viewer: &str) -> &'a str {
    if conversation.user1 == viewer {
        &conversation.user2
    } else {
        &conversation.user1
    }
}

/// Whether the viewer may delete a comment. Only the author can.
pub fn can_delete_comment(viewer: &str, comment: &Comment) -> bool {
    comment.user_id == viewer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimistic::Resolution;

    fn post(id: &str, likes: i64) -> Post {
        Post {
            id: id.into(),
            user_id: "u-author".into(),
            caption: None,
            media: None,
            media_type: None,
            likes,
            created_at: String::new(),
        }
    }

    #[test]
    fn engagement_reflects_pending_like() {
        let post = post("p-1", 10);
        let mut likes = ToggleSet::new();
        let saves = ToggleSet::new();
        likes.hydrate("p-1", false);

        let before = engagement(&post, &likes, &saves);
        assert_eq!(before.likes, 10);
        assert!(!before.liked);

        likes.set("p-1", true).unwrap();
        let during = engagement(&post, &likes, &saves);
        assert_eq!(during.likes, 11);
        assert!(during.liked);
    }

    #[test]
    fn failed_like_leaves_projection_at_pre_mutation_value() {
        let post = post("p-1", 10);
        let mut likes = ToggleSet::new();
        let saves = ToggleSet::new();
        likes.hydrate("p-1", false);
        let before = engagement(&post, &likes, &saves);

        let ticket = likes.set("p-1", true).unwrap();
        assert_eq!(likes.resolve(&ticket, false), Resolution::Reverted(Vec::new()));

        let after = engagement(&post, &likes, &saves);
        assert_eq!(after, before);
    }

    #[test]
    fn counter_settles_once_the_echo_lands() {
        let mut row = post("p-1", 10);
        let mut likes = ToggleSet::new();
        let saves = ToggleSet::new();
        likes.hydrate("p-1", false);

        likes.set("p-1", true).unwrap();
        assert_eq!(engagement(&row, &likes, &saves).likes, 11);

        // Server commits row + counter in one transaction and echoes both.
        likes.observe("p-1", true);
        row.likes = 11;
        assert_eq!(engagement(&row, &likes, &saves).likes, 11);
    }

    #[test]
    fn pending_unlike_never_drives_the_counter_negative() {
        let post = post("p-1", 0);
        let mut likes = ToggleSet::new();
        let saves = ToggleSet::new();
        // Stale hydration: counter says 0 but the pair row exists.
        likes.hydrate("p-1", true);
        likes.set("p-1", false).unwrap();

        assert_eq!(engagement(&post, &likes, &saves).likes, 0);
    }

    #[test]
    fn profile_stats_follow_the_toggle() {
        let mut follows = ToggleSet::new();
        follows.hydrate("u-2", false);

        follows.set("u-2", true).unwrap();
        let stats = profile_stats("u-2", 12, 100, 35, &follows);

        assert_eq!(stats.followers, 101);
        assert!(stats.is_following);
        assert_eq!(stats.posts, 12);
        assert_eq!(stats.following, 35);
    }

    #[test]
    fn partner_is_whichever_side_is_not_the_viewer() {
        let conversation = Conversation {
            id: "c-1".into(),
            user1: "u-1".into(),
            user2: "u-2".into(),
            created_at: String::new(),
        };

        assert_eq!(conversation_partner(&conversation, "u-1"), "u-2");
        assert_eq!(conversation_partner(&conversation, "u-2"), "u-1");
    }

    #[test]
    fn only_the_author_deletes_a_comment() {
        let comment = Comment::new("cm-1", "p-1", "u-1", "mine");

        assert!(can_delete_comment("u-1", &comment));
        assert!(!can_delete_comment("u-2", &comment));
    }
}
