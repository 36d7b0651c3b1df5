//! Edge case tests for tidepool-engine
//!
//! These tests run whole screen lifecycles through the public API: hydrate,
//! stage, publish, drain, resolve. They cover the orderings a real host
//! produces but unit tests rarely do.

use tidepool_engine::{
    engagement, Applied, ChangeNotification, Cleanup, Feed, Message, Post, RealtimeHub,
    Resolution, ScopeFilter, Subscription, Table, ToggleSet, UploadRef,
};
use serde_json::json;

fn text_row(id: &str, conversation: &str, sender: &str, content: &str) -> Message {
    Message::text(id, conversation, sender, content)
}

fn post_row(id: &str, likes: i64) -> Post {
    Post {
        id: id.into(),
        user_id: "u-author".into(),
        caption: Some("caption".into()),
        media: None,
        media_type: None,
        likes,
        created_at: "2024-03-01T09:00:00Z".into(),
    }
}

/// Drain a subscription into a feed, the way a host loop does once per
/// turn. Returns how many notifications were applied.
fn pump(subscription: &Subscription, feed: &mut Feed<Message>) -> usize {
    let mut applied = 0;
    for notification in subscription.drain() {
        feed.apply(notification).unwrap();
        applied += 1;
    }
    applied
}

fn insert_event(row: &Message) -> ChangeNotification {
    ChangeNotification::insert(Table::Messages, serde_json::to_value(row).unwrap())
}

// ============================================================================
// Conversation Thread Lifecycle
// ============================================================================

#[test]
fn thread_sees_own_send_exactly_once_regardless_of_arrival_order() {
    let mut hub = RealtimeHub::new();
    let sub = hub.subscribe(
        Table::Messages,
        Some(ScopeFilter::new("conversation_id", "c-1")),
    );
    let mut thread: Feed<Message> = Feed::scoped("c-1");
    thread
        .hydrate(vec![text_row("m-1", "c-1", "u-2", "hey")])
        .unwrap();

    // Echo before direct response.
    let sent = text_row("m-2", "c-1", "u-1", "omw");
    let ticket = thread.stage_insert(sent.clone()).unwrap();
    hub.publish(&insert_event(&sent));
    pump(&sub, &mut thread);
    assert_eq!(thread.len(), 2);
    assert_eq!(thread.resolve_success(ticket, None), Resolution::Stale);
    assert_eq!(thread.len(), 2);

    // Direct response before echo.
    let sent = text_row("m-3", "c-1", "u-1", "here");
    let ticket = thread.stage_insert(sent.clone()).unwrap();
    assert!(!thread
        .resolve_success(ticket, Some(sent.clone()))
        .is_stale());
    hub.publish(&insert_event(&sent));
    pump(&sub, &mut thread);
    assert_eq!(thread.len(), 3);

    let ids: Vec<_> = thread.rows().iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m-1", "m-2", "m-3"]);
}

#[test]
fn interleaved_conversations_never_bleed_into_each_other() {
    let mut hub = RealtimeHub::new();
    let sub_a = hub.subscribe(
        Table::Messages,
        Some(ScopeFilter::new("conversation_id", "c-a")),
    );
    let sub_b = hub.subscribe(
        Table::Messages,
        Some(ScopeFilter::new("conversation_id", "c-b")),
    );
    let mut thread_a: Feed<Message> = Feed::scoped("c-a");
    let mut thread_b: Feed<Message> = Feed::scoped("c-b");

    for i in 0..6 {
        let conversation = if i % 2 == 0 { "c-a" } else { "c-b" };
        let row = text_row(&format!("m-{i}"), conversation, "u-1", "msg");
        hub.publish(&insert_event(&row));
    }

    assert_eq!(pump(&sub_a, &mut thread_a), 3);
    assert_eq!(pump(&sub_b, &mut thread_b), 3);
    assert!(thread_a.rows().iter().all(|m| m.conversation_id == "c-a"));
    assert!(thread_b.rows().iter().all(|m| m.conversation_id == "c-b"));
}

#[test]
fn deleting_an_image_message_hands_back_the_blob_path() {
    let mut thread: Feed<Message> = Feed::scoped("c-1");
    thread
        .hydrate(vec![
            text_row("m-1", "c-1", "u-1", "look at this"),
            Message::image("m-2", "c-1", "u-1", "https://cdn/p.png", "c-1/p.png"),
        ])
        .unwrap();

    let ticket = thread.stage_delete("m-2").unwrap();
    let resolution = thread.resolve_success(ticket, None);

    assert_eq!(
        resolution,
        Resolution::Confirmed(vec![Cleanup::RemoveUpload(UploadRef::new(
            "conversations",
            "c-1/p.png"
        ))])
    );
    assert_eq!(thread.len(), 1);
}

#[test]
fn failed_image_send_reverts_and_flags_the_orphaned_upload() {
    let mut thread: Feed<Message> = Feed::scoped("c-1");
    let row = Message::image("m-1", "c-1", "u-1", "https://cdn/p.png", "c-1/p.png");

    let ticket = thread
        .stage_insert_with_upload(row, UploadRef::new("conversations", "c-1/p.png"))
        .unwrap();
    let resolution = thread.resolve_failure(ticket);

    match resolution {
        Resolution::Reverted(cleanups) => {
            assert_eq!(
                cleanups,
                vec![Cleanup::RemoveUpload(UploadRef::new(
                    "conversations",
                    "c-1/p.png"
                ))]
            );
        }
        other => panic!("expected revert, got {other:?}"),
    }
    assert!(thread.is_empty());
}

// ============================================================================
// Like Toggle Under Race
// ============================================================================

#[test]
fn rapid_like_unlike_settles_on_the_last_intent() {
    let mut likes = ToggleSet::new();
    let saves = ToggleSet::new();
    let post = post_row("p-1", 10);
    likes.hydrate("p-1", false);

    // Tap like, then unlike, before the first response lands.
    let like = likes.set("p-1", true).unwrap();
    let unlike = likes.set("p-1", false).unwrap();

    // The like response arrives late; it must not resurrect the like.
    assert_eq!(likes.resolve(&like, true), Resolution::Stale);
    assert!(!engagement(&post, &likes, &saves).liked);

    // The unlike response settles the toggle in agreement with the server.
    assert_eq!(
        likes.resolve(&unlike, true),
        Resolution::Confirmed(Vec::new())
    );
    assert!(!likes.get("p-1"));
    assert!(!likes.confirmed("p-1"));
    assert_eq!(engagement(&post, &likes, &saves).likes, 10);
}

#[test]
fn failed_like_restores_the_projection() {
    let mut likes = ToggleSet::new();
    let saves = ToggleSet::new();
    let post = post_row("p-1", 10);
    likes.hydrate("p-1", false);
    let before = engagement(&post, &likes, &saves);

    let ticket = likes.set("p-1", true).unwrap();
    assert_eq!(engagement(&post, &likes, &saves).likes, 11);

    likes.resolve(&ticket, false);
    assert_eq!(engagement(&post, &likes, &saves), before);
}

#[test]
fn like_echo_and_counter_update_settle_without_double_counting() {
    let mut posts: Feed<Post> = Feed::unscoped();
    posts.hydrate(vec![post_row("p-1", 10)]).unwrap();
    let mut likes = ToggleSet::new();
    let saves = ToggleSet::new();
    likes.hydrate("p-1", false);

    likes.set("p-1", true).unwrap();
    assert_eq!(engagement(&posts.rows()[0], &likes, &saves).likes, 11);

    // The transaction echoes the membership row, then the updated counter.
    likes.observe("p-1", true);
    posts
        .apply(ChangeNotification::update(
            Table::Posts,
            serde_json::to_value(post_row("p-1", 11)).unwrap(),
        ))
        .unwrap();

    let header = engagement(&posts.rows()[0], &likes, &saves);
    assert_eq!(header.likes, 11);
    assert!(header.liked);
}

// ============================================================================
// At-Least-Once Delivery
// ============================================================================

#[test]
fn duplicate_deliveries_leave_the_thread_unchanged() {
    let mut thread: Feed<Message> = Feed::scoped("c-1");
    let row = text_row("m-1", "c-1", "u-2", "hey");

    assert_eq!(thread.apply(insert_event(&row)).unwrap(), Applied::Appended);
    assert_eq!(thread.apply(insert_event(&row)).unwrap(), Applied::Replaced);
    assert_eq!(thread.len(), 1);

    let delete = ChangeNotification::delete(Table::Messages, json!({"id": "m-1"}));
    assert_eq!(thread.apply(delete.clone()).unwrap(), Applied::Removed);
    assert_eq!(thread.apply(delete).unwrap(), Applied::NoMatch);
    assert!(thread.is_empty());
}

#[test]
fn malformed_envelopes_fail_typed_and_leave_state_alone() {
    let mut thread: Feed<Message> = Feed::scoped("c-1");
    thread
        .hydrate(vec![text_row("m-1", "c-1", "u-2", "hey")])
        .unwrap();

    let missing_row = ChangeNotification {
        event_type: tidepool_engine::EventKind::Update,
        table: Table::Messages,
        new: None,
        old: None,
    };
    assert!(thread.apply(missing_row).is_err());

    let wrong_table = ChangeNotification::delete(Table::Posts, json!({"id": "m-1"}));
    assert!(thread.apply(wrong_table).is_err());

    assert_eq!(thread.len(), 1);
}

// ============================================================================
// Subscription Teardown
// ============================================================================

#[test]
fn unmount_stops_delivery_on_every_path() {
    let mut hub = RealtimeHub::new();

    // Explicit cancel.
    let sub = hub.subscribe(Table::Messages, None);
    sub.cancel();
    assert_eq!(hub.publish(&insert_event(&text_row("m-1", "c-1", "u-1", "x"))), 0);

    // Early return drops the guard.
    {
        let _sub = hub.subscribe(Table::Messages, None);
    }
    assert_eq!(hub.publish(&insert_event(&text_row("m-2", "c-1", "u-1", "x"))), 0);
    assert_eq!(hub.subscriber_count(), 0);
}

#[test]
fn events_resolving_after_unmount_cannot_reach_the_view() {
    let mut hub = RealtimeHub::new();
    let sub = hub.subscribe(
        Table::Messages,
        Some(ScopeFilter::new("conversation_id", "c-1")),
    );
    let mut thread: Feed<Message> = Feed::scoped("c-1");

    hub.publish(&insert_event(&text_row("m-1", "c-1", "u-2", "queued")));
    sub.cancel();

    // The queued notification is gone along with the subscription.
    assert_eq!(pump(&sub, &mut thread), 0);
    assert!(thread.is_empty());
}

#[test]
fn remount_replays_nothing_and_reconverges_via_hydrate() {
    let mut hub = RealtimeHub::new();
    let first = hub.subscribe(
        Table::Messages,
        Some(ScopeFilter::new("conversation_id", "c-1")),
    );
    hub.publish(&insert_event(&text_row("m-1", "c-1", "u-2", "before")));
    drop(first);

    // Remount: fresh subscription first, then hydrate from a query that
    // already includes everything published before.
    let second = hub.subscribe(
        Table::Messages,
        Some(ScopeFilter::new("conversation_id", "c-1")),
    );
    let mut thread: Feed<Message> = Feed::scoped("c-1");
    thread
        .hydrate(vec![text_row("m-1", "c-1", "u-2", "before")])
        .unwrap();

    assert_eq!(pump(&second, &mut thread), 0);

    hub.publish(&insert_event(&text_row("m-2", "c-1", "u-2", "after")));
    assert_eq!(pump(&second, &mut thread), 1);
    assert_eq!(thread.len(), 2);
}

// ============================================================================
// Content Extremes
// ============================================================================

#[test]
fn unicode_content_survives_the_wire_envelope() {
    let contents = vec![
        "日本語テスト",
        "Привет мир",
        "مرحبا بالعالم",
        "🎉🚀💯",
        "Hello\nWorld\tTab",
    ];

    let mut thread: Feed<Message> = Feed::scoped("c-1");
    for (i, content) in contents.iter().enumerate() {
        let row = text_row(&format!("m-{i}"), "c-1", "u-1", content);
        let envelope = serde_json::to_string(&insert_event(&row)).unwrap();
        let parsed: ChangeNotification = serde_json::from_str(&envelope).unwrap();
        thread.apply(parsed).unwrap();
    }

    for (i, content) in contents.iter().enumerate() {
        let row = thread.get(&format!("m-{i}")).unwrap();
        assert_eq!(row.content.as_deref(), Some(*content));
    }
}

#[test]
fn very_long_message_content() {
    let long = "x".repeat(1024 * 1024);
    let mut thread: Feed<Message> = Feed::scoped("c-1");

    thread
        .apply(insert_event(&text_row("m-1", "c-1", "u-1", &long)))
        .unwrap();

    assert_eq!(thread.get("m-1").unwrap().content.as_deref(), Some(long.as_str()));
}
