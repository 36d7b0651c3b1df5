//! Performance benchmarks for tidepool-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use tidepool_engine::{
    engagement, ChangeNotification, Feed, Message, Post, RealtimeHub, ScopeFilter, Table,
    ToggleSet,
};

fn message_row(i: u64) -> Message {
    Message::text(
        format!("m-{i}"),
        "c-1",
        "u-1",
        format!("message number {i}"),
    )
}

fn insert_notification(i: u64) -> ChangeNotification {
    ChangeNotification::insert(
        Table::Messages,
        serde_json::to_value(message_row(i)).expect("serializable row"),
    )
}

fn bench_feed_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("feed_operations");

    // Benchmark hydration from a bulk query
    group.bench_function("hydrate_1000", |b| {
        let rows: Vec<Message> = (0..1000).map(message_row).collect();
        b.iter(|| {
            let mut feed: Feed<Message> = Feed::scoped("c-1");
            feed.hydrate(black_box(rows.clone())).expect("unique ids")
        })
    });

    // Benchmark one optimistic stage/revert round trip
    group.bench_function("stage_and_revert", |b| {
        let mut feed: Feed<Message> = Feed::scoped("c-1");
        let mut id = 0u64;

        b.iter(|| {
            id += 1;
            let ticket = feed
                .stage_insert(black_box(message_row(id)))
                .expect("fresh id");
            feed.resolve_failure(ticket)
        })
    });

    // Benchmark lookup in a populated feed
    group.bench_function("get_row", |b| {
        let mut feed: Feed<Message> = Feed::scoped("c-1");
        feed.hydrate((0..1000).map(message_row).collect())
            .expect("unique ids");

        b.iter(|| feed.get(black_box("m-500")))
    });

    group.finish();
}

fn bench_event_application(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_application");

    for size in [10, 100, 500].iter() {
        group.bench_with_input(BenchmarkId::new("apply_inserts", size), size, |b, &size| {
            let notifications: Vec<ChangeNotification> =
                (0..size).map(insert_notification).collect();

            b.iter(|| {
                let mut feed: Feed<Message> = Feed::scoped("c-1");
                for notification in &notifications {
                    feed.apply(black_box(notification.clone())).expect("typed");
                }
                feed.len()
            })
        });

        group.bench_with_input(
            BenchmarkId::new("apply_mixed_churn", size),
            size,
            |b, &size| {
                // Inserts with periodic updates and deletes over a small id
                // space, the shape a busy conversation produces.
                let notifications: Vec<ChangeNotification> = (0..size)
                    .map(|i| match i % 5 {
                        3 => ChangeNotification::update(
                            Table::Messages,
                            serde_json::to_value(message_row(i / 2)).expect("serializable row"),
                        ),
                        4 => ChangeNotification::delete(
                            Table::Messages,
                            json!({"id": format!("m-{}", i / 3)}),
                        ),
                        _ => insert_notification(i),
                    })
                    .collect();

                b.iter(|| {
                    let mut feed: Feed<Message> = Feed::scoped("c-1");
                    for notification in &notifications {
                        feed.apply(black_box(notification.clone())).expect("typed");
                    }
                    feed.len()
                })
            },
        );
    }

    group.finish();
}

fn bench_fanout_and_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout_and_projection");

    // Benchmark routing one event through many scoped subscriptions
    group.bench_function("publish_50_scopes", |b| {
        let mut hub = RealtimeHub::new();
        let _subs: Vec<_> = (0..50)
            .map(|i| {
                hub.subscribe(
                    Table::Messages,
                    Some(ScopeFilter::new("conversation_id", format!("c-{i}"))),
                )
            })
            .collect();
        let notification = insert_notification(7);

        b.iter(|| hub.publish(black_box(&notification)))
    });

    // Benchmark the engagement recompute a list render performs per post
    group.bench_function("engagement_recompute", |b| {
        let post = Post {
            id: "p-1".into(),
            user_id: "u-1".into(),
            caption: Some("caption".into()),
            media: None,
            media_type: None,
            likes: 42,
            created_at: "2024-03-01T09:00:00Z".into(),
        };
        let mut likes = ToggleSet::new();
        let mut saves = ToggleSet::new();
        for i in 0..1000 {
            likes.hydrate(format!("p-{i}"), i % 3 == 0);
            saves.hydrate(format!("p-{i}"), i % 7 == 0);
        }

        b.iter(|| engagement(black_box(&post), black_box(&likes), black_box(&saves)))
    });

    group.finish();
}

fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialization");

    group.bench_function("notification_to_json", |b| {
        let notification = insert_notification(1);
        b.iter(|| serde_json::to_string(black_box(&notification)))
    });

    group.bench_function("notification_from_json", |b| {
        let json = r#"{"eventType":"INSERT","table":"messages","new":{"id":"m-1","conversation_id":"c-1","sender_id":"u-1","message_type":"text","content":"message number 1"}}"#;

        b.iter(|| serde_json::from_str::<ChangeNotification>(black_box(json)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_feed_operations,
    bench_event_application,
    bench_fanout_and_projection,
    bench_serialization,
);
criterion_main!(benches);
