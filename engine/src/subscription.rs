//! Subscription plumbing between the realtime channel and feeds.
//!
//! The host pushes every raw notification it receives into a
//! [`RealtimeHub`]; the hub fans them out to the [`Subscription`] handles
//! whose table and scope match. A subscription is a lazy, pull-based
//! sequence: nothing is delivered until the host asks, and dropping the
//! handle cancels delivery on every exit path. Subscribing again to the
//! same scope starts a fresh sequence.

use crate::event::{ChangeNotification, EventKind};
use crate::record::Table;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Column/value equality filter over a subscribed table.
///
/// Filters travel over the wire as part of subscribe requests, so the
/// field names are the wire names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFilter {
    pub column: String,
    pub value: String,
}

impl ScopeFilter {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Whether a row matches the filter. String columns compare directly;
    /// numeric columns compare through their decimal rendering.
    pub fn matches(&self, row: &serde_json::Value) -> bool {
        match row.get(&self.column) {
            Some(serde_json::Value::String(s)) => *s == self.value,
            Some(serde_json::Value::Number(n)) => n.to_string() == self.value,
            _ => false,
        }
    }
}

#[derive(Debug)]
struct Channel {
    queue: Mutex<VecDeque<ChangeNotification>>,
    active: AtomicBool,
}

impl Channel {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            active: AtomicBool::new(true),
        }
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<ChangeNotification>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
struct HubEntry {
    table: Table,
    filter: Option<ScopeFilter>,
    channel: Arc<Channel>,
}

impl HubEntry {
    /// Deletes are routed to every subscriber of the table: their `old`
    /// row is only guaranteed to carry an id, so a scope filter cannot be
    /// evaluated against them. Removing an id that was never in scope is a
    /// no-op downstream.
    fn wants(&self, notification: &ChangeNotification) -> bool {
        if self.table != notification.table {
            return false;
        }
        if notification.event_type == EventKind::Delete {
            return true;
        }
        match (&self.filter, notification.scope_row()) {
            (None, _) => true,
            (Some(filter), Some(row)) => filter.matches(row),
            (Some(_), None) => false,
        }
    }
}

/// Routes raw notifications to matching subscriptions.
#[derive(Debug, Default)]
pub struct RealtimeHub {
    entries: Vec<HubEntry>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Open a subscription over `table`, optionally narrowed to rows whose
    /// `filter.column` equals `filter.value`.
    pub fn subscribe(&mut self, table: Table, filter: Option<ScopeFilter>) -> Subscription {
        let channel = Arc::new(Channel::new());
        self.entries.push(HubEntry {
            table,
            filter,
            channel: Arc::clone(&channel),
        });
        Subscription { table, channel }
    }

    /// Fan a notification out to every matching live subscription.
    /// Returns how many subscriptions received it.
    pub fn publish(&mut self, notification: &ChangeNotification) -> usize {
        self.entries
            .retain(|entry| entry.channel.active.load(Ordering::Acquire));

        let mut delivered = 0;
        for entry in &self.entries {
            if entry.wants(notification) {
                entry.channel.lock_queue().push_back(notification.clone());
                delivered += 1;
            }
        }
        delivered
    }

    /// Live subscriptions currently registered.
    pub fn subscriber_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.channel.active.load(Ordering::Acquire))
            .count()
    }
}

/// Handle to one realtime subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    table: Table,
    channel: Arc<Channel>,
}

impl Subscription {
    pub fn table(&self) -> Table {
        self.table
    }

    /// Pull the next queued notification, if any. Always `None` after
    /// cancellation, even for notifications queued earlier.
    pub fn next_event(&self) -> Option<ChangeNotification> {
        if !self.is_active() {
            return None;
        }
        self.channel.lock_queue().pop_front()
    }

    /// Pull everything queued so far. Hosts drain once per loop turn so a
    /// transaction's related events land in the same render pass.
    pub fn drain(&self) -> Vec<ChangeNotification> {
        if !self.is_active() {
            return Vec::new();
        }
        self.channel.lock_queue().drain(..).collect()
    }

    /// Stop delivery. Queued notifications are discarded; the hub forgets
    /// the subscription on its next publish.
    pub fn cancel(&self) {
        self.channel.active.store(false, Ordering::Release);
        self.channel.lock_queue().clear();
    }

    pub fn is_active(&self) -> bool {
        self.channel.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
