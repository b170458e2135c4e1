//! Sequenced, replayable broadcast fan-out, grounded on
//! `resource/src/events.rs`'s `tokio::sync::broadcast`-backed `EventBus`.
//!
//! `broadcast::Sender` alone only delivers events published after a
//! subscriber joins; subscribers that reconnect with "replay from sequence
//! N" need access to events already sent. Each execution therefore also
//! keeps a bounded retained ring of its own recent events, so a subscriber
//! joining or rejoining gets backlog-then-live without the bus ever
//! blocking a publisher on a slow reader (the teacher's fire-and-forget
//! `emit` policy, kept as-is).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use relay_core::{ExecutionId, NodeId};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::event::{Event, EventKind};

pub const DEFAULT_RETAINED_CAPACITY: usize = 1024;
pub const DEFAULT_BROADCAST_CAPACITY: usize = 1024;
pub const HEARTBEAT_INTERVAL: chrono::Duration = chrono::Duration::seconds(30);
pub const MAX_MISSED_HEARTBEATS: u32 = 3;
pub const TERMINAL_RETENTION: chrono::Duration = chrono::Duration::hours(1);
pub const STALE_RUNNING_RETENTION: chrono::Duration = chrono::Duration::hours(24);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub String);

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

struct SubscriberHealth {
    last_ack: DateTime<Utc>,
    missed_heartbeats: u32,
}

struct ExecutionBus {
    sender: broadcast::Sender<Event>,
    sequence: AtomicU64,
    retained: RwLock<VecDeque<Event>>,
    retained_capacity: usize,
    started_at: DateTime<Utc>,
    terminal_at: RwLock<Option<DateTime<Utc>>>,
    subscribers: RwLock<HashMap<ConnectionId, SubscriberHealth>>,
}

impl ExecutionBus {
    fn new(now: DateTime<Utc>, retained_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self {
            sender,
            sequence: AtomicU64::new(0),
            retained: RwLock::new(VecDeque::with_capacity(retained_capacity.min(4096))),
            retained_capacity,
            started_at: now,
            terminal_at: RwLock::new(None),
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    fn publish(&self, kind: EventKind, node_id: Option<NodeId>, data: Option<Value>, execution_id: ExecutionId) -> Event {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            kind,
            execution_id,
            sequence,
            ts: Utc::now(),
            node_id,
            data,
        };

        {
            let mut retained = self.retained.write();
            if retained.len() >= self.retained_capacity {
                retained.pop_front();
            }
            retained.push_back(event.clone());
        }

        if kind.is_execution_terminal() {
            *self.terminal_at.write() = Some(event.ts);
        }

        let _ = self.sender.send(event.clone());
        event
    }

    fn backlog_since(&self, since_sequence: u64) -> Vec<Event> {
        self.retained
            .read()
            .iter()
            .filter(|e| e.sequence >= since_sequence)
            .cloned()
            .collect()
    }
}

pub struct Subscription {
    pub backlog: Vec<Event>,
    pub receiver: broadcast::Receiver<Event>,
}

/// The process-wide event registry: one `ExecutionBus` per live execution,
/// created lazily on first publish or subscribe.
pub struct EventBus {
    executions: RwLock<HashMap<ExecutionId, Arc<ExecutionBus>>>,
    retained_capacity: usize,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            executions: RwLock::new(HashMap::new()),
            retained_capacity: DEFAULT_RETAINED_CAPACITY,
        }
    }

    fn bus_for(&self, execution_id: ExecutionId) -> Arc<ExecutionBus> {
        if let Some(bus) = self.executions.read().get(&execution_id) {
            return Arc::clone(bus);
        }
        Arc::clone(
            self.executions
                .write()
                .entry(execution_id)
                .or_insert_with(|| Arc::new(ExecutionBus::new(Utc::now(), self.retained_capacity))),
        )
    }

    pub fn publish(
        &self,
        execution_id: ExecutionId,
        kind: EventKind,
        node_id: Option<NodeId>,
        data: Option<Value>,
    ) -> Event {
        self.bus_for(execution_id).publish(kind, node_id, data, execution_id)
    }

    /// Subscribes a connection, returning any retained backlog with
    /// `sequence >= since_sequence` followed by a live receiver for events
    /// published from this point forward.
    pub fn subscribe(
        &self,
        execution_id: ExecutionId,
        connection_id: ConnectionId,
        since_sequence: u64,
    ) -> Subscription {
        let bus = self.bus_for(execution_id);
        let receiver = bus.sender.subscribe();
        let backlog = bus.backlog_since(since_sequence);
        bus.subscribers.write().insert(
            connection_id,
            SubscriberHealth {
                last_ack: Utc::now(),
                missed_heartbeats: 0,
            },
        );
        Subscription { backlog, receiver }
    }

    pub fn unsubscribe(&self, execution_id: ExecutionId, connection_id: &ConnectionId) {
        if let Some(bus) = self.executions.read().get(&execution_id) {
            bus.subscribers.write().remove(connection_id);
        }
    }

    pub fn mark_alive(&self, execution_id: ExecutionId, connection_id: &ConnectionId) {
        if let Some(bus) = self.executions.read().get(&execution_id) {
            if let Some(health) = bus.subscribers.write().get_mut(connection_id) {
                health.last_ack = Utc::now();
                health.missed_heartbeats = 0;
            }
        }
    }

    /// Emits a heartbeat for `execution_id` and closes any subscriber that
    /// has missed three consecutive heartbeats. Call once per
    /// `HEARTBEAT_INTERVAL` of idle time per live execution.
    pub fn heartbeat_tick(&self, execution_id: ExecutionId) -> Event {
        let bus = self.bus_for(execution_id);
        let mut dead = Vec::new();
        {
            let mut subs = bus.subscribers.write();
            for (conn, health) in subs.iter_mut() {
                health.missed_heartbeats += 1;
                if health.missed_heartbeats >= MAX_MISSED_HEARTBEATS {
                    dead.push(conn.clone());
                }
            }
            for conn in &dead {
                subs.remove(conn);
            }
        }
        bus.publish(EventKind::Heartbeat, None, None, execution_id)
    }

    pub fn subscriber_count(&self, execution_id: ExecutionId) -> usize {
        self.executions
            .read()
            .get(&execution_id)
            .map_or(0, |bus| bus.subscribers.read().len())
    }

    /// Removes executions whose retention window has elapsed: terminal
    /// executions older than `TERMINAL_RETENTION`, or non-terminal ones
    /// older than `STALE_RUNNING_RETENTION` (§4.7). Returns the ids removed
    /// so a caller (e.g. the persistence layer) can mark stale-running
    /// executions failed.
    pub fn gc(&self, now: DateTime<Utc>) -> Vec<ExecutionId> {
        let mut removed = Vec::new();
        self.executions.write().retain(|id, bus| {
            let expired = match *bus.terminal_at.read() {
                Some(terminal_at) => now - terminal_at >= TERMINAL_RETENTION,
                None => now - bus.started_at >= STALE_RUNNING_RETENTION,
            };
            if expired {
                removed.push(*id);
            }
            !expired
        });
        removed
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("executions", &self.executions.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exec_id() -> ExecutionId {
        ExecutionId::v4()
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let id = exec_id();
        let mut sub = bus.subscribe(id, ConnectionId::from("c1"), 0);
        bus.publish(id, EventKind::ExecutionStarted, None, None);
        let event = sub.receiver.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::ExecutionStarted);
        assert_eq!(event.sequence, 0);
    }

    #[test]
    fn late_subscriber_gets_backlog_from_requested_sequence() {
        let bus = EventBus::new();
        let id = exec_id();
        bus.publish(id, EventKind::ExecutionStarted, None, None);
        bus.publish(id, EventKind::NodeStarted, None, None);
        bus.publish(id, EventKind::NodeCompleted, None, None);

        let sub = bus.subscribe(id, ConnectionId::from("late"), 1);
        assert_eq!(sub.backlog.len(), 2);
        assert_eq!(sub.backlog[0].sequence, 1);
    }

    #[test]
    fn sequence_numbers_are_monotonic_per_execution() {
        let bus = EventBus::new();
        let id = exec_id();
        let a = bus.publish(id, EventKind::ExecutionStarted, None, None);
        let b = bus.publish(id, EventKind::ExecutionCompleted, None, None);
        assert_eq!(a.sequence, 0);
        assert_eq!(b.sequence, 1);
    }

    #[test]
    fn subscriber_is_closed_after_three_missed_heartbeats() {
        let bus = EventBus::new();
        let id = exec_id();
        let conn = ConnectionId::from("c1");
        let _sub = bus.subscribe(id, conn.clone(), 0);
        assert_eq!(bus.subscriber_count(id), 1);

        bus.heartbeat_tick(id);
        bus.heartbeat_tick(id);
        assert_eq!(bus.subscriber_count(id), 1);
        bus.heartbeat_tick(id);
        assert_eq!(bus.subscriber_count(id), 0);
    }

    #[test]
    fn marking_alive_resets_the_missed_counter() {
        let bus = EventBus::new();
        let id = exec_id();
        let conn = ConnectionId::from("c1");
        let _sub = bus.subscribe(id, conn.clone(), 0);

        bus.heartbeat_tick(id);
        bus.heartbeat_tick(id);
        bus.mark_alive(id, &conn);
        bus.heartbeat_tick(id);
        assert_eq!(bus.subscriber_count(id), 1);
    }

    #[test]
    fn terminal_execution_is_gced_after_retention_window() {
        let bus = EventBus::new();
        let id = exec_id();
        bus.publish(id, EventKind::ExecutionCompleted, None, None);

        let removed = bus.gc(Utc::now());
        assert!(removed.is_empty());

        let removed = bus.gc(Utc::now() + TERMINAL_RETENTION + chrono::Duration::seconds(1));
        assert_eq!(removed, vec![id]);
    }

    #[test]
    fn stale_running_execution_is_gced_after_24h() {
        let bus = EventBus::new();
        let id = exec_id();
        bus.publish(id, EventKind::ExecutionStarted, None, None);

        let removed = bus.gc(Utc::now() + STALE_RUNNING_RETENTION + chrono::Duration::seconds(1));
        assert_eq!(removed, vec![id]);
    }
}
