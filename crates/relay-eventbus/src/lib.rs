//! Execution event fan-out: sequenced, replayable broadcast per execution,
//! idle heartbeats, and retention-driven garbage collection (§4.7).

mod bus;
mod event;

pub use bus::{
    ConnectionId, EventBus, Subscription, DEFAULT_BROADCAST_CAPACITY, DEFAULT_RETAINED_CAPACITY,
    HEARTBEAT_INTERVAL, MAX_MISSED_HEARTBEATS, STALE_RUNNING_RETENTION, TERMINAL_RETENTION,
};
pub use event::{Event, EventKind};

pub mod prelude {
    pub use crate::{ConnectionId, Event, EventBus, EventKind, Subscription};
}
