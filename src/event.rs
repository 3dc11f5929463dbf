use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use crate::subscriber::SubscriberRef;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one connection instance.
///
/// Lets a subscriber listening across more than one connection (for example
/// during a handover from an old connection to a new one) tell their events
/// apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn new() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// The payload-specific part of an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Subscribed { channel: Bytes },
    Psubscribed { pattern: Bytes },
    Unsubscribed { channel: Bytes },
    Punsubscribed { pattern: Bytes },
    Message { channel: Bytes, payload: Bytes },
    Pmessage { pattern: Bytes, channel: Bytes, payload: Bytes },
    Disconnected { reason: String },
}

/// A notification delivered to a subscriber.
#[derive(Debug, Clone)]
pub struct Event {
    pub connection: ConnectionId,
    pub subscriber: SubscriberRef,
    pub kind: EventKind,
}
