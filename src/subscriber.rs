use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::event::Event;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, stable token identifying a subscriber across reconnects.
///
/// Issued the first time a [`Subscriber`] is passed to
/// [`PubSubClient::subscribe`](crate::PubSubClient::subscribe) or
/// [`psubscribe`](crate::PubSubClient::psubscribe); every later call from the
/// same `Subscriber` reuses it, and it is attached to every [`Event`]
/// delivered so code listening across more than one connection can tell them
/// apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberRef(u64);

/// A handle representing one in-process pub/sub consumer.
///
/// Cloning a `Subscriber` does not mint a new identity: clones share the same
/// [`SubscriberRef`] and the same event channel, so a single logical listener
/// can be handed to several call sites.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub(crate) id: SubscriberRef,
    pub(crate) sender: mpsc::UnboundedSender<Event>,
}

impl Subscriber {
    /// Creates a new subscriber identity and its paired event receiver.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = SubscriberRef(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed));
        (Self { id, sender }, receiver)
    }

    /// The ref this subscriber will be (or has already been) issued.
    pub fn subscriber_ref(&self) -> SubscriberRef {
        self.id
    }
}

#[cfg(test)]
impl SubscriberRef {
    /// Test-only constructor so `ledger`/`registry` unit tests can build
    /// refs without going through `Subscriber::new`.
    pub(crate) fn for_test(n: u64) -> Self {
        Self(n)
    }
}
