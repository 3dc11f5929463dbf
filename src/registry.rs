use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::connection::Request;
use crate::event::Event;
use crate::ledger::Ledger;
use crate::subscriber::{Subscriber, SubscriberRef};

struct Entry {
    sender: mpsc::UnboundedSender<Event>,
    death_watch: JoinHandle<()>,
}

/// Tracks live subscribers and installs a death notification for each.
///
/// Death detection is implemented by spawning one task per newly acquired
/// subscriber that awaits `sender.closed()` — resolved the moment the
/// subscriber drops its event receiver or its task ends — and forwards a
/// [`Request::SubscriberDied`] back into the connection's own request
/// channel. This keeps all ledger and registry mutation on the single writer
/// task instead of introducing a second mutation path guarded by a lock.
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<SubscriberRef, Entry>,
}

impl Registry {
    /// Idempotent: returns the subscriber's existing ref if already tracked,
    /// otherwise installs a death notification and starts tracking it.
    pub fn acquire(&mut self, subscriber: &Subscriber, self_tx: mpsc::Sender<Request>) -> SubscriberRef {
        let id = subscriber.subscriber_ref();

        self.entries.entry(id).or_insert_with(|| {
            let sender = subscriber.sender.clone();
            let watched = sender.clone();
            let death_watch = tokio::spawn(async move {
                watched.closed().await;
                let _ = self_tx.send(Request::SubscriberDied(id)).await;
            });
            Entry { sender, death_watch }
        });

        id
    }

    /// Drops the subscriber's registry entry (and cancels its death watch)
    /// once the ledger shows no remaining interest for it.
    pub fn release_if_idle(&mut self, id: SubscriberRef, ledger: &Ledger) {
        if ledger.has_subscriber(id) {
            return;
        }
        if let Some(entry) = self.entries.remove(&id) {
            entry.death_watch.abort();
        }
    }

    /// Best-effort delivery: a subscriber that has already dropped its
    /// receiver silently misses the event, its death notification will
    /// clean up the registry and ledger shortly after.
    pub fn deliver(&self, id: SubscriberRef, event: Event) {
        if let Some(entry) = self.entries.get(&id) {
            let _ = entry.sender.send(event);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        for entry in self.entries.values() {
            entry.death_watch.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::target::Target;

    #[tokio::test]
    async fn acquire_is_idempotent() {
        let mut registry = Registry::default();
        let (subscriber, _rx) = Subscriber::new();
        let (tx, _rx_req) = mpsc::channel(8);

        let first = registry.acquire(&subscriber, tx.clone());
        let second = registry.acquire(&subscriber, tx);
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn dropping_the_receiver_fires_the_death_notification() {
        let mut registry = Registry::default();
        let (subscriber, rx) = Subscriber::new();
        let (tx, mut rx_req) = mpsc::channel(8);

        let id = registry.acquire(&subscriber, tx);
        drop(rx);

        let request = rx_req.recv().await.unwrap();
        assert!(matches!(request, Request::SubscriberDied(dead) if dead == id));
    }

    #[tokio::test]
    async fn release_if_idle_keeps_entries_with_remaining_ledger_interest() {
        let mut registry = Registry::default();
        let (subscriber, _rx) = Subscriber::new();
        let (tx, _rx_req) = mpsc::channel(8);
        let id = registry.acquire(&subscriber, tx);

        let mut ledger = Ledger::default();
        ledger.add_interest(&[Target::Channel("news".into())], id);

        registry.release_if_idle(id, &ledger);
        assert_eq!(registry.len(), 1);

        ledger.remove_interest(&[Target::Channel("news".into())], id);
        registry.release_if_idle(id, &ledger);
        assert_eq!(registry.len(), 0);
    }
}
