use tokio::sync::broadcast;

/// Listens for the client-wide shutdown signal.
///
/// Shutdown is signalled by dropping or triggering the single
/// `broadcast::Sender` owned by [`PubSubClient`](crate::PubSubClient). Only
/// one value is ever sent; `Shutdown` tracks whether it has already fired so
/// repeated calls to [`recv`](Shutdown::recv) after the first resolve
/// immediately instead of waiting on a closed channel.
#[derive(Debug)]
pub(crate) struct Shutdown {
    is_shutdown: bool,
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    pub(crate) fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown { is_shutdown: false, notify }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.is_shutdown
    }

    /// Waits for the shutdown signal. Resolves immediately on every call
    /// after the first.
    pub(crate) async fn recv(&mut self) {
        if self.is_shutdown {
            return;
        }

        let _ = self.notify.recv().await;
        self.is_shutdown = true;
    }
}
