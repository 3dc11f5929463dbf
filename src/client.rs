use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::instrument;

use crate::config::Config;
use crate::connection::{self, Request};
use crate::connector::Connector;
use crate::subscriber::{Subscriber, SubscriberRef};
use crate::target::Target;
use crate::{Error, Result};

/// A cloneable handle to a reconnecting Redis pub/sub connection.
///
/// Each method hands a [`Request`] to the background connection task and
/// awaits a correlated reply, the same shape as the teacher's `Client`
/// methods handing a command to its background `Handler` task over
/// `subscribe_handler_tx`.
#[derive(Debug, Clone)]
pub struct PubSubClient {
    request_tx: mpsc::Sender<Request>,
    shutdown_tx: broadcast::Sender<()>,
}

impl PubSubClient {
    /// Starts the background connection task and returns a handle to it.
    ///
    /// If `config.sync_connect` is set, the first connect attempt is made
    /// here and awaited; failure aborts start-up with `Err` instead of
    /// scheduling a retry. Otherwise the connection task starts directly in
    /// the disconnected state and makes its first connect attempt
    /// immediately in the background.
    #[instrument(skip(connector))]
    pub async fn connect<C: Connector>(config: Config, connector: C) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel(256);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let initial_transport =
            if config.sync_connect { Some(connection::connect_sync(&config, &connector).await?) } else { None };

        let self_tx = request_tx.clone();
        tokio::spawn(connection::run(config, connector, request_rx, self_tx, shutdown_rx, initial_transport));

        Ok(Self { request_tx, shutdown_tx })
    }

    /// Subscribes `subscriber` to exact-match `channels`.
    pub async fn subscribe<I, B>(&self, channels: I, subscriber: &Subscriber) -> Result<SubscriberRef>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let targets = channels.into_iter().map(|c| Target::Channel(c.into())).collect();
        self.send_subscribe(targets, subscriber).await
    }

    /// Subscribes `subscriber` to glob `patterns`.
    pub async fn psubscribe<I, B>(&self, patterns: I, subscriber: &Subscriber) -> Result<SubscriberRef>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let targets = patterns.into_iter().map(|p| Target::Pattern(p.into())).collect();
        self.send_subscribe(targets, subscriber).await
    }

    /// Unsubscribes `subscriber` from exact-match `channels`.
    ///
    /// Channels the subscriber never subscribed to are silently ignored.
    pub async fn unsubscribe<I, B>(&self, channels: I, subscriber: &Subscriber) -> Result<()>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let targets = channels.into_iter().map(|c| Target::Channel(c.into())).collect();
        self.send_unsubscribe(targets, subscriber).await
    }

    /// Unsubscribes `subscriber` from glob `patterns`.
    pub async fn punsubscribe<I, B>(&self, patterns: I, subscriber: &Subscriber) -> Result<()>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let targets = patterns.into_iter().map(|p| Target::Pattern(p.into())).collect();
        self.send_unsubscribe(targets, subscriber).await
    }

    /// Stops the connection task. Any in-flight connect or I/O is abandoned;
    /// no further events are delivered to any subscriber afterwards.
    pub fn close(&self) -> Result<()> {
        self.shutdown_tx.send(()).map(|_| ()).map_err(|_| Error::ConnectionClosed)
    }

    async fn send_subscribe(&self, targets: Vec<Target>, subscriber: &Subscriber) -> Result<SubscriberRef> {
        let (reply, reply_rx) = oneshot::channel();
        self.request_tx
            .send(Request::Subscribe { targets, subscriber: subscriber.clone(), reply })
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        reply_rx.await.map_err(|_| Error::ConnectionClosed)
    }

    async fn send_unsubscribe(&self, targets: Vec<Target>, subscriber: &Subscriber) -> Result<()> {
        let (reply, reply_rx) = oneshot::channel();
        self.request_tx
            .send(Request::Unsubscribe { targets, subscriber: subscriber.clone(), reply })
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        reply_rx.await.map_err(|_| Error::ConnectionClosed)
    }
}
