//! A reconnecting Redis Pub/Sub connection that multiplexes subscriptions
//! across in-process subscribers.
//!
//! [`PubSubClient::connect`] starts a background task driving the connection
//! state machine: it dials out through a [`Connector`], issues
//! `SUBSCRIBE`/`PSUBSCRIBE` for whatever channels and patterns are wanted,
//! and reconnects with exponential backoff on failure, replaying every still
//! wanted subscription. Each [`Subscriber`] gets its own stream of
//! [`Event`]s, independent of how many others share the same channel.

mod backoff;
mod client;
mod config;
mod connection;
mod connector;
mod event;
mod ledger;
mod protocol;
mod reader;
mod registry;
mod resp;
mod shutdown;
mod subscriber;
mod target;
mod writer;

pub use client::PubSubClient;
pub use config::{BackoffMax, Config, ConfigBuilder, LogLevels};
pub use connector::{Connector, TcpConnector};
#[cfg(feature = "tls")]
pub use connector::TlsConnector;
pub use event::{ConnectionId, Event, EventKind};
pub use subscriber::{Subscriber, SubscriberRef};

/// Errors returned directly by [`PubSubClient`] calls.
///
/// Deliberately small: once a connection is running, transport failures are
/// not reported as `Err` anywhere — they are retried internally and surfaced
/// to subscribers as [`EventKind::Disconnected`] instead. This enum only
/// covers the two ways a call into the client can fail outright.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// [`Config::sync_connect`] was set and the first connect attempt
    /// failed.
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect { host: String, port: u16, #[source] source: std::io::Error },
    /// The background connection task is no longer running, so the request
    /// or reply could not be delivered.
    #[error("the connection task is no longer running")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Re-exports for integration tests that need to speak RESP2 directly to
/// build a fake Redis-like responder, mirroring the teacher's own pattern of
/// keeping its wire types `pub(crate)` in normal builds and only widening
/// their visibility under a test-only feature.
#[cfg(feature = "test-util")]
pub mod testing {
    pub use crate::reader::Reader;
    pub use crate::resp::Frame;
    pub use crate::writer::Writer;
}
