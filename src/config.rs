use std::time::Duration;

use tracing::Level;

/// Per-event log level overrides for the three connection lifecycle events
/// the spec calls out by name.
#[derive(Debug, Clone, Copy)]
pub struct LogLevels {
    pub disconnection: Level,
    pub reconnection: Level,
    pub failed_connection: Level,
}

impl Default for LogLevels {
    fn default() -> Self {
        Self { disconnection: Level::WARN, reconnection: Level::INFO, failed_connection: Level::WARN }
    }
}

/// An upper bound on the exponential backoff schedule, or none at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffMax {
    Millis(u64),
    Infinite,
}

/// Tunables recognized by [`PubSubClient::connect`](crate::PubSubClient::connect).
///
/// Generalizes the teacher's `client::connect(addr, client_id)` parameter
/// list into a chainable builder, since this crate's configuration surface
/// (backoff tuning, TLS, exit-on-disconnect, per-event log levels) is
/// considerably larger than a single host/port/id triple.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) sentinel: Option<String>,
    pub(crate) ssl: bool,
    pub(crate) sync_connect: bool,
    pub(crate) exit_on_disconnection: bool,
    pub(crate) backoff_initial: Duration,
    pub(crate) backoff_max: BackoffMax,
    pub(crate) log: LogLevels,
}

impl Config {
    pub fn builder(host: impl Into<String>, port: u16) -> ConfigBuilder {
        ConfigBuilder::new(host, port)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            config: Config {
                host: host.into(),
                port,
                sentinel: None,
                ssl: false,
                sync_connect: false,
                exit_on_disconnection: false,
                backoff_initial: Duration::from_millis(100),
                backoff_max: BackoffMax::Millis(10_000),
                log: LogLevels::default(),
            },
        }
    }

    pub fn sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.config.sentinel = Some(sentinel.into());
        self
    }

    pub fn ssl(mut self, ssl: bool) -> Self {
        self.config.ssl = ssl;
        self
    }

    pub fn sync_connect(mut self, sync_connect: bool) -> Self {
        self.config.sync_connect = sync_connect;
        self
    }

    pub fn exit_on_disconnection(mut self, exit_on_disconnection: bool) -> Self {
        self.config.exit_on_disconnection = exit_on_disconnection;
        self
    }

    pub fn backoff_initial(mut self, backoff_initial: Duration) -> Self {
        self.config.backoff_initial = backoff_initial;
        self
    }

    pub fn backoff_max(mut self, backoff_max: BackoffMax) -> Self {
        self.config.backoff_max = backoff_max;
        self
    }

    pub fn log(mut self, log: LogLevels) -> Self {
        self.config.log = log;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn builder_defaults_are_conservative() {
        let config = Config::builder("localhost", 6379).build();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 6379);
        assert!(!config.ssl);
        assert!(!config.sync_connect);
        assert!(!config.exit_on_disconnection);
        assert_eq!(config.backoff_max, BackoffMax::Millis(10_000));
    }

    #[test]
    fn builder_chains_overrides() {
        let config = Config::builder("redis.internal", 6380)
            .ssl(true)
            .sync_connect(true)
            .exit_on_disconnection(true)
            .backoff_initial(Duration::from_millis(50))
            .backoff_max(BackoffMax::Infinite)
            .build();
        assert!(config.ssl);
        assert!(config.sync_connect);
        assert!(config.exit_on_disconnection);
        assert_eq!(config.backoff_initial, Duration::from_millis(50));
        assert_eq!(config.backoff_max, BackoffMax::Infinite);
    }
}
