use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Opens a framed, bidirectional transport to a Redis server.
///
/// Stands in for the external "TCP/TLS connector" collaborator the core is
/// explicitly not responsible for: DNS resolution, sentinel discovery, and
/// authentication all happen (or are expected to happen) inside an
/// implementation of this trait before it returns.
///
/// Uses an associated `Transport` type and native `async fn` in traits
/// (stable since Rust 1.75) rather than a boxed trait object: a
/// [`PubSubClient`](crate::PubSubClient) is generic over exactly one
/// connector for its whole lifetime and never needs to swap connectors at
/// runtime.
pub trait Connector: Send + Sync + 'static {
    type Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn connect(&self, host: &str, port: u16) -> impl std::future::Future<Output = std::io::Result<(Self::Transport, SocketAddr)>> + Send;
}

/// Plain, unencrypted TCP transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Transport = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> std::io::Result<(TcpStream, SocketAddr)> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        Ok((stream, peer))
    }
}

/// TLS-over-TCP transport, mirroring `lunatic-redis`'s own optional `tls`
/// Cargo feature: off by default, enabled with `--features tls`.
#[cfg(feature = "tls")]
#[derive(Debug, Clone)]
pub struct TlsConnector {
    connector: tokio_native_tls::TlsConnector,
}

#[cfg(feature = "tls")]
impl TlsConnector {
    pub fn new(connector: native_tls::TlsConnector) -> Self {
        Self { connector: tokio_native_tls::TlsConnector::from(connector) }
    }
}

#[cfg(feature = "tls")]
impl Connector for TlsConnector {
    type Transport = tokio_native_tls::TlsStream<TcpStream>;

    async fn connect(&self, host: &str, port: u16) -> std::io::Result<(Self::Transport, SocketAddr)> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let tls_stream = self
            .connector
            .connect(host, stream)
            .await
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;
        Ok((tls_stream, peer))
    }
}
