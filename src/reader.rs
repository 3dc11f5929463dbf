use std::io::{self, Cursor};

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::resp::{Frame, RespError};

/// Buffers bytes off an `AsyncRead` half and yields complete RESP frames.
///
/// Generalized from a `TcpStream`-specific reader into one generic over `R`
/// so the same parsing logic runs against a live `TcpStream` half and, in
/// tests, a `tokio::io::DuplexStream` half standing in for a fake server.
#[derive(Debug)]
pub struct Reader<R> {
    stream: R,
    buffer: BytesMut,
}

impl<R: AsyncRead + Unpin> Reader<R> {
    pub fn new(stream: R) -> Self {
        Self { stream, buffer: BytesMut::with_capacity(4 * 1024) }
    }

    /// Reads a single frame, buffering more bytes from the socket as needed.
    ///
    /// Returns `Ok(None)` on a clean close (no partial frame left in the
    /// buffer); a non-empty leftover buffer on EOF is reported as a reset.
    pub async fn read_frame(&mut self) -> io::Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"))
                };
            }
        }
    }

    fn parse_frame(&mut self) -> io::Result<Option<Frame>> {
        let mut cursor = Cursor::new(&self.buffer[..]);

        match Frame::check(&mut cursor) {
            Ok(()) => {
                let len = cursor.position() as usize;
                cursor.set_position(0);
                let frame = Frame::parse(&mut cursor)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
                self.buffer.advance(len);
                Ok(Some(frame))
            }
            Err(RespError::Incomplete) => Ok(None),
            Err(err) => Err(io::Error::new(io::ErrorKind::InvalidData, err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};
    use pretty_assertions::assert_eq;
    use tokio::io::{duplex, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn reads_a_frame_split_across_several_writes() {
        let (mut client, server) = duplex(64);
        let mut reader = Reader::new(server);

        let mut encoded = BytesMut::new();
        Frame::command(b"SUBSCRIBE", [Bytes::from_static(b"news")]).encode(&mut encoded);

        let (first, second) = encoded.split_at(4);
        client.write_all(first).await.unwrap();
        client.write_all(second).await.unwrap();

        let frame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(frame, Frame::command(b"SUBSCRIBE", [Bytes::from_static(b"news")]));
    }

    #[tokio::test]
    async fn clean_close_with_no_partial_frame_returns_none() {
        let (client, server) = duplex(64);
        let mut reader = Reader::new(server);
        drop(client);
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_mid_frame_is_reported_as_reset() {
        let (mut client, server) = duplex(64);
        let mut reader = Reader::new(server);
        client.write_all(b"*2\r\n$4\r\nSUBS").await.unwrap();
        drop(client);
        assert!(reader.read_frame().await.is_err());
    }
}
