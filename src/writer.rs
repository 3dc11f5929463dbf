use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::resp::Frame;

/// Encodes and flushes RESP frames onto an `AsyncWrite` half.
///
/// Generalized the same way [`Reader`](crate::reader::Reader) is, over any
/// `W: AsyncWrite + Unpin`, so the wire layer is exercised against a fake
/// duplex-stream server in tests without a real socket.
#[derive(Debug)]
pub struct Writer<W> {
    stream: W,
}

impl<W: AsyncWrite + Unpin> Writer<W> {
    pub fn new(stream: W) -> Self {
        Self { stream }
    }

    /// Encodes every frame into one buffer and writes it in a single
    /// `write_all` + `flush`, so a `SUBSCRIBE` and a `PSUBSCRIBE` issued
    /// together for the same request land on the wire back-to-back without
    /// an interleaving opportunity.
    pub async fn write_frames(&mut self, frames: &[Frame]) -> io::Result<()> {
        if frames.is_empty() {
            return Ok(());
        }

        let mut buffer = BytesMut::new();
        for frame in frames {
            frame.encode(&mut buffer);
        }

        self.stream.write_all(&buffer).await?;
        self.stream.flush().await
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use tokio::io::{duplex, AsyncReadExt};

    use super::*;

    #[tokio::test]
    async fn writes_two_commands_in_one_flush() {
        let (server, mut client) = duplex(256);
        let mut writer = Writer::new(server);

        let subscribe = Frame::command(b"SUBSCRIBE", [Bytes::from_static(b"news")]);
        let psubscribe = Frame::command(b"PSUBSCRIBE", [Bytes::from_static(b"n*")]);
        writer.write_frames(&[subscribe.clone(), psubscribe.clone()]).await.unwrap();
        drop(writer);

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();

        let mut expected = BytesMut::new();
        subscribe.encode(&mut expected);
        psubscribe.encode(&mut expected);
        assert_eq!(received, expected.to_vec());
    }

    #[tokio::test]
    async fn empty_frame_list_writes_nothing() {
        let (server, mut client) = duplex(64);
        let mut writer = Writer::new(server);
        writer.write_frames(&[]).await.unwrap();
        drop(writer);

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());
    }
}
