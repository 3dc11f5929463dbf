use bytes::Bytes;

use crate::resp::Frame;

/// A parsed pub/sub push or acknowledgement from the server.
///
/// Built directly on top of [`resp::Frame`](crate::resp::Frame) by matching
/// an exhaustive set of the six verbs Redis ever sends on a pub/sub
/// connection; anything else is a [`ProtocolError`], never silently
/// swallowed (per the source's "dynamic atom conversion" note: a
/// "string-to-existing-atom" lookup that fails is a hard error there too).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PubSubFrame {
    Subscribe { channel: Bytes, count: i64 },
    Psubscribe { pattern: Bytes, count: i64 },
    Unsubscribe { channel: Bytes, count: i64 },
    Punsubscribe { pattern: Bytes, count: i64 },
    Message { channel: Bytes, payload: Bytes },
    Pmessage { pattern: Bytes, channel: Bytes, payload: Bytes },
}

#[derive(Debug, Clone, thiserror::Error)]
pub(crate) enum ProtocolError {
    #[error("expected an array frame, got {0:?}")]
    NotAnArray(Frame),
    #[error("malformed {verb} frame: {detail}")]
    Malformed { verb: &'static str, detail: &'static str },
    #[error("unrecognized pub/sub verb {0:?}")]
    UnknownVerb(Bytes),
}

impl PubSubFrame {
    pub(crate) fn from_frame(frame: Frame) -> Result<PubSubFrame, ProtocolError> {
        let Frame::Array(items) = frame else {
            return Err(ProtocolError::NotAnArray(frame));
        };

        let mut items = items.into_iter();
        let verb = match items.next() {
            Some(Frame::Bulk(verb)) => verb,
            _ => return Err(ProtocolError::Malformed { verb: "?", detail: "missing leading verb" }),
        };

        match verb.as_ref() {
            b"subscribe" => {
                let (channel, count) = two(items, "subscribe")?;
                Ok(PubSubFrame::Subscribe { channel, count })
            }
            b"psubscribe" => {
                let (pattern, count) = two(items, "psubscribe")?;
                Ok(PubSubFrame::Psubscribe { pattern, count })
            }
            b"unsubscribe" => {
                let (channel, count) = two(items, "unsubscribe")?;
                Ok(PubSubFrame::Unsubscribe { channel, count })
            }
            b"punsubscribe" => {
                let (pattern, count) = two(items, "punsubscribe")?;
                Ok(PubSubFrame::Punsubscribe { pattern, count })
            }
            b"message" => {
                let channel = next_bulk(items.next(), "message")?;
                let payload = next_bulk(items.next(), "message")?;
                Ok(PubSubFrame::Message { channel, payload })
            }
            b"pmessage" => {
                let pattern = next_bulk(items.next(), "pmessage")?;
                let channel = next_bulk(items.next(), "pmessage")?;
                let payload = next_bulk(items.next(), "pmessage")?;
                Ok(PubSubFrame::Pmessage { pattern, channel, payload })
            }
            _ => Err(ProtocolError::UnknownVerb(verb)),
        }
    }
}

fn next_bulk(item: Option<Frame>, verb: &'static str) -> Result<Bytes, ProtocolError> {
    match item {
        Some(Frame::Bulk(bytes)) => Ok(bytes),
        _ => Err(ProtocolError::Malformed { verb, detail: "expected a bulk string" }),
    }
}

fn two(mut items: impl Iterator<Item = Frame>, verb: &'static str) -> Result<(Bytes, i64), ProtocolError> {
    let name = next_bulk(items.next(), verb)?;
    let count = match items.next() {
        Some(Frame::Integer(n)) => n,
        _ => return Err(ProtocolError::Malformed { verb, detail: "expected a trailing integer count" }),
    };
    Ok((name, count))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn bulk(s: &str) -> Frame {
        Frame::Bulk(Bytes::copy_from_slice(s.as_bytes()))
    }

    #[test]
    fn parses_subscribe_ack() {
        let frame = Frame::Array(vec![bulk("subscribe"), bulk("news"), Frame::Integer(1)]);
        let parsed = PubSubFrame::from_frame(frame).unwrap();
        assert_eq!(parsed, PubSubFrame::Subscribe { channel: Bytes::from_static(b"news"), count: 1 });
    }

    #[test]
    fn parses_message_push() {
        let frame = Frame::Array(vec![bulk("message"), bulk("news"), bulk("hello")]);
        let parsed = PubSubFrame::from_frame(frame).unwrap();
        assert_eq!(
            parsed,
            PubSubFrame::Message { channel: Bytes::from_static(b"news"), payload: Bytes::from_static(b"hello") }
        );
    }

    #[test]
    fn parses_pmessage_push() {
        let frame = Frame::Array(vec![bulk("pmessage"), bulk("n*"), bulk("news"), bulk("hello")]);
        let parsed = PubSubFrame::from_frame(frame).unwrap();
        assert_eq!(
            parsed,
            PubSubFrame::Pmessage {
                pattern: Bytes::from_static(b"n*"),
                channel: Bytes::from_static(b"news"),
                payload: Bytes::from_static(b"hello"),
            }
        );
    }

    #[test]
    fn rejects_unknown_verb() {
        let frame = Frame::Array(vec![bulk("ping")]);
        assert!(matches!(PubSubFrame::from_frame(frame), Err(ProtocolError::UnknownVerb(_))));
    }

    #[test]
    fn rejects_non_array_frames() {
        let frame = Frame::Simple("OK".into());
        assert!(matches!(PubSubFrame::from_frame(frame), Err(ProtocolError::NotAnArray(_))));
    }
}
