use std::io::Cursor;

use bytes::{Buf, Bytes, BytesMut};

/// A RESP2 value.
///
/// Only the handful of types pub/sub traffic actually uses are modelled:
/// arrays of sub-frames, bulk strings, integers (subscription counts), and
/// simple/error strings (only ever seen on a malformed exchange, but parsed
/// rather than rejected so a reconnect isn't forced by a frame this crate
/// doesn't otherwise care about).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Array(Vec<Frame>),
    Bulk(Bytes),
    Integer(i64),
    Simple(String),
    Error(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub(crate) enum RespError {
    #[error("not enough data is available to parse a frame")]
    Incomplete,
    #[error("invalid frame encoding: {0}")]
    Invalid(String),
}

impl Frame {
    /// Checks whether a complete frame is present at the front of `src`
    /// without consuming it. On success, `src`'s position is left just past
    /// the end of the frame.
    pub(crate) fn check(src: &mut Cursor<&[u8]>) -> Result<(), RespError> {
        match get_u8(src)? {
            b'*' => {
                let len = get_decimal(src)?;
                for _ in 0..len {
                    Frame::check(src)?;
                }
                Ok(())
            }
            b'$' => {
                if peek_u8(src)? == b'-' {
                    let line = get_line(src)?;
                    if line != b"-1" {
                        return Err(RespError::Invalid("invalid bulk string length".into()));
                    }
                    Ok(())
                } else {
                    let len = get_decimal(src)? as usize;
                    skip(src, len + 2)
                }
            }
            b':' => {
                get_decimal(src)?;
                Ok(())
            }
            b'+' | b'-' => {
                get_line(src)?;
                Ok(())
            }
            actual => Err(RespError::Invalid(format!("unexpected frame type byte `{}`", actual as char))),
        }
    }

    /// Parses a complete frame out of `src`. Must only be called after
    /// [`check`](Frame::check) has already confirmed one is present.
    pub(crate) fn parse(src: &mut Cursor<&[u8]>) -> Result<Frame, RespError> {
        match get_u8(src)? {
            b'*' => {
                let len = get_decimal(src)? as usize;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(Frame::parse(src)?);
                }
                Ok(Frame::Array(items))
            }
            b'$' => {
                if peek_u8(src)? == b'-' {
                    let line = get_line(src)?;
                    if line != b"-1" {
                        return Err(RespError::Invalid("invalid bulk string length".into()));
                    }
                    Ok(Frame::Bulk(Bytes::new()))
                } else {
                    let len = get_decimal(src)? as usize;
                    let needed = len + 2;
                    if src.remaining() < needed {
                        return Err(RespError::Incomplete);
                    }
                    let data = Bytes::copy_from_slice(&src.chunk()[..len]);
                    skip(src, needed)?;
                    Ok(Frame::Bulk(data))
                }
            }
            b':' => Ok(Frame::Integer(get_decimal(src)?)),
            b'+' => Ok(Frame::Simple(String::from_utf8_lossy(get_line(src)?).into_owned())),
            b'-' => Ok(Frame::Error(String::from_utf8_lossy(get_line(src)?).into_owned())),
            actual => Err(RespError::Invalid(format!("unexpected frame type byte `{}`", actual as char))),
        }
    }

    /// Encodes this frame onto `dst` in RESP2 wire format.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Array(items) => {
                dst.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.encode(dst);
                }
            }
            Frame::Bulk(data) => {
                dst.extend_from_slice(format!("${}\r\n", data.len()).as_bytes());
                dst.extend_from_slice(data);
                dst.extend_from_slice(b"\r\n");
            }
            Frame::Integer(n) => dst.extend_from_slice(format!(":{n}\r\n").as_bytes()),
            Frame::Simple(s) => dst.extend_from_slice(format!("+{s}\r\n").as_bytes()),
            Frame::Error(s) => dst.extend_from_slice(format!("-{s}\r\n").as_bytes()),
        }
    }

    /// Builds a command frame: an array of bulk strings.
    pub fn command(verb: &'static [u8], args: impl IntoIterator<Item = Bytes>) -> Frame {
        let mut items = vec![Frame::Bulk(Bytes::from_static(verb))];
        items.extend(args.into_iter().map(Frame::Bulk));
        Frame::Array(items)
    }
}

fn peek_u8(src: &Cursor<&[u8]>) -> Result<u8, RespError> {
    if !src.has_remaining() {
        return Err(RespError::Incomplete);
    }
    Ok(src.chunk()[0])
}

fn get_u8(src: &mut Cursor<&[u8]>) -> Result<u8, RespError> {
    if !src.has_remaining() {
        return Err(RespError::Incomplete);
    }
    Ok(src.get_u8())
}

fn skip(src: &mut Cursor<&[u8]>, n: usize) -> Result<(), RespError> {
    if src.remaining() < n {
        return Err(RespError::Incomplete);
    }
    src.advance(n);
    Ok(())
}

fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], RespError> {
    let start = src.position() as usize;
    let buf = src.get_ref();
    if buf.is_empty() {
        return Err(RespError::Incomplete);
    }
    let end = buf.len() - 1;
    for i in start..end {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            src.set_position((i + 2) as u64);
            return Ok(&buf[start..i]);
        }
    }
    Err(RespError::Incomplete)
}

fn get_decimal(src: &mut Cursor<&[u8]>) -> Result<i64, RespError> {
    let line = get_line(src)?;
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| RespError::Invalid("invalid integer".into()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn roundtrip(frame: Frame) -> Frame {
        let mut buf = BytesMut::new();
        frame.encode(&mut buf);
        let mut cursor = Cursor::new(&buf[..]);
        Frame::check(&mut cursor).unwrap();
        cursor.set_position(0);
        Frame::parse(&mut cursor).unwrap()
    }

    #[test]
    fn encodes_and_parses_a_subscribe_command() {
        let frame = Frame::command(b"SUBSCRIBE", [Bytes::from_static(b"news")]);
        assert_eq!(roundtrip(frame.clone()), frame);
    }

    #[test]
    fn encodes_and_parses_a_message_push() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from_static(b"message")),
            Frame::Bulk(Bytes::from_static(b"news")),
            Frame::Bulk(Bytes::from_static(b"hello")),
        ]);
        assert_eq!(roundtrip(frame.clone()), frame);
    }

    #[test]
    fn check_reports_incomplete_on_a_partial_frame() {
        let mut buf = BytesMut::new();
        Frame::command(b"SUBSCRIBE", [Bytes::from_static(b"news")]).encode(&mut buf);
        let truncated = &buf[..buf.len() - 3];
        let mut cursor = Cursor::new(truncated);
        assert!(matches!(Frame::check(&mut cursor), Err(RespError::Incomplete)));
    }
}
