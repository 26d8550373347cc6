//! Line framing for tokio.
//!
//! Inbound lines end in LF with an optional CR. Lines longer than the
//! 512-byte wire limit are still handed up; only the absolute ceiling is
//! an error. Outbound lines are clipped to the wire limit.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ProtocolError, Result};
use crate::message::Message;

/// Wire limit for a single line, CRLF included.
pub const MAX_LINE_LEN: usize = 512;

/// Default hard ceiling for inbound lines.
pub const DEFAULT_LINE_CEILING: usize = 8192;

/// Codec for CRLF-terminated IRC lines.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Index of the next byte to scan for a newline.
    next_index: usize,
    ceiling: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_ceiling(DEFAULT_LINE_CEILING)
    }

    /// Codec with a custom inbound ceiling (clamped to at least the wire limit).
    pub fn with_ceiling(ceiling: usize) -> Self {
        Self {
            next_index: 0,
            ceiling: ceiling.max(MAX_LINE_LEN),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    fn finish_line(&self, raw: BytesMut) -> Result<String> {
        let mut end = raw.len();
        if end > 0 && raw[end - 1] == b'\n' {
            end -= 1;
        }
        if end > 0 && raw[end - 1] == b'\r' {
            end -= 1;
        }
        std::str::from_utf8(&raw[..end])
            .map(str::to_owned)
            .map_err(|e| ProtocolError::InvalidUtf8 {
                byte_pos: e.valid_up_to(),
            })
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if line.len() > self.ceiling {
                return Err(ProtocolError::LineTooLong {
                    actual: line.len(),
                    limit: self.ceiling,
                });
            }

            return self.finish_line(line).map(Some);
        }

        if src.len() > self.ceiling {
            return Err(ProtocolError::LineTooLong {
                actual: src.len(),
                limit: self.ceiling,
            });
        }
        self.next_index = src.len();
        Ok(None)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        // Peer closed mid-line: hand up what arrived.
        self.next_index = 0;
        let rest = buf.split_to(buf.len());
        self.finish_line(rest).map(Some)
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<()> {
        let body = clip(&line, MAX_LINE_LEN - 2);
        dst.reserve(body.len() + 2);
        dst.extend_from_slice(body.as_bytes());
        dst.extend_from_slice(b"\r\n");
        Ok(())
    }
}

impl Encoder<Message> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<()> {
        Encoder::<String>::encode(self, msg.to_string(), dst)
    }
}

/// Longest prefix of `s` within `max` bytes that ends on a char boundary.
fn clip(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_crlf_and_bare_lf() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("NICK alice\r\nUSER a 0 * :A\n");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("NICK alice"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("USER a 0 * :A"));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn waits_for_partial_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PRIVMSG #a :hel");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"lo\r\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("PRIVMSG #a :hello")
        );
    }

    #[test]
    fn overlong_line_below_ceiling_is_delivered() {
        let mut codec = LineCodec::new();
        let long = format!("TOPIC #a :{}\r\n", "x".repeat(900));
        let mut buf = BytesMut::from(long.as_str());
        let line = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(line.len(), long.len() - 2);
    }

    #[test]
    fn line_over_ceiling_is_an_error() {
        let mut codec = LineCodec::with_ceiling(600);
        let mut buf = BytesMut::from("x".repeat(700).as_str());
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::LineTooLong { limit: 600, .. })
        ));
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"PRIVMSG #a :\xff\xfe\r\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::InvalidUtf8 { byte_pos: 12 })
        ));
    }

    #[test]
    fn eof_flushes_trailing_partial_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("QUIT :bye");
        assert_eq!(codec.decode_eof(&mut buf).unwrap().as_deref(), Some("QUIT :bye"));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn encoder_appends_crlf_and_clips() {
        let mut codec = LineCodec::new();
        let mut dst = BytesMut::new();
        codec.encode("PING :x".to_string(), &mut dst).unwrap();
        assert_eq!(&dst[..], b"PING :x\r\n");

        let mut dst = BytesMut::new();
        codec.encode("é".repeat(400), &mut dst).unwrap();
        assert!(dst.len() <= MAX_LINE_LEN);
        assert!(dst.ends_with(b"\r\n"));
        assert!(std::str::from_utf8(&dst).is_ok());
    }

    #[tokio::test]
    async fn framed_read_yields_lines_then_ends() {
        use futures_util::StreamExt;
        use tokio_util::codec::FramedRead;

        let data: &[u8] = b"NICK alice\r\nUSER a 0 * :Alice\r\nQUIT :bye";
        let mut reader = FramedRead::new(data, LineCodec::new());
        assert_eq!(reader.next().await.unwrap().unwrap(), "NICK alice");
        assert_eq!(reader.next().await.unwrap().unwrap(), "USER a 0 * :Alice");
        assert_eq!(reader.next().await.unwrap().unwrap(), "QUIT :bye");
        assert!(reader.next().await.is_none());
    }

    #[tokio::test]
    async fn framed_read_surfaces_ceiling_error() {
        use futures_util::StreamExt;
        use tokio_util::codec::FramedRead;

        let long = format!("PRIVMSG #a :{}\r\n", "A".repeat(1000));
        let mut reader = FramedRead::new(long.as_bytes(), LineCodec::with_ceiling(600));
        match reader.next().await {
            Some(Err(ProtocolError::LineTooLong { limit: 600, .. })) => {}
            other => panic!("Expected LineTooLong, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn framed_write_terminates_messages() {
        use futures_util::SinkExt;
        use tokio_util::codec::FramedWrite;

        let mut writer = FramedWrite::new(Vec::new(), LineCodec::new());
        writer
            .send(Message::new("PING", vec!["irc.example".to_string()]))
            .await
            .unwrap();
        writer.send("PONG x".to_string()).await.unwrap();
        assert_eq!(writer.get_ref().as_slice(), b"PING irc.example\r\nPONG x\r\n");
    }
}
