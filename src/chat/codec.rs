// Inbound line framing

use crate::chat::error::ChatError;
use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// Frames a client byte stream into text lines.
///
/// Lines end at `\n`, with an optional `\r` before it. The length limit
/// applies to the line without its terminator. Invalid UTF-8 is replaced
/// rather than rejected.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_len: usize,
}

impl LineCodec {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    fn too_long(&self) -> ChatError {
        ChatError::LineTooLong(self.max_len)
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ChatError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                let mut line = src.split_to(pos);
                src.advance(1);
                if line.last() == Some(&b'\r') {
                    line.truncate(line.len() - 1);
                }
                if line.len() > self.max_len {
                    return Err(self.too_long());
                }
                Ok(Some(String::from_utf8_lossy(&line).into_owned()))
            }
            None => {
                // A full-length line may still be waiting on its "\n" after a "\r".
                let pending = match src.last() {
                    Some(b'\r') => src.len() - 1,
                    _ => src.len(),
                };
                if pending > self.max_len {
                    return Err(self.too_long());
                }
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }

        // Unterminated last line
        let mut line = src.split();
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }
}
