//! Length-prefixed frame encoding and the incremental decoder.
//!
//! A frame on the wire is `<decimal byte count>###<payload>`. The decoder
//! accumulates raw socket bytes and hands back complete payloads no matter
//! how the stream was fragmented or coalesced in transit.

use bytes::{Bytes, BytesMut};

use crate::error::FrameError;
use crate::message::{Message, MAX_MSG_LENGTH, MSG_LEN_DELIMITER};

/// Longest header we will buffer while looking for the length delimiter.
/// A legal header is at most the digits of [`MAX_MSG_LENGTH`] plus the
/// delimiter itself; anything past this is a peer that will never frame.
const MAX_HEADER_LEN: usize = 16;

/// Frames a payload with its length prefix, ready to enqueue.
pub fn encode_payload(payload: &str) -> Bytes {
    Bytes::from(format!(
        "{}{}{}",
        payload.as_bytes().len(),
        MSG_LEN_DELIMITER,
        payload
    ))
}

/// Serializes and frames a message in one step.
pub fn encode_message(message: &Message) -> Bytes {
    encode_payload(&message.to_wire())
}

#[derive(Debug)]
enum DecodeState {
    /// Scanning the accumulator for a complete `<digits>###` header.
    Header,
    /// Header consumed; waiting until `length` payload bytes are buffered.
    Payload { length: usize },
}

/// Incremental decoder for the inbound byte stream of one connection.
///
/// Feed it whatever the socket produced, then poll until it runs dry:
///
/// ```
/// use shared::codec::FrameCodec;
///
/// let mut codec = FrameCodec::new();
/// codec.feed(b"5###HELLO7###GUESS##");
/// assert_eq!(codec.poll_payload().unwrap().as_deref(), Some("HELLO"));
/// assert_eq!(codec.poll_payload().unwrap().as_deref(), Some("GUESS##"));
/// assert_eq!(codec.poll_payload().unwrap(), None);
/// ```
#[derive(Debug)]
pub struct FrameCodec {
    buffer: BytesMut,
    state: DecodeState,
}

impl FrameCodec {
    pub fn new() -> Self {
        FrameCodec {
            buffer: BytesMut::with_capacity(MAX_MSG_LENGTH),
            state: DecodeState::Header,
        }
    }

    /// Appends raw received bytes to the accumulator. Any chunking is fine,
    /// from single bytes up to several frames at once.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Removes and returns the oldest complete payload, or `Ok(None)` if no
    /// full frame is buffered yet. Call repeatedly to drain; once it reports
    /// `None` it keeps reporting `None` until more bytes arrive.
    ///
    /// Payload bytes are consumed strictly by count: a delimiter occurring
    /// inside payload text can never desynchronize the header scan.
    pub fn poll_payload(&mut self) -> Result<Option<String>, FrameError> {
        loop {
            match self.state {
                DecodeState::Header => {
                    let delim = MSG_LEN_DELIMITER.as_bytes();
                    let Some(pos) = self
                        .buffer
                        .windows(delim.len())
                        .position(|window| window == delim)
                    else {
                        if self.buffer.len() > MAX_HEADER_LEN {
                            return Err(FrameError::HeaderOverflow(self.buffer.len()));
                        }
                        return Ok(None);
                    };
                    let length = parse_length(&self.buffer[..pos])?;
                    if length > MAX_MSG_LENGTH {
                        return Err(FrameError::Oversized(length));
                    }
                    let _ = self.buffer.split_to(pos + delim.len());
                    self.state = DecodeState::Payload { length };
                }
                DecodeState::Payload { length } => {
                    if self.buffer.len() < length {
                        return Ok(None);
                    }
                    let payload = self.buffer.split_to(length);
                    self.state = DecodeState::Header;
                    return String::from_utf8(payload.to_vec())
                        .map(Some)
                        .map_err(|_| FrameError::InvalidUtf8);
                }
            }
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_length(header: &[u8]) -> Result<usize, FrameError> {
    let bad = || FrameError::BadLength(String::from_utf8_lossy(header).into_owned());
    if header.is_empty() || !header.iter().all(u8::is_ascii_digit) {
        return Err(bad());
    }
    std::str::from_utf8(header)
        .map_err(|_| bad())?
        .parse()
        .map_err(|_| bad())
}
