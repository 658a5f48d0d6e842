//! Error types shared by both endpoints.

use thiserror::Error;

/// A violation of the length-prefixed wire framing.
///
/// Any of these is fatal for the connection it occurred on: the framer has
/// lost its place in the byte stream and no resynchronization is attempted.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The length header was empty, non-numeric, or absurdly large.
    #[error("malformed length header {0:?}")]
    BadLength(String),

    /// The declared payload length exceeds the per-frame limit.
    #[error("declared frame length {0} exceeds the maximum frame size")]
    Oversized(usize),

    /// The peer kept sending bytes without ever producing a length delimiter.
    #[error("no length delimiter in the first {0} bytes of a frame header")]
    HeaderOverflow(usize),

    /// The framed payload is not valid UTF-8 text.
    #[error("frame payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Anything that forces a connection to be torn down.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The outbound queue hit its byte budget; the peer is not draining.
    #[error("outbound queue full ({queued} of {limit} bytes used)")]
    QueueFull { queued: usize, limit: usize },
}
