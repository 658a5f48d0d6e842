//! Connection lifecycle state and the interest set derived from it.

use tokio::io::Interest;

/// Lifecycle of one socket connection.
///
/// `Connecting → Open → Closing → Closed`, driven only by the task that
/// owns the connection. While `Closing`, pending writes are still flushed
/// but nothing received is dispatched anymore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Socket connect in flight.
    Connecting,
    /// Fully established; reading, and writing while the queue is non-empty.
    Open,
    /// A local or remote close was observed; flushing, then closing.
    Closing,
    /// Channel closed, queue discarded.
    Closed,
}

impl ConnState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnState::Open)
    }
}

/// The interest set to register for the next readiness wait.
///
/// `None` means the connection has nothing left to wait for: either the
/// connect future still drives it, or it is ready to be closed for good.
pub fn wire_interest(state: ConnState, has_pending_writes: bool) -> Option<Interest> {
    match state {
        ConnState::Connecting | ConnState::Closed => None,
        ConnState::Open => Some(if has_pending_writes {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        }),
        ConnState::Closing => has_pending_writes.then_some(Interest::WRITABLE),
    }
}
