//! Per-connection outbound write queue.
//!
//! Producers on any thread enqueue framed bytes; the connection's own task
//! drains them whenever the socket reports writable. Enqueueing wakes the
//! task out of its readiness wait so a fresh write is flushed promptly
//! instead of riding on the next unrelated I/O event.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::Notify;

use crate::error::TransportError;

/// Byte budget per connection. A peer that stops draining its socket will
/// hit this instead of growing the queue without bound.
pub const MAX_QUEUED_BYTES: usize = 64 * 1024;

/// One pending write: an immutable byte sequence plus a cursor recording
/// how much of it the socket has already accepted.
#[derive(Debug)]
struct WriteEntry {
    bytes: Bytes,
    written: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    entries: VecDeque<WriteEntry>,
    queued: usize,
}

/// Ordered, thread-safe queue of pending writes for one connection.
#[derive(Debug)]
pub struct OutboundQueue {
    state: Mutex<QueueState>,
    wake: Arc<Notify>,
    limit: usize,
}

impl OutboundQueue {
    /// A queue that wakes `wake` on every enqueue, with the default byte
    /// budget of [`MAX_QUEUED_BYTES`].
    pub fn new(wake: Arc<Notify>) -> Self {
        Self::with_limit(wake, MAX_QUEUED_BYTES)
    }

    pub fn with_limit(wake: Arc<Notify>, limit: usize) -> Self {
        OutboundQueue {
            state: Mutex::new(QueueState::default()),
            wake,
            limit,
        }
    }

    /// Appends a write entry and wakes the owning task.
    ///
    /// This is the one operation on connection state that may be called
    /// from any thread.
    pub fn enqueue(&self, bytes: Bytes) -> Result<(), TransportError> {
        {
            let mut state = self.lock();
            if state.queued + bytes.len() > self.limit {
                return Err(TransportError::QueueFull {
                    queued: state.queued,
                    limit: self.limit,
                });
            }
            state.queued += bytes.len();
            state.entries.push_back(WriteEntry { bytes, written: 0 });
        }
        self.wake.notify_one();
        Ok(())
    }

    /// Writes as much queued data as `write` accepts without blocking.
    ///
    /// `write` is called with the unwritten remainder of the head entry and
    /// reports how many bytes the socket took; `WouldBlock` or a zero-byte
    /// acceptance stops the drain with the entry kept in place. Entries are
    /// written strictly in FIFO order and removed only once fully written.
    ///
    /// Returns whether entries remain (the caller keeps WRITE interest
    /// registered exactly as long as this reports `true`).
    pub fn drain_with<W>(&self, mut write: W) -> io::Result<bool>
    where
        W: FnMut(&[u8]) -> io::Result<usize>,
    {
        let mut state = self.lock();
        while let Some(entry) = state.entries.front_mut() {
            if entry.written == entry.bytes.len() {
                state.entries.pop_front();
                continue;
            }
            let remaining = entry.bytes.len() - entry.written;
            match write(&entry.bytes[entry.written..]) {
                Ok(0) => return Ok(true),
                Ok(n) => {
                    entry.written += n;
                    let done = entry.written == entry.bytes.len();
                    state.queued -= n;
                    if done {
                        state.entries.pop_front();
                    }
                    if n < remaining {
                        return Ok(true);
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(true),
                Err(err) => return Err(err),
            }
        }
        Ok(false)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Unwritten bytes currently held by the queue.
    pub fn queued_bytes(&self) -> usize {
        self.lock().queued
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
