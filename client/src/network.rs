//! Client network layer: the connection task and its thread-safe front.
//!
//! [`ServerConnection`] is the handle the rest of the program holds. Its
//! send methods only frame a message and put it on the outbound queue,
//! which wakes the connection task; every socket operation and all
//! connection state live on that one task.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use shared::{
    encode_message, wire_interest, ConnState, FrameCodec, Message, MessageType, OutboundQueue,
    TransportError,
};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio::time::timeout;

use crate::listener::{ConnectionListener, ListenerBridge};

const LOST_CONNECTION_MSG: &str = "Lost connection.";
const CONNECT_FAILED_MSG: &str = "Could not connect to the server.";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_BUFFER_SIZE: usize = 4096;

/// Handle to the connection task; cheap to clone and safe to use from any
/// thread, including from listener callbacks.
#[derive(Clone)]
pub struct ServerConnection {
    outbound: Arc<OutboundQueue>,
    wake: Arc<Notify>,
    connected: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    bridge: ListenerBridge,
}

impl ServerConnection {
    /// Spawns the connection task and returns at once; the listener hears
    /// `connected()` when the socket is established.
    pub fn connect(addr: SocketAddr, listener: Arc<dyn ConnectionListener>) -> Self {
        let wake = Arc::new(Notify::new());
        let outbound = Arc::new(OutboundQueue::new(Arc::clone(&wake)));
        let connected = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));
        let bridge = ListenerBridge::new(listener);

        let task = ConnectionTask {
            addr,
            outbound: Arc::clone(&outbound),
            wake: Arc::clone(&wake),
            connected: Arc::clone(&connected),
            shutdown: Arc::clone(&shutdown),
            bridge: bridge.clone(),
            codec: FrameCodec::new(),
        };
        tokio::spawn(task.run());

        ServerConnection {
            outbound,
            wake,
            connected,
            shutdown,
            bridge,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn login(&self, username: &str, password: &str) {
        self.send(
            Message::with_body(
                MessageType::Login,
                vec![username.to_string(), password.to_string()],
            ),
            "Connect before logging in!",
        );
    }

    pub fn send_start(&self) {
        self.send(Message::new(MessageType::Start), "Connect to start a game!");
    }

    pub fn send_guess(&self, guess: &str) {
        self.send(
            Message::with_body(MessageType::Guess, vec![guess.to_string()]),
            "Connect and start a game to make guesses!",
        );
    }

    /// Queues a protocol disconnect and stops the connection task once the
    /// queue has drained. The disconnect message goes out before the socket
    /// closes; everything is best-effort from here on.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self
            .outbound
            .enqueue(encode_message(&Message::new(MessageType::Disconnect)));
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    fn send(&self, message: Message, not_connected_notice: &str) {
        if !self.is_connected() {
            self.bridge.notify_message(not_connected_notice);
            return;
        }
        if let Err(err) = self.outbound.enqueue(encode_message(&message)) {
            // A full queue means the transport has effectively failed.
            error!("Dropping the connection: {}", err);
            self.bridge.notify_message(LOST_CONNECTION_MSG);
            self.connected.store(false, Ordering::SeqCst);
            self.shutdown.store(true, Ordering::SeqCst);
            self.wake.notify_one();
        }
    }
}

enum ReadOutcome {
    KeepGoing,
    EndOfStream,
}

/// The task that owns the socket, the inbound accumulator, and the
/// connection lifecycle.
struct ConnectionTask {
    addr: SocketAddr,
    outbound: Arc<OutboundQueue>,
    wake: Arc<Notify>,
    connected: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    bridge: ListenerBridge,
    codec: FrameCodec,
}

impl ConnectionTask {
    async fn run(mut self) {
        let Some(stream) = self.establish().await else {
            return;
        };

        let mut state = ConnState::Open;
        loop {
            if self.shutdown.load(Ordering::SeqCst) && state.is_open() {
                state = ConnState::Closing;
            }
            // No interest left means the close finished flushing.
            let Some(interest) = wire_interest(state, !self.outbound.is_empty()) else {
                break;
            };
            tokio::select! {
                _ = self.wake.notified() => continue,
                ready = stream.ready(interest) => match ready {
                    Ok(ready) => {
                        if ready.is_readable() || ready.is_read_closed() {
                            match self.read_ready(&stream, state) {
                                Ok(ReadOutcome::KeepGoing) => {}
                                Ok(ReadOutcome::EndOfStream) => {
                                    info!("Server closed the connection");
                                    if state.is_open() {
                                        // Not locally initiated.
                                        self.bridge.notify_message(LOST_CONNECTION_MSG);
                                    }
                                    break;
                                }
                                Err(err) => {
                                    self.fail(&err);
                                    break;
                                }
                            }
                        } else if ready.is_writable() || ready.is_write_closed() {
                            if let Err(err) = self.outbound.drain_with(|chunk| stream.try_write(chunk)) {
                                self.fail(&err.into());
                                break;
                            }
                        }
                    }
                    Err(err) => {
                        self.fail(&err.into());
                        break;
                    }
                },
            }
        }

        // Dropping the stream closes the socket.
        self.connected.store(false, Ordering::SeqCst);
        self.bridge.notify_disconnected();
        info!("Connection to {} closed", self.addr);
    }

    async fn establish(&self) -> Option<TcpStream> {
        match timeout(CONNECT_TIMEOUT, TcpStream::connect(self.addr)).await {
            Ok(Ok(stream)) => {
                info!("Connected to {}", self.addr);
                self.connected.store(true, Ordering::SeqCst);
                self.bridge.notify_connected();
                Some(stream)
            }
            Ok(Err(err)) => {
                error!("Connect to {} failed: {}", self.addr, err);
                self.bridge.notify_message(CONNECT_FAILED_MSG);
                self.bridge.notify_disconnected();
                None
            }
            Err(_) => {
                error!("Connect to {} timed out", self.addr);
                self.bridge.notify_message(CONNECT_FAILED_MSG);
                self.bridge.notify_disconnected();
                None
            }
        }
    }

    fn read_ready(&mut self, stream: &TcpStream, state: ConnState) -> Result<ReadOutcome, TransportError> {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        match stream.try_read(&mut buf) {
            Ok(0) => return Ok(ReadOutcome::EndOfStream),
            Ok(n) => self.codec.feed(&buf[..n]),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                return Ok(ReadOutcome::KeepGoing)
            }
            Err(err) => return Err(err.into()),
        }
        // Nothing gets dispatched anymore once the close began.
        while state.is_open() {
            let Some(payload) = self.codec.poll_payload()? else {
                break;
            };
            match Message::parse(&payload) {
                Ok(message) => self.bridge.notify_response(message),
                Err(err) => warn!("Dropping unusable server message: {}", err),
            }
        }
        Ok(ReadOutcome::KeepGoing)
    }

    fn fail(&self, err: &TransportError) {
        error!("Connection to {} failed: {}", self.addr, err);
        self.bridge.notify_message(LOST_CONNECTION_MSG);
    }
}
