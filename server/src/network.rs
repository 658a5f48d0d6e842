//! Server network layer: one event loop serving every client connection
//! through a single readiness multiplexer.
//!
//! All socket I/O and connection state changes happen on the task running
//! [`Server::run`]. The one cross-thread entry point is a connection's
//! outbound queue, whose enqueue wakes the loop out of its readiness wait.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use log::{debug, error, info, warn};
use shared::{
    encode_message, wire_interest, ConnState, FrameCodec, Message, MessageType, OutboundQueue,
    TransportError,
};
use tokio::io::Ready;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

use crate::dispatcher::{Dispatcher, Session};

/// Flush window a closed socket gets for unsent bytes.
const LINGER_TIME: Duration = Duration::from_secs(5);
/// One readable event pulls at most this much off the socket before
/// handing control back to the loop.
const READ_BUFFER_SIZE: usize = 4096;

/// Everything the reactor owns for one client.
struct ClientConnection {
    stream: TcpStream,
    addr: SocketAddr,
    codec: FrameCodec,
    outbound: Arc<OutboundQueue>,
    state: ConnState,
    session: Session,
}

/// The single thing each loop iteration waits for.
enum Event {
    Incoming(io::Result<(TcpStream, SocketAddr)>),
    Ready { id: u64, ready: io::Result<Ready> },
    Wakeup,
}

/// Accepts clients and multiplexes all of their socket I/O.
pub struct Server {
    listener: TcpListener,
    dispatcher: Dispatcher,
    connections: HashMap<u64, ClientConnection>,
    next_conn_id: u64,
    wake: Arc<Notify>,
}

impl Server {
    pub async fn new(
        addr: &str,
        dispatcher: Dispatcher,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);
        Ok(Server {
            listener,
            dispatcher,
            connections: HashMap::new(),
            next_conn_id: 0,
            wake: Arc::new(Notify::new()),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the event loop. Owns the task until it is cancelled.
    ///
    /// A failure while servicing one connection closes that connection and
    /// nothing else; only a failed accept surfaces in the log here.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            self.close_finished();
            match self.next_event().await {
                Event::Incoming(Ok((stream, addr))) => self.register(stream, addr),
                Event::Incoming(Err(err)) => error!("Accept failed: {}", err),
                Event::Ready { id, ready: Ok(ready) } => {
                    if let Err(err) = self.service(id, ready) {
                        self.fail_connection(id, err);
                    }
                }
                Event::Ready { id, ready: Err(err) } => self.fail_connection(id, err.into()),
                // A queue got new data; rebuilding the wait below picks up
                // the widened interest set.
                Event::Wakeup => {}
            }
        }
    }

    /// Blocks until a client knocks, a registered socket turns ready, or an
    /// enqueue wakes the loop. The readiness futures are rebuilt from each
    /// connection's current interest set on every call; this is where
    /// interest changes take effect.
    async fn next_event(&self) -> Event {
        let mut ready_ops = FuturesUnordered::new();
        for (&id, conn) in &self.connections {
            if let Some(interest) = wire_interest(conn.state, !conn.outbound.is_empty()) {
                ready_ops.push(async move {
                    let ready = conn.stream.ready(interest).await;
                    Event::Ready { id, ready }
                });
            }
        }
        tokio::select! {
            incoming = self.listener.accept() => Event::Incoming(incoming),
            _ = self.wake.notified() => Event::Wakeup,
            Some(event) = ready_ops.next() => event,
        }
    }

    fn register(&mut self, stream: TcpStream, addr: SocketAddr) {
        if let Err(err) = stream.set_linger(Some(LINGER_TIME)) {
            warn!("Could not set linger for {}: {}", addr, err);
        }
        let id = self.next_conn_id;
        self.next_conn_id += 1;
        info!("Client {} connected from {}", id, addr);
        self.connections.insert(
            id,
            ClientConnection {
                stream,
                addr,
                codec: FrameCodec::new(),
                outbound: Arc::new(OutboundQueue::new(Arc::clone(&self.wake))),
                state: ConnState::Open,
                session: self.dispatcher.new_session(),
            },
        );
    }

    /// Dispatches exactly one readiness kind per event, skipping ids that
    /// were invalidated earlier in the iteration.
    fn service(&mut self, id: u64, ready: Ready) -> Result<(), TransportError> {
        if !self.connections.contains_key(&id) {
            return Ok(());
        }
        if ready.is_readable() || ready.is_read_closed() {
            self.handle_readable(id)
        } else if ready.is_writable() || ready.is_write_closed() {
            self.handle_writable(id)
        } else {
            Ok(())
        }
    }

    fn handle_readable(&mut self, id: u64) -> Result<(), TransportError> {
        let Some(conn) = self.connections.get_mut(&id) else {
            return Ok(());
        };
        let mut buf = [0u8; READ_BUFFER_SIZE];
        match conn.stream.try_read(&mut buf) {
            Ok(0) => {
                // End of stream: an orderly disconnect, not an error.
                info!("Client {} ({}) disconnected", id, conn.addr);
                conn.state = ConnState::Closing;
                return Ok(());
            }
            Ok(n) => conn.codec.feed(&buf[..n]),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(err) => return Err(err.into()),
        }

        while conn.state.is_open() {
            let Some(payload) = conn.codec.poll_payload()? else {
                break;
            };
            debug!("Client {} -> {:?}", id, payload);
            let reply = match Message::parse(&payload) {
                Ok(message) => {
                    if message.kind == MessageType::Disconnect {
                        info!("Client {} requested disconnect", id);
                        conn.state = ConnState::Closing;
                    }
                    self.dispatcher.dispatch(&mut conn.session, message)
                }
                Err(err) => self.dispatcher.handle_unparsed(&err),
            };
            if let Some(reply) = reply {
                conn.outbound.enqueue(encode_message(&reply))?;
            }
        }
        Ok(())
    }

    fn handle_writable(&mut self, id: u64) -> Result<(), TransportError> {
        let Some(conn) = self.connections.get_mut(&id) else {
            return Ok(());
        };
        let stream = &conn.stream;
        conn.outbound.drain_with(|chunk| stream.try_write(chunk))?;
        Ok(())
    }

    /// Removes connections that finished closing: the flush is done (or was
    /// never needed) and the socket can go.
    fn close_finished(&mut self) {
        let finished: Vec<u64> = self
            .connections
            .iter()
            .filter(|(_, conn)| match conn.state {
                ConnState::Closing => conn.outbound.is_empty(),
                ConnState::Closed => true,
                ConnState::Connecting | ConnState::Open => false,
            })
            .map(|(&id, _)| id)
            .collect();
        for id in finished {
            self.remove(id);
        }
    }

    fn fail_connection(&mut self, id: u64, err: TransportError) {
        error!("Connection {} failed: {}", id, err);
        self.remove(id);
    }

    fn remove(&mut self, id: u64) {
        if let Some(conn) = self.connections.remove(&id) {
            // Dropping the stream closes the socket; the queue goes with it.
            info!("Closed connection {} to {}", id, conn.addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthenticationManager;
    use crate::dispatcher::UnknownTagPolicy;
    use crate::game::WordList;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::timeout;
    use tokio_test::assert_ok;

    async fn start_server(policy: UnknownTagPolicy) -> SocketAddr {
        let dispatcher = Dispatcher::new(
            AuthenticationManager::default(),
            WordList::from_words(vec!["hello".to_string()]).unwrap(),
            policy,
        );
        let mut server = Server::new("127.0.0.1:0", dispatcher).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        addr
    }

    async fn read_message(stream: &mut TcpStream, codec: &mut FrameCodec) -> Message {
        let mut buf = [0u8; 1024];
        loop {
            if let Some(payload) = codec.poll_payload().unwrap() {
                return Message::parse(&payload).unwrap();
            }
            let n = timeout(Duration::from_secs(5), stream.read(&mut buf))
                .await
                .expect("timed out waiting for a response")
                .unwrap();
            assert!(n > 0, "server closed the connection unexpectedly");
            codec.feed(&buf[..n]);
        }
    }

    async fn send(stream: &mut TcpStream, message: &Message) {
        stream.write_all(&encode_message(message)).await.unwrap();
    }

    fn login() -> Message {
        Message::with_body(
            MessageType::Login,
            vec!["johndoe".to_string(), "123456".to_string()],
        )
    }

    #[tokio::test]
    async fn test_login_then_start_round_trip() {
        let addr = start_server(UnknownTagPolicy::Reject).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut codec = FrameCodec::new();

        send(&mut stream, &login()).await;
        let reply = read_message(&mut stream, &mut codec).await;
        assert_eq!(reply.kind, MessageType::LoginSuccess);
        assert_eq!(reply.field(0), Some("johndoe"));

        send(&mut stream, &Message::new(MessageType::Start)).await;
        let reply = read_message(&mut stream, &mut codec).await;
        assert_eq!(reply.kind, MessageType::GameResponse);
        assert_eq!(reply.field(0), Some("_ _ _ _ _"));
        assert_eq!(reply.field(1), Some("5"));
    }

    #[tokio::test]
    async fn test_commands_before_login_are_rejected() {
        let addr = start_server(UnknownTagPolicy::Reject).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut codec = FrameCodec::new();

        send(&mut stream, &Message::new(MessageType::Start)).await;
        let reply = read_message(&mut stream, &mut codec).await;
        assert_eq!(reply.kind, MessageType::InvalidRequest);
        assert_eq!(reply.field(0), Some("Please login!"));
    }

    #[tokio::test]
    async fn test_coalesced_requests_answered_in_order() {
        let addr = start_server(UnknownTagPolicy::Reject).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut codec = FrameCodec::new();

        // Both frames in a single write.
        let mut bytes = encode_message(&login()).to_vec();
        bytes.extend_from_slice(&encode_message(&Message::new(MessageType::Start)));
        stream.write_all(&bytes).await.unwrap();

        let first = read_message(&mut stream, &mut codec).await;
        let second = read_message(&mut stream, &mut codec).await;
        assert_eq!(first.kind, MessageType::LoginSuccess);
        assert_eq!(second.kind, MessageType::GameResponse);
    }

    #[tokio::test]
    async fn test_unknown_tag_gets_invalid_request() {
        let addr = start_server(UnknownTagPolicy::Reject).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut codec = FrameCodec::new();

        stream
            .write_all(&shared::encode_payload("BOGUS##hi"))
            .await
            .unwrap();
        let reply = read_message(&mut stream, &mut codec).await;
        assert_eq!(reply.kind, MessageType::InvalidRequest);
    }

    #[tokio::test]
    async fn test_malformed_frame_closes_the_connection() {
        let addr = start_server(UnknownTagPolicy::Reject).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        tokio_test::assert_ok!(stream.write_all(b"abc###X").await);
        let mut buf = [0u8; 64];
        let n = timeout(Duration::from_secs(5), stream.read(&mut buf))
            .await
            .expect("timed out waiting for the close")
            .unwrap();
        assert_eq!(n, 0);
    }
}
