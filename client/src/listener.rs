//! Asynchronous hand-off between the connection task and the UI layer.

use std::sync::Arc;

use log::warn;
use shared::Message;
use tokio::sync::mpsc;

/// Callbacks the UI layer receives about the connection.
///
/// All of them are invoked on a dedicated delivery task, never on the
/// connection's own task, so slow handling cannot stall socket servicing.
/// Calling back into [`crate::network::ServerConnection`] from a callback
/// is allowed; sending is thread-safe.
pub trait ConnectionListener: Send + Sync {
    /// The connection to the server completed.
    fn connected(&self);
    /// The connection is gone, whether locally requested or not.
    fn disconnected(&self);
    /// A transport-level notice in human-readable form.
    fn handle_message(&self, text: &str);
    /// A decoded response from the server.
    fn received_response(&self, message: Message);
}

#[derive(Debug)]
enum ListenerEvent {
    Connected,
    Disconnected,
    Notice(String),
    Response(Message),
}

/// Marshals connection events onto the listener's delivery task.
///
/// Events are queued in order and delivered in order; the sender never
/// waits for the listener.
#[derive(Clone)]
pub struct ListenerBridge {
    tx: mpsc::UnboundedSender<ListenerEvent>,
}

impl ListenerBridge {
    /// Spawns the delivery task. Must be called inside a tokio runtime.
    pub fn new(listener: Arc<dyn ConnectionListener>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    ListenerEvent::Connected => listener.connected(),
                    ListenerEvent::Disconnected => listener.disconnected(),
                    ListenerEvent::Notice(text) => listener.handle_message(&text),
                    ListenerEvent::Response(message) => listener.received_response(message),
                }
            }
        });
        ListenerBridge { tx }
    }

    pub fn notify_connected(&self) {
        self.send(ListenerEvent::Connected);
    }

    pub fn notify_disconnected(&self) {
        self.send(ListenerEvent::Disconnected);
    }

    pub fn notify_message(&self, text: impl Into<String>) {
        self.send(ListenerEvent::Notice(text.into()));
    }

    pub fn notify_response(&self, message: Message) {
        self.send(ListenerEvent::Response(message));
    }

    fn send(&self, event: ListenerEvent) {
        if self.tx.send(event).is_err() {
            warn!("Listener delivery task is gone, dropping event");
        }
    }
}
