//! Wire protocol pieces common to the client and the server: the message
//! vocabulary, the length-prefixed frame codec, the outbound write queue,
//! and the connection lifecycle model.

pub mod codec;
pub mod connection;
pub mod error;
pub mod message;
pub mod queue;

pub use codec::{encode_message, encode_payload, FrameCodec};
pub use connection::{wire_interest, ConnState};
pub use error::{FrameError, TransportError};
pub use message::{Message, MessageError, MessageType};
pub use queue::OutboundQueue;
