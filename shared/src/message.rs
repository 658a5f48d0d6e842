//! Message types and the text layout of a decoded frame payload.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Separates the decimal byte count from the framed payload.
pub const MSG_LEN_DELIMITER: &str = "###";
/// Separates the type tag from the message body.
pub const MSG_TYPE_DELIMITER: &str = "##";
/// Separates the fields inside a message body.
pub const MSG_BODY_DELIMITER: &str = "&";

/// Largest frame payload a peer may send, in bytes.
pub const MAX_MSG_LENGTH: usize = 4096;

/// Every kind of message either side of the protocol can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Start a new game round.
    Start,
    /// Guess a letter or a whole word.
    Guess,
    /// Orderly connection teardown.
    Disconnect,
    /// Authenticate with username and password.
    Login,
    /// Game state update from the server.
    GameResponse,
    /// Credentials accepted.
    LoginSuccess,
    /// Credentials rejected.
    LoginFail,
    /// The request could not be honored (bad command, not logged in, ...).
    InvalidRequest,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Start => "START",
            MessageType::Guess => "GUESS",
            MessageType::Disconnect => "DISCONNECT",
            MessageType::Login => "LOGIN",
            MessageType::GameResponse => "GAME_RESPONSE",
            MessageType::LoginSuccess => "LOGIN_SUCCESS",
            MessageType::LoginFail => "LOGIN_FAIL",
            MessageType::InvalidRequest => "INVALID_REQUEST",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = MessageError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        const ALL: [MessageType; 8] = [
            MessageType::Start,
            MessageType::Guess,
            MessageType::Disconnect,
            MessageType::Login,
            MessageType::GameResponse,
            MessageType::LoginSuccess,
            MessageType::LoginFail,
            MessageType::InvalidRequest,
        ];
        ALL.into_iter()
            .find(|kind| tag.eq_ignore_ascii_case(kind.as_str()))
            .ok_or_else(|| MessageError::UnknownType(tag.to_string()))
    }
}

/// Raised when a well-framed payload does not parse into a [`Message`].
///
/// Unlike a framing error this is an application-level problem: the
/// connection that received it stays open.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("unrecognized message type {0:?}")]
    UnknownType(String),
    #[error("empty message payload")]
    Empty,
}

/// A decoded frame payload: a type tag plus zero or more body fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageType,
    pub fields: Vec<String>,
}

impl Message {
    /// A message with no body, e.g. `START` or `DISCONNECT`.
    pub fn new(kind: MessageType) -> Self {
        Message {
            kind,
            fields: Vec::new(),
        }
    }

    pub fn with_body(kind: MessageType, fields: Vec<String>) -> Self {
        Message { kind, fields }
    }

    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Serializes the tag and body into the payload text that gets framed.
    pub fn to_wire(&self) -> String {
        if self.fields.is_empty() {
            self.kind.as_str().to_string()
        } else {
            format!(
                "{}{}{}",
                self.kind,
                MSG_TYPE_DELIMITER,
                self.fields.join(MSG_BODY_DELIMITER)
            )
        }
    }

    /// Parses a frame payload back into a message.
    pub fn parse(payload: &str) -> Result<Self, MessageError> {
        if payload.is_empty() {
            return Err(MessageError::Empty);
        }
        match payload.split_once(MSG_TYPE_DELIMITER) {
            Some((tag, body)) => Ok(Message {
                kind: tag.parse()?,
                fields: body.split(MSG_BODY_DELIMITER).map(str::to_string).collect(),
            }),
            None => Ok(Message::new(payload.parse()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_roundtrip_with_body() {
        let msg = Message::with_body(
            MessageType::Login,
            vec!["johndoe".to_string(), "123456".to_string()],
        );
        let wire = msg.to_wire();
        assert_eq!(wire, "LOGIN##johndoe&123456");
        assert_eq!(Message::parse(&wire).unwrap(), msg);
    }

    #[test]
    fn test_message_roundtrip_without_body() {
        let msg = Message::new(MessageType::Start);
        let wire = msg.to_wire();
        assert_eq!(wire, "START");
        assert_eq!(Message::parse(&wire).unwrap(), msg);
    }

    #[test]
    fn test_message_roundtrip_empty_field() {
        let msg = Message::with_body(MessageType::Guess, vec![String::new()]);
        assert_eq!(msg.to_wire(), "GUESS##");
        assert_eq!(Message::parse("GUESS##").unwrap(), msg);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let msg = Message::parse("guess##A").unwrap();
        assert_eq!(msg.kind, MessageType::Guess);
        assert_eq!(msg.field(0), Some("A"));
    }

    #[test]
    fn test_parse_rejects_unknown_tag() {
        assert_eq!(
            Message::parse("BOGUS##x"),
            Err(MessageError::UnknownType("BOGUS".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_empty_payload() {
        assert_eq!(Message::parse(""), Err(MessageError::Empty));
    }

    #[test]
    fn test_body_fields_split_on_delimiter() {
        let msg = Message::parse("GAME_RESPONSE##H _ L L O&4&2").unwrap();
        assert_eq!(msg.fields, vec!["H _ L L O", "4", "2"]);
    }
}
