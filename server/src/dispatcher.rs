//! Routes decoded client messages to the game and auth collaborators.

use std::sync::Arc;

use log::{info, warn};
use shared::{Message, MessageError, MessageType};

use crate::auth::AuthenticationManager;
use crate::game::{GameUpdate, HangmanGame, WordList};

/// What to do with a request the protocol cannot route: a tag outside the
/// protocol, or a response kind arriving where a command belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownTagPolicy {
    /// Answer with an `INVALID_REQUEST` message.
    Reject,
    /// Drop the message; the connection stays open either way.
    Ignore,
}

/// Per-connection application state: login status plus the running game.
#[derive(Debug)]
pub struct Session {
    user: Option<String>,
    game: HangmanGame,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Turns each inbound message into at most one response message.
///
/// Routing is a pure function of the message type; all state lives in the
/// per-connection [`Session`].
#[derive(Debug)]
pub struct Dispatcher {
    auth: AuthenticationManager,
    words: Arc<WordList>,
    policy: UnknownTagPolicy,
}

impl Dispatcher {
    pub fn new(auth: AuthenticationManager, words: WordList, policy: UnknownTagPolicy) -> Self {
        Dispatcher {
            auth,
            words: Arc::new(words),
            policy,
        }
    }

    /// Fresh application state for a newly accepted connection.
    pub fn new_session(&self) -> Session {
        Session {
            user: None,
            game: HangmanGame::new(Arc::clone(&self.words)),
        }
    }

    pub fn dispatch(&self, session: &mut Session, message: Message) -> Option<Message> {
        match message.kind {
            MessageType::Login => Some(self.login(session, &message)),
            MessageType::Start => {
                if !session.is_authenticated() {
                    return Some(invalid_request("Please login!"));
                }
                Some(game_response(session.game.start()))
            }
            MessageType::Guess => {
                if !session.is_authenticated() {
                    return Some(invalid_request("Please login and start a game!"));
                }
                Some(game_response(session.game.guess(message.field(0))))
            }
            // Teardown is handled by the connection itself.
            MessageType::Disconnect => None,
            MessageType::GameResponse
            | MessageType::LoginSuccess
            | MessageType::LoginFail
            | MessageType::InvalidRequest => {
                warn!("Received a response-kind message: {}", message.kind);
                self.unroutable()
            }
        }
    }

    /// Applies the configured policy to a payload that did not parse.
    pub fn handle_unparsed(&self, error: &MessageError) -> Option<Message> {
        warn!("Unroutable message: {}", error);
        self.unroutable()
    }

    fn login(&self, session: &mut Session, message: &Message) -> Message {
        let (Some(username), Some(password)) = (message.field(0), message.field(1)) else {
            return Message::with_body(
                MessageType::LoginFail,
                vec!["Provide a username and a password".to_string()],
            );
        };
        if self.auth.login(username, password) {
            info!("{} logged in", username);
            session.user = Some(username.to_string());
            Message::with_body(MessageType::LoginSuccess, vec![username.to_string()])
        } else {
            Message::with_body(
                MessageType::LoginFail,
                vec!["Invalid credentials".to_string()],
            )
        }
    }

    fn unroutable(&self) -> Option<Message> {
        match self.policy {
            UnknownTagPolicy::Reject => Some(invalid_request("Invalid request")),
            UnknownTagPolicy::Ignore => None,
        }
    }
}

fn game_response(update: GameUpdate) -> Message {
    Message::with_body(MessageType::GameResponse, update.into_fields())
}

fn invalid_request(text: &str) -> Message {
    Message::with_body(MessageType::InvalidRequest, vec![text.to_string()])
}
