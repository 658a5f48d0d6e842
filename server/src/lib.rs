//! # Hangman Server Library
//!
//! The server side of the word-guessing protocol: a single event loop
//! multiplexing every client connection over one listener, a dispatcher
//! routing decoded messages to the game and auth collaborators, and the
//! game model itself.
//!
//! ## Module Organization
//!
//! - `network` — connection accept/registry, the readiness event loop,
//!   framing and write-queue plumbing per client.
//! - `dispatcher` — message routing, per-session state, unknown-tag policy.
//! - `game` — Hangman rules, scoring, and word selection.
//! - `auth` — the credential check consumed by the dispatcher.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::auth::AuthenticationManager;
//! use server::dispatcher::{Dispatcher, UnknownTagPolicy};
//! use server::game::WordList;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = Dispatcher::new(
//!         AuthenticationManager::default(),
//!         WordList::builtin(),
//!         UnknownTagPolicy::Reject,
//!     );
//!     let mut server = Server::new("127.0.0.1:8000", dispatcher).await?;
//!     server.run().await
//! }
//! ```

pub mod auth;
pub mod dispatcher;
pub mod game;
pub mod network;
