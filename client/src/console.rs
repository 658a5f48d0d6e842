//! Thin console front: reads commands from stdin, prints what the
//! connection reports.

use std::io;

use shared::{Message, MessageType};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::listener::ConnectionListener;
use crate::network::ServerConnection;

/// Prints connection events to stdout.
pub struct ConsoleOutput;

impl ConnectionListener for ConsoleOutput {
    fn connected(&self) {
        println!("Connected to the server.");
    }

    fn disconnected(&self) {
        println!("Disconnected.");
    }

    fn handle_message(&self, text: &str) {
        println!("{}", text);
    }

    fn received_response(&self, message: Message) {
        println!("{}", render(&message));
    }
}

fn render(message: &Message) -> String {
    match message.kind {
        MessageType::GameResponse => {
            match (message.field(0), message.field(1), message.field(2)) {
                (Some(text), Some(attempts), Some(score)) => {
                    format!("{}   (attempts left: {}, score: {})", text, attempts, score)
                }
                _ => message.to_wire(),
            }
        }
        MessageType::LoginSuccess => {
            format!("Logged in as {}.", message.field(0).unwrap_or("?"))
        }
        MessageType::LoginFail | MessageType::InvalidRequest => {
            message.field(0).unwrap_or("Request rejected").to_string()
        }
        _ => message.to_wire(),
    }
}

/// Reads commands until `quit` or end of input.
pub async fn run(connection: &ServerConnection) -> io::Result<()> {
    print_help();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        match command.to_ascii_lowercase().as_str() {
            "" => {}
            "login" => match rest.split_once(char::is_whitespace) {
                Some((username, password)) => connection.login(username, password.trim()),
                None => println!("Usage: login <username> <password>"),
            },
            "start" => connection.send_start(),
            "guess" => {
                if rest.is_empty() {
                    println!("Usage: guess <letter or word>");
                } else {
                    connection.send_guess(rest);
                }
            }
            "quit" | "disconnect" => {
                connection.disconnect();
                break;
            }
            _ => print_help(),
        }
    }
    Ok(())
}

fn print_help() {
    println!("Commands: login <user> <password> | start | guess <letter or word> | quit");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_game_response() {
        let message = Message::with_body(
            MessageType::GameResponse,
            vec!["_ _ L".to_string(), "3".to_string(), "1".to_string()],
        );
        assert_eq!(render(&message), "_ _ L   (attempts left: 3, score: 1)");
    }

    #[test]
    fn test_render_login_results() {
        let ok = Message::with_body(MessageType::LoginSuccess, vec!["johndoe".to_string()]);
        assert_eq!(render(&ok), "Logged in as johndoe.");

        let fail = Message::with_body(MessageType::LoginFail, vec!["Invalid credentials".to_string()]);
        assert_eq!(render(&fail), "Invalid credentials");
    }

    #[test]
    fn test_render_falls_back_to_wire_text() {
        let odd = Message::new(MessageType::GameResponse);
        assert_eq!(render(&odd), "GAME_RESPONSE");
    }
}
