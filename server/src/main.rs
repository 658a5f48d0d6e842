use std::path::PathBuf;

use clap::Parser;
use log::info;
use server::auth::AuthenticationManager;
use server::dispatcher::{Dispatcher, UnknownTagPolicy};
use server::game::WordList;
use server::network::Server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Word list file; the built-in list is used when absent
    #[arg(short, long)]
    words: Option<PathBuf>,

    /// Username accepted by the login step
    #[arg(long, default_value = "johndoe")]
    username: String,

    /// Password accepted by the login step
    #[arg(long, default_value = "123456")]
    password: String,

    /// Silently drop unusable requests instead of answering INVALID_REQUEST
    #[arg(long)]
    lenient: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let words = match &args.words {
        Some(path) => WordList::from_file(path)?,
        None => WordList::builtin(),
    };
    let policy = if args.lenient {
        UnknownTagPolicy::Ignore
    } else {
        UnknownTagPolicy::Reject
    };
    let dispatcher = Dispatcher::new(
        AuthenticationManager::new(args.username, args.password),
        words,
        policy,
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, dispatcher).await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    }
}
