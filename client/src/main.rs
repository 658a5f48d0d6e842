use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use client::console::{self, ConsoleOutput};
use client::network::ServerConnection;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8000")]
    server: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    info!("Connecting to {}", args.server);

    let connection = ServerConnection::connect(args.server, Arc::new(ConsoleOutput));
    console::run(&connection).await?;

    // Leave the disconnect frame a moment to flush before the runtime goes.
    tokio::time::sleep(Duration::from_millis(250)).await;
    Ok(())
}
