//! Chat Relay Server - Entry Point
//!
//! Parses the configuration, initializes logging, and runs the relay.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use chat_relay::{Config, RelayServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    // RUST_LOG takes precedence over the --debug flag
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    let default_filter = if config.debug {
        "chat_relay=debug"
    } else {
        "chat_relay=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let server = RelayServer::bind(config).await?;
    server.run().await?;

    Ok(())
}
