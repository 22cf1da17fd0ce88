//! Chat Relay Client - Entry Point
//!
//! Connects to a relay, prints every received frame to stdout, and frames
//! each line typed on stdin. `/command exit` leaves the chat.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_relay::command::{classify, Directive, Input};
use chat_relay::frame::FrameCodec;
use tokio_util::codec::Framed;

/// Terminal client for the chat relay
#[derive(Debug, Parser)]
#[command(name = "chat-relay-client", version, about)]
struct Args {
    /// Host for the server address
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port for the server address
    #[arg(long, default_value_t = 8001)]
    port: u16,

    /// Enable debug logging output (RUST_LOG overrides this)
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_filter = if args.debug {
        "chat_relay=debug"
    } else {
        "chat_relay=error"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let addr = format!("{}:{}", args.host, args.port);
    let stream = TcpStream::connect(&addr).await?;
    info!("connected to {}", addr);

    let framed = Framed::new(stream, FrameCodec::new());
    let (mut sink, mut frames) = framed.split::<String>();

    // Receiver task: keeps the chat space current while stdin blocks below
    let receiver = tokio::spawn(async move {
        loop {
            match frames.next().await {
                Some(Ok(text)) => println!("{}", text),
                Some(Err(e)) => {
                    error!("receive error: {}", e);
                    break;
                }
                None => {
                    info!("connection closed by server");
                    break;
                }
            }
        }
    });

    // Main task composes and sends messages
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        sink.send(line.clone()).await?;

        if let Input::Directive(Directive::Exit) = classify(&line) {
            break;
        }
    }

    let _ = sink.close().await;
    receiver.abort();
    let _ = receiver.await;

    Ok(())
}
