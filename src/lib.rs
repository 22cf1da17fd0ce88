//! Single-Room TCP Chat Relay Library
//!
//! A best-effort, in-memory chat relay: clients connect over TCP, frame
//! lines of text, and receive every other client's lines in real time.
//!
//! # Features
//! - Length-prefixed framing (4-byte big-endian prefix + UTF-8 payload)
//! - Name handshake on connect
//! - Totally ordered broadcast with a global sequence number
//! - Bounded distribution queue with explicit backpressure drops
//! - Eviction of disconnected, idle and non-draining clients
//! - In-band `/command exit` directive
//!
//! # Architecture
//! One reader task per connection drives that session's state machine;
//! a paired writer task drains the session's bounded delivery channel.
//! Sessions publish into a single bounded queue consumed by the
//! distributor task, which snapshots the shared registry and fans each
//! message out in FIFO order. The registry is the only shared mutable
//! state.
//!
//! # Example
//! ```ignore
//! use chat_relay::{Config, RelayServer};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = RelayServer::bind(Config::default()).await?;
//!     server.run().await
//! }
//! ```

pub mod command;
pub mod config;
pub mod distributor;
pub mod error;
pub mod frame;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use command::{classify, Directive, Input};
pub use config::Config;
pub use distributor::{Distributor, Publisher};
pub use error::RelayError;
pub use frame::FrameCodec;
pub use message::{Body, Delivery, Message};
pub use registry::{Peer, Registry};
pub use server::RelayServer;
pub use session::{handle_connection, SessionState};
pub use types::SessionId;
