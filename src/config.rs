//! Server configuration
//!
//! Command-line surface: listen address, log verbosity, and the tunables
//! of the distribution engine. Parsed once at startup with clap.

use std::time::Duration;

use clap::Parser;

use crate::distributor;
use crate::frame;

/// A single-room TCP chat relay
#[derive(Debug, Parser)]
#[command(name = "chat-relay", version, about)]
pub struct Config {
    /// Host for the server address
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port for the server address
    #[arg(long, default_value_t = 8001)]
    pub port: u16,

    /// Enable debug logging output (RUST_LOG overrides this)
    #[arg(long)]
    pub debug: bool,

    /// Distribution queue capacity
    #[arg(long, default_value_t = distributor::DEFAULT_QUEUE_CAPACITY, value_parser = positive_size)]
    pub queue_capacity: usize,

    /// Bounded wait in milliseconds before a publish into a full queue
    /// is reported as dropped
    #[arg(long, default_value_t = 250)]
    pub publish_wait_ms: u64,

    /// Per-client delivery buffer; a client this far behind is evicted
    #[arg(long, default_value_t = 32, value_parser = positive_size)]
    pub client_buffer: usize,

    /// Maximum frame payload size in bytes
    #[arg(long, default_value_t = frame::DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,

    /// Idle read deadline in seconds; a silent client is evicted on expiry
    #[arg(long, default_value_t = 300)]
    pub idle_timeout_secs: u64,

    /// Do not deliver a message back to its own sender
    #[arg(long)]
    pub no_echo: bool,
}

impl Config {
    /// The address to bind, as `host:port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Bounded publish wait as a `Duration`
    pub fn publish_wait(&self) -> Duration {
        Duration::from_millis(self.publish_wait_ms)
    }

    /// Whether messages are delivered back to their own sender
    pub fn echo_to_sender(&self) -> bool {
        !self.no_echo
    }

    /// Idle read deadline as a `Duration`
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_from(["chat-relay"])
    }
}

/// Parse a size argument that must be at least 1; channel capacities of
/// zero are not representable.
fn positive_size(s: &str) -> Result<usize, String> {
    let value: usize = s.parse().map_err(|e| format!("{}", e))?;
    if value == 0 {
        return Err("must be at least 1".to_string());
    }
    Ok(value)
}
