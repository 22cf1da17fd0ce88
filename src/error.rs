//! Error types for the relay
//!
//! Defines the error taxonomy shared by sessions, the registry and the
//! distributor. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::SessionId;

/// Relay-level errors
///
/// Per-session errors (`PeerClosed`, `Connection`) stay inside that
/// session's task and drive its teardown; they never propagate to other
/// sessions or to the distributor. No variant is ever fatal to the process.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The remote end closed the stream cleanly. Not a failure; drives
    /// normal session teardown.
    #[error("peer closed the connection")]
    PeerClosed,

    /// I/O or protocol failure on send or receive. Same lifecycle effect
    /// as `PeerClosed`, logged at a higher severity.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The distribution queue stayed saturated beyond the bounded publish
    /// wait. The message was not queued and the publisher is told so
    /// synchronously.
    #[error("message dropped: distribution queue saturated")]
    BackpressureDropped,

    /// The distribution engine already stopped; only possible during
    /// shutdown. The message is lost like a backpressure drop, but kept
    /// apart from queue saturation in logs.
    #[error("message dropped: distribution engine stopped")]
    EngineStopped,

    /// Registry add collision. Fatal to the offending add only.
    #[error("session {0} is already registered")]
    DuplicateSession(SessionId),
}
