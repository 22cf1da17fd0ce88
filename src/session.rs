//! Per-connection session state machine
//!
//! Each accepted connection gets one reader task that owns the session's
//! lifecycle (`Connecting → AwaitingName → Active → Closing → Closed`)
//! and one writer task that drains the session's bounded delivery channel
//! into the framed sink. No other task ever drives this session's state.

use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

use crate::command::{classify, Directive, Input};
use crate::config::Config;
use crate::distributor::Publisher;
use crate::error::RelayError;
use crate::frame::FrameCodec;
use crate::message::{Delivery, Message, DROPPED_NOTICE, NAME_PROMPT};
use crate::registry::{Peer, Registry};
use crate::types::SessionId;

/// Lifecycle states of one client session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, codec not yet exchanged anything
    Connecting,
    /// Prompt sent, waiting for the display name
    AwaitingName,
    /// Relaying chat and directives
    Active,
    /// Deregistering and releasing the connection
    Closing,
    /// Terminal
    Closed,
}

type Reader = SplitStream<Framed<TcpStream, FrameCodec>>;
type Writer = SplitSink<Framed<TcpStream, FrameCodec>, String>;

/// Handle one accepted connection from handshake to teardown.
///
/// Returns only after the session reached `Closed` and both halves of the
/// connection are released. Errors below disconnect severity are handled
/// internally; the returned error is for the accept loop's log line.
pub async fn handle_connection(
    stream: TcpStream,
    registry: Registry,
    publisher: Publisher,
    config: Arc<Config>,
) -> Result<(), RelayError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let id = SessionId::new();
    let mut state = SessionState::Connecting;
    trace!("session {} from {}: {:?}", id, peer_addr, state);

    let mut framed = Framed::new(
        stream,
        FrameCodec::with_max_frame_size(config.max_frame_size),
    );

    // Handshake happens before the stream is split; only after a name is
    // known does the writer task exist.
    state = SessionState::AwaitingName;
    trace!("session {}: {:?}", id, state);
    framed.send(NAME_PROMPT.to_string()).await?;

    let (sink, mut reader) = framed.split::<String>();

    let name = match await_name(id, &mut reader, &config).await {
        Ok(name) => name,
        Err(err) => {
            // Never registered, nothing to deregister or announce
            debug!("session {} left during handshake: {}", id, err);
            return Ok(());
        }
    };

    state = SessionState::Active;
    trace!("session {}: {:?}", id, state);
    info!("session {} ('{}') from {} active", id, name, peer_addr);

    // Writer task: drains deliveries into the framed sink, closes the
    // sink once the channel is drained. Owns the write half outright.
    // mpsc::channel panics on zero; a buffer of one is the smallest bound
    let (out_tx, out_rx) = mpsc::channel::<Delivery>(config.client_buffer.max(1));
    let writer_task = tokio::spawn(write_loop(out_rx, sink));

    if let Err(err) = registry.add(Peer::new(id, name.clone(), out_tx.clone())) {
        // UUID collision should not occur; fatal to this session only
        warn!("session {} not registered: {}", id, err);
        drop(out_tx);
        let _ = writer_task.await;
        return Ok(());
    }

    if let Err(err) = publisher.publish(Message::welcome(id, &name)).await {
        debug!("welcome for session {} not announced: {}", id, err);
    }

    active_loop(id, &name, &mut reader, &out_tx, &publisher, &config).await;

    state = SessionState::Closing;
    trace!("session {}: {:?}", id, state);

    // Idempotent: a mid-broadcast eviction may already have removed us
    registry.remove(id);

    if let Err(err) = publisher.publish(Message::farewell(id, &name)).await {
        debug!("farewell for session {} not announced: {}", id, err);
    }

    // Dropping the last sender lets the writer drain and close the socket
    drop(out_tx);
    let _ = writer_task.await;

    state = SessionState::Closed;
    trace!("session {}: {:?}", id, state);
    info!("session {} ('{}') closed", id, name);

    Ok(())
}

/// Wait for the first non-empty frame; it becomes the display name.
///
/// The name is taken verbatim: no validation and no uniqueness check.
async fn await_name(id: SessionId, reader: &mut Reader, config: &Config) -> Result<String, RelayError> {
    loop {
        let name = receive(reader, config).await?;
        if name.is_empty() {
            trace!("session {} sent an empty name, re-prompting wait", id);
            continue;
        }
        return Ok(name);
    }
}

/// The `Active` state: receive, classify, relay, until disconnect, idle
/// expiry or the terminate directive.
async fn active_loop(
    id: SessionId,
    name: &str,
    reader: &mut Reader,
    out_tx: &mpsc::Sender<Delivery>,
    publisher: &Publisher,
    config: &Config,
) {
    loop {
        let text = match receive(reader, config).await {
            Ok(text) => text,
            Err(RelayError::PeerClosed) => {
                debug!("session {} peer closed", id);
                return;
            }
            Err(err) => {
                warn!("session {} connection error: {}", id, err);
                return;
            }
        };

        match classify(&text) {
            Input::Chat(text) => {
                match publisher.publish(Message::chat(id, name, text)).await {
                    Ok(()) => {}
                    Err(RelayError::BackpressureDropped) => {
                        // The sender alone learns about the drop, on its
                        // own connection, outside the global stream.
                        warn!("session {} message dropped under backpressure", id);
                        let _ = out_tx.try_send(Delivery {
                            seq: 0,
                            line: Arc::from(DROPPED_NOTICE),
                        });
                    }
                    Err(err) => {
                        warn!("session {} publish failed: {}", id, err);
                    }
                }
            }
            Input::Directive(Directive::Exit) => {
                info!("session {} requested exit", id);
                return;
            }
            Input::Ignored => {
                debug!("session {} sent an unrecognized directive, ignoring", id);
            }
        }
    }
}

/// Receive one whole frame, bounded by the idle read deadline.
///
/// Stream end is `PeerClosed`; I/O and protocol failures and deadline
/// expiry are `Connection` errors, all handled identically by the caller.
async fn receive(reader: &mut Reader, config: &Config) -> Result<String, RelayError> {
    match timeout(config.idle_timeout(), reader.next()).await {
        Ok(Some(Ok(text))) => Ok(text),
        Ok(Some(Err(e))) => Err(RelayError::Connection(e)),
        Ok(None) => Err(RelayError::PeerClosed),
        Err(_) => Err(RelayError::Connection(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "idle read deadline expired",
        ))),
    }
}

/// Writer task body: deliveries in, frames out.
async fn write_loop(mut out_rx: mpsc::Receiver<Delivery>, mut sink: Writer) {
    while let Some(delivery) = out_rx.recv().await {
        if let Err(err) = sink.send(delivery.line.to_string()).await {
            debug!("write failed, ending writer task: {}", err);
            break;
        }
    }
    let _ = sink.close().await;
}
