//! Distribution engine
//!
//! The single ordered path between every session's reader and every
//! session's writer. Producers publish into one bounded queue; one
//! consumer task dequeues in FIFO order, stamps the global sequence
//! number, snapshots the registry and fans the rendered line out. A
//! recipient that cannot take the delivery is evicted; it never stalls
//! the remaining recipients or the loop itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::message::{Delivery, Message};
use crate::registry::Registry;

/// Default distribution queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default bounded wait applied when the queue is full
pub const DEFAULT_PUBLISH_WAIT: Duration = Duration::from_millis(250);

/// Producer-side handle to the distribution queue
///
/// Cheap to clone; one per session. Dropping every handle ends the
/// consumer loop, which is how shutdown drains the engine.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: mpsc::Sender<Message>,
    publish_wait: Duration,
}

impl Publisher {
    /// Append a message to the distribution queue.
    ///
    /// When the queue is at capacity the call waits up to the configured
    /// bound, then resolves to `BackpressureDropped` instead of blocking
    /// forever or growing the queue. The caller learns synchronously that
    /// the message was not queued; nobody downstream will ever see it.
    pub async fn publish(&self, message: Message) -> Result<(), RelayError> {
        let message = match self.tx.try_send(message) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Closed(_)) => return Err(RelayError::EngineStopped),
            Err(TrySendError::Full(message)) => message,
        };

        self.tx
            .send_timeout(message, self.publish_wait)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => RelayError::BackpressureDropped,
                SendTimeoutError::Closed(_) => RelayError::EngineStopped,
            })
    }
}

/// The fan-out consumer
///
/// Owns the receiving end of the distribution queue and the sequence
/// counter. Exactly one instance runs per process.
pub struct Distributor {
    rx: mpsc::Receiver<Message>,
    registry: Registry,
    /// Deliver each message back to its own sender as well
    echo_to_sender: bool,
    next_seq: u64,
}

/// Create a connected publisher/distributor pair over a bounded queue
pub fn channel(
    registry: Registry,
    capacity: usize,
    publish_wait: Duration,
    echo_to_sender: bool,
) -> (Publisher, Distributor) {
    // mpsc::channel panics on zero; a queue of one is the smallest bound
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        Publisher { tx, publish_wait },
        Distributor {
            rx,
            registry,
            echo_to_sender,
            next_seq: 0,
        },
    )
}

impl Distributor {
    /// Run the consumption loop until every publisher handle is dropped
    pub async fn run(mut self) {
        info!("distributor started");

        while let Some(message) = self.rx.recv().await {
            self.dispatch(message);
        }

        info!("distributor shutting down");
    }

    /// Deliver one dequeued message to every session in the current
    /// registry snapshot.
    ///
    /// The sequence number is stamped here, at the only point that sees
    /// true queue order, so every recipient of the same message observes
    /// the same number and numbering always agrees with FIFO order.
    fn dispatch(&mut self, message: Message) {
        self.next_seq += 1;
        let delivery = Delivery {
            seq: self.next_seq,
            line: Arc::from(message.render().as_str()),
        };

        for peer in self.registry.snapshot() {
            if !self.echo_to_sender && peer.id == message.origin {
                continue;
            }

            match peer.try_deliver(delivery.clone()) {
                Ok(()) => {}
                Err(TrySendError::Closed(_)) => {
                    // Writer task is gone; the session is a disconnect
                    debug!("session {} unreachable, evicting", peer.id);
                    self.registry.remove(peer.id);
                }
                Err(TrySendError::Full(_)) => {
                    // Peer is not draining its buffer; treat as a failed send
                    warn!("session {} ('{}') not draining, evicting", peer.id, peer.name);
                    self.registry.remove(peer.id);
                }
            }
        }
    }
}
