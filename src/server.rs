//! Relay server: accept loop and shutdown
//!
//! Binds the listener, runs the distributor on its own task, and spawns
//! one session task per accepted connection into a `JoinSet` so shutdown
//! can account for every live session explicitly. Ctrl-C stops the accept
//! loop, tears the sessions down, then lets the distributor drain.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::distributor::{self, Publisher};
use crate::registry::Registry;
use crate::session::handle_connection;

/// A bound relay ready to accept connections
pub struct RelayServer {
    listener: TcpListener,
    registry: Registry,
    publisher: Publisher,
    distributor_task: JoinHandle<()>,
    config: Arc<Config>,
}

impl RelayServer {
    /// Bind the listener and start the distributor task
    pub async fn bind(config: Config) -> io::Result<Self> {
        let config = Arc::new(config);
        let registry = Registry::new();

        let (publisher, distributor) = distributor::channel(
            registry.clone(),
            config.queue_capacity,
            config.publish_wait(),
            config.echo_to_sender(),
        );
        let distributor_task = tokio::spawn(distributor.run());

        let listener = TcpListener::bind(config.listen_addr()).await?;
        info!("chat relay listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            registry,
            publisher,
            distributor_task,
            config,
        })
    }

    /// The address actually bound (useful with port 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle to the live session set, for observation
    pub fn registry(&self) -> Registry {
        self.registry.clone()
    }

    /// Accept connections until Ctrl-C, then shut down cleanly.
    ///
    /// Every session task is tracked in the `JoinSet` and torn down here;
    /// the distributor exits once the last publisher handle is dropped.
    pub async fn run(self) -> io::Result<()> {
        let RelayServer {
            listener,
            registry,
            publisher,
            distributor_task,
            config,
        } = self;

        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        info!("new connection from {}", addr);
                        let registry = registry.clone();
                        let publisher = publisher.clone();
                        let config = config.clone();
                        sessions.spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, registry, publisher, config).await
                            {
                                error!("session ended with error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("failed to accept connection: {}", e);
                    }
                },
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = finished {
                        error!("session task failed: {}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown requested");
                    break;
                }
            }
        }

        drop(listener);

        // Abort and await every tracked session, then release the last
        // publisher handle so the distributor drains its queue and exits.
        debug!("shutting down {} live session(s)", sessions.len());
        sessions.shutdown().await;
        drop(publisher);
        if let Err(e) = distributor_task.await {
            error!("distributor task failed: {}", e);
        }

        info!("chat relay stopped");
        Ok(())
    }
}
