// Relay server: shared state and the TCP accept loop

use crate::chat::config::RelayConfig;
use crate::chat::handler::handle_connection;
use crate::chat::registry::Registry;
use crate::chat::relations::RelationStore;
use crate::chat::router::Router;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

/// Pause after the first failed accept; doubles per consecutive failure
const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);
/// Longest pause between accept retries
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Delay before retrying after `failures` consecutive accept errors
fn accept_backoff(failures: u32) -> Duration {
    let doublings = failures.saturating_sub(1).min(16);
    ACCEPT_BACKOFF_MIN
        .saturating_mul(1 << doublings)
        .min(ACCEPT_BACKOFF_MAX)
}

/// State shared by every connection handler
pub struct Relay {
    pub config: RelayConfig,
    pub registry: Arc<Registry>,
    pub relations: Arc<RelationStore>,
    pub router: Arc<Router>,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(Registry::new());
        let relations = Arc::new(RelationStore::new(registry.clone()));
        let router = Arc::new(Router::new(registry.clone(), relations.clone()));

        Self {
            config,
            registry,
            relations,
            router,
        }
    }
}

/// A bound relay server, ready to accept connections
pub struct RelayServer {
    listener: TcpListener,
    relay: Arc<Relay>,
    slots: Arc<Semaphore>,
}

impl RelayServer {
    /// Bind the listener described by `config`
    pub async fn bind(config: RelayConfig) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

        let slots = Arc::new(Semaphore::new(config.max_connections));
        let relay = Arc::new(Relay::new(config));

        Ok(Self {
            listener,
            relay,
            slots,
        })
    }

    /// Address actually bound, useful when the config asked for port 0
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read listener address")
    }

    pub fn relay(&self) -> Arc<Relay> {
        self.relay.clone()
    }

    /// Accept connections until a shutdown signal arrives.
    ///
    /// Each connection runs on its own task and holds a connection slot for
    /// its lifetime. When all slots are taken, accepting pauses.
    pub async fn run(self, shutdown_rx: &mut mpsc::UnboundedReceiver<()>) -> Result<()> {
        let addr = self.local_addr()?;
        tracing::info!("Relay listening on {}", addr);
        let mut accept_failures = 0u32;

        loop {
            if self.slots.available_permits() == 0 {
                tracing::warn!(
                    "Connection limit ({}) reached, waiting for a free slot",
                    self.relay.config.max_connections
                );
            }

            let permit = tokio::select! {
                permit = self.slots.clone().acquire_owned() => {
                    permit.context("Connection slots closed")?
                }
                _ = shutdown_rx.recv() => break,
            };

            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            accept_failures = 0;
                            let relay = self.relay.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, peer.to_string(), relay).await;
                                drop(permit);
                            });
                        }
                        Err(e) => {
                            accept_failures = accept_failures.saturating_add(1);
                            let pause = accept_backoff(accept_failures);
                            tracing::error!("Accept error: {} (retrying in {:?})", e, pause);
                            tokio::select! {
                                _ = tokio::time::sleep(pause) => {}
                                _ = shutdown_rx.recv() => break,
                            }
                        }
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }

        tracing::info!("Listener shutting down");
        Ok(())
    }

    /// Run on a background task and return a handle to it
    pub fn spawn(self) -> Result<RelayHandle> {
        let addr = self.local_addr()?;
        let relay = self.relay.clone();
        let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            if let Err(e) = self.run(&mut shutdown_rx).await {
                tracing::error!("Relay listener error: {}", e);
            }
        });

        Ok(RelayHandle {
            addr,
            relay,
            shutdown_tx,
            task,
        })
    }
}

/// Handle to a relay running in the background
pub struct RelayHandle {
    addr: SocketAddr,
    relay: Arc<Relay>,
    shutdown_tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl RelayHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn relay(&self) -> Arc<Relay> {
        self.relay.clone()
    }

    /// Stop accepting new connections and wait for the listener to exit.
    ///
    /// Sessions already running keep going until their clients leave.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .context("Failed to send listener shutdown")?;

        self.task.await.context("Listener task failed")?;
        Ok(())
    }
}
