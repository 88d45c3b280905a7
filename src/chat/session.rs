// Per-connection session state and its outbound sink

use anyhow::{Context, Result};
use std::fmt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Opaque identifier, one per accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Sending half of a session's outbound line queue.
pub type LineSender = mpsc::UnboundedSender<String>;

/// Receiving half, drained by the session's writer task.
pub type LineReceiver = mpsc::UnboundedReceiver<String>;

/// A named session as seen by the registry and router.
///
/// Cloning is cheap: clones share the same outbound queue.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    name: String,
    tx: LineSender,
}

impl Session {
    pub fn new(id: SessionId, name: String, tx: LineSender) -> Self {
        Self { id, name, tx }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue one line for delivery. The newline is added by the writer.
    pub fn send_line(&self, line: impl Into<String>) -> Result<()> {
        self.tx
            .send(line.into())
            .context("Failed to send line to session")
    }
}

/// Create the outbound queue for a new connection
pub fn line_channel() -> (LineSender, LineReceiver) {
    mpsc::unbounded_channel()
}

/// Spawn the task that writes queued lines to the connection.
///
/// The task ends when every sender is dropped or a write fails.
pub fn spawn_writer<W>(mut writer: W, mut rx: LineReceiver) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(mut line) = rx.recv().await {
            line.push('\n');
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                tracing::debug!("Writer stopped: {}", e);
                break;
            }
            if writer.flush().await.is_err() {
                break;
            }
        }
        let _ = writer.shutdown().await;
    })
}
