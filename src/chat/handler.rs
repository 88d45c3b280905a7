// Per-connection control loop

use crate::chat::codec::LineCodec;
use crate::chat::command::{is_quit, Command, ServerLine};
use crate::chat::error::{ChatError, ChatResult};
use crate::chat::router::Dispatch;
use crate::chat::server::Relay;
use crate::chat::session::{line_channel, spawn_writer, LineSender, Session, SessionId};
use futures::{FutureExt, Stream, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::FramedRead;
use tracing::Instrument;

/// How long queued output may take to flush after a session closes
const WRITER_GRACE: Duration = Duration::from_secs(5);

/// Connection lifecycle
#[derive(Debug, Clone)]
pub enum HandlerState {
    Connecting,
    AwaitingName,
    Registered(Session),
    Closed,
}

/// Drives one connection from handshake to cleanup.
pub struct ConnectionHandler {
    id: SessionId,
    state: HandlerState,
    name: Option<String>,
    tx: LineSender,
    relay: Arc<Relay>,
}

impl ConnectionHandler {
    pub fn new(id: SessionId, tx: LineSender, relay: Arc<Relay>) -> Self {
        Self {
            id,
            state: HandlerState::Connecting,
            name: None,
            tx,
            relay,
        }
    }

    pub fn state(&self) -> &HandlerState {
        &self.state
    }

    /// Name bound during the handshake, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Run the state machine until the session closes.
    ///
    /// `lines` yields decoded inbound lines; its end is the client's EOF.
    pub async fn run<L>(&mut self, lines: &mut L) -> ChatResult<()>
    where
        L: Stream<Item = ChatResult<String>> + Unpin,
    {
        loop {
            match &self.state {
                HandlerState::Connecting => {
                    self.send(ServerLine::SubmitName)?;
                    self.state = HandlerState::AwaitingName;
                }
                HandlerState::AwaitingName => {
                    let Some(candidate) = lines.next().await.transpose()? else {
                        self.state = HandlerState::Closed;
                        continue;
                    };
                    if is_quit(&candidate) {
                        self.state = HandlerState::Closed;
                        continue;
                    }
                    self.try_register(candidate).await?;
                }
                HandlerState::Registered(session) => {
                    let session = session.clone();
                    let Some(line) = lines.next().await.transpose()? else {
                        self.state = HandlerState::Closed;
                        continue;
                    };
                    if line.is_empty() {
                        continue;
                    }
                    let command = Command::parse(&line);
                    if self.relay.router.dispatch(&session, command).await == Dispatch::Quit {
                        tracing::info!("{} quit", session.name());
                        self.state = HandlerState::Closed;
                    }
                }
                HandlerState::Closed => return Ok(()),
            }
        }
    }

    async fn try_register(&mut self, candidate: String) -> ChatResult<()> {
        match self.relay.registry.register(self.id, &candidate).await {
            Ok(()) => {
                self.name = Some(candidate.clone());
                self.send(ServerLine::NameAccepted(candidate.clone()))?;

                // Others hear about the join before the joiner becomes routable.
                self.relay.router.announce_join(&candidate).await;

                let session = Session::new(self.id, candidate, self.tx.clone());
                self.relay.registry.activate(session.clone()).await;
                tracing::info!("{} joined", session.name());
                self.state = HandlerState::Registered(session);
            }
            Err(e) => {
                tracing::debug!("Rejected name {:?}: {}", candidate, e);
                self.send(ServerLine::SubmitName)?;
            }
        }
        Ok(())
    }

    /// Release the name and announce the departure, if a name was bound.
    pub async fn close(&mut self) {
        self.state = HandlerState::Closed;
        if let Some(name) = self.name.take() {
            self.relay.router.depart(&name).await;
            tracing::info!("{} left", name);
        }
    }

    fn send(&self, line: ServerLine) -> ChatResult<()> {
        self.tx.send(line.to_string()).map_err(|_| {
            ChatError::Connection(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "writer closed",
            ))
        })
    }
}

/// Serve one accepted connection to completion.
///
/// Cleanup runs on every exit path, including a panic inside the loop.
pub async fn handle_connection<S>(stream: S, peer: String, relay: Arc<Relay>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let id = SessionId::new();
    let span = tracing::info_span!("session", %id, %peer);

    async move {
        tracing::info!("Connection accepted");

        let (read_half, write_half) = tokio::io::split(stream);
        let (tx, rx) = line_channel();
        let writer = spawn_writer(write_half, rx);

        let codec = LineCodec::new(relay.config.max_line_length);
        let mut lines = FramedRead::new(read_half, codec);
        let mut handler = ConnectionHandler::new(id, tx, relay);

        let outcome = AssertUnwindSafe(handler.run(&mut lines))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::info!("Session ended: {}", e),
            Err(_) => tracing::error!("Session handler panicked"),
        }

        handler.close().await;
        drop(handler);

        let abort = writer.abort_handle();
        if tokio::time::timeout(WRITER_GRACE, writer).await.is_err() {
            abort.abort();
        }

        tracing::info!("Connection closed");
    }
    .instrument(span)
    .await
}
