// Message routing across registered sessions

use crate::chat::command::{Command, ServerLine};
use crate::chat::error::ChatError;
use crate::chat::registry::Registry;
use crate::chat::relations::RelationStore;
use crate::chat::session::Session;
use std::sync::Arc;

/// Outcome of dispatching one registered-state line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    Quit,
}

/// Resolves recipients and delivers lines.
///
/// Reads a registry snapshot and the relation store for every decision.
/// Delivery is best-effort: a failed send to one recipient is logged and
/// the rest still receive the line.
pub struct Router {
    registry: Arc<Registry>,
    relations: Arc<RelationStore>,
}

impl Router {
    pub fn new(registry: Arc<Registry>, relations: Arc<RelationStore>) -> Self {
        Self {
            registry,
            relations,
        }
    }

    /// Deliver `text` from `sender` to every registered session it is not
    /// blocked from. Returns the number of recipients reached.
    pub async fn deliver_broadcast(&self, sender: &str, text: &str) -> usize {
        let recipients = self.registry.all().await;
        self.deliver_filtered(sender, text, recipients).await
    }

    /// Deliver `text` to `sender`'s private group plus the sender.
    ///
    /// Group members that are no longer routable are skipped.
    pub async fn deliver_private(&self, sender: &str, text: &str) -> usize {
        let mut recipients = Vec::new();
        for member in self.relations.group_members(sender).await {
            if let Some(session) = self.registry.lookup(&member).await {
                recipients.push(session);
            }
        }
        if let Some(me) = self.registry.lookup(sender).await {
            recipients.push(me);
        }

        self.deliver_filtered(sender, text, recipients).await
    }

    async fn deliver_filtered(&self, sender: &str, text: &str, recipients: Vec<Session>) -> usize {
        let line = ServerLine::chat(sender, text).to_string();
        let mut delivered = 0;

        for recipient in recipients {
            if self.relations.is_blocked(sender, recipient.name()).await {
                tracing::debug!("Skipping {} -> {} (blocked)", sender, recipient.name());
                continue;
            }
            if Self::send(&recipient, &line) {
                delivered += 1;
            }
        }

        delivered
    }

    /// Announce a join to every routable session.
    ///
    /// Must run before the joiner is activated, so it never sees its own
    /// announcement.
    pub async fn announce_join(&self, name: &str) {
        self.announce(ServerLine::joined(name)).await;
    }

    /// Announce a departure to every session still routable
    pub async fn announce_leave(&self, name: &str) {
        self.announce(ServerLine::left(name)).await;
    }

    // Presence lines ignore block lists.
    async fn announce(&self, line: ServerLine) {
        let line = line.to_string();
        for session in self.registry.all().await {
            Self::send(&session, &line);
        }
    }

    fn send(recipient: &Session, line: &str) -> bool {
        match recipient.send_line(line) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to deliver to {}: {}", recipient.name(), e);
                false
            }
        }
    }

    /// Apply one parsed command on behalf of `actor`.
    ///
    /// Each name in a list command is handled on its own; a rejected name
    /// is reported to the actor and the rest are still processed.
    pub async fn dispatch(&self, actor: &Session, command: Command) -> Dispatch {
        let owner = actor.name();
        match command {
            Command::Quit => return Dispatch::Quit,
            Command::Message { private: true, text } => {
                self.deliver_private(owner, &text).await;
            }
            Command::Message { private: false, text } => {
                self.deliver_broadcast(owner, &text).await;
            }
            Command::Block(names) => {
                for name in names {
                    let result = self.relations.block(owner, &name).await;
                    Self::report(actor, result);
                }
            }
            Command::Unblock(names) => {
                for name in names {
                    let result = self.relations.unblock(owner, &name).await;
                    Self::report(actor, result);
                }
            }
            Command::GroupAdd(names) => {
                for name in names {
                    let result = self.relations.add_to_group(owner, &name).await;
                    Self::report(actor, result);
                }
            }
            Command::GroupRemove(names) => {
                for name in names {
                    self.relations.remove_from_group(owner, &name).await;
                }
            }
        }

        Dispatch::Continue
    }

    fn report(actor: &Session, result: Result<(), ChatError>) {
        match result {
            Ok(()) => {}
            Err(e @ (ChatError::SelfBlock(_) | ChatError::SelfGroup(_))) => {
                tracing::info!("Rejected for {}: {}", actor.name(), e);
                Self::send(actor, &ServerLine::Message(e.to_string()).to_string());
            }
            Err(ChatError::UnregisteredGroupTarget(name)) => {
                tracing::debug!("{} tried to add unregistered {}", actor.name(), name);
            }
            Err(e) => {
                tracing::warn!("Unexpected relation error for {}: {}", actor.name(), e);
            }
        }
    }

    /// Release everything a departing session held and tell the others.
    pub async fn depart(&self, name: &str) {
        self.relations.release(name).await;
        self.announce_leave(name).await;
    }
}
