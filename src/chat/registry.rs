// Live name registry

use crate::chat::error::{ChatError, ChatResult};
use crate::chat::session::{Session, SessionId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Registry slot for a claimed name.
///
/// A name is claimed during the handshake and only becomes routable once
/// the join announcement has gone out.
#[derive(Debug, Clone)]
enum Slot {
    Reserved(SessionId),
    Active(Session),
}

/// Authoritative mapping of display name to session.
///
/// At most one live session holds a given name. All mutation happens under
/// a single write lock, so concurrent claims on one name have exactly one
/// winner.
pub struct Registry {
    slots: RwLock<HashMap<String, Slot>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Claim `name` for session `id`.
    ///
    /// Rejects blank names and names already present, whether active or
    /// still in their handshake.
    pub async fn register(&self, id: SessionId, name: &str) -> ChatResult<()> {
        if name.trim().is_empty() {
            return Err(ChatError::DuplicateOrBlankName);
        }

        let mut slots = self.slots.write().await;
        if slots.contains_key(name) {
            return Err(ChatError::DuplicateOrBlankName);
        }
        slots.insert(name.to_string(), Slot::Reserved(id));
        tracing::info!("Name {} claimed by session {}", name, id);
        Ok(())
    }

    /// Make a claimed name visible to routing.
    ///
    /// Returns false if the name is not held by this session, which leaves
    /// the registry untouched.
    pub async fn activate(&self, session: Session) -> bool {
        let mut slots = self.slots.write().await;
        match slots.get(session.name()) {
            Some(Slot::Reserved(id)) if *id == session.id() => {
                slots.insert(session.name().to_string(), Slot::Active(session));
                true
            }
            _ => false,
        }
    }

    /// Release `name`. No-op if absent.
    pub async fn unregister(&self, name: &str) {
        let mut slots = self.slots.write().await;
        if slots.remove(name).is_some() {
            tracing::info!("Name {} released", name);
        }
    }

    /// Whether `name` is currently held by a live session
    pub async fn is_registered(&self, name: &str) -> bool {
        let slots = self.slots.read().await;
        slots.contains_key(name)
    }

    /// Look up a routable session by name
    pub async fn lookup(&self, name: &str) -> Option<Session> {
        let slots = self.slots.read().await;
        match slots.get(name) {
            Some(Slot::Active(session)) => Some(session.clone()),
            _ => None,
        }
    }

    /// Snapshot of every routable session.
    ///
    /// The returned vector is owned, so later registry changes do not
    /// affect a caller iterating over it.
    pub async fn all(&self) -> Vec<Session> {
        let slots = self.slots.read().await;
        slots
            .values()
            .filter_map(|slot| match slot {
                Slot::Active(session) => Some(session.clone()),
                Slot::Reserved(_) => None,
            })
            .collect()
    }

    /// Number of claimed names, including those still in the handshake
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
