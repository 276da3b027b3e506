use serde_json::Value;
use tracing::debug;

use super::interaction::Interaction;
use crate::entity::{decode_collection, Entity};

/// The two views a hook keeps and the guard between them.
///
/// `remote` always holds the latest snapshot. `local` is what gets rendered:
/// it follows `remote` except while an interaction is active, so a snapshot
/// arriving mid-drag cannot move the entity under the pointer.
#[derive(Debug, Clone)]
pub struct SyncState<E> {
    remote: Vec<E>,
    local: Vec<E>,
    interaction: Option<Interaction>,
}

impl<E> Default for SyncState<E> {
    fn default() -> Self {
        Self {
            remote: Vec::new(),
            local: Vec::new(),
            interaction: None,
        }
    }
}

impl<E: Entity> SyncState<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remote(&self) -> &[E] {
        &self.remote
    }

    pub fn local(&self) -> &[E] {
        &self.local
    }

    pub fn interaction(&self) -> Option<&Interaction> {
        self.interaction.as_ref()
    }

    pub fn local_entity(&self, id: &str) -> Option<&E> {
        self.local.iter().find(|e| e.id() == id)
    }

    pub fn local_entity_mut(&mut self, id: &str) -> Option<&mut E> {
        self.local.iter_mut().find(|e| e.id() == id)
    }

    pub fn remote_entity(&self, id: &str) -> Option<&E> {
        self.remote.iter().find(|e| e.id() == id)
    }

    /// Decode and accept a wire snapshot. Returns true if the local view changed.
    pub fn apply_snapshot(&mut self, snapshot: &Value) -> bool {
        self.accept(decode_collection(snapshot))
    }

    /// Accept a decoded snapshot. Returns true if the local view changed.
    pub fn accept(&mut self, entities: Vec<E>) -> bool {
        self.remote = entities;
        if let Some(interaction) = &self.interaction {
            debug!(id = %interaction.id, "holding local view during interaction");
            return false;
        }
        self.resync()
    }

    /// Copy the remote snapshot into the local view. Reapplying the same
    /// snapshot is a no-op.
    pub fn resync(&mut self) -> bool {
        if self.local == self.remote {
            return false;
        }
        self.local = self.remote.clone();
        true
    }

    /// Start an interaction, replacing any active one.
    pub fn begin(&mut self, interaction: Interaction) -> Option<Interaction> {
        self.interaction.replace(interaction)
    }

    pub fn end(&mut self) -> Option<Interaction> {
        self.interaction.take()
    }
}
