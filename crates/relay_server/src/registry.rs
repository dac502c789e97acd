//! Authoritative participant registry.
//!
//! This module holds the server-owned mapping from participant identity to
//! that participant's latest known pose. The registry is the only piece of
//! cross-connection shared mutable state in the relay core.

use presence_protocol::{ParticipantId, Pose, RegistrySnapshot};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Server-side authoritative map of identity to latest pose.
///
/// The registry applies last-writer-wins semantics per identity: a new
/// update fully replaces the previous pose, and no ordering or versioning
/// is preserved beyond "most recent write observed wins". Entries are
/// created on a participant's first update and removed exactly once on
/// disconnect.
///
/// # Concurrency
///
/// Uses `RwLock<HashMap>` so that `upsert`, `remove`, and `snapshot` are
/// each atomic when called from many connection-handling tasks. A snapshot
/// never observes a partially-applied mutation.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    /// Map of participant identity to latest pose
    poses: RwLock<HashMap<ParticipantId, Pose>>,
}

impl ParticipantRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the pose for `id`.
    ///
    /// No constraints on the pose values are enforced — the relay does not
    /// bounds-check or sanity-check submitted poses, and out-of-range values
    /// propagate to all clients as-is.
    ///
    /// # Arguments
    ///
    /// * `id` - The participant identity to write
    /// * `pose` - The new pose, fully replacing any previous record
    pub async fn upsert(&self, id: ParticipantId, pose: Pose) {
        let mut poses = self.poses.write().await;
        poses.insert(id, pose);
    }

    /// Removes the entry for `id` if present.
    ///
    /// An absent identity is a benign no-op, not an error, which makes
    /// duplicate disconnect events idempotent.
    ///
    /// # Returns
    ///
    /// `true` if an entry was removed, `false` if the identity was absent.
    pub async fn remove(&self, id: ParticipantId) -> bool {
        let mut poses = self.poses.write().await;
        let removed = poses.remove(&id).is_some();
        if removed {
            debug!("🗑️ Registry entry for {} removed", id);
        }
        removed
    }

    /// Returns an owned copy of the full mapping for broadcast.
    ///
    /// The copy is detached from the live map, so a concurrent update can
    /// never mutate a snapshot mid-broadcast.
    pub async fn snapshot(&self) -> RegistrySnapshot {
        let poses = self.poses.read().await;
        poses.clone()
    }

    /// Number of participants currently in the registry.
    pub async fn len(&self) -> usize {
        let poses = self.poses.read().await;
        poses.len()
    }

    /// Whether the registry currently has no participants.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
