//! Entity lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an entity stands relative to the remote store.
///
/// The full transition set is driven by attach, property writes, deletion,
/// merges, and accept/reject; see the manager and aspect operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityState {
    /// Not tracked by any manager.
    Detached,
    /// Locally created, not yet known to the remote store.
    Added,
    /// Tracked and identical to the last known remote state.
    Unchanged,
    /// Tracked with local property changes.
    Modified,
    /// Tracked and locally scheduled for deletion.
    Deleted,
}

impl EntityState {
    /// Check if the entity is tracked by a manager.
    pub fn is_attached(&self) -> bool {
        !matches!(self, EntityState::Detached)
    }

    /// Check if the entity carries unsaved changes.
    pub fn has_changes(&self) -> bool {
        matches!(
            self,
            EntityState::Added | EntityState::Modified | EntityState::Deleted
        )
    }

    /// Check if the entity is scheduled for deletion.
    pub fn is_deleted(&self) -> bool {
        matches!(self, EntityState::Deleted)
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityState::Detached => "Detached",
            EntityState::Added => "Added",
            EntityState::Unchanged => "Unchanged",
            EntityState::Modified => "Modified",
            EntityState::Deleted => "Deleted",
        };
        f.write_str(s)
    }
}
