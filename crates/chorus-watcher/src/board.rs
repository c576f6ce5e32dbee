//! Status read model: last observed lifecycle state per watched id.
//!
//! The board never decides which ids exist — the daemon applies updates
//! only for ids still present in the frame cache (stale-update guard),
//! so a response racing a close is dropped before it reaches here.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use chorus_core::types::{FrameKind, LifecycleStatus};

use crate::watcher::StatusUpdate;

/// Monotonic version counter for change tracking.
pub type BoardVersion = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleState {
    pub id: String,
    pub kind: FrameKind,
    pub status: LifecycleStatus,
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Per-id lifecycle states with version-based change tracking, so the
/// RPC layer can serve toast-style notifications via `changes_since`.
#[derive(Debug, Default)]
pub struct StatusBoard {
    states: HashMap<String, LifecycleState>,
    version: BoardVersion,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an observed update. Returns true when the visible state
    /// changed (new id, status transition, or new diagnostic message).
    pub fn apply(&mut self, update: StatusUpdate) -> bool {
        let new_state = LifecycleState {
            id: update.id.clone(),
            kind: update.kind,
            status: update.report.status,
            message: update.report.message,
            updated_at: update.observed_at,
        };

        let changed = self.states.get(&update.id).is_none_or(|existing| {
            existing.status != new_state.status || existing.message != new_state.message
        });

        if changed {
            self.version += 1;
        }
        self.states.insert(update.id, new_state);
        changed
    }

    /// Drop the state for a closed frame.
    pub fn remove(&mut self, id: &str) {
        self.states.remove(id);
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn get(&self, id: &str) -> Option<&LifecycleState> {
        self.states.get(id)
    }

    /// All tracked states, sorted by id.
    pub fn list(&self) -> Vec<&LifecycleState> {
        let mut states: Vec<_> = self.states.values().collect();
        states.sort_by(|a, b| a.id.cmp(&b.id));
        states
    }

    pub fn version(&self) -> BoardVersion {
        self.version
    }

    /// True when anything changed after `since_version`.
    pub fn changed_since(&self, since_version: BoardVersion) -> bool {
        self.version > since_version
    }
}

// ─── Tests ───────────────────────────────────────────────────────
