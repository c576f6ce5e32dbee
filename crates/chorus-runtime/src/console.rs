//! Console state: frame cache + status board + cached backend directory.
//!
//! One instance per daemon, constructed in `run_daemon` and passed down —
//! never a module-level singleton.

use chrono::{DateTime, Utc};

use chorus_core::types::{App, FrameKind, Workspace};
use chorus_frame_cache::{CacheConfig, FrameCache};
use chorus_watcher::StatusBoard;

/// Cached lists fetched from the backend for display.
#[derive(Debug, Default)]
pub struct Directory {
    pub workspaces: Vec<Workspace>,
    pub apps: Vec<App>,
    pub fetched_at: Option<DateTime<Utc>>,
}

pub struct ConsoleState {
    pub cache: FrameCache,
    pub board: StatusBoard,
    pub directory: Directory,
    /// Cleared on forced logout (current-user fetch failing).
    pub authenticated: bool,
}

impl ConsoleState {
    pub fn new(cache_config: CacheConfig) -> Self {
        Self {
            cache: FrameCache::new(cache_config),
            board: StatusBoard::new(),
            directory: Directory::default(),
            authenticated: true,
        }
    }

    /// Close one frame and drop its lifecycle state with it.
    pub fn close_frame(&mut self, id: &str, now: DateTime<Utc>) {
        self.cache.close_frame(id, now);
        self.board.remove(id);
    }

    /// The cleanup dialog's "Close All".
    pub fn clear_all(&mut self, now: DateTime<Utc>) {
        self.cache.clear_all(now);
        self.board.clear();
    }

    pub fn remove_recent(&mut self, id: &str, kind: FrameKind, now: DateTime<Utc>) {
        self.cache.remove_from_recent(id, kind, now);
    }

    /// Forced logout: drop everything tied to the expired session.
    pub fn logout(&mut self, now: DateTime<Utc>) {
        self.clear_all(now);
        self.directory = Directory::default();
        self.authenticated = false;
    }
}

// ─── Tests ───────────────────────────────────────────────────────
