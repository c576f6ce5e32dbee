//! The frame cache: open/switch/close without reload.
//!
//! All operations are synchronous, infallible state transitions; `now` is
//! passed in explicitly so tests are deterministic. Change tracking is
//! version-based: clients poll `changes_since(version)`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use chorus_core::types::{CachedFrame, FrameKind, RecentReference};
use chorus_core::urls;

/// Monotonic version counter for change tracking.
pub type StateVersion = u64;

/// Retained change-log length. A client further behind than this window
/// refetches the full frame list instead of replaying changes.
const CHANGE_LOG_CAP: usize = 256;

/// Notification that the cache changed. `frame_id` is `None` for bulk
/// operations (`clear_all`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameChange {
    pub version: StateVersion,
    pub frame_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Cache configuration. Construction-time, not derived.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Display cap for the recents bar. The cache itself is unbounded;
    /// frames leave only through `close_frame` / `clear_all`.
    pub recent_display_cap: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            recent_display_cap: 8,
        }
    }
}

/// In-memory display-frame cache.
///
/// Single-threaded, deterministic, no IO. At most one frame is active
/// (visible) at any time; all others are cached but hidden, never
/// destroyed except by an explicit close or clear.
#[derive(Debug)]
pub struct FrameCache {
    /// Cached frames keyed by frame id.
    frames: HashMap<String, CachedFrame>,
    /// Currently visible frame, if any.
    active: Option<String>,
    /// Recents order, most-recently-activated first. `remove_from_recent`
    /// drops entries here without touching the frame itself.
    recents: Vec<(String, FrameKind)>,
    version: StateVersion,
    changes: Vec<FrameChange>,
    config: CacheConfig,
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl FrameCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            frames: HashMap::new(),
            active: None,
            recents: Vec::new(),
            version: 0,
            changes: Vec::new(),
            config,
        }
    }

    // ── Operations ─────────────────────────────────────────────────

    /// Open a workbench session frame and make it visible.
    ///
    /// If the id is already cached the existing frame is reused as-is
    /// (its `source_url` is preserved, so the loaded content is not
    /// interrupted); only `name` and `last_accessed_at` are refreshed.
    /// The previously active frame becomes hidden, not destroyed.
    pub fn open_session(
        &mut self,
        id: &str,
        workspace_id: &str,
        name: &str,
        now: DateTime<Utc>,
    ) {
        if !self.frames.contains_key(id) {
            self.frames.insert(
                id.to_owned(),
                CachedFrame {
                    id: id.to_owned(),
                    kind: FrameKind::Session,
                    name: name.to_owned(),
                    source_url: urls::workbench_stream_path(id),
                    workspace_id: Some(workspace_id.to_owned()),
                    last_accessed_at: now,
                },
            );
        }
        self.activate(id, name, now);
    }

    /// Open an external web-app frame and make it visible.
    ///
    /// Symmetric to [`open_session`](Self::open_session); the source URL
    /// comes from the app definition and is treated as opaque.
    pub fn open_webapp(&mut self, id: &str, name: &str, source_url: &str, now: DateTime<Utc>) {
        if !self.frames.contains_key(id) {
            self.frames.insert(
                id.to_owned(),
                CachedFrame {
                    id: id.to_owned(),
                    kind: FrameKind::Webapp,
                    name: name.to_owned(),
                    source_url: source_url.to_owned(),
                    workspace_id: None,
                    last_accessed_at: now,
                },
            );
        }
        self.activate(id, name, now);
    }

    /// Remove a frame unconditionally. If it was active, active becomes
    /// `None` (the caller navigates away). Closing an unknown id is a
    /// no-op: no state change, no version bump.
    pub fn close_frame(&mut self, id: &str, now: DateTime<Utc>) {
        if self.frames.remove(id).is_none() {
            return;
        }
        // Keep the two lists consistent: a closed frame leaves the
        // recents bar as well.
        self.recents.retain(|(rid, _)| rid != id);
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }
        self.record_change(Some(id), now);
    }

    /// Remove every cached frame and deactivate. No-op on an already
    /// empty cache.
    pub fn clear_all(&mut self, now: DateTime<Utc>) {
        if self.frames.is_empty() && self.active.is_none() && self.recents.is_empty() {
            return;
        }
        self.frames.clear();
        self.recents.clear();
        self.active = None;
        self.record_change(None, now);
    }

    /// Drop an entry from the recents bar without closing the underlying
    /// frame. The frame (if cached) stays loaded and switchable.
    pub fn remove_from_recent(&mut self, id: &str, kind: FrameKind, now: DateTime<Utc>) {
        let before = self.recents.len();
        self.recents
            .retain(|(rid, rkind)| !(rid == id && *rkind == kind));
        if self.recents.len() != before {
            self.record_change(Some(id), now);
        }
    }

    // ── Queries ────────────────────────────────────────────────────

    pub fn is_cached(&self, id: &str) -> bool {
        self.frames.contains_key(id)
    }

    /// Id of the currently visible frame, if any.
    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active(&self) -> Option<&CachedFrame> {
        self.active.as_deref().and_then(|id| self.frames.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&CachedFrame> {
        self.frames.get(id)
    }

    /// All cached frames, sorted by id.
    pub fn list_frames(&self) -> Vec<&CachedFrame> {
        let mut frames: Vec<_> = self.frames.values().collect();
        frames.sort_by(|a, b| a.id.cmp(&b.id));
        frames
    }

    /// The recents bar for one kind: most-recently-activated first,
    /// capped at `recent_display_cap`. Entries whose frame is gone are
    /// skipped (close keeps the lists consistent, so this is belt only).
    pub fn recent(&self, kind: FrameKind) -> Vec<RecentReference> {
        self.recents
            .iter()
            .filter(|(_, rkind)| *rkind == kind)
            .filter_map(|(rid, _)| self.frames.get(rid))
            .map(|frame| RecentReference {
                id: frame.id.clone(),
                kind: frame.kind,
                name: frame.name.clone(),
                last_accessed_at: frame.last_accessed_at,
            })
            .take(self.config.recent_display_cap)
            .collect()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn version(&self) -> StateVersion {
        self.version
    }

    /// Changes since a given version, oldest first. Only the last
    /// `CHANGE_LOG_CAP` entries are retained.
    pub fn changes_since(&self, since_version: StateVersion) -> Vec<&FrameChange> {
        let start = self.changes.partition_point(|c| c.version <= since_version);
        self.changes[start..].iter().collect()
    }

    /// Drop change entries with version <= `before_version` once all
    /// clients have acknowledged past it.
    pub fn trim_changes_before(&mut self, before_version: StateVersion) {
        self.changes.retain(|c| c.version > before_version);
    }

    // ── Internals ──────────────────────────────────────────────────

    /// Make `id` the single visible frame and refresh its recents slot.
    /// The frame must already be in the map.
    fn activate(&mut self, id: &str, name: &str, now: DateTime<Utc>) {
        let kind = match self.frames.get_mut(id) {
            Some(frame) => {
                frame.name = name.to_owned();
                frame.last_accessed_at = now;
                frame.kind
            }
            None => return,
        };

        self.active = Some(id.to_owned());

        // Move-to-front in the recents order.
        self.recents
            .retain(|(rid, rkind)| !(rid == id && *rkind == kind));
        self.recents.insert(0, (id.to_owned(), kind));

        self.record_change(Some(id), now);
    }

    fn record_change(&mut self, frame_id: Option<&str>, now: DateTime<Utc>) {
        self.version += 1;
        self.changes.push(FrameChange {
            version: self.version,
            frame_id: frame_id.map(str::to_owned),
            timestamp: now,
        });
        if self.changes.len() > CHANGE_LOG_CAP {
            let excess = self.changes.len() - CHANGE_LOG_CAP;
            self.changes.drain(..excess);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-25T12:00:00Z")
            .expect("valid")
            .with_timezone(&Utc)
    }

    // ── 1. Opening a new session creates exactly one frame ─────────

    #[test]
    fn open_new_session() {
        let mut cache = FrameCache::default();
        let now = t0();

        cache.open_session("wb-1", "ws-1", "Analysis", now);

        assert_eq!(cache.frame_count(), 1);
        assert_eq!(cache.active_id(), Some("wb-1"));
        let frame = cache.get("wb-1").expect("cached");
        assert_eq!(frame.kind, FrameKind::Session);
        assert_eq!(frame.name, "Analysis");
        assert_eq!(frame.source_url, "/api/rest/v2/workbenchs/wb-1/stream");
        assert_eq!(frame.workspace_id.as_deref(), Some("ws-1"));
        assert_eq!(frame.last_accessed_at, now);
    }

    // ── 2. Switching hides but keeps the previous frame ────────────

    #[test]
    fn switch_keeps_previous_frame() {
        let mut cache = FrameCache::default();
        let t = t0();

        cache.open_session("wb-1", "ws-1", "One", t);
        cache.open_session("wb-2", "ws-1", "Two", t + TimeDelta::seconds(1));

        assert_eq!(cache.active_id(), Some("wb-2"));
        assert!(cache.is_cached("wb-1"), "hidden frame remains cached");
        assert_eq!(cache.frame_count(), 2);
    }

    // ── 3. Duplicate open updates, never duplicates ────────────────

    #[test]
    fn duplicate_open_updates_in_place() {
        let mut cache = FrameCache::default();
        let t = t0();

        cache.open_session("wb-1", "ws-1", "Old name", t);
        let original_url = cache.get("wb-1").expect("cached").source_url.clone();

        let t2 = t + TimeDelta::seconds(30);
        cache.open_session("wb-1", "ws-1", "New name", t2);

        assert_eq!(cache.frame_count(), 1, "no second entry");
        let frame = cache.get("wb-1").expect("cached");
        assert_eq!(frame.name, "New name");
        assert_eq!(frame.last_accessed_at, t2);
        assert_eq!(frame.source_url, original_url, "no reload");
        assert_eq!(cache.active_id(), Some("wb-1"));
    }

    // ── 4. Close removes frame and deactivates ─────────────────────

    #[test]
    fn close_active_frame() {
        let mut cache = FrameCache::default();
        let t = t0();

        cache.open_session("wb-1", "ws-1", "One", t);
        cache.close_frame("wb-1", t + TimeDelta::seconds(1));

        assert!(!cache.is_cached("wb-1"));
        assert_eq!(cache.active_id(), None);
        assert!(cache.recent(FrameKind::Session).is_empty());
    }

    #[test]
    fn close_hidden_frame_keeps_active() {
        let mut cache = FrameCache::default();
        let t = t0();

        cache.open_session("wb-1", "ws-1", "One", t);
        cache.open_webapp("app-1", "App One", "https://app.example", t);
        cache.close_frame("wb-1", t + TimeDelta::seconds(1));

        assert_eq!(cache.active_id(), Some("app-1"), "active untouched");
        assert!(!cache.is_cached("wb-1"));
    }

    // ── 5. Closing an unknown id is a no-op ────────────────────────

    #[test]
    fn close_unknown_id_noop() {
        let mut cache = FrameCache::default();
        let t = t0();

        cache.open_session("wb-1", "ws-1", "One", t);
        let version = cache.version();

        cache.close_frame("nope", t + TimeDelta::seconds(1));

        assert_eq!(cache.frame_count(), 1);
        assert_eq!(cache.active_id(), Some("wb-1"));
        assert_eq!(cache.version(), version, "no version bump");
    }

    // ── 6. clear_all empties everything ────────────────────────────

    #[test]
    fn clear_all_empties() {
        let mut cache = FrameCache::default();
        let t = t0();

        cache.open_session("wb-1", "ws-1", "One", t);
        cache.open_webapp("app-1", "App", "https://a.example", t);
        cache.clear_all(t + TimeDelta::seconds(1));

        assert_eq!(cache.frame_count(), 0);
        assert_eq!(cache.active_id(), None);
        assert!(cache.recent(FrameKind::Session).is_empty());
        assert!(cache.recent(FrameKind::Webapp).is_empty());
    }

    #[test]
    fn clear_all_on_empty_cache_noop() {
        let mut cache = FrameCache::default();
        cache.clear_all(t0());
        assert_eq!(cache.version(), 0);
    }

    // ── 7. Scenario from the lifecycle walk-through ────────────────

    #[test]
    fn open_switch_close_clear_scenario() {
        let mut cache = FrameCache::default();
        let t = t0();

        cache.open_session("s1", "w1", "Session One", t);
        assert_eq!(cache.active_id(), Some("s1"));

        cache.open_webapp("a1", "App One", "https://a1.example", t + TimeDelta::seconds(1));
        assert_eq!(cache.active_id(), Some("a1"));
        assert!(cache.is_cached("s1"), "s1 cached and hidden");

        cache.close_frame("s1", t + TimeDelta::seconds(2));
        assert!(!cache.is_cached("s1"));
        assert_eq!(cache.active_id(), Some("a1"), "active remains a1");

        cache.clear_all(t + TimeDelta::seconds(3));
        assert_eq!(cache.frame_count(), 0);
        assert_eq!(cache.active_id(), None);
    }

    // ── 8. Recents: order, kind filter, display cap ────────────────

    #[test]
    fn recents_most_recent_first() {
        let mut cache = FrameCache::default();
        let t = t0();

        cache.open_session("wb-1", "ws-1", "One", t);
        cache.open_session("wb-2", "ws-1", "Two", t + TimeDelta::seconds(1));
        cache.open_session("wb-3", "ws-1", "Three", t + TimeDelta::seconds(2));

        let recent = cache.recent(FrameKind::Session);
        let ids: Vec<&str> = recent.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["wb-3", "wb-2", "wb-1"]);
    }

    #[test]
    fn reactivation_moves_to_front() {
        let mut cache = FrameCache::default();
        let t = t0();

        cache.open_session("wb-1", "ws-1", "One", t);
        cache.open_session("wb-2", "ws-1", "Two", t + TimeDelta::seconds(1));
        cache.open_session("wb-1", "ws-1", "One", t + TimeDelta::seconds(2));

        let recent = cache.recent(FrameKind::Session);
        let ids: Vec<&str> = recent.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["wb-1", "wb-2"]);
    }

    #[test]
    fn recents_filtered_by_kind() {
        let mut cache = FrameCache::default();
        let t = t0();

        cache.open_session("wb-1", "ws-1", "One", t);
        cache.open_webapp("app-1", "App", "https://a.example", t + TimeDelta::seconds(1));

        let sessions = cache.recent(FrameKind::Session);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "wb-1");

        let webapps = cache.recent(FrameKind::Webapp);
        assert_eq!(webapps.len(), 1);
        assert_eq!(webapps[0].id, "app-1");
    }

    #[test]
    fn recents_capped_for_display() {
        let mut cache = FrameCache::new(CacheConfig {
            recent_display_cap: 3,
        });
        let t = t0();

        for i in 0..6 {
            let id = format!("wb-{i}");
            cache.open_session(&id, "ws-1", &id, t + TimeDelta::seconds(i));
        }

        let recent = cache.recent(FrameKind::Session);
        assert_eq!(recent.len(), 3, "display cap applies");
        assert_eq!(recent[0].id, "wb-5");
        // The cache itself stays unbounded — only the view is capped.
        assert_eq!(cache.frame_count(), 6);
    }

    // ── 9. remove_from_recent hides without closing ────────────────

    #[test]
    fn remove_from_recent_keeps_frame() {
        let mut cache = FrameCache::default();
        let t = t0();

        cache.open_session("wb-1", "ws-1", "One", t);
        cache.open_session("wb-2", "ws-1", "Two", t + TimeDelta::seconds(1));

        cache.remove_from_recent("wb-1", FrameKind::Session, t + TimeDelta::seconds(2));

        assert!(cache.is_cached("wb-1"), "frame survives");
        let ids: Vec<String> = cache
            .recent(FrameKind::Session)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["wb-2"]);
    }

    #[test]
    fn remove_from_recent_unknown_noop() {
        let mut cache = FrameCache::default();
        let version = cache.version();
        cache.remove_from_recent("nope", FrameKind::Webapp, t0());
        assert_eq!(cache.version(), version);
    }

    #[test]
    fn reopened_frame_returns_to_recents() {
        let mut cache = FrameCache::default();
        let t = t0();

        cache.open_session("wb-1", "ws-1", "One", t);
        cache.remove_from_recent("wb-1", FrameKind::Session, t + TimeDelta::seconds(1));
        assert!(cache.recent(FrameKind::Session).is_empty());

        cache.open_session("wb-1", "ws-1", "One", t + TimeDelta::seconds(2));
        assert_eq!(cache.recent(FrameKind::Session).len(), 1);
    }

    // ── 10. Change tracking ────────────────────────────────────────

    #[test]
    fn change_tracking_versions() {
        let mut cache = FrameCache::default();
        let t = t0();
        assert_eq!(cache.version(), 0);

        cache.open_session("wb-1", "ws-1", "One", t);
        assert_eq!(cache.version(), 1);

        let changes = cache.changes_since(0);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].frame_id.as_deref(), Some("wb-1"));

        cache.clear_all(t + TimeDelta::seconds(1));
        let changes = cache.changes_since(1);
        assert_eq!(changes.len(), 1);
        assert!(changes[0].frame_id.is_none(), "bulk change has no id");
    }

    #[test]
    fn changes_since_filters_and_trims() {
        let mut cache = FrameCache::default();
        let t = t0();

        cache.open_session("wb-1", "ws-1", "One", t);
        let v1 = cache.version();
        cache.open_session("wb-2", "ws-1", "Two", t + TimeDelta::seconds(1));

        assert_eq!(cache.changes_since(v1).len(), 1);

        cache.trim_changes_before(v1);
        assert_eq!(cache.changes_since(0).len(), 1, "old entries trimmed");
    }

    #[test]
    fn change_log_bounded() {
        let mut cache = FrameCache::default();
        let t = t0();

        for i in 0..600u32 {
            cache.open_session(&format!("wb-{}", i % 10), "ws-1", "Bench", t);
        }

        assert_eq!(cache.version(), 600, "version keeps counting");
        assert_eq!(cache.changes_since(0).len(), 256, "old entries dropped");
        // The newest change is always retained.
        assert_eq!(cache.changes_since(599).len(), 1);
        assert_eq!(cache.changes_since(599)[0].version, 600);
    }

    #[test]
    fn list_frames_sorted_by_id() {
        let mut cache = FrameCache::default();
        let t = t0();

        cache.open_session("wb-3", "ws-1", "Three", t);
        cache.open_session("wb-1", "ws-1", "One", t);
        cache.open_session("wb-2", "ws-1", "Two", t);

        let ids: Vec<&str> = cache.list_frames().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["wb-1", "wb-2", "wb-3"]);
    }
}
