//! Per-id polling tasks with explicit cancellation.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use chorus_core::types::{FrameKind, LifecycleReport};

/// One observed status for a watched id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub id: String,
    pub kind: FrameKind,
    pub report: LifecycleReport,
    pub observed_at: DateTime<Utc>,
}

/// Seam between the watcher and the backend, so tests can script
/// status sequences without a network.
pub trait StatusPoller: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send;

    fn fetch_status(
        &self,
        kind: FrameKind,
        id: String,
    ) -> impl Future<Output = Result<LifecycleReport, Self::Error>> + Send;
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub poll_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
        }
    }
}

struct WatchHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

/// Set of active status watches, one polling task per watched id.
///
/// A watch ends three ways: `unwatch` (token cancelled, in-flight fetch
/// aborted), `shutdown`, or the backend reporting a terminal status
/// (delivered, then the task stops on its own).
pub struct WatcherSet<P: StatusPoller> {
    poller: P,
    config: WatcherConfig,
    tx: mpsc::UnboundedSender<StatusUpdate>,
    tasks: HashMap<String, WatchHandle>,
}

impl<P: StatusPoller> WatcherSet<P> {
    pub fn new(
        poller: P,
        config: WatcherConfig,
    ) -> (Self, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                poller,
                config,
                tx,
                tasks: HashMap::new(),
            },
            rx,
        )
    }

    /// Start polling an id. A duplicate watch for a still-live id is a
    /// no-op; a finished task (terminal status reached) is replaced.
    pub fn watch(&mut self, kind: FrameKind, id: &str) {
        if let Some(handle) = self.tasks.get(id) {
            if !handle.join.is_finished() {
                return;
            }
            self.tasks.remove(id);
        }

        let token = CancellationToken::new();
        let task_token = token.clone();
        let poller = self.poller.clone();
        let tx = self.tx.clone();
        let interval = self.config.poll_interval;
        let task_id = id.to_owned();

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = task_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let result = tokio::select! {
                    () = task_token.cancelled() => break,
                    r = poller.fetch_status(kind, task_id.clone()) => r,
                };

                match result {
                    Ok(report) => {
                        let terminal = report.status.is_terminal();
                        let update = StatusUpdate {
                            id: task_id.clone(),
                            kind,
                            report,
                            observed_at: Utc::now(),
                        };
                        if tx.send(update).is_err() {
                            break; // consumer gone
                        }
                        if terminal {
                            tracing::debug!("watch for {task_id} ended on terminal status");
                            break;
                        }
                    }
                    // Poll failures are skipped, never retried eagerly.
                    Err(e) => tracing::debug!("status poll failed for {task_id}: {e}"),
                }
            }
        });

        self.tasks.insert(id.to_owned(), WatchHandle { token, join });
    }

    /// Stop polling an id, aborting any in-flight request. Unknown ids
    /// are a no-op.
    pub fn unwatch(&mut self, id: &str) {
        if let Some(handle) = self.tasks.remove(id) {
            handle.token.cancel();
        }
    }

    pub fn is_watched(&self, id: &str) -> bool {
        self.tasks
            .get(id)
            .is_some_and(|h| !h.join.is_finished())
    }

    /// Number of live watch tasks.
    pub fn watched_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|h| !h.join.is_finished())
            .count()
    }

    /// Cancel every watch.
    pub fn shutdown(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.token.cancel();
        }
    }
}

impl<P: StatusPoller> Drop for WatcherSet<P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::types::LifecycleStatus;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted poller: returns statuses in sequence per call, repeating
    /// the last one. An empty script means every fetch fails.
    #[derive(Clone)]
    struct ScriptedPoller {
        script: Vec<LifecycleStatus>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedPoller {
        fn new(script: Vec<LifecycleStatus>) -> Self {
            Self {
                script,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl StatusPoller for ScriptedPoller {
        type Error = String;

        fn fetch_status(
            &self,
            _kind: FrameKind,
            id: String,
        ) -> impl Future<Output = Result<LifecycleReport, String>> + Send {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let status = self.script.get(n).or(self.script.last()).copied();
            async move {
                match status {
                    Some(status) => Ok(LifecycleReport {
                        status,
                        message: None,
                    }),
                    None => Err(format!("no status scripted for {id}")),
                }
            }
        }
    }

    fn fast_config() -> WatcherConfig {
        WatcherConfig {
            poll_interval: Duration::from_millis(5),
        }
    }

    async fn recv_update(
        rx: &mut mpsc::UnboundedReceiver<StatusUpdate>,
    ) -> Option<StatusUpdate> {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .ok()
            .flatten()
    }

    // ── 1. Updates are delivered in poll order ─────────────────────

    #[tokio::test]
    async fn delivers_status_sequence() {
        let poller = ScriptedPoller::new(vec![
            LifecycleStatus::Progressing,
            LifecycleStatus::Running,
        ]);
        let (mut set, mut rx) = WatcherSet::new(poller, fast_config());

        set.watch(FrameKind::Session, "wb-1");

        let first = recv_update(&mut rx).await.expect("first update");
        assert_eq!(first.id, "wb-1");
        assert_eq!(first.kind, FrameKind::Session);
        assert_eq!(first.report.status, LifecycleStatus::Progressing);

        let second = recv_update(&mut rx).await.expect("second update");
        assert_eq!(second.report.status, LifecycleStatus::Running);
    }

    // ── 2. Terminal status ends the watch after delivery ───────────

    #[tokio::test]
    async fn terminal_status_stops_watch() {
        let poller = ScriptedPoller::new(vec![
            LifecycleStatus::Progressing,
            LifecycleStatus::Failed,
        ]);
        let (mut set, mut rx) = WatcherSet::new(poller, fast_config());

        set.watch(FrameKind::Session, "wb-1");

        let first = recv_update(&mut rx).await.expect("progressing");
        assert_eq!(first.report.status, LifecycleStatus::Progressing);
        let second = recv_update(&mut rx).await.expect("failed delivered");
        assert_eq!(second.report.status, LifecycleStatus::Failed);

        // Task winds down on its own; no further updates arrive.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!set.is_watched("wb-1"));
        assert!(rx.try_recv().is_err());
    }

    // ── 3. Unwatch cancels delivery ────────────────────────────────

    #[tokio::test]
    async fn unwatch_stops_delivery() {
        let poller = ScriptedPoller::new(vec![LifecycleStatus::Running]);
        let (mut set, mut rx) = WatcherSet::new(poller, fast_config());

        set.watch(FrameKind::Webapp, "app-1");
        recv_update(&mut rx).await.expect("at least one update");

        set.unwatch("app-1");
        assert!(!set.is_watched("app-1"));

        // Drain anything already in flight, then confirm silence.
        tokio::time::sleep(Duration::from_millis(50)).await;
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err(), "no updates after unwatch");
    }

    // ── 4. Duplicate watch is a no-op for a live id ────────────────

    #[tokio::test]
    async fn duplicate_watch_noop() {
        let poller = ScriptedPoller::new(vec![LifecycleStatus::Running]);
        let calls = Arc::clone(&poller.calls);
        let (mut set, mut rx) = WatcherSet::new(poller, fast_config());

        set.watch(FrameKind::Session, "wb-1");
        set.watch(FrameKind::Session, "wb-1");
        assert_eq!(set.watched_count(), 1);

        recv_update(&mut rx).await.expect("update");
        assert!(calls.load(Ordering::SeqCst) >= 1);
    }

    // ── 5. Fetch errors skip the tick but keep polling ─────────────

    #[tokio::test]
    async fn fetch_error_keeps_polling() {
        // Empty script: every fetch fails.
        let poller = ScriptedPoller::new(vec![]);
        let calls = Arc::clone(&poller.calls);
        let (mut set, mut rx) = WatcherSet::new(poller, fast_config());

        set.watch(FrameKind::Session, "wb-1");
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(calls.load(Ordering::SeqCst) >= 2, "polling continued");
        assert!(rx.try_recv().is_err(), "errors deliver nothing");
        assert!(set.is_watched("wb-1"));
    }

    // ── 6. Unknown unwatch is a no-op ──────────────────────────────

    #[tokio::test]
    async fn unwatch_unknown_noop() {
        let poller = ScriptedPoller::new(vec![LifecycleStatus::Running]);
        let (mut set, _rx) = WatcherSet::new(poller, fast_config());
        set.unwatch("nope");
        assert_eq!(set.watched_count(), 0);
    }

    // ── 7. Shutdown cancels everything ─────────────────────────────

    #[tokio::test]
    async fn shutdown_cancels_all() {
        let poller = ScriptedPoller::new(vec![LifecycleStatus::Running]);
        let (mut set, _rx) = WatcherSet::new(poller, fast_config());

        set.watch(FrameKind::Session, "wb-1");
        set.watch(FrameKind::Webapp, "app-1");
        assert_eq!(set.watched_count(), 2);

        set.shutdown();
        assert_eq!(set.watched_count(), 0);
    }
}
