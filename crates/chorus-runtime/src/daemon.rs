//! Daemon: wires cache → watcher → backend into one process.
//!
//! Runs the UDS server, drains watcher updates through the stale-update
//! guard, and refreshes the backend directory on an interval.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use tokio::time::interval;

use chorus_api::{ApiClient, ApiError};
use chorus_core::types::{FrameKind, LifecycleReport};
use chorus_frame_cache::CacheConfig;
use chorus_watcher::{StatusPoller, StatusUpdate, WatcherConfig, WatcherSet};

use crate::cli::DaemonOpts;
use crate::console::{ConsoleState, Directory};
use crate::server;

/// Status poller over the backend REST client. Session frames poll the
/// workbench status endpoint; web-app frames are app-instance backed
/// and poll the instance status endpoint.
#[derive(Clone)]
pub struct ApiPoller {
    client: ApiClient,
}

impl ApiPoller {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl StatusPoller for ApiPoller {
    type Error = ApiError;

    fn fetch_status(
        &self,
        kind: FrameKind,
        id: String,
    ) -> impl Future<Output = Result<LifecycleReport, ApiError>> + Send {
        let client = self.client.clone();
        async move {
            match kind {
                FrameKind::Session => client.workbench_status(&id).await,
                FrameKind::Webapp => client.app_instance_status(&id).await,
            }
        }
    }
}

/// Shared daemon state protected by a mutex.
pub struct DaemonState<P: StatusPoller> {
    pub console: ConsoleState,
    pub watcher: WatcherSet<P>,
}

impl<P: StatusPoller> DaemonState<P> {
    pub fn new(console: ConsoleState, watcher: WatcherSet<P>) -> Self {
        Self { console, watcher }
    }

    /// Open (or switch to) a workbench frame and start watching its
    /// lifecycle.
    pub fn open_workbench(&mut self, id: &str, workspace_id: &str, name: &str) {
        self.console
            .cache
            .open_session(id, workspace_id, name, Utc::now());
        self.watcher.watch(FrameKind::Session, id);
    }

    /// Open (or switch to) a web-app frame and start watching its app
    /// instance.
    pub fn open_webapp(&mut self, id: &str, name: &str, source_url: &str) {
        self.console.cache.open_webapp(id, name, source_url, Utc::now());
        self.watcher.watch(FrameKind::Webapp, id);
    }

    /// Close one frame: drop it from cache and board, cancel its watch.
    pub fn close_frame(&mut self, id: &str) {
        self.console.close_frame(id, Utc::now());
        self.watcher.unwatch(id);
    }

    /// Close everything and cancel every watch.
    pub fn clear_all(&mut self) {
        self.console.clear_all(Utc::now());
        self.watcher.shutdown();
    }

    /// Apply a watcher update through the stale-update guard.
    ///
    /// A response for a frame closed while the poll was in flight must
    /// be discarded, never re-inserted. Returns true when the board
    /// state changed.
    pub fn apply_update(&mut self, update: StatusUpdate) -> bool {
        if !self.console.cache.is_cached(&update.id) {
            tracing::debug!("dropping stale status for closed frame {}", update.id);
            self.watcher.unwatch(&update.id);
            return false;
        }

        let id = update.id.clone();
        let status = update.report.status;
        let message = update.report.message.clone();
        let changed = self.console.board.apply(update);
        if changed {
            match message {
                Some(msg) => tracing::info!("{id} is {status}: {msg}"),
                None => tracing::info!("{id} is {status}"),
            }
        }
        changed
    }

    /// Forced logout on session expiry: everything tied to the expired
    /// cookie goes away.
    pub fn force_logout(&mut self) {
        self.console.logout(Utc::now());
        self.watcher.shutdown();
    }
}

/// Run the daemon: UDS server, watcher drain and directory refresh,
/// until ctrl-c or SIGTERM.
pub async fn run_daemon(opts: DaemonOpts, socket_path: &str) -> anyhow::Result<()> {
    let client = ApiClient::new(&opts.backend_url, &opts.session_cookie);
    let poller = ApiPoller::new(client.clone());
    let (watcher, updates) = WatcherSet::new(
        poller,
        WatcherConfig {
            poll_interval: Duration::from_millis(opts.poll_interval_ms),
        },
    );
    let state = Arc::new(Mutex::new(DaemonState::new(
        ConsoleState::new(CacheConfig::default()),
        watcher,
    )));

    // UDS server
    let server_state = Arc::clone(&state);
    let server_socket = socket_path.to_string();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::run_server(&server_socket, server_state).await {
            tracing::error!("UDS server error: {e}");
        }
    });

    // Watcher update drain
    let drain_state = Arc::clone(&state);
    let drain_handle = tokio::spawn(async move {
        run_update_drain(updates, drain_state).await;
    });

    // Directory refresh loop
    let refresh_state = Arc::clone(&state);
    let refresh_client = client.clone();
    let refresh_secs = opts.refresh_interval_secs;
    let refresh_handle = tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(refresh_secs));
        loop {
            ticker.tick().await;
            refresh_tick(&refresh_client, &refresh_state).await;
        }
    });

    // Wait for shutdown signal (ctrl-c or SIGTERM)
    #[cfg(unix)]
    let mut sigterm =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("failed to register SIGTERM handler")?;

    let shutdown = async {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("received ctrl-c, shutting down"),
                _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("received ctrl-c, shutting down");
        }
    };

    tokio::select! {
        () = shutdown => {}
        _ = server_handle => {
            tracing::warn!("server exited unexpectedly");
        }
        _ = drain_handle => {
            tracing::warn!("update drain exited unexpectedly");
        }
        _ = refresh_handle => {
            tracing::warn!("refresh loop exited unexpectedly");
        }
    }

    state.lock().await.watcher.shutdown();

    // Cleanup socket
    let _ = std::fs::remove_file(socket_path);
    tracing::info!("daemon stopped");
    Ok(())
}

async fn run_update_drain<P: StatusPoller>(
    mut updates: mpsc::UnboundedReceiver<StatusUpdate>,
    state: Arc<Mutex<DaemonState<P>>>,
) {
    while let Some(update) = updates.recv().await {
        state.lock().await.apply_update(update);
    }
}

/// One directory refresh: current user (session-expiry probe) plus the
/// workspace and app lists the console displays.
async fn refresh_tick<P: StatusPoller>(client: &ApiClient, state: &Arc<Mutex<DaemonState<P>>>) {
    match client.get_current_user().await {
        Ok(user) => tracing::debug!("session valid for {}", user.username),
        Err(ApiError::AuthExpired) => {
            tracing::warn!("session expired, forcing logout");
            state.lock().await.force_logout();
            return;
        }
        Err(e) => {
            // Transient backend trouble; never retried eagerly.
            tracing::debug!("current-user check failed: {e}");
            return;
        }
    }

    let workspaces = match client.list_workspaces().await {
        Ok(list) => list,
        Err(e) => {
            tracing::debug!("workspace refresh failed: {e}");
            return;
        }
    };
    let apps = match client.list_apps().await {
        Ok(list) => list,
        Err(e) => {
            tracing::debug!("app refresh failed: {e}");
            return;
        }
    };

    let mut st = state.lock().await;
    st.console.directory = Directory {
        workspaces,
        apps,
        fetched_at: Some(Utc::now()),
    };
    st.console.authenticated = true;
}

// ─── Tests ───────────────────────────────────────────────────────
