//! UDS JSON-RPC server: minimal hand-rolled implementation.
//! Connection-per-request, newline-delimited JSON.

use std::str::FromStr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::Mutex;

use chorus_core::types::FrameKind;
use chorus_watcher::StatusPoller;

use crate::daemon::DaemonState;

/// Run the UDS JSON-RPC server.
pub async fn run_server<P: StatusPoller>(
    socket_path: &str,
    state: Arc<Mutex<DaemonState<P>>>,
) -> anyhow::Result<()> {
    // Create socket directory with mode 0700
    let socket_dir = std::path::Path::new(socket_path)
        .parent()
        .ok_or_else(|| anyhow::anyhow!("invalid socket path"))?;

    std::fs::create_dir_all(socket_dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(socket_dir, std::fs::Permissions::from_mode(0o700))?;
    }

    // Check for stale socket
    if std::path::Path::new(socket_path).exists() {
        if tokio::net::UnixStream::connect(socket_path).await.is_err() {
            std::fs::remove_file(socket_path)?;
            tracing::info!("removed stale socket at {socket_path}");
        } else {
            anyhow::bail!("another daemon is already running at {socket_path}");
        }
    }

    let listener = UnixListener::bind(socket_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!("UDS server listening on {socket_path}");

    loop {
        let (stream, _) = listener.accept().await?;
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, state).await {
                tracing::debug!("connection error: {e}");
            }
        });
    }
}

async fn handle_connection<P: StatusPoller>(
    stream: tokio::net::UnixStream,
    state: Arc<Mutex<DaemonState<P>>>,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    let request: serde_json::Value = serde_json::from_str(line.trim())?;
    let method = request["method"].as_str().unwrap_or("");
    let id = request["id"].clone();
    let params = &request["params"];

    // A bad method or bad params still gets a response; only transport
    // failures drop the connection.
    let response = match dispatch(method, params, &state).await {
        Ok(result) => serde_json::json!({
            "jsonrpc": "2.0",
            "result": result,
            "id": id,
        }),
        Err(rpc_err) => error_response(&id, &rpc_err),
    };
    let mut resp = serde_json::to_string(&response)?;
    resp.push('\n');
    writer.write_all(resp.as_bytes()).await?;

    Ok(())
}

/// The failure shapes the server reports, mapped to JSON-RPC codes.
#[derive(Debug, PartialEq, Eq)]
enum RpcError {
    MethodNotFound,
    InvalidParams(String),
    Internal(String),
}

impl RpcError {
    fn code(&self) -> i64 {
        match self {
            Self::MethodNotFound => -32601,
            Self::InvalidParams(_) => -32602,
            Self::Internal(_) => -32603,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::MethodNotFound => "method not found".to_owned(),
            Self::InvalidParams(msg) | Self::Internal(msg) => msg.clone(),
        }
    }
}

fn error_response(id: &serde_json::Value, err: &RpcError) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "error": {"code": err.code(), "message": err.message()},
        "id": id,
    })
}

async fn dispatch<P: StatusPoller>(
    method: &str,
    params: &serde_json::Value,
    state: &Arc<Mutex<DaemonState<P>>>,
) -> Result<serde_json::Value, RpcError> {
    match method {
        "status" => Ok(build_status(&*state.lock().await)),
        "list_frames" => Ok(build_frame_list(&*state.lock().await)),
        "recent" => {
            let kind = parse_kind(params["kind"].as_str())?;
            let st = state.lock().await;
            serde_json::to_value(st.console.cache.recent(kind))
                .map_err(|e| RpcError::Internal(e.to_string()))
        }
        "open_workbench" => {
            let frame_id = required_str(params, "id")?;
            let workspace = required_str(params, "workspace_id")?;
            let name = required_str(params, "name")?;
            let mut st = state.lock().await;
            st.open_workbench(&frame_id, &workspace, &name);
            Ok(build_status(&st))
        }
        "open_webapp" => {
            let frame_id = required_str(params, "id")?;
            let name = required_str(params, "name")?;
            let url = required_str(params, "url")?;
            let mut st = state.lock().await;
            st.open_webapp(&frame_id, &name, &url);
            Ok(build_status(&st))
        }
        "close_frame" => {
            let frame_id = required_str(params, "id")?;
            let mut st = state.lock().await;
            st.close_frame(&frame_id);
            Ok(build_status(&st))
        }
        "clear_all" => {
            let mut st = state.lock().await;
            st.clear_all();
            Ok(build_status(&st))
        }
        "remove_recent" => {
            let frame_id = required_str(params, "id")?;
            let kind = parse_kind(params["kind"].as_str())?;
            let mut st = state.lock().await;
            st.console.remove_recent(&frame_id, kind, chrono::Utc::now());
            Ok(build_status(&st))
        }
        "state_changed" => {
            let since_version = params["since_version"].as_u64().unwrap_or(0);
            let st = state.lock().await;
            Ok(build_state_changed(&st, since_version))
        }
        _ => Err(RpcError::MethodNotFound),
    }
}

fn required_str(params: &serde_json::Value, key: &str) -> Result<String, RpcError> {
    params[key]
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| RpcError::InvalidParams(format!("missing param: {key}")))
}

fn parse_kind(raw: Option<&str>) -> Result<FrameKind, RpcError> {
    let raw = raw.unwrap_or("session");
    FrameKind::from_str(raw).map_err(|e| RpcError::InvalidParams(e.to_string()))
}

/// Build a daemon status summary: counts, active frame and auth state.
pub(crate) fn build_status<P: StatusPoller>(state: &DaemonState<P>) -> serde_json::Value {
    serde_json::json!({
        "authenticated": state.console.authenticated,
        "frame_count": state.console.cache.frame_count(),
        "active_frame": state.console.cache.active_id(),
        "watched_count": state.watcher.watched_count(),
        "workspace_count": state.console.directory.workspaces.len(),
        "app_count": state.console.directory.apps.len(),
        "directory_fetched_at": state.console.directory.fetched_at,
        "version": state.console.cache.version(),
    })
}

/// Build the frame list: every cached frame joined with its last
/// observed lifecycle state.
pub(crate) fn build_frame_list<P: StatusPoller>(state: &DaemonState<P>) -> serde_json::Value {
    let active = state.console.cache.active_id();

    let mut result: Vec<serde_json::Value> = Vec::new();
    for frame in state.console.cache.list_frames() {
        let lifecycle = state.console.board.get(&frame.id);
        result.push(serde_json::json!({
            "id": frame.id,
            "kind": frame.kind,
            "name": frame.name,
            "source_url": frame.source_url,
            "workspace_id": frame.workspace_id,
            "active": active == Some(frame.id.as_str()),
            "status": lifecycle.map(|s| s.status),
            "status_message": lifecycle.and_then(|s| s.message.clone()),
            "last_accessed_at": frame.last_accessed_at,
        }));
    }

    serde_json::Value::Array(result)
}

/// Build a `state_changed` response: cache changes since a given
/// version, each joined with current frame and lifecycle state, plus
/// the current version for the next poll.
pub(crate) fn build_state_changed<P: StatusPoller>(
    state: &DaemonState<P>,
    since_version: u64,
) -> serde_json::Value {
    let changes = state.console.cache.changes_since(since_version);
    let current_version = state.console.cache.version();

    let mut entries = Vec::new();
    for change in &changes {
        let mut entry = serde_json::json!({
            "version": change.version,
            "timestamp": change.timestamp,
        });

        if let Some(ref frame_id) = change.frame_id {
            entry["frame_id"] = serde_json::Value::String(frame_id.clone());
            if let Some(frame) = state.console.cache.get(frame_id) {
                entry["frame"] = serde_json::json!({
                    "kind": frame.kind,
                    "name": frame.name,
                    "source_url": frame.source_url,
                });
            }
            if let Some(lifecycle) = state.console.board.get(frame_id) {
                entry["lifecycle"] = serde_json::json!({
                    "status": lifecycle.status,
                    "message": lifecycle.message,
                    "updated_at": lifecycle.updated_at,
                });
            }
        }

        entries.push(entry);
    }

    serde_json::json!({
        "changes": entries,
        "version": current_version,
        "board_version": state.console.board.version(),
    })
}
