//! UDS JSON-RPC client for CLI subcommands.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

pub(crate) async fn rpc_call(
    socket_path: &str,
    method: &str,
    params: serde_json::Value,
) -> anyhow::Result<serde_json::Value> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot connect to daemon at {socket_path}: {e}"))?;

    let (reader, mut writer) = stream.into_split();

    let request = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1,
    });
    let mut req = serde_json::to_string(&request)?;
    req.push('\n');
    writer.write_all(req.as_bytes()).await?;
    writer.shutdown().await?;

    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    let response: serde_json::Value = serde_json::from_str(line.trim())?;

    if let Some(error) = response.get("error") {
        anyhow::bail!("RPC error: {error}");
    }

    Ok(response["result"].clone())
}

/// `chorus status` — one-line daemon summary.
pub async fn cmd_status(socket_path: &str) -> anyhow::Result<()> {
    let status = rpc_call(socket_path, "status", serde_json::json!({})).await?;
    println!("{}", format_status(&status));
    Ok(())
}

/// `chorus list-frames` — cached frames with lifecycle states.
pub async fn cmd_list_frames(socket_path: &str) -> anyhow::Result<()> {
    let frames = rpc_call(socket_path, "list_frames", serde_json::json!({})).await?;
    let output = format_frame_table(&frames);
    if output.is_empty() {
        println!("(no cached frames)");
    } else {
        println!("{output}");
    }
    Ok(())
}

/// `chorus recent <kind>` — the recents bar for one frame kind.
pub async fn cmd_recent(socket_path: &str, kind: &str) -> anyhow::Result<()> {
    let recents = rpc_call(
        socket_path,
        "recent",
        serde_json::json!({ "kind": kind }),
    )
    .await?;
    let output = format_recents(&recents);
    if output.is_empty() {
        println!("(no recent {kind} frames)");
    } else {
        println!("{output}");
    }
    Ok(())
}

/// Pure formatting logic for the status line, separated for testability.
pub(crate) fn format_status(status: &serde_json::Value) -> String {
    let authenticated = status["authenticated"].as_bool().unwrap_or(false);
    let frames = status["frame_count"].as_u64().unwrap_or(0);
    let watched = status["watched_count"].as_u64().unwrap_or(0);
    let active = status["active_frame"].as_str().unwrap_or("-");

    let auth = if authenticated { "ok" } else { "expired" };
    format!("session: {auth}  frames: {frames}  watched: {watched}  active: {active}")
}

/// One line per frame: marker, id, kind, status, name.
pub(crate) fn format_frame_table(frames: &serde_json::Value) -> String {
    let arr = match frames.as_array() {
        Some(a) => a,
        None => return String::new(),
    };

    let mut lines = Vec::new();
    for frame in arr {
        let marker = if frame["active"].as_bool().unwrap_or(false) {
            "*"
        } else {
            " "
        };
        let id = frame["id"].as_str().unwrap_or("?");
        let kind = frame["kind"].as_str().unwrap_or("?");
        let status = frame["status"].as_str().unwrap_or("unknown");
        let name = frame["name"].as_str().unwrap_or("");
        lines.push(format!("{marker} {id:<20} {kind:<8} {status:<12} {name}"));
    }
    lines.join("\n")
}

pub(crate) fn format_recents(recents: &serde_json::Value) -> String {
    let arr = match recents.as_array() {
        Some(a) => a,
        None => return String::new(),
    };

    let mut lines = Vec::new();
    for entry in arr {
        let id = entry["id"].as_str().unwrap_or("?");
        let name = entry["name"].as_str().unwrap_or("");
        lines.push(format!("{id:<20} {name}"));
    }
    lines.join("\n")
}
