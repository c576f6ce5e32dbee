//! Source URL construction for cached frames.
//!
//! The cache itself treats every `source_url` as an opaque string; these
//! helpers are the single place the path shapes live.

/// Path that streams a workbench's remote desktop UI.
pub fn workbench_stream_path(workbench_id: &str) -> String {
    format!("/api/rest/v2/workbenchs/{workbench_id}/stream")
}

/// Absolute stream URL for a workbench against a backend base URL.
pub fn workbench_stream_url(base_url: &str, workbench_id: &str) -> String {
    format!(
        "{}{}",
        base_url.trim_end_matches('/'),
        workbench_stream_path(workbench_id)
    )
}
