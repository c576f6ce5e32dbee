//! CLI definition using clap derive.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chorus", about = "CHORUS research-environment console daemon")]
pub struct Cli {
    /// UDS socket path (default: /tmp/chorus-$USER/chorusd.sock)
    #[arg(long, short = 's', global = true)]
    pub socket_path: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the console daemon (status watcher + UDS server)
    Daemon(DaemonOpts),
    /// Show daemon status summary
    Status,
    /// List all cached frames (JSON)
    ListFrames,
    /// Show the recents bar for one frame kind
    Recent {
        /// Frame kind: session | webapp
        #[arg(default_value = "session")]
        kind: String,
    },
    /// Open (or switch to) a workbench session frame
    OpenWorkbench {
        /// Workbench id
        id: String,
        /// Owning workspace id
        #[arg(long)]
        workspace: String,
        /// Display name
        #[arg(long)]
        name: String,
    },
    /// Open (or switch to) an external web-app frame
    OpenWebapp {
        /// Web-app id
        id: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// Source URL loaded into the frame
        #[arg(long)]
        url: String,
    },
    /// Close a cached frame
    Close {
        /// Frame id
        id: String,
    },
    /// Close every cached frame
    Clear,
    /// Drop an entry from the recents bar without closing its frame
    RemoveRecent {
        /// Frame id
        id: String,
        /// Frame kind: session | webapp
        #[arg(default_value = "session")]
        kind: String,
    },
    /// Live-refresh view of frames and lifecycle statuses
    Watch {
        /// Refresh interval in seconds
        #[arg(long, default_value = "1")]
        interval: u64,
    },
}

#[derive(clap::Args)]
pub struct DaemonOpts {
    /// Lifecycle status poll interval in milliseconds
    #[arg(long, default_value = "2000")]
    pub poll_interval_ms: u64,

    /// Directory (workspaces/apps) refresh interval in seconds
    #[arg(long, default_value = "30")]
    pub refresh_interval_secs: u64,

    /// Backend base URL
    #[arg(long, env = "CHORUS_BACKEND_URL")]
    pub backend_url: String,

    /// Opaque session cookie (`name=value`) attached to backend calls
    #[arg(long, env = "CHORUS_SESSION_COOKIE", hide_env_values = true)]
    pub session_cookie: String,
}

/// Default socket path using $USER for per-user isolation.
pub fn default_socket_path() -> String {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        return format!("{dir}/chorus/chorusd.sock");
    }
    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    format!("/tmp/chorus-{user}/chorusd.sock")
}
