use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

// ─── Frame kind ───────────────────────────────────────────────────

/// What a cached frame displays: a provisioned workbench session or an
/// external web application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Session,
    Webapp,
}

impl FrameKind {
    pub const ALL: [Self; 2] = [Self::Session, Self::Webapp];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Webapp => "webapp",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrameKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "webapp" => Ok(Self::Webapp),
            _ => Err(ParseError::UnknownFrameKind(s.to_owned())),
        }
    }
}

// ─── Lifecycle status ─────────────────────────────────────────────

/// Remote lifecycle status of a workbench or app instance.
///
/// Owned by the orchestration backend; the console only observes and
/// displays it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum LifecycleStatus {
    #[default]
    Unknown,
    Progressing,
    Running,
    Complete,
    Failed,
    Stopped,
    Killed,
}

impl LifecycleStatus {
    pub const ALL: [Self; 7] = [
        Self::Unknown,
        Self::Progressing,
        Self::Running,
        Self::Complete,
        Self::Failed,
        Self::Stopped,
        Self::Killed,
    ];

    /// True for statuses the backend never transitions out of.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Complete | Self::Failed | Self::Stopped | Self::Killed
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Progressing => "progressing",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
            Self::Killed => "killed",
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(Self::Unknown),
            "progressing" => Ok(Self::Progressing),
            "running" => Ok(Self::Running),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            "stopped" => Ok(Self::Stopped),
            "killed" => Ok(Self::Killed),
            _ => Err(ParseError::UnknownStatus(s.to_owned())),
        }
    }
}

/// `{ status, message }` as returned by the lifecycle status endpoint.
/// `message` is a human-readable diagnostic surfaced verbatim to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleReport {
    pub status: LifecycleStatus,
    #[serde(default)]
    pub message: Option<String>,
}

// ─── Cached frame ─────────────────────────────────────────────────

/// One remote UI surface retained in memory so switching back to it does
/// not reload it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFrame {
    /// Workbench id or web-app id, unique among cached frames.
    pub id: String,
    pub kind: FrameKind,
    /// Display label.
    pub name: String,
    /// Address loaded into the frame. Opaque to the cache.
    pub source_url: String,
    /// Owning workspace, for session frames.
    #[serde(default)]
    pub workspace_id: Option<String>,
    /// Updated whenever the frame becomes visible.
    pub last_accessed_at: DateTime<Utc>,
}

/// Entry in the recents bar, most-recently-accessed first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentReference {
    pub id: String,
    pub kind: FrameKind,
    pub name: String,
    pub last_accessed_at: DateTime<Utc>,
}

// ─── Backend DTOs ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A named collection of workbenches and shared context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

/// A provisioned, stateful remote desktop environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbench {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    #[serde(default)]
    pub status: LifecycleStatus,
    pub created_at: DateTime<Utc>,
}

/// A containerized application definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub docker_image: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A running instance of an app attached to a workbench.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInstance {
    pub id: String,
    pub app_id: String,
    pub workbench_id: String,
    #[serde(default)]
    pub status: LifecycleStatus,
}

// ─── Error ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown frame kind: {0}")]
    UnknownFrameKind(String),

    #[error("unknown lifecycle status: {0}")]
    UnknownStatus(String),
}

// ─── Tests ────────────────────────────────────────────────────────
