//! Lifecycle status watching for workbenches and app instances.
//!
//! Each watched id gets its own polling task holding a cancellation
//! token, cancelled explicitly when the frame closes — in-flight
//! requests are aborted, not merely ignored on arrival. The consumer
//! still applies a stale-update guard before committing any update.

pub mod board;
pub mod watcher;

pub use board::{LifecycleState, StatusBoard};
pub use watcher::{StatusPoller, StatusUpdate, WatcherConfig, WatcherSet};
