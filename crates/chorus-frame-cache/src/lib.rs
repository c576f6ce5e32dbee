//! Display-frame cache for the CHORUS console.
//!
//! Tracks the set of remote frames (workbench sessions and external web
//! apps) the user has opened, keeps exactly one visible, and lets the UI
//! switch between them without destroying hidden frames — switching back
//! to a previously opened session must not reload it.

pub mod cache;

pub use cache::{CacheConfig, FrameCache, FrameChange, StateVersion};
