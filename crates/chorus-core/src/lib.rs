//! Shared types for the CHORUS console core.
//!
//! Pure library — no tokio, no IO, no async. Only serde and chrono.

pub mod types;
pub mod urls;
