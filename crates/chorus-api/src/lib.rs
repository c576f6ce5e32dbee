//! HTTP client for the CHORUS orchestration backend.
//!
//! Request/response only: the backend owns workspaces, workbenches, apps
//! and app instances; this crate observes them. Authentication is an
//! opaque session cookie attached to every call. Responses are
//! `{ data } | { error }` shaped and backend errors come back as data,
//! never as exceptions — they map to [`ApiError::Backend`].

pub mod client;
pub mod envelope;

pub use client::{ApiClient, ApiError};
pub use envelope::Envelope;
