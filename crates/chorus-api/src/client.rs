//! Backend REST client over reqwest.

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use chorus_core::types::{App, AppInstance, LifecycleReport, User, Workbench, Workspace};

use crate::envelope::{Envelope, EnvelopeError};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Backend-reported error string, surfaced to the user verbatim.
    #[error("backend error: {0}")]
    Backend(String),

    /// Session cookie no longer valid — caller must force a logout.
    #[error("session expired")]
    AuthExpired,

    /// Network-level failure reaching the backend.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body did not match the expected envelope shape.
    #[error("malformed response from {endpoint}")]
    Decode { endpoint: String },
}

/// Client for the CHORUS backend REST gateway.
///
/// Calls are plain request/response; nothing is retried automatically.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session_cookie: String,
}

impl ApiClient {
    /// `session_cookie` is the opaque `name=value` pair attached to every
    /// request; issuing it is out of scope here.
    pub fn new(base_url: impl Into<String>, session_cookie: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            session_cookie: session_cookie.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── Users ──────────────────────────────────────────────────────

    /// Fetch the authenticated user. A failure here is how session
    /// expiry is detected: 401/403 maps to [`ApiError::AuthExpired`].
    pub async fn get_current_user(&self) -> Result<User, ApiError> {
        self.get("/api/rest/v2/users/me").await
    }

    // ── Workspaces ─────────────────────────────────────────────────

    pub async fn list_workspaces(&self) -> Result<Vec<Workspace>, ApiError> {
        self.get("/api/rest/v2/workspaces").await
    }

    pub async fn get_workspace(&self, id: &str) -> Result<Workspace, ApiError> {
        self.get(&format!("/api/rest/v2/workspaces/{id}")).await
    }

    pub async fn create_workspace(&self, workspace: &Workspace) -> Result<Workspace, ApiError> {
        self.post("/api/rest/v2/workspaces", workspace).await
    }

    pub async fn delete_workspace(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/api/rest/v2/workspaces/{id}")).await
    }

    // ── Workbenches ────────────────────────────────────────────────

    pub async fn list_workbenches(&self, workspace_id: &str) -> Result<Vec<Workbench>, ApiError> {
        self.get(&format!(
            "/api/rest/v2/workspaces/{workspace_id}/workbenchs"
        ))
        .await
    }

    pub async fn get_workbench(&self, id: &str) -> Result<Workbench, ApiError> {
        self.get(&format!("/api/rest/v2/workbenchs/{id}")).await
    }

    pub async fn create_workbench(&self, workbench: &Workbench) -> Result<Workbench, ApiError> {
        self.post("/api/rest/v2/workbenchs", workbench).await
    }

    pub async fn delete_workbench(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/api/rest/v2/workbenchs/{id}")).await
    }

    /// Poll the lifecycle status of a workbench. `message` in the report
    /// is a human-readable diagnostic (e.g. insufficient cluster
    /// resources) passed through verbatim.
    pub async fn workbench_status(&self, id: &str) -> Result<LifecycleReport, ApiError> {
        self.get(&format!("/api/rest/v2/workbenchs/{id}/status"))
            .await
    }

    // ── Apps & instances ───────────────────────────────────────────

    pub async fn list_apps(&self) -> Result<Vec<App>, ApiError> {
        self.get("/api/rest/v2/apps").await
    }

    pub async fn list_app_instances(&self, workbench_id: &str) -> Result<Vec<AppInstance>, ApiError> {
        self.get(&format!(
            "/api/rest/v2/workbenchs/{workbench_id}/app-instances"
        ))
        .await
    }

    pub async fn create_app_instance(
        &self,
        instance: &AppInstance,
    ) -> Result<AppInstance, ApiError> {
        self.post("/api/rest/v2/app-instances", instance).await
    }

    pub async fn delete_app_instance(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/api/rest/v2/app-instances/{id}"))
            .await
    }

    pub async fn app_instance_status(&self, id: &str) -> Result<LifecycleReport, ApiError> {
        self.get(&format!("/api/rest/v2/app-instances/{id}/status"))
            .await
    }

    // ── Internals ──────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .header(reqwest::header::COOKIE, &self.session_cookie)
            .send()
            .await?;
        self.decode(path, response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header(reqwest::header::COOKIE, &self.session_cookie)
            .json(body)
            .send()
            .await?;
        self.decode(path, response).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(format!("{}{path}", self.base_url))
            .header(reqwest::header::COOKIE, &self.session_cookie)
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::AuthExpired);
        }
        // Delete responses may have an empty body; only the envelope's
        // error field matters when one is present.
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(());
        }
        match serde_json::from_str::<Envelope<serde_json::Value>>(&text) {
            Ok(envelope) => match envelope.into_result() {
                Ok(_) | Err(EnvelopeError::Empty) => Ok(()),
                Err(EnvelopeError::Backend(msg)) => Err(ApiError::Backend(msg)),
            },
            Err(_) => Err(ApiError::Decode {
                endpoint: path.to_owned(),
            }),
        }
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::AuthExpired);
        }

        let envelope: Envelope<T> =
            response.json().await.map_err(|e| {
                tracing::debug!("decode failed for {path}: {e}");
                ApiError::Decode {
                    endpoint: path.to_owned(),
                }
            })?;

        match envelope.into_result() {
            Ok(data) => Ok(data),
            Err(EnvelopeError::Backend(msg)) => Err(ApiError::Backend(msg)),
            Err(EnvelopeError::Empty) => Err(ApiError::Decode {
                endpoint: path.to_owned(),
            }),
        }
    }
}
