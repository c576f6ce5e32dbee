//! The backend's `{ data } | { error }` response envelope.

use serde::Deserialize;

/// Every backend response carries either a payload or an error string,
/// never both. An empty body decodes as neither.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T> {
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    /// Unwrap the envelope: backend-reported errors win over data.
    pub fn into_result(self) -> Result<T, EnvelopeError> {
        if let Some(error) = self.error {
            return Err(EnvelopeError::Backend(error));
        }
        self.data.ok_or(EnvelopeError::Empty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Backend-reported error string, surfaced verbatim.
    Backend(String),
    /// Neither data nor error present.
    Empty,
}
