//! Error taxonomy shared by the fetch, ingest and store layers.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure talking to the departure monitor, or making sense of its reply.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status. `body` is the upstream response text, verbatim.
    #[error("upstream returned status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("upstream response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),
}

impl UpstreamError {
    /// Text surfaced to HTTP callers as `{"error": ...}`.
    ///
    /// For a status error this is the upstream body as received.
    pub fn payload(&self) -> String {
        match self {
            UpstreamError::Status { body, .. } => body.clone(),
            other => other.to_string(),
        }
    }
}

/// A single stop event that could not be turned into a departure.
#[derive(Debug, Error)]
#[error("malformed stop event #{index}: {source}")]
pub struct EventNormalizationError {
    pub index: usize,
    #[source]
    pub source: serde_json::Error,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("persisting departures failed: {0}")]
    Persistence(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_payload_is_body_verbatim() {
        let err = UpstreamError::Status {
            status: StatusCode::UNAUTHORIZED,
            body: "{\"ErrorDetails\":\"bad key\"}".to_string(),
        };
        assert_eq!(err.payload(), "{\"ErrorDetails\":\"bad key\"}");
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_other_payload_uses_message() {
        let err = UpstreamError::InvalidRequest("empty stop id".to_string());
        assert_eq!(err.payload(), "invalid upstream request: empty stop id");
    }
}
