//! The remote authority seam.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use super::protocol::{BatchRequest, BatchResponse};

/// Failures that prevented a remote exchange from producing a verdict.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Remote request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {0}")]
    Api(String),
    #[error("Remote request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Server of record that accepts, rejects, or overrides queued mutations.
#[allow(async_fn_in_trait)]
pub trait RemoteAuthority {
    /// Cheap reachability check
    async fn health(&self) -> TransportResult<()>;

    /// Submit one batch and return per-item verdicts
    async fn submit_batch(&self, request: &BatchRequest) -> TransportResult<BatchResponse>;
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

pub(crate) fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = crate::util::compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_api_error_prefers_json_message() {
        let message = parse_api_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"bad batch","message":"items must not be empty"}"#,
        );
        assert_eq!(message, "items must not be empty (400)");

        let message = parse_api_error(StatusCode::BAD_GATEWAY, r#"{"error":"upstream down"}"#);
        assert_eq!(message, "upstream down (502)");
    }

    #[test]
    fn parse_api_error_falls_back_to_status() {
        assert_eq!(
            parse_api_error(StatusCode::SERVICE_UNAVAILABLE, "   "),
            "HTTP 503"
        );
        assert_eq!(
            parse_api_error(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            "boom (500)"
        );
    }
}
