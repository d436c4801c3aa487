use crate::forward::ForwardError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Every terminal outcome of a relay request other than success.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("origin not allowed")]
    Forbidden,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("invalid JSON body")]
    InvalidJson,
    #[error("invalid request: {0}")]
    BadRequest(&'static str),
    #[error("webhook URL not configured")]
    NotConfigured,
    #[error("downstream webhook answered HTTP {0}")]
    Upstream(u16),
    #[error("downstream webhook unreachable")]
    Network,
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Forbidden => StatusCode::FORBIDDEN,
            RelayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            RelayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::InvalidJson | RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::Upstream(_) | RelayError::Network => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            RelayError::Forbidden => (status, "Forbidden").into_response(),
            RelayError::MethodNotAllowed => (status, "Method Not Allowed").into_response(),
            RelayError::RateLimited => (
                status,
                Json(json!({"error": "Too many requests, please try again later"})),
            )
                .into_response(),
            RelayError::PayloadTooLarge => (status, "Payload Too Large").into_response(),
            RelayError::InvalidJson => {
                (status, Json(json!({"error": "Invalid JSON"}))).into_response()
            }
            RelayError::BadRequest(message) => {
                (status, Json(json!({"error": message}))).into_response()
            }
            RelayError::NotConfigured => (status, "Webhook not configured").into_response(),
            RelayError::Upstream(_) => (status, "Webhook request failed").into_response(),
            RelayError::Network => (status, "Network error").into_response(),
        }
    }
}

impl From<ForwardError> for RelayError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::NotConfigured => RelayError::NotConfigured,
            ForwardError::Status(code) => RelayError::Upstream(code),
            ForwardError::Transport(_) => RelayError::Network,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: RelayError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn forbidden_is_plain_text() {
        let (status, body) = body_of(RelayError::Forbidden).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, "Forbidden");
    }

    #[tokio::test]
    async fn payload_too_large_is_413() {
        let (status, body) = body_of(RelayError::PayloadTooLarge).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body, "Payload Too Large");
    }

    #[tokio::test]
    async fn rate_limited_is_json_without_retry_after() {
        let response = RelayError::RateLimited.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().get("retry-after").is_none());
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn bad_request_carries_message() {
        let (status, body) = body_of(RelayError::BadRequest("Comment too short")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], "Comment too short");
    }

    #[tokio::test]
    async fn downstream_failures_share_status() {
        assert_eq!(RelayError::Upstream(404).status(), StatusCode::BAD_GATEWAY);
        let (status, body) = body_of(RelayError::Network).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, "Network error");
    }

    #[test]
    fn forward_errors_map_to_relay_errors() {
        assert!(matches!(
            RelayError::from(ForwardError::NotConfigured),
            RelayError::NotConfigured
        ));
        assert!(matches!(
            RelayError::from(ForwardError::Status(500)),
            RelayError::Upstream(500)
        ));
        assert!(matches!(
            RelayError::from(ForwardError::Transport("refused".to_string())),
            RelayError::Network
        ));
    }
}
