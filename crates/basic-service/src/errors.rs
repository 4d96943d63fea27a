//! Basic service error types.
//!
//! Errors map to HTTP status codes via `IntoResponse` and to gRPC statuses via
//! `From<BasicError> for tonic::Status`. Messages returned to callers are
//! generic; the actual cause is logged server-side.
//!
//! Forced failures are not errors: they are a successful outcome of the echo
//! endpoint (see [`crate::services::EchoOutcome`]).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::telemetry::PublishError;

/// Basic service error type.
///
/// Every variant is a 500 Internal Server Error over HTTP, with body code:
/// - Publish: `PUBLISH_FAILED`
/// - InvalidForcedStatus: `INVALID_FORCED_STATUS`
///
/// Over gRPC every variant is `INTERNAL`.
#[derive(Debug, Error)]
pub enum BasicError {
    #[error("Telemetry publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("Forced status {0} is not a valid HTTP status code")]
    InvalidForcedStatus(u32),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for BasicError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            BasicError::Publish(err) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "basic.telemetry", error = %err, "Error writing telemetry event");
                ("PUBLISH_FAILED", "Failed to publish telemetry event")
            }
            BasicError::InvalidForcedStatus(code) => {
                tracing::warn!(target: "basic.http", forced_status = code, "Forced status is not a valid HTTP status");
                ("INVALID_FORCED_STATUS", "Forced status is not a valid HTTP status code")
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
            },
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(error_response)).into_response()
    }
}

impl From<BasicError> for tonic::Status {
    fn from(err: BasicError) -> Self {
        tracing::error!(target: "basic.grpc", error = %err, "Request failed");
        tonic::Status::internal("An internal error occurred")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_publish_error() {
        let error = BasicError::Publish(PublishError::NoBrokersAvailable);
        assert_eq!(
            format!("{}", error),
            "Telemetry publish failed: No Kafka brokers available"
        );
    }

    #[test]
    fn test_display_invalid_forced_status() {
        let error = BasicError::InvalidForcedStatus(42);
        assert_eq!(
            format!("{}", error),
            "Forced status 42 is not a valid HTTP status code"
        );
    }

    #[tokio::test]
    async fn test_invalid_forced_status_response() {
        let response = BasicError::InvalidForcedStatus(42).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "INVALID_FORCED_STATUS");
    }

    #[tokio::test]
    async fn test_publish_error_response_is_generic() {
        let error = BasicError::Publish(PublishError::Connection {
            broker: "kafka:9092".to_string(),
            message: "connection refused".to_string(),
        });
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "PUBLISH_FAILED");
        assert!(!body.to_string().contains("kafka:9092"));
    }

    #[test]
    fn test_into_grpc_status() {
        let status: tonic::Status = BasicError::Publish(PublishError::Timeout).into();
        assert_eq!(status.code(), tonic::Code::Internal);
        assert_eq!(status.message(), "An internal error occurred");
    }
}
