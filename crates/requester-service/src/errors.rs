//! Requester service error types.
//!
//! Only failures of the forwarding hop itself are errors. A downstream
//! response of any status, forced or not, is relayed and never turned into a
//! `RequesterError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message returned when the downstream gRPC peer cannot be reached.
pub const DOWNSTREAM_UNAVAILABLE_MESSAGE: &str = "couldn't connect to downstream";

/// Requester service error type.
///
/// All variants map to 500 Internal Server Error over HTTP. Over gRPC,
/// `DownstreamUnavailable` maps to `UNAVAILABLE` and the rest to `INTERNAL`.
#[derive(Debug, Error)]
pub enum RequesterError {
    /// The downstream peer could not be reached or the call did not complete.
    #[error("Downstream unavailable: {0}")]
    DownstreamUnavailable(String),

    /// The configured downstream address cannot be used.
    #[error("Invalid downstream address: {0}")]
    InvalidDownstream(String),

    #[error("Internal server error")]
    Internal,
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

impl IntoResponse for RequesterError {
    fn into_response(self) -> Response {
        // Log actual error server-side, return generic message to client
        tracing::error!(target: "requester.http", error = %self, "Forwarding failed");

        let code = match &self {
            RequesterError::DownstreamUnavailable(_) => "DOWNSTREAM_UNAVAILABLE",
            RequesterError::InvalidDownstream(_) | RequesterError::Internal => "INTERNAL_ERROR",
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: "An internal error occurred".to_string(),
            },
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(error_response)).into_response()
    }
}

impl From<RequesterError> for tonic::Status {
    fn from(err: RequesterError) -> Self {
        tracing::error!(target: "requester.grpc", error = %err, "Forwarding failed");
        match err {
            RequesterError::DownstreamUnavailable(_) => {
                tonic::Status::unavailable(DOWNSTREAM_UNAVAILABLE_MESSAGE)
            }
            RequesterError::InvalidDownstream(_) | RequesterError::Internal => {
                tonic::Status::internal("An internal error occurred")
            }
        }
    }
}
