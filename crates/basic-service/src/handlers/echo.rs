//! HTTP adapter for the echo endpoint.
//!
//! Answers `GET` on any path. The fault directive is read from the
//! `force_delay` and `force_ret` query parameters; malformed values are
//! treated as absent.

use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use common::directive::FaultDirective;
use common::transport::Transport;
use std::sync::Arc;
use tracing::instrument;

use crate::errors::BasicError;
use crate::routes::AppState;
use crate::services::EchoOutcome;

/// Echo handler.
///
/// ## Responses
///
/// - `200` with an empty body when no status is forced and the telemetry
///   event was published
/// - the forced status with an empty body
/// - `500` when the publish failed or the forced status cannot be expressed
///   over HTTP
#[instrument(skip_all, name = "basic.http.echo", fields(path = %uri.path()))]
pub async fn echo(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<StatusCode, BasicError> {
    let directive = FaultDirective::from_query_pairs(params).with_path(uri.path());

    match state.echo.handle(&directive, Transport::Http).await? {
        EchoOutcome::Succeeded => Ok(StatusCode::OK),
        EchoOutcome::ForcedFailure(code) => forced_status(code),
    }
}

/// Convert a forced status into an HTTP final status.
///
/// Informational (1xx) codes and anything outside `100..=999` are rejected.
fn forced_status(code: u32) -> Result<StatusCode, BasicError> {
    u16::try_from(code)
        .ok()
        .and_then(|c| StatusCode::from_u16(c).ok())
        .filter(|status| !status.is_informational())
        .ok_or(BasicError::InvalidForcedStatus(code))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_forced_status_valid_codes() {
        assert_eq!(forced_status(503).unwrap(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(forced_status(404).unwrap(), StatusCode::NOT_FOUND);
        assert_eq!(forced_status(200).unwrap(), StatusCode::OK);
        assert_eq!(forced_status(999).unwrap().as_u16(), 999);
    }

    #[test]
    fn test_forced_status_rejects_unrepresentable_codes() {
        assert!(matches!(
            forced_status(42),
            Err(BasicError::InvalidForcedStatus(42))
        ));
        assert!(matches!(
            forced_status(101),
            Err(BasicError::InvalidForcedStatus(101))
        ));
        assert!(matches!(
            forced_status(1000),
            Err(BasicError::InvalidForcedStatus(1000))
        ));
        assert!(matches!(
            forced_status(70_000),
            Err(BasicError::InvalidForcedStatus(70_000))
        ));
    }
}
