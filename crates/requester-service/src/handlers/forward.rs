//! HTTP adapter for the forwarding endpoint.
//!
//! Answers `GET` on any path by calling the same path on the downstream HTTP
//! surface with the same fault directive, then mirroring the downstream
//! status and body.

use axum::extract::{Query, State};
use axum::http::{header, Uri};
use axum::response::{IntoResponse, Response};
use common::directive::FaultDirective;
use std::sync::Arc;
use tracing::instrument;

use crate::errors::RequesterError;
use crate::routes::AppState;

/// Forwarding handler.
///
/// ## Responses
///
/// - the downstream status and body, whatever the status
/// - `500` with a generic JSON error body when the downstream cannot be
///   reached
#[instrument(skip_all, name = "requester.http.forward", fields(path = %uri.path()))]
pub async fn forward(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, RequesterError> {
    let directive = FaultDirective::from_query_pairs(params).with_path(uri.path());

    let downstream = state.forwarding.forward_http(&directive).await?;

    let mut response = (downstream.status, downstream.body).into_response();
    match downstream.content_type {
        Some(content_type) => {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, content_type);
        }
        None => {
            response.headers_mut().remove(header::CONTENT_TYPE);
        }
    }

    Ok(response)
}
