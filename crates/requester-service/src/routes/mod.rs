//! HTTP routes for the requester service.
//!
//! Defines the Axum router and application state.

use crate::handlers;
use crate::services::ForwardingEndpoint;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Endpoint every request is forwarded through.
    pub forwarding: ForwardingEndpoint,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `GET /` and `GET /*path` - Forwarding endpoint (path is forwarded as-is)
/// - TraceLayer for request logging
pub fn build_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::forward))
        .route("/*path", get(handlers::forward))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
