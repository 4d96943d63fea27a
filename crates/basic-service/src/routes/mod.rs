//! HTTP routes for the basic service.
//!
//! Defines the Axum router and application state.

use crate::handlers;
use crate::services::EchoEndpoint;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Terminal endpoint every request is routed to.
    pub echo: EchoEndpoint,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `GET /` and `GET /*path` - Echo endpoint (every path behaves the same)
/// - TraceLayer for request logging
pub fn build_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::echo))
        .route("/*path", get(handlers::echo))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
