//! Health endpoints shared by both fixtures.
//!
//! Served on a dedicated listener so they never shadow fixture routes (both
//! HTTP surfaces answer every path):
//! - `GET /health` - Liveness: answers 200 whenever the process can serve it
//! - `GET /ready` - Readiness: 200 while the fixture listeners are serving,
//!   503 before startup completes and while draining on shutdown
//!
//! Each binary merges its `/metrics` route onto the same router.

use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Readiness flag flipped by `main` around the serving phase.
#[derive(Debug, Default)]
pub struct HealthState {
    ready: AtomicBool,
}

impl HealthState {
    /// Create a state that is not ready yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the fixture as serving.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Mark the fixture as draining.
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Create the router serving `/health` and `/ready`.
pub fn health_router(health_state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/ready", get(readiness_handler))
        .with_state(health_state)
}

async fn readiness_handler(State(state): State<Arc<HealthState>>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn status_of(app: Router, uri: &str) -> StatusCode {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_ready_follows_startup_and_drain() {
        let state = Arc::new(HealthState::new());
        let app = health_router(Arc::clone(&state));

        assert_eq!(status_of(app.clone(), "/ready").await, StatusCode::SERVICE_UNAVAILABLE);

        state.set_ready();
        assert_eq!(status_of(app.clone(), "/ready").await, StatusCode::OK);

        state.set_not_ready();
        assert_eq!(status_of(app, "/ready").await, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_liveness_independent_of_readiness() {
        let state = Arc::new(HealthState::new());
        let app = health_router(Arc::clone(&state));

        assert_eq!(status_of(app.clone(), "/health").await, StatusCode::OK);

        state.set_ready();
        state.set_not_ready();
        assert_eq!(status_of(app, "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_fixture_paths_not_served() {
        let app = health_router(Arc::new(HealthState::new()));
        assert_eq!(status_of(app, "/request").await, StatusCode::NOT_FOUND);
    }
}
