//! Observability for the basic service.
//!
//! - [`health_router`] - Liveness/readiness endpoints, shared with the
//!   requester and served on the health listener
//! - `metrics` - Prometheus metric definitions and recorder setup

pub mod metrics;

pub use common::health::{health_router, HealthState};
