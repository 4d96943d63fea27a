//! Observability for the requester service: health endpoints and metrics.

pub mod metrics;

pub use common::health::{health_router, HealthState};
