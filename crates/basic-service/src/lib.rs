//! Basic Service Library
//!
//! The terminal fixture of a fault-injection chain. Every request, over HTTP
//! or gRPC, carries an optional fault directive:
//!
//! - `force_delay` - milliseconds to wait before answering
//! - `force_ret` - status code to answer with instead of succeeding
//!
//! Requests that are not forced to fail publish a telemetry event describing
//! the directive, so tracing pipelines under test can correlate hops.
//!
//! # Modules
//!
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types and their HTTP/gRPC mappings
//! - [`grpc`] - `BasicService` gRPC adapter
//! - [`handlers`] - HTTP adapter
//! - [`observability`] - Health endpoints and Prometheus metrics
//! - [`routes`] - Axum router and application state
//! - [`services`] - Echo endpoint
//! - [`telemetry`] - Telemetry event publishers

pub mod config;
pub mod errors;
pub mod grpc;
pub mod handlers;
pub mod observability;
pub mod routes;
pub mod services;
pub mod telemetry;
