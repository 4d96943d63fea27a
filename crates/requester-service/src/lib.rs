//! Requester Service Library
//!
//! The forwarding fixture of a fault-injection chain. Every HTTP or gRPC
//! request is relayed one hop downstream with its fault directive
//! (`force_delay`, `force_ret`) re-encoded unchanged, and the downstream
//! outcome is mirrored back to the caller. A forced failure two hops away is
//! indistinguishable from one at this hop.
//!
//! # Modules
//!
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Forwarding failures and their HTTP/gRPC mappings
//! - [`grpc`] - `BasicService` gRPC adapter
//! - [`handlers`] - HTTP adapter
//! - [`observability`] - Health endpoints and Prometheus metrics
//! - [`routes`] - Axum router and application state
//! - [`services`] - Forwarding endpoint and downstream clients

pub mod config;
pub mod errors;
pub mod grpc;
pub mod handlers;
pub mod observability;
pub mod routes;
pub mod services;
