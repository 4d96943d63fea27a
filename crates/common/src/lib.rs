//! Common types shared by the fault-injection fixtures.
//!
//! The only state that crosses a hop boundary is the [`directive::FaultDirective`]:
//! a forced delay and an optional forced status. Both fixtures decode it from
//! whichever transport the request arrived on and, when forwarding, encode it
//! again onto the outbound call.

#![warn(clippy::pedantic)]

/// Module for the fault directive and its HTTP/RPC codecs
pub mod directive;

/// Module for the liveness/readiness router served by both fixtures
pub mod health;

/// Module for transport identification shared by logs and metrics
pub mod transport;
