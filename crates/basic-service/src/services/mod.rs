//! Service layer for the basic service.
//!
//! # Components
//!
//! - `echo` - Terminal echo endpoint applying a fault directive

pub mod echo;

pub use echo::{EchoEndpoint, EchoOutcome, PublishPolicy};
