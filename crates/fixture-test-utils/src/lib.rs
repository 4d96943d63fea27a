//! # Fixture Test Utilities
//!
//! Shared test utilities for the fault-injection fixtures.
//!
//! This crate provides:
//! - Server test harnesses (`TestBasicServer`, `TestRequesterServer`) that run
//!   the real HTTP and gRPC surfaces on ephemeral ports
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fixture_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_chain() -> anyhow::Result<()> {
//!     let basic = TestBasicServer::spawn().await?;
//!     let requester = TestRequesterServer::spawn(&basic.url(), &basic.grpc_url()).await?;
//!
//!     let response = reqwest::get(format!("{}/request?force_ret=503", requester.url())).await?;
//!
//!     assert_eq!(response.status(), 503);
//!     Ok(())
//! }
//! ```

pub mod server_harness;

// Re-export commonly used items
pub use server_harness::*;
