//! Generated Protocol Buffer code for the fault-injection fixtures.
//!
//! This crate contains the compiled Protocol Buffer definitions used on the
//! RPC surface of both fixtures. The generated code is checked in; enable the
//! `regenerate` feature to rebuild it from `proto/basic.proto`.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)] // Generated code has various doc formatting

// Re-export prost traits for convenience
pub use prost::Message;

// Generated protobuf modules
pub mod basic {
    //! `BasicService` request/response messages, client and server
    include!("generated/fixtures.basic.rs");
}
