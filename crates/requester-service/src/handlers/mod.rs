//! HTTP request handlers for the requester service.

pub mod forward;

pub use forward::forward;
