//! HTTP request handlers for the basic service.

pub mod echo;

pub use echo::echo;
