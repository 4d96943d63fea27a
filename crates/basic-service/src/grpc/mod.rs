//! gRPC services for the basic service.

pub mod basic_service;

pub use basic_service::BasicGrpcService;
