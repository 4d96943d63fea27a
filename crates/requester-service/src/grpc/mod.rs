//! gRPC services for the requester service.

pub mod requester_service;

pub use requester_service::RequesterGrpcService;
