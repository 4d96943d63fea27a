//! Forwarding endpoint and its downstream clients.

pub mod downstream;
pub mod forward;

pub use downstream::{
    DownstreamResponse, GrpcCallResult, GrpcDownstream, HttpDownstream, ReqwestDownstream,
    TonicDownstream,
};
pub use forward::ForwardingEndpoint;
