//! Forwarding endpoint: the non-terminal hop of a fixture chain.
//!
//! The directive is re-encoded onto the outbound call unchanged and the
//! downstream outcome is relayed verbatim, so a forced failure further down
//! the chain looks exactly like one at this hop. This hop does not sleep
//! itself; the delay is honored where the chain terminates.

use common::directive::FaultDirective;
use common::transport::Transport;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use crate::errors::RequesterError;
use crate::observability::metrics;
use crate::services::downstream::{
    DownstreamResponse, GrpcCallResult, GrpcDownstream, HttpDownstream,
};

/// Non-terminal fixture endpoint.
#[derive(Clone)]
pub struct ForwardingEndpoint {
    http: Arc<dyn HttpDownstream>,
    grpc: Arc<dyn GrpcDownstream>,
}

impl ForwardingEndpoint {
    /// Create a forwarding endpoint over the given downstream clients.
    pub fn new(http: Arc<dyn HttpDownstream>, grpc: Arc<dyn GrpcDownstream>) -> Self {
        Self { http, grpc }
    }

    /// Forward an HTTP request one hop downstream.
    ///
    /// # Errors
    ///
    /// - `RequesterError::DownstreamUnavailable` - the peer could not be reached
    #[instrument(skip_all, name = "requester.forward.http", fields(directive = %directive))]
    pub async fn forward_http(
        &self,
        directive: &FaultDirective,
    ) -> Result<DownstreamResponse, RequesterError> {
        let start = Instant::now();
        let result = self.http.get(directive).await;
        metrics::record_forward(Transport::Http, outcome_label(&result), start.elapsed());
        result
    }

    /// Forward a gRPC request one hop downstream.
    ///
    /// # Errors
    ///
    /// - `RequesterError::DownstreamUnavailable` - the peer could not be reached
    /// - `RequesterError::InvalidDownstream` - the configured endpoint is unusable
    #[instrument(skip_all, name = "requester.forward.grpc", fields(directive = %directive))]
    pub async fn forward_grpc(
        &self,
        directive: &FaultDirective,
    ) -> Result<GrpcCallResult, RequesterError> {
        let start = Instant::now();
        let result = self.grpc.request(directive).await;
        metrics::record_forward(Transport::Grpc, outcome_label(&result), start.elapsed());
        result
    }
}

fn outcome_label<T>(result: &Result<T, RequesterError>) -> &'static str {
    match result {
        Ok(_) => "relayed",
        Err(_) => "unavailable",
    }
}
