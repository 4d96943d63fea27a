//! gRPC adapter for the forwarding endpoint.
//!
//! Serves `fixtures.basic.BasicService/Request` and relays each call to the
//! downstream gRPC surface. A completed downstream call, successful or not,
//! is returned verbatim.

use common::directive::FaultDirective;
use proto_gen::basic::basic_service_server::BasicService;
use proto_gen::basic::{BasicRequest, BasicResponse};
use tonic::{Request, Response, Status};
use tracing::instrument;

use crate::services::ForwardingEndpoint;

/// Requester gRPC service.
pub struct RequesterGrpcService {
    forwarding: ForwardingEndpoint,
}

impl RequesterGrpcService {
    /// Create a gRPC service backed by `forwarding`.
    pub fn new(forwarding: ForwardingEndpoint) -> Self {
        Self { forwarding }
    }
}

#[tonic::async_trait]
impl BasicService for RequesterGrpcService {
    #[instrument(skip_all, name = "requester.grpc.request")]
    async fn request(
        &self,
        request: Request<BasicRequest>,
    ) -> Result<Response<BasicResponse>, Status> {
        let directive = FaultDirective::from_rpc(request.get_ref());

        self.forwarding
            .forward_grpc(&directive)
            .await?
            .map(Response::new)
    }
}
