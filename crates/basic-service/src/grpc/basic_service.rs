//! gRPC adapter for the echo endpoint.
//!
//! Implements `fixtures.basic.BasicService/Request`. A forced status is
//! returned as the gRPC status code of the response.

use common::directive::FaultDirective;
use common::transport::Transport;
use proto_gen::basic::basic_service_server::BasicService;
use proto_gen::basic::{BasicRequest, BasicResponse};
use tonic::{Code, Request, Response, Status};
use tracing::instrument;

use crate::services::{EchoEndpoint, EchoOutcome};

/// Message attached to forced failures.
pub const FORCED_ERROR_MESSAGE: &str = "forced error";

/// Basic gRPC service.
pub struct BasicGrpcService {
    echo: EchoEndpoint,
}

impl BasicGrpcService {
    /// Create a gRPC service backed by `echo`.
    pub fn new(echo: EchoEndpoint) -> Self {
        Self { echo }
    }
}

/// Build the status for a forced failure. Codes unknown to gRPC map to
/// `Unknown`.
fn forced_status(code: u32) -> Status {
    let code = i32::try_from(code).map_or(Code::Unknown, Code::from_i32);
    Status::new(code, FORCED_ERROR_MESSAGE)
}

#[tonic::async_trait]
impl BasicService for BasicGrpcService {
    #[instrument(skip_all, name = "basic.grpc.request")]
    async fn request(
        &self,
        request: Request<BasicRequest>,
    ) -> Result<Response<BasicResponse>, Status> {
        let directive = FaultDirective::from_rpc(request.get_ref());

        match self.echo.handle(&directive, Transport::Grpc).await? {
            EchoOutcome::Succeeded => Ok(Response::new(BasicResponse {})),
            EchoOutcome::ForcedFailure(code) => Err(forced_status(code)),
        }
    }
}
