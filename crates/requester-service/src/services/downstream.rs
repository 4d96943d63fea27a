//! Downstream clients for the forwarding hop.
//!
//! Each transport has a trait seam so the forwarding endpoint can be tested
//! with mocks:
//!
//! - [`HttpDownstream`] / [`ReqwestDownstream`] - `GET {base}{path}?{directive}`
//!   on a pooled `reqwest::Client`
//! - [`GrpcDownstream`] / [`TonicDownstream`] - `BasicService/Request` on a
//!   cached tonic channel
//!
//! A completed downstream call is returned as-is whatever its status. Only a
//! failure to reach the peer or to complete the call is a [`RequesterError`].
//!
//! Neither client bounds the duration of a call: the caller's own timeout is
//! the only one that applies, so a forced delay of any length is honored.
//! Connection establishment is bounded by the connect timeout.

use async_trait::async_trait;
use axum::http::{HeaderValue, StatusCode};
use bytes::Bytes;
use common::directive::FaultDirective;
use proto_gen::basic::basic_service_client::BasicServiceClient;
use proto_gen::basic::BasicResponse;
use reqwest::Client;
use std::error::Error as _;
use std::time::Duration;
use tokio::sync::RwLock;
use tonic::transport::{Channel, Endpoint};
use tonic::Status;
use tracing::{debug, error, instrument, warn};

use crate::errors::RequesterError;

/// A completed downstream HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownstreamResponse {
    /// Status returned by the downstream hop.
    pub status: StatusCode,
    /// `Content-Type` returned by the downstream hop, if any.
    pub content_type: Option<HeaderValue>,
    /// Response body, unmodified.
    pub body: Bytes,
}

/// Outcome of a completed downstream gRPC call.
pub type GrpcCallResult = Result<BasicResponse, Status>;

/// Trait for downstream HTTP calls (enables mocking).
#[async_trait]
pub trait HttpDownstream: Send + Sync {
    /// Forward `directive` to the downstream HTTP surface.
    async fn get(&self, directive: &FaultDirective) -> Result<DownstreamResponse, RequesterError>;
}

/// Trait for downstream gRPC calls (enables mocking).
#[async_trait]
pub trait GrpcDownstream: Send + Sync {
    /// Forward `directive` to the downstream gRPC surface.
    async fn request(&self, directive: &FaultDirective) -> Result<GrpcCallResult, RequesterError>;
}

/// HTTP downstream client with a configured connect timeout.
#[derive(Clone)]
pub struct ReqwestDownstream {
    /// Pooled HTTP client.
    client: Client,

    /// Base URL of the downstream hop, without a trailing slash.
    base_url: String,
}

impl ReqwestDownstream {
    /// Create a new HTTP downstream client.
    ///
    /// # Errors
    ///
    /// Returns `RequesterError::Internal` if the HTTP client cannot be built.
    pub fn new(base_url: String, connect_timeout: Duration) -> Result<Self, RequesterError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| {
                error!(target: "requester.downstream", error = %e, "Failed to build HTTP client");
                RequesterError::Internal
            })?;

        Ok(Self { client, base_url })
    }

    /// URL for `directive`'s path, without the query.
    fn url_for(&self, directive: &FaultDirective) -> String {
        format!(
            "{}{}",
            self.base_url,
            directive.path.as_deref().unwrap_or_default()
        )
    }
}

#[async_trait]
impl HttpDownstream for ReqwestDownstream {
    #[instrument(skip_all, name = "requester.downstream.http", fields(path = directive.path.as_deref().unwrap_or("")))]
    async fn get(&self, directive: &FaultDirective) -> Result<DownstreamResponse, RequesterError> {
        let url = self.url_for(directive);
        debug!(target: "requester.downstream", url = %url, directive = %directive, "Forwarding HTTP request");

        let response = self
            .client
            .get(&url)
            .query(&directive.query_pairs())
            .send()
            .await
            .map_err(|e| {
                warn!(target: "requester.downstream", error = %e, url = %url, "Downstream HTTP request failed");
                RequesterError::DownstreamUnavailable(format!("HTTP request to {url} failed: {e}"))
            })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .cloned();

        let body = response.bytes().await.map_err(|e| {
            warn!(target: "requester.downstream", error = %e, url = %url, "Failed to read downstream body");
            RequesterError::DownstreamUnavailable(format!("Reading body from {url} failed: {e}"))
        })?;

        debug!(target: "requester.downstream", status = %status, "Received downstream response");

        Ok(DownstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

/// gRPC downstream client.
///
/// The channel is created on first use and cached after a successful
/// connect, so a downstream that starts late is picked up by the next call.
pub struct TonicDownstream {
    /// Downstream gRPC endpoint URL.
    endpoint: String,

    connect_timeout: Duration,

    /// Cached channel. Tonic re-establishes the underlying connection on its
    /// own after the peer goes away.
    channel: RwLock<Option<Channel>>,
}

impl TonicDownstream {
    /// Create a new gRPC downstream client. Does not connect.
    pub fn new(endpoint: String, connect_timeout: Duration) -> Self {
        Self {
            endpoint,
            connect_timeout,
            channel: RwLock::new(None),
        }
    }

    /// Get or create the channel to the downstream endpoint.
    async fn get_channel(&self) -> Result<Channel, RequesterError> {
        // Check cache first
        {
            let channel = self.channel.read().await;
            if let Some(channel) = channel.as_ref() {
                return Ok(channel.clone());
            }
        }

        let channel = Endpoint::from_shared(self.endpoint.clone())
            .map_err(|e| {
                error!(target: "requester.downstream", error = %e, endpoint = %self.endpoint, "Invalid downstream gRPC endpoint");
                RequesterError::InvalidDownstream(format!("{}: {e}", self.endpoint))
            })?
            .connect_timeout(self.connect_timeout)
            .connect()
            .await
            .map_err(|e| {
                warn!(target: "requester.downstream", error = %e, endpoint = %self.endpoint, "Failed to connect to downstream");
                RequesterError::DownstreamUnavailable(format!(
                    "gRPC connect to {} failed: {e}",
                    self.endpoint
                ))
            })?;

        // Cache the channel
        {
            let mut cached = self.channel.write().await;
            *cached = Some(channel.clone());
        }

        Ok(channel)
    }
}

#[async_trait]
impl GrpcDownstream for TonicDownstream {
    #[instrument(skip_all, name = "requester.downstream.grpc", fields(endpoint = %self.endpoint))]
    async fn request(&self, directive: &FaultDirective) -> Result<GrpcCallResult, RequesterError> {
        let channel = self.get_channel().await?;
        debug!(target: "requester.downstream", directive = %directive, "Forwarding gRPC request");

        let mut client = BasicServiceClient::new(channel);
        let result = client
            .request(directive.to_rpc())
            .await
            .map(tonic::Response::into_inner);

        classify_call(&self.endpoint, result)
    }
}

/// Separate statuses the downstream peer sent from failures of the call
/// itself.
///
/// Tonic attaches a source error to every status it synthesizes on the
/// client side (connect failures, broken connections, timeouts). A status
/// decoded from the peer's response never carries one.
fn classify_call(
    endpoint: &str,
    result: GrpcCallResult,
) -> Result<GrpcCallResult, RequesterError> {
    match result {
        Err(status) if status.source().is_some() => {
            warn!(
                target: "requester.downstream",
                endpoint = %endpoint,
                code = ?status.code(),
                error = %status,
                "Downstream gRPC call failed in transport"
            );
            Err(RequesterError::DownstreamUnavailable(format!(
                "gRPC call to {endpoint} failed: {status}"
            )))
        }
        Err(status) => {
            debug!(target: "requester.downstream", code = ?status.code(), "Downstream returned error status");
            Ok(Err(status))
        }
        Ok(response) => Ok(Ok(response)),
    }
}

/// Mock downstream clients for testing.
///
/// This module provides mock implementations of [`HttpDownstream`] and
/// [`GrpcDownstream`] for use in tests.
pub mod mock {

    use super::*;
    use std::sync::Mutex;
    use tonic::Code;

    /// Mock HTTP downstream for unit testing.
    pub struct MockHttpDownstream {
        /// Response to return; `None` simulates an unreachable peer.
        response: Option<DownstreamResponse>,
        /// Directives received, in order.
        calls: Mutex<Vec<FaultDirective>>,
    }

    impl MockHttpDownstream {
        /// Create a mock that answers every call with `status` and `body`.
        pub fn responding(status: StatusCode, body: impl Into<Bytes>) -> Self {
            Self {
                response: Some(DownstreamResponse {
                    status,
                    content_type: None,
                    body: body.into(),
                }),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Create a mock whose peer is unreachable.
        pub fn unreachable() -> Self {
            Self {
                response: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Directives received so far.
        pub fn calls(&self) -> Vec<FaultDirective> {
            self.calls
                .lock()
                .map(|calls| calls.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl HttpDownstream for MockHttpDownstream {
        async fn get(
            &self,
            directive: &FaultDirective,
        ) -> Result<DownstreamResponse, RequesterError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(directive.clone());
            }

            self.response.clone().ok_or_else(|| {
                RequesterError::DownstreamUnavailable("Mock downstream unreachable".to_string())
            })
        }
    }

    /// What [`MockGrpcDownstream`] answers with.
    #[derive(Debug, Clone)]
    enum GrpcBehavior {
        Succeed,
        Fail(Code, String),
        Unreachable,
    }

    /// Mock gRPC downstream for unit testing.
    pub struct MockGrpcDownstream {
        behavior: GrpcBehavior,
        /// Directives received, in order.
        calls: Mutex<Vec<FaultDirective>>,
    }

    impl MockGrpcDownstream {
        fn with_behavior(behavior: GrpcBehavior) -> Self {
            Self {
                behavior,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Create a mock whose calls complete successfully.
        pub fn succeeding() -> Self {
            Self::with_behavior(GrpcBehavior::Succeed)
        }

        /// Create a mock whose calls complete with the given error status.
        pub fn failing_with(code: Code, message: impl Into<String>) -> Self {
            Self::with_behavior(GrpcBehavior::Fail(code, message.into()))
        }

        /// Create a mock whose peer is unreachable.
        pub fn unreachable() -> Self {
            Self::with_behavior(GrpcBehavior::Unreachable)
        }

        /// Directives received so far.
        pub fn calls(&self) -> Vec<FaultDirective> {
            self.calls
                .lock()
                .map(|calls| calls.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl GrpcDownstream for MockGrpcDownstream {
        async fn request(
            &self,
            directive: &FaultDirective,
        ) -> Result<GrpcCallResult, RequesterError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(directive.clone());
            }

            match &self.behavior {
                GrpcBehavior::Succeed => Ok(Ok(BasicResponse {})),
                GrpcBehavior::Fail(code, message) => Ok(Err(Status::new(*code, message.clone()))),
                GrpcBehavior::Unreachable => Err(RequesterError::DownstreamUnavailable(
                    "Mock downstream unreachable".to_string(),
                )),
            }
        }
    }
}
