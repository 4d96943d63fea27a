//! Test server harness for E2E testing
//!
//! Provides `TestBasicServer` and `TestRequesterServer` for spawning real
//! fixture instances in tests. Each runs its HTTP and gRPC surfaces on random
//! localhost ports; health endpoints are not started.
//!
//! Dropping a harness shuts its servers down gracefully, which also closes
//! connections peers already hold, so tests can observe a downstream that
//! goes away mid-session.

use basic_service::grpc::BasicGrpcService;
use basic_service::routes::{self as basic_routes, AppState as BasicAppState};
use basic_service::services::EchoEndpoint;
use basic_service::telemetry::mock::MockPublisher;
use basic_service::telemetry::EventPublisher;
use proto_gen::basic::basic_service_server::{BasicService, BasicServiceServer};
use requester_service::config::Config as RequesterConfig;
use requester_service::grpc::RequesterGrpcService;
use requester_service::routes::{self as requester_routes, AppState as RequesterAppState};
use requester_service::services::{
    ForwardingEndpoint, GrpcDownstream, HttpDownstream, ReqwestDownstream, TonicDownstream,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;

/// Topic the test basic server publishes to.
pub const TEST_TOPIC: &str = "fixtures-test";

/// Running HTTP + gRPC servers on ephemeral ports.
struct Servers {
    http_addr: SocketAddr,
    grpc_addr: SocketAddr,
    http_handle: JoinHandle<()>,
    grpc_handle: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl Servers {
    async fn spawn<S>(app: axum::Router, grpc_service: S) -> Result<Self, anyhow::Error>
    where
        S: BasicService,
    {
        // Bind to random ports
        let http_listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind HTTP test server: {}", e))?;
        let http_addr = http_listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let grpc_listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind gRPC test server: {}", e))?;
        let grpc_addr = grpc_listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let shutdown = CancellationToken::new();

        // Spawn servers in background
        let http_shutdown = shutdown.clone();
        let http_handle = tokio::spawn(async move {
            let server = axum::serve(http_listener, app)
                .with_graceful_shutdown(async move { http_shutdown.cancelled().await });
            if let Err(e) = server.await {
                eprintln!("Test HTTP server error: {}", e);
            }
        });

        let grpc_shutdown = shutdown.clone();
        let grpc_handle = tokio::spawn(async move {
            let result = tonic::transport::Server::builder()
                .add_service(BasicServiceServer::new(grpc_service))
                .serve_with_incoming_shutdown(TcpListenerStream::new(grpc_listener), async move {
                    grpc_shutdown.cancelled().await;
                })
                .await;
            if let Err(e) = result {
                eprintln!("Test gRPC server error: {}", e);
            }
        });

        Ok(Self {
            http_addr,
            grpc_addr,
            http_handle,
            grpc_handle,
            shutdown,
        })
    }
}

impl Drop for Servers {
    fn drop(&mut self) {
        // Signal open connections to close, then abort the accept loops so
        // the listeners are released immediately.
        self.shutdown.cancel();
        self.http_handle.abort();
        self.grpc_handle.abort();
    }
}

/// Test harness for spawning the basic service in E2E tests.
///
/// Telemetry goes to a [`MockPublisher`] the test can inspect.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_echo_publishes() -> anyhow::Result<()> {
///     let server = TestBasicServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/request", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     assert_eq!(server.publisher().events().len(), 1);
///     Ok(())
/// }
/// ```
pub struct TestBasicServer {
    servers: Servers,
    publisher: Arc<MockPublisher>,
}

impl TestBasicServer {
    /// Spawn a basic server whose publisher accepts every event.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_publisher(Arc::new(MockPublisher::accepting())).await
    }

    /// Spawn a basic server publishing to `publisher`.
    ///
    /// # Returns
    /// * `Ok(TestBasicServer)` - Running server instance
    /// * `Err(anyhow::Error)` - If server spawn fails
    pub async fn spawn_with_publisher(
        publisher: Arc<MockPublisher>,
    ) -> Result<Self, anyhow::Error> {
        let echo = EchoEndpoint::new(
            Arc::clone(&publisher) as Arc<dyn EventPublisher>,
            TEST_TOPIC,
        );

        // Build routes using basic-service's real route builder
        let app = basic_routes::build_routes(Arc::new(BasicAppState { echo: echo.clone() }));
        let servers = Servers::spawn(app, BasicGrpcService::new(echo)).await?;

        Ok(Self { servers, publisher })
    }

    /// Get the base URL of the HTTP surface.
    pub fn url(&self) -> String {
        format!("http://{}", self.servers.http_addr)
    }

    /// Get the URL of the gRPC surface.
    pub fn grpc_url(&self) -> String {
        format!("http://{}", self.servers.grpc_addr)
    }

    /// Get the HTTP socket address.
    pub fn addr(&self) -> SocketAddr {
        self.servers.http_addr
    }

    /// Get the gRPC socket address.
    pub fn grpc_addr(&self) -> SocketAddr {
        self.servers.grpc_addr
    }

    /// Get the publisher telemetry events are sent to.
    pub fn publisher(&self) -> &Arc<MockPublisher> {
        &self.publisher
    }
}

/// Test harness for spawning the requester service in E2E tests.
///
/// Forwards to whatever downstream URLs it is given, typically a
/// [`TestBasicServer`] or a stub.
pub struct TestRequesterServer {
    servers: Servers,
    config: RequesterConfig,
}

impl TestRequesterServer {
    /// Spawn a requester server forwarding to `basic_url` (HTTP) and
    /// `basic_grpc_url` (gRPC).
    ///
    /// # Returns
    /// * `Ok(TestRequesterServer)` - Running server instance
    /// * `Err(anyhow::Error)` - If configuration or server spawn fails
    pub async fn spawn(basic_url: &str, basic_grpc_url: &str) -> Result<Self, anyhow::Error> {
        // Build configuration for test environment
        let vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("GRPC_BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("BASIC_SERVER_URL".to_string(), basic_url.to_string()),
            (
                "BASIC_SERVER_GRPC_URL".to_string(),
                basic_grpc_url.to_string(),
            ),
            (
                "DOWNSTREAM_CONNECT_TIMEOUT_SECONDS".to_string(),
                "2".to_string(),
            ),
        ]);

        let config = RequesterConfig::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let http_downstream: Arc<dyn HttpDownstream> = Arc::new(
            ReqwestDownstream::new(
                config.basic_server_url.clone(),
                config.downstream_connect_timeout,
            )
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP downstream: {}", e))?,
        );
        let grpc_downstream: Arc<dyn GrpcDownstream> = Arc::new(TonicDownstream::new(
            config.basic_server_grpc_url.clone(),
            config.downstream_connect_timeout,
        ));
        let forwarding = ForwardingEndpoint::new(http_downstream, grpc_downstream);

        // Build routes using requester-service's real route builder
        let app = requester_routes::build_routes(Arc::new(RequesterAppState {
            forwarding: forwarding.clone(),
        }));
        let servers = Servers::spawn(app, RequesterGrpcService::new(forwarding)).await?;

        Ok(Self { servers, config })
    }

    /// Get the base URL of the HTTP surface.
    pub fn url(&self) -> String {
        format!("http://{}", self.servers.http_addr)
    }

    /// Get the URL of the gRPC surface.
    pub fn grpc_url(&self) -> String {
        format!("http://{}", self.servers.grpc_addr)
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &RequesterConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let server = TestBasicServer::spawn().await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));
        assert!(server.grpc_url().starts_with("http://127.0.0.1:"));
        assert_ne!(server.addr(), server.grpc_addr());

        let response = reqwest::get(format!("{}/request", server.url())).await?;
        assert_eq!(response.status(), 200);
        assert_eq!(server.publisher().events().len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_requester_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let basic = TestBasicServer::spawn().await?;
        let requester = TestRequesterServer::spawn(&basic.url(), &basic.grpc_url()).await?;

        assert_eq!(requester.config().basic_server_url, basic.url());

        let response = reqwest::get(format!("{}/request", requester.url())).await?;
        assert_eq!(response.status(), 200);

        Ok(())
    }
}
