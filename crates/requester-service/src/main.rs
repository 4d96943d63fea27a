//! Requester Service
//!
//! Forwarding fault-injection fixture.
//!
//! # Servers
//!
//! - HTTP server forwarding `GET` on any path (default: 0.0.0.0:8081)
//! - gRPC server for `fixtures.basic.BasicService` (default: 0.0.0.0:6061)
//! - HTTP server for health endpoints and metrics (default: 0.0.0.0:9091)
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize Prometheus metrics recorder
//! 3. Create the downstream HTTP and gRPC clients (gRPC connects lazily)
//! 4. Bind all three listeners (fail fast on bind errors)
//! 5. Spawn the servers and mark the service ready
//! 6. Wait for shutdown signal and stop the servers

#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)] // main.rs orchestrates startup, naturally longer

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use proto_gen::basic::basic_service_server::BasicServiceServer;
use requester_service::config::Config;
use requester_service::grpc::RequesterGrpcService;
use requester_service::observability::metrics::init_metrics_recorder;
use requester_service::observability::{health_router, HealthState};
use requester_service::routes::{self, AppState};
use requester_service::services::{
    ForwardingEndpoint, GrpcDownstream, HttpDownstream, ReqwestDownstream, TonicDownstream,
};
use tokio::signal;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Requester Service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        grpc_bind_address = %config.grpc_bind_address,
        health_bind_address = %config.health_bind_address,
        basic_server_url = %config.basic_server_url,
        basic_server_grpc_url = %config.basic_server_grpc_url,
        downstream_connect_timeout_seconds = config.downstream_connect_timeout.as_secs(),
        "Configuration loaded successfully"
    );

    // This must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let health_state = Arc::new(HealthState::new());

    let http_downstream: Arc<dyn HttpDownstream> = Arc::new(ReqwestDownstream::new(
        config.basic_server_url.clone(),
        config.downstream_connect_timeout,
    )?);
    let grpc_downstream: Arc<dyn GrpcDownstream> = Arc::new(TonicDownstream::new(
        config.basic_server_grpc_url.clone(),
        config.downstream_connect_timeout,
    ));

    let forwarding = ForwardingEndpoint::new(http_downstream, grpc_downstream);

    let shutdown_token = CancellationToken::new();

    // Bind listeners BEFORE spawning to fail fast on bind errors
    let http_addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.bind_address, "Invalid bind address");
        e
    })?;
    let grpc_addr: SocketAddr = config.grpc_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.grpc_bind_address, "Invalid gRPC bind address");
        e
    })?;
    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        e
    })?;

    let http_listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %http_addr, "Failed to bind HTTP server");
            e
        })?;
    let grpc_listener = tokio::net::TcpListener::bind(grpc_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %grpc_addr, "Failed to bind gRPC server");
            e
        })?;
    let health_listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            e
        })?;

    // Health server: liveness, readiness and Prometheus /metrics
    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );
    let health_app = health_router(Arc::clone(&health_state)).merge(metrics_router);

    let health_shutdown_token = shutdown_token.child_token();
    let health_task = tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(health_listener, health_app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    // HTTP forwarding server
    let app = routes::build_routes(Arc::new(AppState {
        forwarding: forwarding.clone(),
    }));
    let http_shutdown_token = shutdown_token.child_token();
    let http_task = tokio::spawn(async move {
        info!(addr = %http_addr, "HTTP server starting");
        let server = axum::serve(http_listener, app).with_graceful_shutdown(async move {
            http_shutdown_token.cancelled().await;
            info!("HTTP server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "HTTP server failed");
        }
    });

    // gRPC forwarding server
    let grpc_shutdown_token = shutdown_token.child_token();
    let grpc_server = tonic::transport::Server::builder()
        .add_service(BasicServiceServer::new(RequesterGrpcService::new(forwarding)))
        .serve_with_incoming_shutdown(TcpListenerStream::new(grpc_listener), async move {
            grpc_shutdown_token.cancelled().await;
            info!("gRPC server shutting down");
        });
    let grpc_task = tokio::spawn(async move {
        info!(addr = %grpc_addr, "gRPC server starting");
        if let Err(e) = grpc_server.await {
            error!(error = %e, "gRPC server failed");
        }
    });

    health_state.set_ready();
    info!("Requester Service running - press Ctrl+C to shutdown");

    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    // Mark as not ready immediately so k8s stops sending traffic
    health_state.set_not_ready();

    shutdown_token.cancel();

    for (name, task) in [("http", http_task), ("grpc", grpc_task), ("health", health_task)] {
        if let Err(e) = task.await {
            warn!(server = name, error = %e, "Server task did not exit cleanly");
        }
    }

    info!("Requester Service shutdown complete");
    Ok(())
}

/// Initialize tracing. `LOG_FORMAT=json` switches to JSON log lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "requester_service=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
