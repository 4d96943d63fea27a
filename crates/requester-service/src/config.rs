//! Requester service configuration.
//!
//! Loaded once from environment variables at startup. The downstream
//! addresses are required: a forwarding fixture without a next hop has
//! nothing to do.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default gRPC bind address.
pub const DEFAULT_GRPC_BIND_ADDRESS: &str = "0.0.0.0:6061";

/// Default health/metrics bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:9091";

/// Default downstream connect timeout in seconds.
pub const DEFAULT_DOWNSTREAM_CONNECT_TIMEOUT_SECONDS: u64 = 5;

/// Requester service configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP bind address (default: "0.0.0.0:8081").
    pub bind_address: String,

    /// gRPC bind address (default: "0.0.0.0:6061").
    pub grpc_bind_address: String,

    /// Health and metrics bind address (default: "0.0.0.0:9091").
    pub health_bind_address: String,

    /// Base URL of the downstream HTTP surface, without a trailing slash.
    pub basic_server_url: String,

    /// URL of the downstream gRPC surface.
    pub basic_server_grpc_url: String,

    /// Upper bound for establishing a downstream connection. A call in
    /// progress is never cut short by the forwarding hop.
    pub downstream_connect_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("grpc_bind_address", &self.grpc_bind_address)
            .field("health_bind_address", &self.health_bind_address)
            .field("basic_server_url", &self.basic_server_url)
            .field("basic_server_grpc_url", &self.basic_server_grpc_url)
            .field("downstream_connect_timeout", &self.downstream_connect_timeout)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid downstream URL in {var}: {message}")]
    InvalidDownstreamUrl { var: String, message: String },

    #[error("Invalid timeout configuration: {0}")]
    InvalidTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let grpc_bind_address = vars
            .get("GRPC_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_GRPC_BIND_ADDRESS.to_string());

        let health_bind_address = vars
            .get("HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let basic_server_url = required_url(vars, "BASIC_SERVER_URL")?;
        let basic_server_grpc_url = required_url(vars, "BASIC_SERVER_GRPC_URL")?;

        let downstream_connect_timeout = parse_seconds(
            vars,
            "DOWNSTREAM_CONNECT_TIMEOUT_SECONDS",
            DEFAULT_DOWNSTREAM_CONNECT_TIMEOUT_SECONDS,
        )?;

        Ok(Config {
            bind_address,
            grpc_bind_address,
            health_bind_address,
            basic_server_url,
            basic_server_grpc_url,
            downstream_connect_timeout,
        })
    }
}

/// Read a required `http://` or `https://` URL, trimming trailing slashes so
/// the inbound path can be appended as-is.
fn required_url(vars: &HashMap<String, String>, var: &str) -> Result<String, ConfigError> {
    let raw = vars
        .get(var)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))?;

    if !raw.starts_with("http://") && !raw.starts_with("https://") {
        return Err(ConfigError::InvalidDownstreamUrl {
            var: var.to_string(),
            message: format!("must start with http:// or https://, got '{raw}'"),
        });
    }

    Ok(raw.trim_end_matches('/').to_string())
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    var: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(value_str) = vars.get(var) else {
        return Ok(Duration::from_secs(default));
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidTimeout(format!(
            "{var} must be a valid positive integer, got '{value_str}': {e}"
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidTimeout(format!(
            "{var} must be greater than 0"
        )));
    }

    Ok(Duration::from_secs(value))
}
