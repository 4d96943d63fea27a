//! Basic service configuration.
//!
//! Configuration is loaded once from environment variables at startup and is
//! immutable afterwards.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default gRPC bind address.
pub const DEFAULT_GRPC_BIND_ADDRESS: &str = "0.0.0.0:6060";

/// Default health/metrics bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:9090";

/// Default Kafka topic for telemetry events.
pub const DEFAULT_KAFKA_TOPIC: &str = "fixtures";

/// Default Kafka client identifier.
pub const DEFAULT_KAFKA_CLIENT_ID: &str = "basic-service";

/// Default Kafka request timeout in seconds.
pub const DEFAULT_KAFKA_TIMEOUT_SECONDS: u64 = 10;

/// Kafka connection settings for the telemetry publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaConfig {
    /// Bootstrap brokers as `host:port`, tried in order.
    pub brokers: Vec<String>,

    /// Topic events are published to.
    pub topic: String,

    /// Partition events are published to.
    pub partition: i32,

    /// Client identifier sent in every request header.
    pub client_id: String,

    /// Upper bound for connecting and for each produce round trip.
    pub timeout: Duration,
}

/// Basic service configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// gRPC bind address (default: "0.0.0.0:6060").
    pub grpc_bind_address: String,

    /// Health and metrics bind address (default: "0.0.0.0:9090").
    pub health_bind_address: String,

    /// Telemetry topic. Used for log output even when Kafka is disabled.
    pub topic: String,

    /// Kafka settings. `None` when `KAFKA_BROKER_URL` is unset, in which case
    /// events are logged rather than published.
    pub kafka: Option<KafkaConfig>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("grpc_bind_address", &self.grpc_bind_address)
            .field("health_bind_address", &self.health_bind_address)
            .field("topic", &self.topic)
            .field("kafka_brokers", &self.kafka.as_ref().map(|k| &k.brokers))
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid Kafka broker configuration: {0}")]
    InvalidKafkaBrokers(String),

    #[error("Invalid Kafka partition configuration: {0}")]
    InvalidKafkaPartition(String),

    #[error("Invalid Kafka timeout configuration: {0}")]
    InvalidKafkaTimeout(String),
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

        let topic = vars
            .get("KAFKA_TOPIC")
            .filter(|t| !t.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_KAFKA_TOPIC.to_string());

        let kafka = match vars.get("KAFKA_BROKER_URL").filter(|v| !v.is_empty()) {
            Some(raw) => Some(KafkaConfig {
                brokers: parse_brokers(raw)?,
                topic: topic.clone(),
                partition: parse_partition(vars.get("KAFKA_PARTITION"))?,
                client_id: vars
                    .get("KAFKA_CLIENT_ID")
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_KAFKA_CLIENT_ID.to_string()),
                timeout: parse_timeout(vars.get("KAFKA_TIMEOUT_SECONDS"))?,
            }),
            None => None,
        };

        Ok(Config {
            bind_address,
            grpc_bind_address,
            health_bind_address,
            topic,
            kafka,
        })
    }
}

fn parse_brokers(raw: &str) -> Result<Vec<String>, ConfigError> {
    let brokers: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(ToString::to_string)
        .collect();

    if brokers.is_empty() {
        return Err(ConfigError::InvalidKafkaBrokers(format!(
            "KAFKA_BROKER_URL must list at least one host:port, got '{raw}'"
        )));
    }

    if let Some(bad) = brokers.iter().find(|b| !b.contains(':')) {
        return Err(ConfigError::InvalidKafkaBrokers(format!(
            "KAFKA_BROKER_URL entries must be host:port, got '{bad}'"
        )));
    }

    Ok(brokers)
}

fn parse_partition(raw: Option<&String>) -> Result<i32, ConfigError> {
    let Some(value_str) = raw else {
        return Ok(0);
    };

    let value: i32 = value_str.parse().map_err(|e| {
        ConfigError::InvalidKafkaPartition(format!(
            "KAFKA_PARTITION must be a valid integer, got '{value_str}': {e}"
        ))
    })?;

    if value < 0 {
        return Err(ConfigError::InvalidKafkaPartition(format!(
            "KAFKA_PARTITION must not be negative, got {value}"
        )));
    }

    Ok(value)
}

fn parse_timeout(raw: Option<&String>) -> Result<Duration, ConfigError> {
    let Some(value_str) = raw else {
        return Ok(Duration::from_secs(DEFAULT_KAFKA_TIMEOUT_SECONDS));
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidKafkaTimeout(format!(
            "KAFKA_TIMEOUT_SECONDS must be a valid positive integer, got '{value_str}': {e}"
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidKafkaTimeout(
            "KAFKA_TIMEOUT_SECONDS must be greater than 0".to_string(),
        ));
    }

    Ok(Duration::from_secs(value))
}
