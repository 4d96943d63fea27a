//! Telemetry event publishing.
//!
//! The echo endpoint emits one event per successful request. Publishing is a
//! capability injected at construction (`Arc<dyn EventPublisher>`); `main`
//! owns its lifecycle and closes it on shutdown.
//!
//! # Components
//!
//! - [`KafkaPublisher`] - Kafka wire-protocol producer
//! - [`LogPublisher`] - Logs events when no broker is configured
//! - [`mock::MockPublisher`] - Records events for tests

mod kafka;

pub use kafka::KafkaPublisher;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from publishing a telemetry event.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to connect to Kafka broker {broker}: {message}")]
    Connection { broker: String, message: String },

    #[error("No Kafka brokers available")]
    NoBrokersAvailable,

    #[error("Kafka protocol error: {0}")]
    Protocol(String),

    #[error("Kafka broker returned error code {code} for {topic}:{partition}")]
    Broker {
        topic: String,
        partition: i32,
        code: i16,
    },

    #[error("Kafka request timed out")]
    Timeout,

    #[error("Publisher is closed")]
    Closed,
}

/// Publishes telemetry events to a topic.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one message to `topic`.
    async fn publish(&self, message: &str, topic: &str) -> Result<(), PublishError>;

    /// Release any held connections. Later publishes fail with
    /// [`PublishError::Closed`].
    async fn close(&self) {}
}

/// Publisher used when no broker is configured: events are only logged.
#[derive(Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, message: &str, topic: &str) -> Result<(), PublishError> {
        tracing::info!(target: "basic.telemetry", topic = %topic, message = %message, "Telemetry event");
        Ok(())
    }
}

/// Mock publisher module for testing.
///
/// This module provides a mock implementation of [`EventPublisher`] for use in tests.
pub mod mock {

    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// A published event captured by [`MockPublisher`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct PublishedEvent {
        pub topic: String,
        pub message: String,
    }

    /// Mock publisher for unit and integration testing.
    #[derive(Debug, Default)]
    pub struct MockPublisher {
        /// Successfully published events, in order.
        events: Mutex<Vec<PublishedEvent>>,
        /// Number of publish attempts (including failures).
        attempts: AtomicUsize,
        /// Whether to return errors.
        return_error: AtomicBool,
        /// Woken on every publish attempt.
        notify: Notify,
    }

    impl MockPublisher {
        /// Create a mock that records every event.
        pub fn accepting() -> Self {
            Self::default()
        }

        /// Create a mock that fails every publish.
        pub fn failing() -> Self {
            let mock = Self::default();
            mock.return_error.store(true, Ordering::SeqCst);
            mock
        }

        /// Number of publish attempts, successful or not.
        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        /// Snapshot of successfully published events.
        pub fn events(&self) -> Vec<PublishedEvent> {
            self.events
                .lock()
                .map(|events| events.clone())
                .unwrap_or_default()
        }

        /// Wait until at least `count` publish attempts happened or `timeout`
        /// elapsed. Returns whether the count was reached.
        ///
        /// Useful for best-effort publishes that run on a spawned task.
        pub async fn wait_for_attempts(&self, count: usize, timeout: Duration) -> bool {
            let wait = async {
                loop {
                    let notified = self.notify.notified();
                    if self.attempts() >= count {
                        return;
                    }
                    notified.await;
                }
            };
            tokio::time::timeout(timeout, wait).await.is_ok()
        }
    }

    #[async_trait]
    impl EventPublisher for MockPublisher {
        async fn publish(&self, message: &str, topic: &str) -> Result<(), PublishError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);

            let result = if self.return_error.load(Ordering::SeqCst) {
                Err(PublishError::NoBrokersAvailable)
            } else {
                if let Ok(mut events) = self.events.lock() {
                    events.push(PublishedEvent {
                        topic: topic.to_string(),
                        message: message.to_string(),
                    });
                }
                Ok(())
            };

            self.notify.notify_waiters();
            result
        }
    }

}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_publisher_always_succeeds() {
        let publisher = LogPublisher;
        assert!(publisher.publish("event", "topic").await.is_ok());
        publisher.close().await;
    }

    #[test]
    fn test_broker_error_display() {
        let error = PublishError::Broker {
            topic: "fixtures".to_string(),
            partition: 0,
            code: 3,
        };
        assert_eq!(
            error.to_string(),
            "Kafka broker returned error code 3 for fixtures:0"
        );
    }
}
