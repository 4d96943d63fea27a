//! Echo endpoint: the terminal hop of a fixture chain.
//!
//! For each request:
//! 1. Sleep for the forced delay (this request only).
//! 2. If a status is forced, stop and report it. Nothing is published.
//! 3. Otherwise publish a telemetry event and report success.
//!
//! # Publish policy
//!
//! The HTTP surface awaits the publish and turns a failure into a 500; the
//! RPC surface publishes on a spawned task and only logs failures. Both
//! fixtures in the field behave this way and tracing tools under test depend
//! on it, so the policy is carried by [`Transport`] rather than unified.

use common::directive::FaultDirective;
use common::transport::Transport;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::errors::BasicError;
use crate::observability::metrics;
use crate::telemetry::EventPublisher;

/// What the echo endpoint decided for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoOutcome {
    /// Delay elapsed and the telemetry event was handled per policy.
    Succeeded,
    /// The caller forced this status code.
    ForcedFailure(u32),
}

impl EchoOutcome {
    fn label(self) -> &'static str {
        match self {
            EchoOutcome::Succeeded => "success",
            EchoOutcome::ForcedFailure(_) => "forced_failure",
        }
    }
}

/// How a failed telemetry publish affects the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishPolicy {
    /// Await the publish; a failure fails the request.
    Required,
    /// Publish on a separate task; failures are logged and counted only.
    BestEffort,
}

impl PublishPolicy {
    /// Policy applied to requests arriving on `transport`.
    #[must_use]
    pub const fn for_transport(transport: Transport) -> Self {
        match transport {
            Transport::Http => PublishPolicy::Required,
            Transport::Grpc => PublishPolicy::BestEffort,
        }
    }
}

/// Telemetry message describing a handled request.
#[must_use]
pub fn event_message(transport: Transport, directive: &FaultDirective) -> String {
    format!("Received {transport} request with {directive}")
}

/// Terminal fixture endpoint.
///
/// Stateless per request; the publisher and topic are read-only shared state.
#[derive(Clone)]
pub struct EchoEndpoint {
    publisher: Arc<dyn EventPublisher>,
    topic: String,
}

impl EchoEndpoint {
    /// Create an echo endpoint publishing to `topic`.
    pub fn new(publisher: Arc<dyn EventPublisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }

    /// Apply `directive` to the current request.
    ///
    /// # Errors
    ///
    /// - `BasicError::Publish` - the publish failed under [`PublishPolicy::Required`]
    #[instrument(skip_all, name = "basic.echo", fields(transport = %transport, delay_ms = directive.delay_ms, forced_status = directive.forced_status))]
    pub async fn handle(
        &self,
        directive: &FaultDirective,
        transport: Transport,
    ) -> Result<EchoOutcome, BasicError> {
        if directive.delay_ms > 0 {
            directive.apply_delay().await;
            metrics::record_injected_delay(transport, directive.delay());
        }

        let result = self.resolve(directive, transport).await;

        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(_) => "publish_failed",
        };
        metrics::record_request(transport, label);

        result
    }

    async fn resolve(
        &self,
        directive: &FaultDirective,
        transport: Transport,
    ) -> Result<EchoOutcome, BasicError> {
        if let Some(code) = directive.forced_status {
            debug!(target: "basic.echo", forced_status = code, "Returning forced status");
            return Ok(EchoOutcome::ForcedFailure(code));
        }

        let message = event_message(transport, directive);

        match PublishPolicy::for_transport(transport) {
            PublishPolicy::Required => {
                if let Err(e) = self.publisher.publish(&message, &self.topic).await {
                    metrics::record_publish_failure(transport);
                    return Err(BasicError::Publish(e));
                }
            }
            PublishPolicy::BestEffort => {
                let publisher = Arc::clone(&self.publisher);
                let topic = self.topic.clone();
                tokio::spawn(async move {
                    if let Err(e) = publisher.publish(&message, &topic).await {
                        metrics::record_publish_failure(transport);
                        warn!(
                            target: "basic.telemetry",
                            error = %e,
                            transport = %transport,
                            "Best-effort telemetry publish failed"
                        );
                    }
                });
            }
        }

        Ok(EchoOutcome::Succeeded)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::telemetry::mock::MockPublisher;
    use std::time::Duration;

    fn endpoint(publisher: &Arc<MockPublisher>) -> EchoEndpoint {
        EchoEndpoint::new(Arc::clone(publisher) as Arc<dyn EventPublisher>, "fixtures")
    }

    #[test]
    fn test_policy_per_transport() {
        assert_eq!(
            PublishPolicy::for_transport(Transport::Http),
            PublishPolicy::Required
        );
        assert_eq!(
            PublishPolicy::for_transport(Transport::Grpc),
            PublishPolicy::BestEffort
        );
    }

    #[test]
    fn test_event_message() {
        assert_eq!(
            event_message(Transport::Http, &FaultDirective::new(50, None)),
            "Received http request with delay: 50, return code: 0"
        );
        assert_eq!(
            event_message(Transport::Grpc, &FaultDirective::default()),
            "Received grpc request with delay: 0, return code: 0"
        );
    }

    #[tokio::test]
    async fn test_success_publishes_event() {
        let publisher = Arc::new(MockPublisher::accepting());
        let echo = endpoint(&publisher);

        let outcome = echo
            .handle(&FaultDirective::default(), Transport::Http)
            .await
            .unwrap();

        assert_eq!(outcome, EchoOutcome::Succeeded);
        let events = publisher.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].topic, "fixtures");
        assert_eq!(
            events[0].message,
            "Received http request with delay: 0, return code: 0"
        );
    }

    #[tokio::test]
    async fn test_forced_status_skips_publish() {
        let publisher = Arc::new(MockPublisher::accepting());
        let echo = endpoint(&publisher);

        let outcome = echo
            .handle(&FaultDirective::new(0, Some(503)), Transport::Http)
            .await
            .unwrap();

        assert_eq!(outcome, EchoOutcome::ForcedFailure(503));
        assert_eq!(publisher.attempts(), 0);
    }

    #[tokio::test]
    async fn test_forced_status_skips_publish_on_grpc() {
        let publisher = Arc::new(MockPublisher::accepting());
        let echo = endpoint(&publisher);

        let outcome = echo
            .handle(&FaultDirective::new(0, Some(14)), Transport::Grpc)
            .await
            .unwrap();

        assert_eq!(outcome, EchoOutcome::ForcedFailure(14));
        assert!(!publisher.wait_for_attempts(1, Duration::from_millis(50)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_applied_before_forced_status() {
        let publisher = Arc::new(MockPublisher::accepting());
        let echo = endpoint(&publisher);
        let start = tokio::time::Instant::now();

        let outcome = echo
            .handle(&FaultDirective::new(50, Some(503)), Transport::Http)
            .await
            .unwrap();

        assert_eq!(outcome, EchoOutcome::ForcedFailure(503));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_applied_on_success() {
        let publisher = Arc::new(MockPublisher::accepting());
        let echo = endpoint(&publisher);
        let start = tokio::time::Instant::now();

        echo.handle(&FaultDirective::new(300, None), Transport::Grpc)
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_http_publish_failure_fails_request() {
        let publisher = Arc::new(MockPublisher::failing());
        let echo = endpoint(&publisher);

        let result = echo
            .handle(&FaultDirective::default(), Transport::Http)
            .await;

        assert!(matches!(result, Err(BasicError::Publish(_))));
        assert_eq!(publisher.attempts(), 1);
    }

    #[tokio::test]
    async fn test_grpc_publish_failure_is_best_effort() {
        let publisher = Arc::new(MockPublisher::failing());
        let echo = endpoint(&publisher);

        let outcome = echo
            .handle(&FaultDirective::default(), Transport::Grpc)
            .await
            .unwrap();

        assert_eq!(outcome, EchoOutcome::Succeeded);
        assert!(publisher.wait_for_attempts(1, Duration::from_secs(1)).await);
    }
}
