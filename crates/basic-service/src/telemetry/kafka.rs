//! Kafka producer speaking the wire protocol directly.
//!
//! Each publish encodes a single-record v2 batch and sends a `Produce`
//! request (acks = leader) to the configured partition. Connections are
//! opened lazily and checked out of a small idle pool for exactly one
//! request/response, so concurrent publishes never queue behind each other.
//! A connection that fails at the transport or protocol level is discarded
//! instead of being returned.

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use kafka_protocol::messages::produce_request::{PartitionProduceData, TopicProduceData};
use kafka_protocol::messages::{
    ApiKey, ProduceRequest, ProduceResponse, RequestHeader, ResponseHeader, TopicName,
};
use kafka_protocol::protocol::{Decodable, Encodable, StrBytes};
use kafka_protocol::records::{
    Compression, Record, RecordBatchEncoder, RecordEncodeOptions, TimestampType,
    NO_PARTITION_LEADER_EPOCH, NO_PRODUCER_EPOCH, NO_PRODUCER_ID, NO_SEQUENCE,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use super::{EventPublisher, PublishError};
use crate::config::KafkaConfig;

/// Produce API version. v8 is supported by every broker since Kafka 2.4.
const PRODUCE_API_VERSION: i16 = 8;

/// Wait for the partition leader only.
const PRODUCE_ACKS: i16 = 1;

/// Idle connections kept for reuse.
const MAX_IDLE_CONNECTIONS: usize = 4;

/// Largest response frame accepted from a broker. A single-partition produce
/// response is a few hundred bytes.
const MAX_RESPONSE_SIZE: usize = 1024 * 1024;

/// Kafka telemetry publisher.
pub struct KafkaPublisher {
    config: KafkaConfig,
    idle: Mutex<Vec<TcpStream>>,
    correlation_id: AtomicI32,
    closed: AtomicBool,
}

impl KafkaPublisher {
    /// Create a publisher. No connection is made until the first publish.
    pub fn new(config: KafkaConfig) -> Self {
        Self {
            config,
            idle: Mutex::new(Vec::new()),
            correlation_id: AtomicI32::new(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Try each bootstrap broker in order until one accepts a connection.
    async fn connect(&self) -> Result<TcpStream, PublishError> {
        for broker in &self.config.brokers {
            match with_timeout(self.config.timeout, TcpStream::connect(broker.as_str())).await {
                Ok(Ok(stream)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!(target: "basic.telemetry", broker = %broker, error = %e, "Failed to set TCP_NODELAY");
                    }
                    debug!(target: "basic.telemetry", broker = %broker, "Connected to Kafka broker");
                    return Ok(stream);
                }
                Ok(Err(e)) => {
                    let error = PublishError::Connection {
                        broker: broker.clone(),
                        message: e.to_string(),
                    };
                    debug!(target: "basic.telemetry", error = %error, "Kafka broker unreachable");
                }
                Err(_) => {
                    debug!(target: "basic.telemetry", broker = %broker, "Kafka connect timed out");
                }
            }
        }

        Err(PublishError::NoBrokersAvailable)
    }

    fn next_correlation_id(&self) -> i32 {
        self.correlation_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Build the length-prefixed `Produce` frame for one message.
    fn encode_produce(
        &self,
        correlation_id: i32,
        message: &str,
        topic: &str,
    ) -> Result<Bytes, PublishError> {
        let records = encode_record_batch(message)?;

        let partition_data = PartitionProduceData::default()
            .with_index(self.config.partition)
            .with_records(Some(records));

        let topic_data = TopicProduceData::default()
            .with_name(TopicName(StrBytes::from_string(topic.to_string())))
            .with_partition_data(vec![partition_data]);

        let timeout_ms = i32::try_from(self.config.timeout.as_millis()).unwrap_or(i32::MAX);
        let request = ProduceRequest::default()
            .with_acks(PRODUCE_ACKS)
            .with_timeout_ms(timeout_ms)
            .with_topic_data(vec![topic_data]);

        let header = RequestHeader::default()
            .with_request_api_key(ApiKey::Produce as i16)
            .with_request_api_version(PRODUCE_API_VERSION)
            .with_correlation_id(correlation_id)
            .with_client_id(Some(StrBytes::from_string(self.config.client_id.clone())));

        let header_version = ApiKey::Produce.request_header_version(PRODUCE_API_VERSION);

        let mut body = BytesMut::new();
        header
            .encode(&mut body, header_version)
            .map_err(|e| PublishError::Protocol(format!("Failed to encode header: {e:?}")))?;
        request
            .encode(&mut body, PRODUCE_API_VERSION)
            .map_err(|e| PublishError::Protocol(format!("Failed to encode request: {e:?}")))?;

        let len = i32::try_from(body.len())
            .map_err(|_| PublishError::Protocol("Produce request too large".to_string()))?;

        let mut frame = BytesMut::with_capacity(body.len() + 4);
        frame.put_i32(len);
        frame.extend_from_slice(&body);
        Ok(frame.freeze())
    }

    /// Send one produce request and validate the partition response.
    async fn produce_on(
        &self,
        stream: &mut TcpStream,
        message: &str,
        topic: &str,
    ) -> Result<(), PublishError> {
        let correlation_id = self.next_correlation_id();
        let frame = self.encode_produce(correlation_id, message, topic)?;

        trace!(
            target: "basic.telemetry",
            correlation_id,
            len = frame.len(),
            "Sending produce request"
        );

        stream
            .write_all(&frame)
            .await
            .map_err(|e| PublishError::Protocol(format!("Failed to send request: {e}")))?;

        let mut response_bytes = read_response_frame(stream).await?;
        let response_header_version = ApiKey::Produce.response_header_version(PRODUCE_API_VERSION);
        let response_header = ResponseHeader::decode(&mut response_bytes, response_header_version)
            .map_err(|e| PublishError::Protocol(format!("Failed to decode response header: {e:?}")))?;

        if response_header.correlation_id != correlation_id {
            return Err(PublishError::Protocol(format!(
                "Correlation id mismatch: sent {correlation_id}, received {}",
                response_header.correlation_id
            )));
        }

        let response = ProduceResponse::decode(&mut response_bytes, PRODUCE_API_VERSION)
            .map_err(|e| PublishError::Protocol(format!("Failed to decode response: {e:?}")))?;

        check_partition_response(&response, topic, self.config.partition)
    }
}

#[async_trait]
impl EventPublisher for KafkaPublisher {
    async fn publish(&self, message: &str, topic: &str) -> Result<(), PublishError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PublishError::Closed);
        }

        // Checked out for one request/response; the pool lock is not held
        // while connecting or waiting on the broker
        let cached = self.idle.lock().await.pop();
        let mut stream = match cached {
            Some(stream) => stream,
            None => self.connect().await?,
        };

        match with_timeout(
            self.config.timeout,
            self.produce_on(&mut stream, message, topic),
        )
        .await
        {
            Ok(Ok(())) => {
                self.release(stream).await;
                Ok(())
            }
            Ok(Err(e @ PublishError::Broker { .. })) => {
                // The connection itself is healthy
                self.release(stream).await;
                Err(e)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(PublishError::Timeout),
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let streams: Vec<TcpStream> = self.idle.lock().await.drain(..).collect();
        for mut stream in streams {
            if let Err(e) = stream.shutdown().await {
                debug!(target: "basic.telemetry", error = %e, "Error closing Kafka connection");
            }
        }
        debug!(target: "basic.telemetry", "Kafka publisher closed");
    }
}

impl KafkaPublisher {
    /// Return a healthy connection to the idle pool, or drop it when the pool
    /// is full or the publisher has been closed.
    async fn release(&self, stream: TcpStream) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let mut idle = self.idle.lock().await;
        if idle.len() < MAX_IDLE_CONNECTIONS {
            idle.push(stream);
        }
    }
}

/// Read one size-prefixed response frame, rejecting lengths that are
/// negative or larger than [`MAX_RESPONSE_SIZE`] before allocating.
async fn read_response_frame<R>(reader: &mut R) -> Result<Bytes, PublishError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader
        .read_exact(&mut len_buf)
        .await
        .map_err(|e| PublishError::Protocol(format!("Failed to read response length: {e}")))?;

    let declared = i32::from_be_bytes(len_buf);
    let response_len = usize::try_from(declared)
        .map_err(|_| PublishError::Protocol(format!("Negative response length {declared}")))?;
    if response_len > MAX_RESPONSE_SIZE {
        return Err(PublishError::Protocol(format!(
            "Response length {response_len} exceeds limit of {MAX_RESPONSE_SIZE} bytes"
        )));
    }

    let mut response_buf = vec![0u8; response_len];
    reader
        .read_exact(&mut response_buf)
        .await
        .map_err(|e| PublishError::Protocol(format!("Failed to read response body: {e}")))?;

    Ok(Bytes::from(response_buf))
}

async fn with_timeout<F: Future>(
    timeout: Duration,
    fut: F,
) -> Result<F::Output, tokio::time::error::Elapsed> {
    tokio::time::timeout(timeout, fut).await
}

/// Encode `message` as the value of a single uncompressed record batch.
fn encode_record_batch(message: &str) -> Result<Bytes, PublishError> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0);

    let record = Record {
        transactional: false,
        control: false,
        partition_leader_epoch: NO_PARTITION_LEADER_EPOCH,
        producer_id: NO_PRODUCER_ID,
        producer_epoch: NO_PRODUCER_EPOCH,
        timestamp_type: TimestampType::Creation,
        offset: 0,
        sequence: NO_SEQUENCE,
        timestamp,
        key: None,
        value: Some(Bytes::copy_from_slice(message.as_bytes())),
        headers: Default::default(),
    };

    let options = RecordEncodeOptions {
        version: 2,
        compression: Compression::None,
    };

    let mut records_buf = BytesMut::new();
    RecordBatchEncoder::encode(&mut records_buf, [record].iter(), &options)
        .map_err(|e| PublishError::Protocol(format!("Failed to encode records: {e:?}")))?;

    Ok(records_buf.freeze())
}

/// Find the response for `topic`/`partition` and surface its error code.
fn check_partition_response(
    response: &ProduceResponse,
    topic: &str,
    partition: i32,
) -> Result<(), PublishError> {
    let partition_response = response
        .responses
        .iter()
        .filter(|t| t.name.as_str() == topic)
        .flat_map(|t| t.partition_responses.iter())
        .find(|p| p.index == partition)
        .ok_or_else(|| {
            PublishError::Protocol("No partition response in produce response".to_string())
        })?;

    if partition_response.error_code != 0 {
        return Err(PublishError::Broker {
            topic: topic.to_string(),
            partition,
            code: partition_response.error_code,
        });
    }

    trace!(
        target: "basic.telemetry",
        topic = %topic,
        partition,
        offset = partition_response.base_offset,
        "Produced telemetry event"
    );

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use kafka_protocol::messages::produce_response::{
        PartitionProduceResponse, TopicProduceResponse,
    };
    use std::sync::Arc;
    use tokio::net::TcpListener;

    fn test_config(brokers: Vec<String>) -> KafkaConfig {
        KafkaConfig {
            brokers,
            topic: "fixtures".to_string(),
            partition: 0,
            client_id: "basic-service-test".to_string(),
            timeout: Duration::from_millis(500),
        }
    }

    fn response_with(topic: &str, partition: i32, error_code: i16) -> ProduceResponse {
        ProduceResponse::default().with_responses(vec![TopicProduceResponse::default()
            .with_name(TopicName(StrBytes::from_string(topic.to_string())))
            .with_partition_responses(vec![PartitionProduceResponse::default()
                .with_index(partition)
                .with_error_code(error_code)
                .with_base_offset(42)])])
    }

    /// Answer every produce request on `socket` with a success response.
    async fn serve_produce(mut socket: TcpStream) {
        loop {
            let mut len_buf = [0u8; 4];
            if socket.read_exact(&mut len_buf).await.is_err() {
                return;
            }
            let mut body = vec![0u8; i32::from_be_bytes(len_buf) as usize];
            if socket.read_exact(&mut body).await.is_err() {
                return;
            }
            // api_key (i16) + api_version (i16) precede the correlation id
            let correlation_id = i32::from_be_bytes([body[4], body[5], body[6], body[7]]);

            let mut payload = BytesMut::new();
            ResponseHeader::default()
                .with_correlation_id(correlation_id)
                .encode(
                    &mut payload,
                    ApiKey::Produce.response_header_version(PRODUCE_API_VERSION),
                )
                .unwrap();
            response_with("fixtures", 0, 0)
                .encode(&mut payload, PRODUCE_API_VERSION)
                .unwrap();

            let mut frame = BytesMut::new();
            frame.put_i32(payload.len() as i32);
            frame.extend_from_slice(&payload);
            if socket.write_all(&frame).await.is_err() {
                return;
            }
        }
    }

    #[test]
    fn test_encode_record_batch_not_empty() {
        let batch = encode_record_batch("Received http request with delay: 0, return code: 0")
            .expect("record batch should encode");
        assert!(!batch.is_empty());
    }

    #[test]
    fn test_encode_produce_frame_length_prefix() {
        let publisher = KafkaPublisher::new(test_config(vec!["127.0.0.1:9092".to_string()]));
        let frame = publisher
            .encode_produce(7, "hello", "fixtures")
            .expect("frame should encode");

        let declared = i32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
        assert_eq!(declared as usize, frame.len() - 4);

        // api_key (i16) + api_version (i16) + correlation_id (i32)
        assert_eq!(i16::from_be_bytes([frame[4], frame[5]]), ApiKey::Produce as i16);
        assert_eq!(i16::from_be_bytes([frame[6], frame[7]]), PRODUCE_API_VERSION);
        assert_eq!(
            i32::from_be_bytes([frame[8], frame[9], frame[10], frame[11]]),
            7
        );
    }

    #[test]
    fn test_check_partition_response_success() {
        let response = response_with("fixtures", 0, 0);
        assert!(check_partition_response(&response, "fixtures", 0).is_ok());
    }

    #[test]
    fn test_check_partition_response_broker_error() {
        let response = response_with("fixtures", 0, 3);
        let result = check_partition_response(&response, "fixtures", 0);
        assert!(matches!(result, Err(PublishError::Broker { code: 3, .. })));
    }

    #[test]
    fn test_check_partition_response_missing_partition() {
        let response = response_with("other-topic", 0, 0);
        let result = check_partition_response(&response, "fixtures", 0);
        assert!(matches!(result, Err(PublishError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_publish_without_reachable_broker_fails() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let publisher = KafkaPublisher::new(test_config(vec![addr.to_string()]));
        let result = publisher.publish("hello", "fixtures").await;

        assert!(matches!(result, Err(PublishError::NoBrokersAvailable)));
    }

    #[tokio::test]
    async fn test_publish_after_close_fails() {
        let publisher = KafkaPublisher::new(test_config(vec!["127.0.0.1:9".to_string()]));
        publisher.close().await;

        let result = publisher.publish("hello", "fixtures").await;
        assert!(matches!(result, Err(PublishError::Closed)));
    }

    #[tokio::test]
    async fn test_publish_times_out_when_broker_never_answers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accept and hold the connection without responding
        let holder = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let publisher = KafkaPublisher::new(test_config(vec![addr.to_string()]));
        let result = publisher.publish("hello", "fixtures").await;

        assert!(matches!(result, Err(PublishError::Timeout)));
        holder.abort();
    }

    #[tokio::test]
    async fn test_read_response_frame_rejects_oversized_length() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&i32::MAX.to_be_bytes()).await.unwrap();

        let result = read_response_frame(&mut server).await;

        assert!(
            matches!(result, Err(PublishError::Protocol(ref message)) if message.contains("exceeds limit")),
            "unexpected result: {result:?}"
        );
    }

    #[tokio::test]
    async fn test_read_response_frame_rejects_negative_length() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&(-1i32).to_be_bytes()).await.unwrap();

        let result = read_response_frame(&mut server).await;
        assert!(matches!(result, Err(PublishError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_publish_succeeds_and_reuses_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicI32::new(0));

        let accepted_by_broker = Arc::clone(&accepted);
        let broker = tokio::spawn(async move {
            loop {
                let (socket, _) = listener.accept().await.unwrap();
                accepted_by_broker.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve_produce(socket));
            }
        });

        let publisher = KafkaPublisher::new(test_config(vec![addr.to_string()]));
        publisher.publish("first", "fixtures").await.unwrap();
        publisher.publish("second", "fixtures").await.unwrap();

        assert_eq!(accepted.load(Ordering::SeqCst), 1);
        broker.abort();
    }

    #[tokio::test]
    async fn test_slow_round_trip_does_not_block_other_publishes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // The first connection never gets an answer; later ones are served
        let broker = tokio::spawn(async move {
            let (_stalled, _) = listener.accept().await.unwrap();
            loop {
                let (socket, _) = listener.accept().await.unwrap();
                tokio::spawn(serve_produce(socket));
            }
        });

        let publisher = Arc::new(KafkaPublisher::new(test_config(vec![addr.to_string()])));

        let stalled_publisher = Arc::clone(&publisher);
        let stalled = tokio::spawn(async move { stalled_publisher.publish("stalled", "fixtures").await });

        // Let the first publish connect and send
        tokio::time::sleep(Duration::from_millis(50)).await;

        publisher.publish("fast", "fixtures").await.unwrap();
        assert!(!stalled.is_finished(), "fast publish should not wait for the stalled one");

        let stalled_result = stalled.await.unwrap();
        assert!(matches!(stalled_result, Err(PublishError::Timeout)));
        broker.abort();
    }
}
