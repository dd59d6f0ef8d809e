//! Redpanda event bus and topic admin for betstream.
//!
//! This crate implements the [`EventBus`] and [`TopicAdmin`](betstream_core::topic::TopicAdmin)
//! traits from `betstream-core` on top of rdkafka, so it works against
//! Redpanda, Apache Kafka, or any other Kafka-compatible broker.
//!
//! # Delivery Semantics
//!
//! **Producer**: with `enable_idempotence(true)` the client retries internally
//! without introducing duplicates or reordering within a partition. The
//! application never retries a failed publish itself.
//!
//! **Consumer**: at-least-once. With `enable_auto_commit(true)` librdkafka
//! commits consumed offsets in the background; otherwise each record is
//! committed after it has been handed to the subscriber's stream.
//!
//! **Ordering**: guaranteed within a partition. Records are keyed by
//! [`OutgoingRecord::key`], so all records sharing a key stay in order.
//!
//! # Example
//!
//! ```no_run
//! use betstream_redpanda::RedpandaEventBus;
//! use betstream_core::event_bus::EventBus;
//! use betstream_core::event::OutgoingRecord;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let event_bus = RedpandaEventBus::builder()
//!     .brokers("localhost:9092")
//!     .enable_idempotence(true)
//!     .consumer_group("transactions-logger-1")
//!     .build()?;
//!
//! let record = OutgoingRecord::new("BET".to_string(), "session-1".to_string(), "{}".to_string());
//! let receipt = event_bus.publish("transactions", &record).await?;
//! println!("stored at {receipt}");
//!
//! let mut stream = event_bus.subscribe(&["transactions"]).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(record) => println!("Received offset {}", record.offset),
//!         Err(e) => eprintln!("Error: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod admin;

pub use admin::RedpandaTopicAdmin;

use betstream_core::event::OutgoingRecord;
use betstream_core::event_bus::{
    ConsumedRecord, DeliveryReceipt, EventBus, EventBusError, RecordStream,
};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Redpanda event bus implementation.
///
/// One producer is created up front and shared by every `publish` call; each
/// `subscribe` call creates its own consumer owned by a background task.
/// [`RedpandaEventBusBuilder::build_consumer`] skips the producer for buses
/// that only subscribe.
///
/// # Configuration
///
/// - **Broker addresses**: Bootstrap servers (required)
/// - **Producer settings**: acks, idempotence, compression, linger, batch size, timeout
/// - **Consumer settings**: group, client id, offset reset, auto-commit, buffer size
///
/// # Example
///
/// ```no_run
/// use betstream_redpanda::RedpandaEventBus;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// // Basic configuration
/// let event_bus = RedpandaEventBus::new("localhost:9092")?;
///
/// // The simulator's producer settings
/// let event_bus = RedpandaEventBus::builder()
///     .brokers("localhost:9092")
///     .producer_acks("all")
///     .enable_idempotence(true)
///     .linger(Duration::from_millis(5))
///     .batch_size(32 * 1024)
///     .compression("lz4")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaEventBus {
    /// Kafka producer for publishing records; absent on consumer-only buses
    producer: Option<FutureProducer>,
    /// Broker addresses (for creating consumers)
    brokers: String,
    /// Delivery timeout, if overridden; librdkafka's `message.timeout.ms` otherwise
    timeout: Option<Duration>,
    /// Consumer group ID (if explicitly set)
    consumer_group: Option<String>,
    /// Consumer client id (if explicitly set)
    client_id: Option<String>,
    /// Record buffer size for subscribers
    buffer_size: usize,
    /// Auto offset reset policy
    auto_offset_reset: String,
    /// Let librdkafka commit offsets in the background
    enable_auto_commit: bool,
}

impl RedpandaEventBus {
    /// Create a new Redpanda event bus with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the producer cannot be created.
    pub fn new(brokers: &str) -> Result<Self, EventBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a new builder for configuring the event bus.
    #[must_use]
    pub fn builder() -> RedpandaEventBusBuilder {
        RedpandaEventBusBuilder::default()
    }

    fn consumer_group_id(&self, topics: &[String]) -> String {
        self.consumer_group.clone().unwrap_or_else(|| {
            // Sort topics for deterministic consumer group naming
            let mut sorted_topics = topics.to_vec();
            sorted_topics.sort();
            format!("betstream-{}", sorted_topics.join("-"))
        })
    }
}

/// Builder for configuring a [`RedpandaEventBus`].
#[derive(Default)]
pub struct RedpandaEventBusBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    enable_idempotence: bool,
    compression: Option<String>,
    linger: Option<Duration>,
    batch_size: Option<usize>,
    timeout: Option<Duration>,
    consumer_group: Option<String>,
    client_id: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
    enable_auto_commit: bool,
}

impl RedpandaEventBusBuilder {
    /// Set the broker addresses.
    ///
    /// # Parameters
    ///
    /// - `brokers`: Comma-separated list of broker addresses (e.g., "localhost:9092")
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the producer acknowledgment mode.
    ///
    /// # Parameters
    ///
    /// - `acks`: "0" (no acks), "1" (leader ack), "all" (all replicas ack)
    ///
    /// Default: "all" when idempotence is enabled, "1" otherwise
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Enable the idempotent producer.
    ///
    /// The client then retries failed sends itself without duplicating or
    /// reordering records. Requires `acks=all`.
    ///
    /// Default: disabled
    #[must_use]
    pub const fn enable_idempotence(mut self, enabled: bool) -> Self {
        self.enable_idempotence = enabled;
        self
    }

    /// Set the compression codec.
    ///
    /// # Parameters
    ///
    /// - `compression`: "none", "gzip", "snappy", "lz4", "zstd"
    ///
    /// Default: "none"
    #[must_use]
    pub fn compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    /// How long the producer waits to fill a batch before sending it.
    ///
    /// Default: librdkafka's own default
    #[must_use]
    pub const fn linger(mut self, linger: Duration) -> Self {
        self.linger = Some(linger);
        self
    }

    /// Maximum size of a produced batch, in bytes.
    ///
    /// Default: librdkafka's own default
    #[must_use]
    pub const fn batch_size(mut self, bytes: usize) -> Self {
        self.batch_size = Some(bytes);
        self
    }

    /// Bound how long a record may wait for delivery, retries included.
    ///
    /// Sets `message.timeout.ms`. Default: librdkafka's own default (300 s),
    /// which leaves retrying entirely to the client.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the consumer group ID for subscriptions.
    ///
    /// If not set, the consumer group will be auto-generated based on subscribed topics.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Set the `client.id` reported by consumers.
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the record buffer size for subscriptions.
    ///
    /// This controls how many records can be buffered in memory between the
    /// Kafka consumer and the subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `buffer_size` is 0.
    #[must_use]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        assert!(buffer_size > 0, "buffer_size must be greater than 0");
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Set the auto offset reset policy for new consumer groups.
    ///
    /// - `"earliest"`: Start from the beginning of the topic
    /// - `"latest"`: Start from the end (only new records)
    /// - `"error"`: Fail if no offset exists
    ///
    /// Default: "latest"
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Let librdkafka commit consumed offsets in the background.
    ///
    /// When disabled, every record is committed after it has been delivered to
    /// the subscriber's stream.
    ///
    /// Default: disabled
    #[must_use]
    pub const fn enable_auto_commit(mut self, enabled: bool) -> Self {
        self.enable_auto_commit = enabled;
        self
    }

    fn resolved_acks(&self) -> &str {
        match (&self.producer_acks, self.enable_idempotence) {
            (Some(acks), _) => acks,
            (None, true) => "all",
            (None, false) => "1",
        }
    }

    fn producer_config(&self, brokers: &str) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", brokers)
            .set("acks", self.resolved_acks())
            .set("enable.idempotence", self.enable_idempotence.to_string())
            .set("compression.type", self.compression.as_deref().unwrap_or("none"));

        if let Some(timeout) = self.timeout {
            config.set("message.timeout.ms", timeout.as_millis().to_string());
        }
        if let Some(linger) = self.linger {
            config.set("linger.ms", linger.as_millis().to_string());
        }
        if let Some(batch_size) = self.batch_size {
            config.set("batch.size", batch_size.to_string());
        }
        config
    }

    /// Build the [`RedpandaEventBus`].
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if:
    /// - Brokers not set
    /// - Idempotence requested with acks other than "all"
    /// - Cannot create producer
    pub fn build(self) -> Result<RedpandaEventBus, EventBusError> {
        let brokers = self.require_brokers()?;

        if self.enable_idempotence && self.resolved_acks() != "all" {
            return Err(EventBusError::ConnectionFailed(format!(
                "Idempotent producer requires acks=all, got acks={}",
                self.resolved_acks()
            )));
        }

        let producer: FutureProducer = self.producer_config(&brokers).create().map_err(|e| {
            EventBusError::ConnectionFailed(format!("Failed to create producer: {e}"))
        })?;

        tracing::info!(
            brokers = %brokers,
            acks = self.resolved_acks(),
            idempotence = self.enable_idempotence,
            compression = self.compression.as_deref().unwrap_or("none"),
            buffer_size = self.buffer_size.unwrap_or(1000),
            auto_offset_reset = self.auto_offset_reset.as_deref().unwrap_or("latest"),
            auto_commit = self.enable_auto_commit,
            "RedpandaEventBus created successfully"
        );

        Ok(self.finish(brokers, Some(producer)))
    }

    /// Build a bus that only subscribes.
    ///
    /// No producer connection is opened; `publish` on the result always fails
    /// and `flush` has nothing to do.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if brokers are not set.
    pub fn build_consumer(self) -> Result<RedpandaEventBus, EventBusError> {
        let brokers = self.require_brokers()?;

        tracing::info!(
            brokers = %brokers,
            auto_offset_reset = self.auto_offset_reset.as_deref().unwrap_or("latest"),
            auto_commit = self.enable_auto_commit,
            "Consumer-only RedpandaEventBus created"
        );

        Ok(self.finish(brokers, None))
    }

    fn require_brokers(&self) -> Result<String, EventBusError> {
        self.brokers
            .clone()
            .ok_or_else(|| EventBusError::ConnectionFailed("Brokers not configured".to_string()))
    }

    fn finish(self, brokers: String, producer: Option<FutureProducer>) -> RedpandaEventBus {
        RedpandaEventBus {
            producer,
            brokers,
            timeout: self.timeout,
            consumer_group: self.consumer_group,
            client_id: self.client_id,
            buffer_size: self.buffer_size.unwrap_or(1000),
            auto_offset_reset: self.auto_offset_reset.unwrap_or_else(|| "latest".to_string()),
            enable_auto_commit: self.enable_auto_commit,
        }
    }
}

fn to_consumed(message: &BorrowedMessage<'_>) -> ConsumedRecord {
    ConsumedRecord {
        topic: message.topic().to_string(),
        partition: message.partition(),
        offset: message.offset(),
        timestamp: message.timestamp().to_millis(),
        key: message.key().map(|k| String::from_utf8_lossy(k).into_owned()),
        payload: message.payload().map(|p| String::from_utf8_lossy(p).into_owned()),
    }
}

/// Final commit and unsubscribe when a subscription ends.
fn close_consumer(consumer: &StreamConsumer) {
    match consumer.commit_consumer_state(CommitMode::Sync) {
        Ok(()) | Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => {},
        Err(e) => tracing::warn!(error = %e, "Consumer close error"),
    }
    consumer.unsubscribe();
}

impl EventBus for RedpandaEventBus {
    fn publish(
        &self,
        topic: &str,
        record: &OutgoingRecord,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryReceipt, EventBusError>> + Send + '_>> {
        // Clone data before moving into async block
        let topic = topic.to_string();
        let record = record.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let Some(producer) = &self.producer else {
                return Err(EventBusError::PublishFailed {
                    topic,
                    reason: "bus was built without a producer".to_string(),
                });
            };

            let kafka_record = FutureRecord::to(&topic)
                .payload(record.payload.as_bytes())
                .key(record.key.as_bytes());

            // Bounds only the wait for queue space; delivery is bounded by message.timeout.ms
            let queue_timeout = timeout.map_or(Timeout::Never, Timeout::After);
            match producer.send(kafka_record, queue_timeout).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        partition = partition,
                        offset = offset,
                        event_type = %record.event_type,
                        "Record published successfully"
                    );
                    Ok(DeliveryReceipt {
                        topic,
                        partition,
                        offset,
                    })
                },
                Err((kafka_error, _)) => {
                    tracing::debug!(
                        topic = %topic,
                        error = %kafka_error,
                        "Failed to publish record"
                    );
                    Err(EventBusError::PublishFailed {
                        topic,
                        reason: kafka_error.to_string(),
                    })
                },
            }
        })
    }

    #[allow(clippy::too_many_lines)] // One task owns the consumer for its whole life
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<RecordStream, EventBusError>> + Send + '_>> {
        // Clone configuration before moving into async block
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();
        let brokers = self.brokers.clone();
        let consumer_group_id = self.consumer_group_id(&topics);
        let client_id = self.client_id.clone();
        let buffer_size = self.buffer_size;
        let auto_offset_reset = self.auto_offset_reset.clone();
        let auto_commit = self.enable_auto_commit;

        Box::pin(async move {
            let mut config = ClientConfig::new();
            config
                .set("bootstrap.servers", &brokers)
                .set("group.id", &consumer_group_id)
                .set("enable.auto.commit", auto_commit.to_string())
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false");
            if let Some(client_id) = &client_id {
                config.set("client.id", client_id);
            }

            let consumer: StreamConsumer = config.create().map_err(|e| {
                EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to create consumer: {e}"),
                }
            })?;

            let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
            consumer.subscribe(&topic_refs).map_err(|e| {
                EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to subscribe to topics: {e}"),
                }
            })?;

            tracing::info!(
                topics = ?topics,
                consumer_group = %consumer_group_id,
                client_id = client_id.as_deref().unwrap_or("-"),
                buffer_size = buffer_size,
                auto_offset_reset = %auto_offset_reset,
                auto_commit = auto_commit,
                "Subscribed to topics"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);

            // The task owns the consumer; it closes it once the receiver is gone
            tokio::spawn(async move {
                use futures::StreamExt;

                let mut stream = consumer.stream();

                loop {
                    let msg_result = tokio::select! {
                        () = tx.closed() => {
                            tracing::debug!("Record stream dropped, closing consumer");
                            break;
                        }
                        next = stream.next() => match next {
                            Some(msg_result) => msg_result,
                            None => break,
                        },
                    };

                    match msg_result {
                        Ok(message) => {
                            tracing::trace!(
                                topic = message.topic(),
                                partition = message.partition(),
                                offset = message.offset(),
                                "Received record"
                            );

                            if tx.send(Ok(to_consumed(&message))).await.is_err() {
                                tracing::debug!("Channel receiver dropped, exiting consumer task");
                                break; // exit WITHOUT committing this record
                            }

                            if !auto_commit {
                                if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                                    tracing::warn!(
                                        topic = message.topic(),
                                        partition = message.partition(),
                                        offset = message.offset(),
                                        error = %e,
                                        "Failed to commit offset (record may be redelivered)"
                                    );
                                }
                            }
                        },
                        Err(e) => {
                            let err = EventBusError::TransportError(format!(
                                "Failed to receive message: {e}"
                            ));
                            if tx.send(Err(err)).await.is_err() {
                                break;
                            }
                        },
                    }
                }

                drop(stream);
                close_consumer(&consumer);
                tracing::debug!("Consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as RecordStream)
        })
    }

    fn flush(&self, timeout: Duration) -> Result<(), EventBusError> {
        match &self.producer {
            Some(producer) => producer
                .flush(Timeout::After(timeout))
                .map_err(|e| EventBusError::FlushFailed(e.to_string())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn redpanda_event_bus_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RedpandaEventBus>();
        assert_sync::<RedpandaEventBus>();
    }

    #[test]
    fn build_without_brokers_fails() {
        let result = RedpandaEventBus::builder().build();
        assert!(matches!(result, Err(EventBusError::ConnectionFailed(_))));
    }

    #[test]
    fn idempotence_defaults_acks_to_all() {
        let builder = RedpandaEventBus::builder().enable_idempotence(true);
        assert_eq!(builder.resolved_acks(), "all");

        let builder = RedpandaEventBus::builder();
        assert_eq!(builder.resolved_acks(), "1");
    }

    #[test]
    fn idempotence_with_leader_acks_is_rejected() {
        let result = RedpandaEventBus::builder()
            .brokers("localhost:9092")
            .producer_acks("1")
            .enable_idempotence(true)
            .build();

        assert!(matches!(result, Err(EventBusError::ConnectionFailed(_))));
    }

    #[test]
    fn producer_config_carries_batching_settings() {
        let builder = RedpandaEventBus::builder()
            .enable_idempotence(true)
            .linger(Duration::from_millis(5))
            .batch_size(32 * 1024)
            .compression("lz4");
        let config = builder.producer_config("localhost:9092");

        assert_eq!(config.get("bootstrap.servers"), Some("localhost:9092"));
        assert_eq!(config.get("acks"), Some("all"));
        assert_eq!(config.get("enable.idempotence"), Some("true"));
        assert_eq!(config.get("linger.ms"), Some("5"));
        assert_eq!(config.get("batch.size"), Some("32768"));
        assert_eq!(config.get("compression.type"), Some("lz4"));
    }

    #[test]
    fn delivery_timeout_is_left_to_the_client_by_default() {
        let config = RedpandaEventBus::builder()
            .enable_idempotence(true)
            .producer_config("localhost:9092");

        assert_eq!(config.get("message.timeout.ms"), None);
    }

    #[test]
    fn explicit_delivery_timeout_is_passed_through() {
        let config = RedpandaEventBus::builder()
            .timeout(Duration::from_secs(30))
            .producer_config("localhost:9092");

        assert_eq!(config.get("message.timeout.ms"), Some("30000"));
    }

    #[test]
    fn consumer_only_build_still_requires_brokers() {
        let result = RedpandaEventBus::builder().build_consumer();
        assert!(matches!(result, Err(EventBusError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn consumer_only_bus_refuses_to_publish() {
        let bus = RedpandaEventBus::builder()
            .brokers("localhost:9092")
            .consumer_group("transactions-logger-1")
            .build_consumer()
            .expect("brokers are set");
        let record = OutgoingRecord::new("BET".to_string(), "session-1".to_string(), "{}".to_string());

        let result = bus.publish("transactions", &record).await;

        assert!(matches!(
            result,
            Err(EventBusError::PublishFailed { ref topic, .. }) if topic == "transactions"
        ));
        assert!(bus.flush(Duration::from_millis(10)).is_ok());
    }
}
