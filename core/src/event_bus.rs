//! Event bus abstraction over a partitioned, Kafka-compatible log.
//!
//! This module provides the [`EventBus`] trait for publishing keyed records to
//! topics and subscribing to the records other processes publish.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐      publish(key = session id)      ┌──────────────┐
//! │  Simulator  │ ──────────────────────────────────► │    topic     │
//! └─────────────┘                                     │ transactions │
//!                                                     └──────┬───────┘
//!                                                            │ subscribe
//!                                                            ▼
//!                                                     ┌──────────────┐
//!                                                     │    Logger    │
//!                                                     └──────────────┘
//! ```
//!
//! # Key Principles
//!
//! - **At-least-once delivery**: records may be delivered more than once
//! - **Ordered within partition**: records sharing a key keep their order
//! - **No application retries**: retry and idempotence belong to the client
//!
//! # Implementations
//!
//! - `InMemoryEventBus` (betstream-testing) - for tests
//! - `RedpandaEventBus` (betstream-redpanda) - for a real broker

use crate::event::OutgoingRecord;
use futures::Stream;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the event bus
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a record to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// Network or transport error
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Flushing pending records did not finish in time
    #[error("Flush failed: {0}")]
    FlushFailed(String),
}

/// Where the broker stored a published record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Topic the record was appended to
    pub topic: String,
    /// Partition the key hashed to
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
}

impl fmt::Display for DeliveryReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}@{}", self.topic, self.partition, self.offset)
    }
}

/// A record received from a subscription, with its broker metadata.
///
/// Key and payload are decoded as UTF-8 text (lossily); either may be absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsumedRecord {
    /// Topic the record was read from
    pub topic: String,
    /// Partition the record was read from
    pub partition: i32,
    /// Offset within the partition
    pub offset: i64,
    /// Broker or producer timestamp in epoch milliseconds, if any
    pub timestamp: Option<i64>,
    /// Partition key
    pub key: Option<String>,
    /// Payload text
    pub payload: Option<String>,
}

/// Stream of records from a subscription.
///
/// Errors are yielded in-band; the stream keeps going after an error.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<ConsumedRecord, EventBusError>> + Send>>;

/// Trait for event bus implementations.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`; a single bus is shared between
/// the bet tick and every delayed win task.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so it can be used as `Arc<dyn EventBus>`.
pub trait EventBus: Send + Sync {
    /// Publish a keyed record to a topic and wait for the broker's verdict.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the record could not be
    /// delivered (after whatever retries the client performs on its own).
    fn publish(
        &self,
        topic: &str,
        record: &OutgoingRecord,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryReceipt, EventBusError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a stream of records.
    ///
    /// Dropping the stream ends the subscription.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<RecordStream, EventBusError>> + Send + '_>>;

    /// Wait for in-flight records to be delivered.
    ///
    /// The default implementation has nothing buffered and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::FlushFailed`] if records are still pending when
    /// `timeout` elapses.
    fn flush(&self, timeout: Duration) -> Result<(), EventBusError> {
        let _ = timeout;
        Ok(())
    }
}
