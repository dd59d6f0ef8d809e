//! In-memory event bus for tests.
//!
//! Behaves like a tiny single-broker cluster: records are hashed by key onto a
//! fixed number of partitions, every partition has its own offset counter, and
//! a new subscription first replays the retained log (like
//! `auto.offset.reset=earliest`) before receiving live records.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

use betstream_core::event::OutgoingRecord;
use betstream_core::event_bus::{
    ConsumedRecord, DeliveryReceipt, EventBus, EventBusError, RecordStream,
};
use chrono::Utc;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::Duration;
use tokio::sync::mpsc;

type Delivery = Result<ConsumedRecord, EventBusError>;

struct Subscriber {
    topics: Vec<String>,
    tx: mpsc::UnboundedSender<Delivery>,
}

#[derive(Default)]
struct BusState {
    log: Vec<ConsumedRecord>,
    next_offsets: HashMap<(String, i32), i64>,
    subscribers: Vec<Subscriber>,
    flushed_on: Vec<ThreadId>,
}

/// In-memory [`EventBus`] implementation.
///
/// Clones share the same log.
///
/// # Example
///
/// ```
/// use betstream_core::event::OutgoingRecord;
/// use betstream_core::event_bus::EventBus;
/// use betstream_testing::InMemoryEventBus;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = InMemoryEventBus::new();
/// let record = OutgoingRecord::new("BET".into(), "session-1".into(), "{}".into());
///
/// let receipt = bus.publish("transactions", &record).await?;
/// assert_eq!(receipt.offset, 0);
/// assert_eq!(bus.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryEventBus {
    partitions: i32,
    state: Arc<Mutex<BusState>>,
    fail_publishes: Arc<AtomicBool>,
}

impl InMemoryEventBus {
    /// Create a bus with a single partition per topic
    #[must_use]
    pub fn new() -> Self {
        Self::with_partitions(1)
    }

    /// Create a bus with `partitions` partitions per topic (at least one)
    #[must_use]
    pub fn with_partitions(partitions: i32) -> Self {
        Self {
            partitions: partitions.max(1),
            state: Arc::new(Mutex::new(BusState::default())),
            fail_publishes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every subsequent publish fail (or succeed again)
    pub fn fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Every record published so far, in publish order
    #[must_use]
    pub fn published(&self) -> Vec<ConsumedRecord> {
        self.state.lock().unwrap().log.clone()
    }

    /// Records published to `topic`, in publish order
    #[must_use]
    pub fn published_on(&self, topic: &str) -> Vec<ConsumedRecord> {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|record| record.topic == topic)
            .cloned()
            .collect()
    }

    /// Number of records published
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().log.len()
    }

    /// Check if nothing has been published
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of subscriptions whose stream is still alive
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        state.subscribers.retain(|sub| !sub.tx.is_closed());
        state.subscribers.len()
    }

    /// Threads `flush` was called on, one entry per call
    #[must_use]
    pub fn flush_threads(&self) -> Vec<ThreadId> {
        self.state.lock().unwrap().flushed_on.clone()
    }

    /// Partition a key is routed to
    #[must_use]
    pub fn partition_for(&self, key: &str) -> i32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let buckets = u64::try_from(self.partitions).unwrap_or(1);
        i32::try_from(hasher.finish() % buckets).unwrap_or(0)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        topic: &str,
        record: &OutgoingRecord,
    ) -> Pin<Box<dyn Future<Output = Result<DeliveryReceipt, EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let record = record.clone();

        Box::pin(async move {
            if self.fail_publishes.load(Ordering::SeqCst) {
                return Err(EventBusError::PublishFailed {
                    topic,
                    reason: "injected publish failure".to_string(),
                });
            }

            let partition = self.partition_for(&record.key);
            let mut state = self.state.lock().unwrap();

            let next = state.next_offsets.entry((topic.clone(), partition)).or_insert(0);
            let offset = *next;
            *next += 1;

            let consumed = ConsumedRecord {
                topic: topic.clone(),
                partition,
                offset,
                timestamp: Some(Utc::now().timestamp_millis()),
                key: Some(record.key),
                payload: Some(record.payload),
            };

            state.subscribers.retain(|sub| {
                if sub.topics.contains(&topic) {
                    sub.tx.send(Ok(consumed.clone())).is_ok()
                } else {
                    !sub.tx.is_closed()
                }
            });
            state.log.push(consumed);

            Ok(DeliveryReceipt {
                topic,
                partition,
                offset,
            })
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<RecordStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();

        Box::pin(async move {
            if topics.is_empty() {
                return Err(EventBusError::SubscriptionFailed {
                    topics,
                    reason: "no topics given".to_string(),
                });
            }

            let (tx, rx) = mpsc::unbounded_channel();
            {
                let mut state = self.state.lock().unwrap();
                for record in state.log.iter().filter(|r| topics.contains(&r.topic)) {
                    let _ = tx.send(Ok(record.clone()));
                }
                state.subscribers.push(Subscriber { topics, tx });
            }

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as RecordStream)
        })
    }

    fn flush(&self, _timeout: Duration) -> Result<(), EventBusError> {
        self.state.lock().unwrap().flushed_on.push(std::thread::current().id());
        Ok(())
    }
}
