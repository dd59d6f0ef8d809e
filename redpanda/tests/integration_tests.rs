//! Integration tests for [`RedpandaEventBus`] and [`RedpandaTopicAdmin`] with a real Kafka instance.
//!
//! These tests use testcontainers to spin up a real Kafka instance and validate:
//! - Idempotent topic bootstrap through the admin API
//! - Keyed publish/subscribe round-trip
//! - Per-key ordering within a partition
//! - Auto-commit consumers
//!
//! # Running These Tests
//!
//! These tests are marked as `#[ignore]` by default because they:
//! - Require Docker to be running (for testcontainers)
//! - Take 15-60 seconds per test to spin up Kafka
//!
//! To run explicitly:
//! ```bash
//! cargo test -p betstream-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use betstream_core::event::OutgoingRecord;
use betstream_core::event_bus::{ConsumedRecord, EventBus};
use betstream_core::topic::{BootstrapOutcome, TopicAdmin, TopicSpec, ensure_topic};
use betstream_redpanda::{RedpandaEventBus, RedpandaTopicAdmin};
use futures::StreamExt;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};

/// Start a Kafka container and return it with its bootstrap address
async fn start_kafka() -> (ContainerAsync<Kafka>, String) {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "false")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    let brokers = format!("{host}:{port}");
    (kafka, brokers)
}

/// Create a topic and wait for it to become describable
async fn provision(brokers: &str, spec: &TopicSpec) -> RedpandaTopicAdmin {
    let admin = RedpandaTopicAdmin::new(brokers, Duration::from_secs(15))
        .expect("Failed to create admin client");

    let outcome = ensure_topic(&admin, spec)
        .await
        .expect("Bootstrap against a fresh broker should succeed");
    assert_eq!(outcome, BootstrapOutcome::Created);
    admin
}

fn bet_record(session_id: &str, bet_id: &str) -> OutgoingRecord {
    let payload = serde_json::json!({
        "eventType": "BET",
        "betId": bet_id,
        "sessionId": session_id,
    });
    OutgoingRecord::new("BET".to_string(), session_id.to_string(), payload.to_string())
}

async fn collect(
    event_bus: &RedpandaEventBus,
    topic: &str,
    expected: usize,
) -> Vec<ConsumedRecord> {
    let mut stream = event_bus
        .subscribe(&[topic])
        .await
        .expect("Failed to subscribe");

    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(20), async {
        while received.len() < expected {
            if let Some(result) = stream.next().await {
                received.push(result.expect("Failed to receive record"));
            }
        }
    })
    .await
    .expect("Timeout waiting for records");
    received
}

#[tokio::test]
#[ignore]
async fn test_topic_bootstrap_is_idempotent() {
    let (_kafka, brokers) = start_kafka().await;
    let spec = TopicSpec::new("transactions", 12, 1, Duration::from_secs(7 * 24 * 3600));

    let admin = provision(&brokers, &spec).await;
    let again = ensure_topic(&admin, &spec)
        .await
        .expect("Second bootstrap should succeed");

    assert_eq!(again, BootstrapOutcome::AlreadyExists);
    assert_eq!(
        admin
            .partition_count("transactions")
            .await
            .expect("Failed to describe topic"),
        12
    );
    let topics = admin.list_topics().await.expect("Failed to list topics");
    assert_eq!(topics.iter().filter(|t| *t == "transactions").count(), 1);
}

#[tokio::test]
#[ignore]
async fn test_keyed_publish_and_subscribe_round_trip() {
    let (_kafka, brokers) = start_kafka().await;
    let spec = TopicSpec::new("round-trip", 12, 1, Duration::from_secs(3600));
    provision(&brokers, &spec).await;

    let event_bus = RedpandaEventBus::builder()
        .brokers(&brokers)
        .producer_acks("all")
        .enable_idempotence(true)
        .compression("lz4")
        .linger(Duration::from_millis(5))
        .batch_size(32 * 1024)
        .consumer_group("round-trip-test")
        .auto_offset_reset("earliest")
        .enable_auto_commit(true)
        .build()
        .expect("Failed to create event bus");

    let receipt = event_bus
        .publish("round-trip", &bet_record("session-1", "bet-1"))
        .await
        .expect("Failed to publish");
    assert_eq!(receipt.topic, "round-trip");

    let received = collect(&event_bus, "round-trip", 1).await;

    assert_eq!(received[0].key.as_deref(), Some("session-1"));
    assert_eq!(received[0].partition, receipt.partition);
    assert_eq!(received[0].offset, receipt.offset);
    assert!(received[0].timestamp.is_some());
    assert!(
        received[0]
            .payload
            .as_deref()
            .is_some_and(|p| p.contains("\"betId\":\"bet-1\""))
    );
}

#[tokio::test]
#[ignore]
async fn test_same_session_keeps_order() {
    let (_kafka, brokers) = start_kafka().await;
    let spec = TopicSpec::new("ordering-test", 12, 1, Duration::from_secs(3600));
    provision(&brokers, &spec).await;

    let event_bus = RedpandaEventBus::builder()
        .brokers(&brokers)
        .enable_idempotence(true)
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create event bus");

    let mut partitions = Vec::new();
    for i in 0..5 {
        let receipt = event_bus
            .publish("ordering-test", &bet_record("session-42", &format!("bet-{i}")))
            .await
            .expect("Failed to publish");
        partitions.push(receipt.partition);
    }
    partitions.dedup();
    assert_eq!(partitions.len(), 1, "same key must map to one partition");

    let received = collect(&event_bus, "ordering-test", 5).await;
    for (i, record) in received.iter().enumerate() {
        let expected = format!("\"betId\":\"bet-{i}\"");
        assert!(
            record
                .payload
                .as_deref()
                .is_some_and(|p| p.contains(&expected)),
            "record {i} out of order"
        );
    }
}

#[tokio::test]
#[ignore]
async fn test_flush_after_publish() {
    let (_kafka, brokers) = start_kafka().await;
    let spec = TopicSpec::new("flush-test", 1, 1, Duration::from_secs(3600));
    provision(&brokers, &spec).await;

    let event_bus = RedpandaEventBus::builder()
        .brokers(&brokers)
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to create event bus");

    event_bus
        .publish("flush-test", &bet_record("session-1", "bet-1"))
        .await
        .expect("Failed to publish");

    event_bus
        .flush(Duration::from_secs(5))
        .expect("Flush should succeed with nothing pending");
}
