//! Configuration management for the betstream simulator.
//!
//! Loads configuration from environment variables with defaults that match the
//! fixed local setup (a single broker on `localhost:9092`).

use betstream_core::topic::TopicSpec;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// RedPanda/Kafka connection and client settings
    pub redpanda: RedpandaConfig,
    /// Topic layout used by the bootstrap
    pub topic: TopicConfig,
    /// Bet/win scheduling
    pub simulator: SimulatorConfig,
    /// Consumer side
    pub logger: LoggerConfig,
    /// Prometheus exporter address; no exporter when unset
    pub metrics_addr: Option<SocketAddr>,
}

/// RedPanda/Kafka configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses (comma-separated)
    pub brokers: String,
    /// Producer acknowledgment mode (idempotence requires "all")
    pub producer_acks: String,
    /// Producer compression codec
    pub compression: String,
    /// Producer linger in milliseconds
    pub linger_ms: u64,
    /// Producer batch size in bytes
    pub batch_size: usize,
}

/// Topic configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Topic carrying both bets and wins
    pub name: String,
    /// Partitions created by the bootstrap
    pub partitions: i32,
    /// Replication factor created by the bootstrap
    pub replication_factor: i32,
    /// Retention in milliseconds (default: 7 days)
    pub retention_ms: u64,
    /// Admin request timeout in milliseconds
    pub admin_request_timeout_ms: u64,
}

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Time between two bets, in milliseconds
    pub bet_period_ms: u64,
    /// Time between a bet and its win, in milliseconds
    pub win_delay_ms: u64,
    /// Bounded wait for scheduled wins at shutdown, in milliseconds
    pub shutdown_timeout_ms: u64,
}

/// Logger (consumer) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Consumer group tracking the logger's offsets
    pub consumer_group: String,
    /// Bounded wait of a single poll, in milliseconds
    pub poll_timeout_ms: u64,
    /// Where a group without committed offsets starts reading
    pub auto_offset_reset: String,
}

fn parsed_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key).and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn string_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unparseable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = &lookup;
        Self {
            redpanda: RedpandaConfig {
                brokers: string_or(lookup, "REDPANDA_BROKERS", "localhost:9092"),
                producer_acks: string_or(lookup, "PRODUCER_ACKS", "all"),
                compression: string_or(lookup, "PRODUCER_COMPRESSION", "lz4"),
                linger_ms: parsed_or(lookup, "PRODUCER_LINGER_MS", 5),
                batch_size: parsed_or(lookup, "PRODUCER_BATCH_SIZE", 32 * 1024),
            },
            topic: TopicConfig {
                name: string_or(lookup, "TRANSACTIONS_TOPIC", "transactions"),
                partitions: parsed_or(lookup, "TOPIC_PARTITIONS", 12),
                replication_factor: parsed_or(lookup, "TOPIC_REPLICATION_FACTOR", 1),
                retention_ms: parsed_or(lookup, "TOPIC_RETENTION_MS", 604_800_000), // 7 days
                admin_request_timeout_ms: parsed_or(lookup, "ADMIN_REQUEST_TIMEOUT_MS", 15_000),
            },
            simulator: SimulatorConfig {
                bet_period_ms: parsed_or(lookup, "BET_PERIOD_MS", 5_000),
                win_delay_ms: parsed_or(lookup, "WIN_DELAY_MS", 5_000),
                shutdown_timeout_ms: parsed_or(lookup, "SHUTDOWN_TIMEOUT_MS", 5_000),
            },
            logger: LoggerConfig {
                consumer_group: string_or(lookup, "CONSUMER_GROUP", "transactions-logger-1"),
                poll_timeout_ms: parsed_or(lookup, "CONSUMER_POLL_TIMEOUT_MS", 500),
                auto_offset_reset: string_or(lookup, "CONSUMER_AUTO_OFFSET_RESET", "earliest"),
            },
            metrics_addr: lookup("METRICS_ADDR").and_then(|s| s.parse().ok()),
        }
    }

    /// Topic layout for the bootstrap
    #[must_use]
    pub fn topic_spec(&self) -> TopicSpec {
        TopicSpec::new(
            self.topic.name.clone(),
            self.topic.partitions,
            self.topic.replication_factor,
            Duration::from_millis(self.topic.retention_ms),
        )
    }

    /// Admin request timeout
    #[must_use]
    pub const fn admin_request_timeout(&self) -> Duration {
        Duration::from_millis(self.topic.admin_request_timeout_ms)
    }
}

impl SimulatorConfig {
    /// Bet period
    #[must_use]
    pub const fn bet_period(&self) -> Duration {
        Duration::from_millis(self.bet_period_ms)
    }

    /// Win delay
    #[must_use]
    pub const fn win_delay(&self) -> Duration {
        Duration::from_millis(self.win_delay_ms)
    }

    /// Shutdown wait
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl LoggerConfig {
    /// Poll timeout
    #[must_use]
    pub const fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}
