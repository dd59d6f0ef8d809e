//! Topic provisioning.
//!
//! [`ensure_topic`] makes sure a topic exists before anything publishes to it.
//! It never reconciles: an existing topic is left exactly as it is, even when
//! its partition count or replication factor differ from the requested
//! [`TopicSpec`].
//!
//! ```text
//! list topics ──► present? ──yes──► AlreadyExists
//!                    │
//!                    no
//!                    ▼
//!               create topic ──TopicAlreadyExists──► AlreadyExists
//!                    │
//!                    ▼
//!                 Created
//! ```
//!
//! Either way the partition count is read back and logged. A freshly created
//! topic may take a moment to show up in metadata, so that read is retried
//! up to [`DESCRIBE_ATTEMPTS`] times.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Errors from administrative topic operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicAdminError {
    /// Could not create the admin client or reach the cluster
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Listing topics failed
    #[error("Failed to list topics: {0}")]
    ListFailed(String),

    /// The topic already exists (lost a creation race)
    #[error("Topic already exists: {0}")]
    AlreadyExists(String),

    /// Creating the topic failed
    #[error("Failed to create topic '{topic}': {reason}")]
    CreateFailed {
        /// Topic being created
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Reading topic metadata failed
    #[error("Failed to describe topic '{topic}': {reason}")]
    DescribeFailed {
        /// Topic being described
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// The topic is not in the cluster metadata yet (still propagating after creation)
    #[error("Topic not yet visible in metadata: {0}")]
    NotYetVisible(String),

    /// The requested topic layout is unusable
    #[error("Invalid topic spec: {0}")]
    InvalidSpec(String),
}

/// Desired layout of a topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicSpec {
    /// Topic name
    pub name: String,
    /// Number of partitions
    pub partitions: i32,
    /// Replication factor
    pub replication_factor: i32,
    /// How long the broker keeps records
    pub retention: Duration,
}

impl TopicSpec {
    /// Creates a topic spec
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        partitions: i32,
        replication_factor: i32,
        retention: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            partitions,
            replication_factor,
            retention,
        }
    }

    /// Value for the `retention.ms` topic config.
    #[must_use]
    pub fn retention_ms(&self) -> String {
        self.retention.as_millis().to_string()
    }

    /// Checks that the layout can be created at all.
    ///
    /// # Errors
    ///
    /// Returns [`TopicAdminError::InvalidSpec`] for an empty name or a
    /// non-positive partition count or replication factor.
    pub fn validate(&self) -> Result<(), TopicAdminError> {
        if self.name.trim().is_empty() {
            return Err(TopicAdminError::InvalidSpec("topic name is empty".to_string()));
        }
        if self.partitions < 1 {
            return Err(TopicAdminError::InvalidSpec(format!(
                "partitions must be at least 1, got {}",
                self.partitions
            )));
        }
        if self.replication_factor < 1 {
            return Err(TopicAdminError::InvalidSpec(format!(
                "replication factor must be at least 1, got {}",
                self.replication_factor
            )));
        }
        Ok(())
    }
}

/// How many times [`ensure_topic`] reads the partition count of a topic that
/// is not yet visible in metadata.
pub const DESCRIBE_ATTEMPTS: u32 = 20;

/// Pause between two of those reads.
pub const DESCRIBE_BACKOFF: Duration = Duration::from_millis(250);

/// What [`ensure_topic`] did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The topic was created by this call
    Created,
    /// The topic was already there and was left untouched
    AlreadyExists,
}

/// Administrative operations needed to provision a topic.
///
/// Uses boxed futures so it can be used as `&dyn TopicAdmin`.
pub trait TopicAdmin: Send + Sync {
    /// Names of all topics in the cluster.
    ///
    /// # Errors
    ///
    /// Returns [`TopicAdminError::ListFailed`] if metadata cannot be fetched.
    fn list_topics(&self) -> Pin<Box<dyn Future<Output = Result<Vec<String>, TopicAdminError>> + Send + '_>>;

    /// Create a topic with the given layout.
    ///
    /// # Errors
    ///
    /// Returns [`TopicAdminError::AlreadyExists`] if the topic exists, or
    /// [`TopicAdminError::CreateFailed`] for any other failure.
    fn create_topic<'a>(
        &'a self,
        spec: &'a TopicSpec,
    ) -> Pin<Box<dyn Future<Output = Result<(), TopicAdminError>> + Send + 'a>>;

    /// Number of partitions of an existing topic.
    ///
    /// # Errors
    ///
    /// Returns [`TopicAdminError::NotYetVisible`] if the broker does not know
    /// the topic (yet), [`TopicAdminError::DescribeFailed`] if metadata cannot
    /// be fetched.
    fn partition_count<'a>(
        &'a self,
        topic: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<usize, TopicAdminError>> + Send + 'a>>;
}

/// Create the topic described by `spec` unless it already exists.
///
/// Safe to call any number of times.
///
/// # Errors
///
/// Any administrative failure is returned unchanged; callers treat it as a
/// fatal startup error.
pub async fn ensure_topic(
    admin: &dyn TopicAdmin,
    spec: &TopicSpec,
) -> Result<BootstrapOutcome, TopicAdminError> {
    spec.validate()?;

    let existing = admin.list_topics().await?;
    let outcome = if existing.iter().any(|name| name == &spec.name) {
        tracing::info!(topic = %spec.name, "Topic already exists");
        BootstrapOutcome::AlreadyExists
    } else {
        match admin.create_topic(spec).await {
            Ok(()) => {
                tracing::info!(
                    topic = %spec.name,
                    partitions = spec.partitions,
                    replication_factor = spec.replication_factor,
                    retention_ms = %spec.retention_ms(),
                    "Created topic"
                );
                BootstrapOutcome::Created
            },
            Err(TopicAdminError::AlreadyExists(_)) => {
                tracing::info!(topic = %spec.name, "Topic created concurrently, already exists");
                BootstrapOutcome::AlreadyExists
            },
            Err(e) => return Err(e),
        }
    };

    let partitions = describe_when_visible(admin, &spec.name).await?;
    tracing::info!(topic = %spec.name, partitions, "Topic described");

    Ok(outcome)
}

async fn describe_when_visible(admin: &dyn TopicAdmin, topic: &str) -> Result<usize, TopicAdminError> {
    let mut attempt = 1;
    loop {
        match admin.partition_count(topic).await {
            Err(TopicAdminError::NotYetVisible(_)) if attempt < DESCRIBE_ATTEMPTS => {
                tracing::debug!(topic = %topic, attempt, "Topic not in metadata yet, retrying");
                attempt += 1;
                tokio::time::sleep(DESCRIBE_BACKOFF).await;
            },
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_ms_is_plain_millis() {
        let spec = TopicSpec::new("transactions", 12, 1, Duration::from_secs(7 * 24 * 60 * 60));
        assert_eq!(spec.retention_ms(), "604800000");
    }

    #[test]
    fn validate_rejects_zero_partitions() {
        let spec = TopicSpec::new("transactions", 0, 1, Duration::from_secs(1));
        assert!(matches!(spec.validate(), Err(TopicAdminError::InvalidSpec(_))));
    }

    #[test]
    fn validate_rejects_blank_name() {
        let spec = TopicSpec::new("  ", 1, 1, Duration::from_secs(1));
        assert!(matches!(spec.validate(), Err(TopicAdminError::InvalidSpec(_))));
    }

    #[test]
    fn validate_accepts_default_layout() {
        let spec = TopicSpec::new("transactions", 12, 1, Duration::from_secs(60));
        assert_eq!(spec.validate(), Ok(()));
    }
}
