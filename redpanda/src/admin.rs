//! Topic administration through the Kafka admin API.

use betstream_core::topic::{TopicAdmin, TopicAdminError, TopicSpec};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::error::RDKafkaErrorCode;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// [`TopicAdmin`] backed by an rdkafka [`AdminClient`].
///
/// # Example
///
/// ```no_run
/// use betstream_core::topic::{TopicSpec, ensure_topic};
/// use betstream_redpanda::RedpandaTopicAdmin;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let admin = RedpandaTopicAdmin::new("localhost:9092", Duration::from_secs(15))?;
/// let spec = TopicSpec::new("transactions", 12, 1, Duration::from_secs(7 * 24 * 3600));
/// ensure_topic(&admin, &spec).await?;
/// # Ok(())
/// # }
/// ```
pub struct RedpandaTopicAdmin {
    admin: Arc<AdminClient<DefaultClientContext>>,
    request_timeout: Duration,
}

impl RedpandaTopicAdmin {
    /// Create an admin client for `brokers`.
    ///
    /// Every admin request (metadata fetch, topic creation) is bounded by
    /// `request_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TopicAdminError::ConnectionFailed`] if the client cannot be created.
    pub fn new(brokers: &str, request_timeout: Duration) -> Result<Self, TopicAdminError> {
        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .create()
            .map_err(|e| {
                TopicAdminError::ConnectionFailed(format!("Failed to create admin client: {e}"))
            })?;

        tracing::debug!(brokers = %brokers, ?request_timeout, "Admin client created");

        Ok(Self {
            admin: Arc::new(admin),
            request_timeout,
        })
    }

    fn options(&self) -> AdminOptions {
        AdminOptions::new()
            .request_timeout(Some(self.request_timeout))
            .operation_timeout(Some(self.request_timeout))
    }
}

impl TopicAdmin for RedpandaTopicAdmin {
    fn list_topics(&self) -> Pin<Box<dyn Future<Output = Result<Vec<String>, TopicAdminError>> + Send + '_>> {
        let admin = Arc::clone(&self.admin);
        let timeout = self.request_timeout;

        Box::pin(async move {
            // fetch_metadata blocks for up to the request timeout
            tokio::task::spawn_blocking(move || -> Result<Vec<String>, TopicAdminError> {
                let metadata = admin
                    .inner()
                    .fetch_metadata(None, timeout)
                    .map_err(|e| TopicAdminError::ListFailed(e.to_string()))?;

                Ok(metadata
                    .topics()
                    .iter()
                    .map(|topic| topic.name().to_string())
                    .collect())
            })
            .await
            .map_err(|e| TopicAdminError::ListFailed(format!("metadata task failed: {e}")))?
        })
    }

    fn create_topic<'a>(
        &'a self,
        spec: &'a TopicSpec,
    ) -> Pin<Box<dyn Future<Output = Result<(), TopicAdminError>> + Send + 'a>> {
        Box::pin(async move {
            let retention_ms = spec.retention_ms();
            let new_topic = NewTopic::new(
                &spec.name,
                spec.partitions,
                TopicReplication::Fixed(spec.replication_factor),
            )
            .set("retention.ms", &retention_ms);

            let results = self
                .admin
                .create_topics([&new_topic], &self.options())
                .await
                .map_err(|e| TopicAdminError::CreateFailed {
                    topic: spec.name.clone(),
                    reason: e.to_string(),
                })?;

            for result in results {
                match result {
                    Ok(_) => {},
                    Err((topic, RDKafkaErrorCode::TopicAlreadyExists)) => {
                        return Err(TopicAdminError::AlreadyExists(topic));
                    },
                    Err((topic, code)) => {
                        return Err(TopicAdminError::CreateFailed {
                            topic,
                            reason: code.to_string(),
                        });
                    },
                }
            }
            Ok(())
        })
    }

    fn partition_count<'a>(
        &'a self,
        topic: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<usize, TopicAdminError>> + Send + 'a>> {
        let admin = Arc::clone(&self.admin);
        let timeout = self.request_timeout;
        let name = topic.to_string();

        Box::pin(async move {
            let describe_failed = |reason: String| TopicAdminError::DescribeFailed {
                topic: topic.to_string(),
                reason,
            };

            tokio::task::spawn_blocking(move || describe(&admin, &name, timeout))
                .await
                .map_err(|e| describe_failed(format!("metadata task failed: {e}")))?
        })
    }
}

/// Partition count of `topic` from a blocking metadata fetch.
fn describe(
    admin: &AdminClient<DefaultClientContext>,
    topic: &str,
    timeout: Duration,
) -> Result<usize, TopicAdminError> {
    let metadata = admin
        .inner()
        .fetch_metadata(Some(topic), timeout)
        .map_err(|e| TopicAdminError::DescribeFailed {
            topic: topic.to_string(),
            reason: e.to_string(),
        })?;

    let Some(described) = metadata.topics().iter().find(|t| t.name() == topic) else {
        return Err(TopicAdminError::NotYetVisible(topic.to_string()));
    };

    match described.error().map(RDKafkaErrorCode::from) {
        None => Ok(described.partitions().len()),
        Some(code) => Err(classify_describe_error(topic, code)),
    }
}

/// Unknown-topic answers are expected while a new topic propagates; anything else is final.
fn classify_describe_error(topic: &str, code: RDKafkaErrorCode) -> TopicAdminError {
    match code {
        RDKafkaErrorCode::UnknownTopicOrPartition | RDKafkaErrorCode::LeaderNotAvailable => {
            TopicAdminError::NotYetVisible(topic.to_string())
        },
        other => TopicAdminError::DescribeFailed {
            topic: topic.to_string(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn propagating_topic_is_retriable() {
        assert_eq!(
            classify_describe_error("transactions", RDKafkaErrorCode::UnknownTopicOrPartition),
            TopicAdminError::NotYetVisible("transactions".to_string())
        );
        assert_eq!(
            classify_describe_error("transactions", RDKafkaErrorCode::LeaderNotAvailable),
            TopicAdminError::NotYetVisible("transactions".to_string())
        );
    }

    #[test]
    fn authorization_failure_is_final() {
        assert!(matches!(
            classify_describe_error("transactions", RDKafkaErrorCode::TopicAuthorizationFailed),
            TopicAdminError::DescribeFailed { .. }
        ));
    }
}
