//! In-memory topic catalogue.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

use betstream_core::topic::{TopicAdmin, TopicAdminError, TopicSpec};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// In-memory [`TopicAdmin`] for bootstrap tests.
///
/// Records how often `create_topic` and `partition_count` were called and
/// can be told to fail listing, to lose a creation race, or to keep a new
/// topic out of metadata for a while.
///
/// # Example
///
/// ```
/// use betstream_core::topic::{BootstrapOutcome, TopicSpec, ensure_topic};
/// use betstream_testing::InMemoryTopicAdmin;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let admin = InMemoryTopicAdmin::new();
/// let spec = TopicSpec::new("transactions", 12, 1, Duration::from_secs(60));
///
/// assert_eq!(ensure_topic(&admin, &spec).await?, BootstrapOutcome::Created);
/// assert_eq!(ensure_topic(&admin, &spec).await?, BootstrapOutcome::AlreadyExists);
/// assert_eq!(admin.topic_count(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryTopicAdmin {
    topics: Arc<RwLock<HashMap<String, TopicSpec>>>,
    create_calls: Arc<AtomicUsize>,
    list_failure: Arc<RwLock<Option<String>>>,
    lose_creation_race: Arc<AtomicBool>,
    hide_after_create: Arc<AtomicUsize>,
    hidden_describes: Arc<AtomicUsize>,
    describe_calls: Arc<AtomicUsize>,
}

impl InMemoryTopicAdmin {
    /// Create an empty catalogue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a topic as if someone else had created it earlier
    #[must_use]
    pub fn with_topic(self, spec: TopicSpec) -> Self {
        self.topics.write().unwrap().insert(spec.name.clone(), spec);
        self
    }

    /// Make `list_topics` fail with `reason`
    pub fn fail_listing(&self, reason: impl Into<String>) {
        *self.list_failure.write().unwrap() = Some(reason.into());
    }

    /// Make the next `create_topic` find the topic already created by a competitor
    pub fn lose_creation_race(&self) {
        self.lose_creation_race.store(true, Ordering::SeqCst);
    }

    /// After the next successful creation, answer the first `describes`
    /// partition-count reads as if metadata had not propagated yet
    pub fn hide_new_topics(&self, describes: usize) {
        self.hide_after_create.store(describes, Ordering::SeqCst);
    }

    /// Layout of a topic, if it exists
    #[must_use]
    pub fn topic(&self, name: &str) -> Option<TopicSpec> {
        self.topics.read().unwrap().get(name).cloned()
    }

    /// Number of topics in the catalogue
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.read().unwrap().len()
    }

    /// How many times `create_topic` was called
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// How many times `partition_count` was called
    #[must_use]
    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }
}

impl TopicAdmin for InMemoryTopicAdmin {
    fn list_topics(&self) -> Pin<Box<dyn Future<Output = Result<Vec<String>, TopicAdminError>> + Send + '_>> {
        Box::pin(async move {
            if let Some(reason) = self.list_failure.read().unwrap().clone() {
                return Err(TopicAdminError::ListFailed(reason));
            }
            let mut names: Vec<String> = self.topics.read().unwrap().keys().cloned().collect();
            names.sort();
            Ok(names)
        })
    }

    fn create_topic<'a>(
        &'a self,
        spec: &'a TopicSpec,
    ) -> Pin<Box<dyn Future<Output = Result<(), TopicAdminError>> + Send + 'a>> {
        Box::pin(async move {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            let mut topics = self.topics.write().unwrap();

            if self.lose_creation_race.swap(false, Ordering::SeqCst) {
                topics.insert(spec.name.clone(), spec.clone());
            }
            if topics.contains_key(&spec.name) {
                return Err(TopicAdminError::AlreadyExists(spec.name.clone()));
            }

            topics.insert(spec.name.clone(), spec.clone());
            self.hidden_describes
                .store(self.hide_after_create.swap(0, Ordering::SeqCst), Ordering::SeqCst);
            Ok(())
        })
    }

    fn partition_count<'a>(
        &'a self,
        topic: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<usize, TopicAdminError>> + Send + 'a>> {
        Box::pin(async move {
            self.describe_calls.fetch_add(1, Ordering::SeqCst);
            let hidden = self
                .hidden_describes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if hidden {
                return Err(TopicAdminError::NotYetVisible(topic.to_string()));
            }

            self.topics
                .read()
                .unwrap()
                .get(topic)
                .map(|spec| usize::try_from(spec.partitions).unwrap_or(0))
                .ok_or_else(|| TopicAdminError::NotYetVisible(topic.to_string()))
        })
    }
}
