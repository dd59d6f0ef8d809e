//! Event trait and the keyed record shape handed to the event bus.
//!
//! Events are facts about something that already happened. In this workspace
//! they travel as JSON text so that any consumer (including `kcat` or the
//! broker console) can read them without a schema registry.
//!
//! # Example
//!
//! ```
//! use betstream_core::event::Event;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! struct Heartbeat {
//!     source: String,
//! }
//!
//! impl Event for Heartbeat {
//!     fn event_type(&self) -> &'static str {
//!         "HEARTBEAT"
//!     }
//! }
//!
//! let json = Heartbeat { source: "sim".to_string() }.to_json().unwrap();
//! assert_eq!(json, r#"{"source":"sim"}"#);
//! ```

use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;

/// Error types for event operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize event to text.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from text.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),
}

/// An event that can be published to a topic.
///
/// The `event_type()` identifier is what downstream consumers switch on, so it
/// must stay stable across releases.
///
/// # Serialization
///
/// Events are serialized to JSON. The default implementations work for any
/// type implementing `Serialize` and `DeserializeOwned`.
pub trait Event: Send + Sync + 'static {
    /// Returns the event type identifier for this event.
    fn event_type(&self) -> &'static str;

    /// Serialize this event to JSON text.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    fn to_json(&self) -> Result<String, EventError>
    where
        Self: Serialize,
    {
        serde_json::to_string(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Deserialize an event from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `EventError::DeserializationError` if the text is not valid JSON
    /// or does not describe this event type.
    fn from_json(text: &str) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        serde_json::from_str(text).map_err(|e| EventError::DeserializationError(e.to_string()))
    }
}

/// A serialized event ready to be published.
///
/// Carries the partition key alongside the payload: records with the same key
/// land on the same partition and keep their relative order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingRecord {
    /// The event type identifier (e.g., "BET").
    pub event_type: String,

    /// Partition key.
    pub key: String,

    /// JSON payload.
    pub payload: String,
}

impl OutgoingRecord {
    /// Create a new outgoing record.
    ///
    /// # Examples
    ///
    /// ```
    /// use betstream_core::event::OutgoingRecord;
    ///
    /// let record = OutgoingRecord::new(
    ///     "BET".to_string(),
    ///     "session-1".to_string(),
    ///     "{}".to_string(),
    /// );
    /// assert_eq!(record.key, "session-1");
    /// ```
    #[must_use]
    pub const fn new(event_type: String, key: String, payload: String) -> Self {
        Self {
            event_type,
            key,
            payload,
        }
    }

    /// Serialize an event and attach the given partition key.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    pub fn from_event<E: Event + Serialize>(
        event: &E,
        key: impl Into<String>,
    ) -> Result<Self, EventError> {
        Ok(Self {
            event_type: event.event_type().to_string(),
            key: key.into(),
            payload: event.to_json()?,
        })
    }
}

impl fmt::Display for OutgoingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OutgoingRecord {{ type: {}, key: {}, size: {} bytes }}",
            self.event_type,
            self.key,
            self.payload.len()
        )
    }
}
