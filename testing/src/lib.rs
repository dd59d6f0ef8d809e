//! # betstream testing
//!
//! Testing utilities for the betstream crates.
//!
//! This crate provides:
//! - [`InMemoryEventBus`]: a partitioned, in-process event bus
//! - [`InMemoryTopicAdmin`]: a topic catalogue with failure injection
//! - [`FixedClock`] / [`test_clock`]: deterministic time
//! - [`SharedBuffer`]: an `io::Write` sink tests can read back
//!
//! ## Example
//!
//! ```ignore
//! use betstream_testing::{InMemoryEventBus, SharedBuffer};
//!
//! #[tokio::test]
//! async fn logger_prints_each_record() {
//!     let bus = InMemoryEventBus::new();
//!     let output = SharedBuffer::new();
//!     // start a logger writing into `output`, publish, then inspect `output.lines()`
//! }
//! ```

use chrono::{DateTime, Utc};
use betstream_core::environment::Clock;

mod event_bus;
mod topic_admin;

pub use event_bus::InMemoryEventBus;
pub use topic_admin::InMemoryTopicAdmin;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use betstream_testing::mocks::FixedClock;
    /// use betstream_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Cloneable `io::Write` sink backed by a shared byte buffer.
    ///
    /// Hand one clone to the code under test and keep the other to read back
    /// what was written.
    #[derive(Debug, Clone, Default)]
    pub struct SharedBuffer {
        bytes: Arc<Mutex<Vec<u8>>>,
    }

    impl SharedBuffer {
        /// Create an empty buffer
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Everything written so far, decoded lossily
        #[must_use]
        #[allow(clippy::unwrap_used)] // poisoned only if a writer panicked, which fails the test anyway
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.bytes.lock().unwrap()).into_owned()
        }

        /// Non-empty lines written so far
        #[must_use]
        pub fn lines(&self) -> Vec<String> {
            self.contents()
                .lines()
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        }
    }

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.bytes
                .lock()
                .map_err(|_| io::Error::other("shared buffer poisoned"))?
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

// Re-export commonly used items
pub use helpers::SharedBuffer;
pub use mocks::{FixedClock, test_clock};
