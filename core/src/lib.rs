//! # betstream core
//!
//! Domain types and broker-facing traits shared by the betstream crates.
//!
//! ## Core Concepts
//!
//! - **Transaction events**: paired [`BetEvent`](transaction::BetEvent) and
//!   [`WinEvent`](transaction::WinEvent), published as JSON
//! - **Event bus**: keyed publish and streaming subscribe over a topic
//! - **Topic admin**: idempotent topic provisioning at startup
//! - **Environment**: injected dependencies (the clock) so tests stay deterministic
//!
//! ## Example
//!
//! ```ignore
//! use betstream_core::event::OutgoingRecord;
//! use betstream_core::event_bus::EventBus;
//! use betstream_core::transaction::TransactionEvent;
//!
//! let event = TransactionEvent::from(pair.bet.clone());
//! let record = OutgoingRecord::from_event(&event, event.session_id())?;
//! let receipt = bus.publish("transactions", &record).await?;
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod event;
pub mod event_bus;
pub mod topic;
pub mod transaction;

/// Environment module - Dependency injection traits
///
/// All time-dependent code reads the clock through [`Clock`](environment::Clock)
/// so tests can pin it.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use betstream_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// assert!(clock.now_millis() > 0);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;

        /// Current time in epoch milliseconds
        fn now_millis(&self) -> i64 {
            self.now().timestamp_millis()
        }
    }

    /// Wall clock
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::environment::{Clock, SystemClock};

    #[test]
    fn system_clock_millis_matches_now() {
        let clock = SystemClock;
        let before = clock.now().timestamp_millis();
        let millis = clock.now_millis();
        assert!(millis >= before);
    }
}
