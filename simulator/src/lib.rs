//! # Betstream Simulator
//!
//! Produces a steady stream of simulated bets and their wins onto a Kafka
//! topic, and prints everything that lands on that topic.
//!
//! ## Components
//!
//! - [`generator::BetGenerator`]: draws bets and settles them into pairs
//! - [`simulator::TransactionSimulator`]: publishes a bet every period and its
//!   win after the win delay
//! - [`logger::TransactionLogger`]: consumes the topic and prints one line per
//!   record
//! - [`config::Config`]: environment-driven settings
//! - [`metrics`]: Prometheus counters for both paths
//!
//! The binary wires these to a real broker; the library takes any
//! [`betstream_core::event_bus::EventBus`], so everything here runs against
//! the in-memory bus in tests.

pub mod config;
pub mod generator;
pub mod logger;
pub mod metrics;
pub mod simulator;

pub use config::Config;
pub use generator::BetGenerator;
pub use logger::TransactionLogger;
pub use simulator::{RunSummary, SimulatorSettings, TransactionSimulator};
