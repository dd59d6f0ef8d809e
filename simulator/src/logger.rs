//! Console logger for the transactions topic.
//!
//! Polls the topic with a bounded wait and prints one line per record. The
//! poll bound is what makes [`TransactionLogger::stop`] take effect promptly:
//! the running flag is rechecked at least once per poll timeout.

use crate::metrics::CONSUMED_TOTAL;
use betstream_core::event_bus::{ConsumedRecord, EventBus};
use futures::StreamExt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Format one consumed record the way the logger prints it.
///
/// Missing timestamps print as `-1`, missing keys and payloads as `null`.
///
/// ```
/// use betstream_core::event_bus::ConsumedRecord;
/// use betstream_simulator::logger::format_record;
///
/// let record = ConsumedRecord {
///     topic: "transactions".to_string(),
///     partition: 3,
///     offset: 17,
///     timestamp: Some(1_735_689_600_000),
///     key: Some("session-1".to_string()),
///     payload: Some("{}".to_string()),
/// };
/// assert_eq!(
///     format_record(&record),
///     "CONSUMER: topic=transactions p=3 off=17 ts=1735689600000 key=session-1 value={}"
/// );
/// ```
#[must_use]
pub fn format_record(record: &ConsumedRecord) -> String {
    format!(
        "CONSUMER: topic={} p={} off={} ts={} key={} value={}",
        record.topic,
        record.partition,
        record.offset,
        record.timestamp.unwrap_or(-1),
        record.key.as_deref().unwrap_or("null"),
        record.payload.as_deref().unwrap_or("null"),
    )
}

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Prints every record of a topic until stopped.
pub struct TransactionLogger {
    bus: Arc<dyn EventBus>,
    topic: String,
    poll_timeout: Duration,
    running: Arc<AtomicBool>,
    output: SharedWriter,
}

impl TransactionLogger {
    /// Logger for `topic`, printing to stdout.
    #[must_use]
    pub fn new(bus: Arc<dyn EventBus>, topic: impl Into<String>, poll_timeout: Duration) -> Self {
        Self {
            bus,
            topic: topic.into(),
            poll_timeout,
            running: Arc::new(AtomicBool::new(false)),
            output: Arc::new(Mutex::new(Box::new(io::stdout()))),
        }
    }

    /// Print to `writer` instead of stdout.
    #[must_use]
    pub fn with_output(mut self, writer: impl Write + Send + 'static) -> Self {
        self.output = Arc::new(Mutex::new(Box::new(writer)));
        self
    }

    /// Whether the consume loop is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the consume loop on a background task.
    ///
    /// Returns `None` if the logger is already running; a second start never
    /// creates a second consumer.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(topic = %self.topic, "Transaction logger already running");
            return None;
        }

        let bus = Arc::clone(&self.bus);
        let topic = self.topic.clone();
        let poll_timeout = self.poll_timeout;
        let running = Arc::clone(&self.running);
        let output = Arc::clone(&self.output);

        Some(tokio::spawn(async move {
            consume(bus.as_ref(), &topic, poll_timeout, &running, &output).await;
            running.store(false, Ordering::SeqCst);
        }))
    }

    /// Ask the consume loop to exit.
    ///
    /// Takes effect within one poll timeout; the subscription is closed when
    /// the loop exits.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!(topic = %self.topic, "Stopping transaction logger");
        }
    }
}

async fn consume(
    bus: &dyn EventBus,
    topic: &str,
    poll_timeout: Duration,
    running: &AtomicBool,
    output: &SharedWriter,
) {
    let mut stream = match bus.subscribe(&[topic]).await {
        Ok(stream) => stream,
        Err(e) => {
            error!(topic = %topic, error = %e, "Transaction logger failed to subscribe");
            return;
        },
    };
    info!(topic = %topic, "Transaction logger subscribed");

    while running.load(Ordering::SeqCst) {
        match tokio::time::timeout(poll_timeout, stream.next()).await {
            Ok(Some(Ok(record))) => {
                print_line(output, &format_record(&record));
                metrics::counter!(CONSUMED_TOTAL).increment(1);
            },
            Ok(Some(Err(e))) => {
                warn!(topic = %topic, error = %e, "Error receiving record");
            },
            Ok(None) => {
                warn!(topic = %topic, "Record stream ended");
                break;
            },
            Err(_) => debug!(topic = %topic, "Poll returned no records"),
        }
    }

    drop(stream);
    info!(topic = %topic, "Transaction logger stopped");
}

fn print_line(output: &SharedWriter, line: &str) {
    let Ok(mut writer) = output.lock() else {
        error!("Logger output poisoned");
        return;
    };
    if let Err(e) = writeln!(writer, "{line}").and_then(|()| writer.flush()) {
        warn!(error = %e, "Failed to write consumed record");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: Option<&str>, timestamp: Option<i64>) -> ConsumedRecord {
        ConsumedRecord {
            topic: "transactions".to_string(),
            partition: 0,
            offset: 0,
            timestamp,
            key: key.map(str::to_string),
            payload: Some("{\"eventType\":\"BET\"}".to_string()),
        }
    }

    #[test]
    fn format_keeps_payload_verbatim() {
        let line = format_record(&record(Some("s-1"), Some(5)));

        assert!(line.starts_with("CONSUMER: topic=transactions p=0 off=0 ts=5 key=s-1 value="));
        assert!(line.ends_with("value={\"eventType\":\"BET\"}"));
    }

    #[test]
    fn format_prints_missing_fields_as_sentinels() {
        let line = format_record(&record(None, None));

        assert!(line.contains("ts=-1"));
        assert!(line.contains("key=null"));
    }
}
