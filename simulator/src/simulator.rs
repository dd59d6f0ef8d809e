//! Periodic bet/win producer.
//!
//! A bet is published on every tick. Its win is published `win_delay` later by
//! a separate task, so a slow or failing win never holds up the next bet. Both
//! records of a pair are keyed by the session id and therefore land on the
//! same partition in order.

use crate::generator::BetGenerator;
use crate::metrics::{PUBLISH_ERRORS_TOTAL, PUBLISHED_TOTAL};
use betstream_core::event::OutgoingRecord;
use betstream_core::event_bus::{DeliveryReceipt, EventBus};
use betstream_core::transaction::{
    Amount, BET_EVENT_TYPE, EventPair, TransactionEvent, WIN_EVENT_TYPE,
};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, error, info, warn};

/// Timing of the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorSettings {
    /// Topic both events are published to
    pub topic: String,
    /// Time between two bets
    pub bet_period: Duration,
    /// Bounded wait for pending wins once shutdown is requested
    pub shutdown_timeout: Duration,
}

impl SimulatorSettings {
    /// Settings with the default 5 s period and 5 s shutdown wait.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            bet_period: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// What a finished run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Pairs drawn and scheduled
    pub pairs_scheduled: u64,
    /// Tasks still pending when the shutdown wait ran out
    pub tasks_aborted: usize,
}

/// Log fields attached to each delivery outcome.
#[derive(Debug, Clone)]
struct Delivery {
    event_type: &'static str,
    brand_id: String,
    bet_id: String,
    amount: Amount,
}

/// Publishes a bet every period and its win after the win delay.
pub struct TransactionSimulator<R = rand::rngs::StdRng> {
    bus: Arc<dyn EventBus>,
    generator: BetGenerator<R>,
    settings: SimulatorSettings,
}

impl<R: Rng> TransactionSimulator<R> {
    /// Create a simulator publishing through `bus`.
    #[must_use]
    pub fn new(bus: Arc<dyn EventBus>, generator: BetGenerator<R>, settings: SimulatorSettings) -> Self {
        Self {
            bus,
            generator,
            settings,
        }
    }

    /// Emit pairs until `shutdown` fires, then drain pending wins.
    ///
    /// The first bet goes out immediately. After shutdown no new bets are
    /// drawn; scheduled wins get `shutdown_timeout` to finish before they are
    /// aborted, and the bus is flushed.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> RunSummary {
        // interval() rejects a zero period
        let mut ticker = interval(self.settings.bet_period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tasks = JoinSet::new();
        let mut summary = RunSummary::default();

        info!(
            topic = %self.settings.topic,
            period = ?self.settings.bet_period,
            win_delay = ?self.generator.win_delay(),
            "Simulator started"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutdown signal received, stopping simulator");
                    break;
                }
                _ = ticker.tick() => {
                    self.emit_pair(&mut tasks);
                    summary.pairs_scheduled += 1;
                }
            }

            while tasks.try_join_next().is_some() {}
        }

        let drained = tokio::time::timeout(self.settings.shutdown_timeout, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            summary.tasks_aborted = tasks.len();
            warn!(
                pending = summary.tasks_aborted,
                "Shutdown wait elapsed, aborting pending publishes"
            );
            tasks.abort_all();
        }

        // Flush blocks the calling thread for up to shutdown_timeout
        let bus = Arc::clone(&self.bus);
        let timeout = self.settings.shutdown_timeout;
        match tokio::task::spawn_blocking(move || bus.flush(timeout)).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => warn!(error = %e, "Producer flush incomplete"),
            Err(e) => warn!(error = %e, "Producer flush task failed"),
        }

        info!(pairs = summary.pairs_scheduled, "Simulator stopped");
        summary
    }

    /// Draw one pair and schedule both of its publishes on `tasks`.
    pub fn emit_pair(&mut self, tasks: &mut JoinSet<()>) {
        let pair = self.generator.next_pair();
        self.schedule(pair, tasks);
    }

    /// Publish `pair.bet` now and `pair.win` after the win delay.
    ///
    /// Neither publish is awaited here; outcomes are logged by the tasks.
    pub fn schedule(&self, pair: EventPair, tasks: &mut JoinSet<()>) {
        let EventPair { bet, win } = pair;
        let key = bet.session_id.clone();

        let bet_delivery = Delivery {
            event_type: BET_EVENT_TYPE,
            brand_id: bet.brand_id.clone(),
            bet_id: bet.bet_id.clone(),
            amount: bet.amount,
        };
        let win_delivery = Delivery {
            event_type: WIN_EVENT_TYPE,
            brand_id: win.brand_id.clone(),
            bet_id: win.bet_id.clone(),
            amount: win.win_amount,
        };

        match OutgoingRecord::from_event(&TransactionEvent::from(bet), key.clone()) {
            Ok(record) => {
                let bus = Arc::clone(&self.bus);
                let topic = self.settings.topic.clone();
                tasks.spawn(async move {
                    publish_and_log(bus.as_ref(), &topic, &record, &bet_delivery).await;
                });
            },
            Err(e) => error!(bet_id = %bet_delivery.bet_id, error = %e, "Failed to serialize bet"),
        }

        match OutgoingRecord::from_event(&TransactionEvent::from(win), key) {
            Ok(record) => {
                let bus = Arc::clone(&self.bus);
                let topic = self.settings.topic.clone();
                let delay = self.generator.win_delay();
                tasks.spawn(async move {
                    sleep(delay).await;
                    publish_and_log(bus.as_ref(), &topic, &record, &win_delivery).await;
                });
            },
            Err(e) => error!(bet_id = %win_delivery.bet_id, error = %e, "Failed to serialize win"),
        }
    }
}

async fn publish_and_log(bus: &dyn EventBus, topic: &str, record: &OutgoingRecord, delivery: &Delivery) {
    match bus.publish(topic, record).await {
        Ok(receipt) => {
            metrics::counter!(PUBLISHED_TOTAL, "event_type" => delivery.event_type).increment(1);
            info!("{}", producer_line(delivery, &receipt));
        },
        Err(e) => {
            metrics::counter!(PUBLISH_ERRORS_TOTAL, "event_type" => delivery.event_type).increment(1);
            let what = if delivery.event_type == BET_EVENT_TYPE { "bet" } else { "win" };
            error!(bet_id = %delivery.bet_id, error = %e, "Failed to send {what}");
        },
    }
    debug!(key = %record.key, event_type = %record.event_type, "Publish settled");
}

/// Success line for one delivery; wins report their payout as `win=`.
fn producer_line(delivery: &Delivery, receipt: &DeliveryReceipt) -> String {
    let label = if delivery.event_type == WIN_EVENT_TYPE { "win" } else { "amount" };
    format!(
        "PRODUCER: {:<4} -> {} key={} betId={} {label}={}",
        delivery.event_type, receipt, delivery.brand_id, delivery.bet_id, delivery.amount
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery(event_type: &'static str, cents: u64) -> Delivery {
        Delivery {
            event_type,
            brand_id: "brand-c".to_string(),
            bet_id: "bet-1".to_string(),
            amount: Amount::from_cents(cents),
        }
    }

    fn receipt() -> DeliveryReceipt {
        DeliveryReceipt {
            topic: "transactions".to_string(),
            partition: 3,
            offset: 42,
        }
    }

    #[test]
    fn bet_line_reports_the_stake_as_amount() {
        let line = producer_line(&delivery(BET_EVENT_TYPE, 5_000), &receipt());

        assert!(line.starts_with("PRODUCER: BET  -> "));
        assert!(line.ends_with("key=brand-c betId=bet-1 amount=50.00"));
    }

    #[test]
    fn win_line_reports_the_payout_as_win() {
        let line = producer_line(&delivery(WIN_EVENT_TYPE, 10_000), &receipt());

        assert!(line.starts_with("PRODUCER: WIN  -> "));
        assert!(line.ends_with("betId=bet-1 win=100.00"));
        assert!(!line.contains("amount="));
    }
}
