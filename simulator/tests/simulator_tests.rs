//! Simulator behaviour against the in-memory bus, on a paused clock.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use betstream_core::event_bus::ConsumedRecord;
use betstream_core::transaction::{Amount, PayoutMultiplier, TransactionEvent};
use betstream_simulator::{BetGenerator, SimulatorSettings, TransactionSimulator};
use betstream_testing::{InMemoryEventBus, SharedBuffer, test_clock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

const TOPIC: &str = "transactions";

fn simulator(bus: &InMemoryEventBus, shutdown_timeout: Duration) -> TransactionSimulator {
    TransactionSimulator::new(
        Arc::new(bus.clone()),
        BetGenerator::seeded(11, Arc::new(test_clock()), Duration::from_secs(5)),
        SimulatorSettings {
            topic: TOPIC.to_string(),
            bet_period: Duration::from_secs(5),
            shutdown_timeout,
        },
    )
}

fn decode(record: &ConsumedRecord) -> TransactionEvent {
    serde_json::from_str(record.payload.as_deref().unwrap()).unwrap()
}

fn split(records: &[ConsumedRecord]) -> (Vec<TransactionEvent>, Vec<TransactionEvent>) {
    records
        .iter()
        .map(decode)
        .partition(|event| matches!(event, TransactionEvent::Bet(_)))
}

#[tokio::test(start_paused = true)]
async fn win_is_published_after_the_delay() {
    let bus = InMemoryEventBus::new();
    let simulator = simulator(&bus, Duration::from_secs(5));
    let pair = BetGenerator::seeded(1, Arc::new(test_clock()), Duration::from_secs(5))
        .pair_with(Amount::from_cents(5_000), PayoutMultiplier::new(2.0).unwrap());
    let bet_id = pair.bet.bet_id.clone();
    let session_id = pair.bet.session_id.clone();

    let mut tasks = JoinSet::new();
    simulator.schedule(pair, &mut tasks);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(bus.len(), 1, "bet goes out immediately");

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(bus.len(), 1, "win waits for the full delay");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(bus.len(), 2);
    while tasks.join_next().await.is_some() {}

    let records = bus.published_on(TOPIC);
    let bet: serde_json::Value = serde_json::from_str(records[0].payload.as_deref().unwrap()).unwrap();
    let win: serde_json::Value = serde_json::from_str(records[1].payload.as_deref().unwrap()).unwrap();

    assert_eq!(bet["eventType"], "BET");
    assert_eq!(bet["amount"].as_f64(), Some(50.0));
    assert_eq!(win["eventType"], "WIN");
    assert_eq!(win["winAmount"].as_f64(), Some(100.0));
    assert_eq!(win["betId"], bet_id.as_str());
    assert_eq!(win["sessionId"], session_id.as_str());
    assert_eq!(
        win["timestamp"].as_i64().unwrap() - bet["timestamp"].as_i64().unwrap(),
        5_000
    );
    assert_eq!(records[0].key.as_deref(), Some(session_id.as_str()));
    assert_eq!(records[1].key.as_deref(), Some(session_id.as_str()));
}

#[tokio::test(start_paused = true)]
async fn run_emits_on_every_tick_and_drains_wins() {
    let bus = InMemoryEventBus::new();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(simulator(&bus, Duration::from_secs(5)).run(shutdown_rx));

    // Ticks at 0s, 5s and 10s
    tokio::time::sleep(Duration::from_millis(12_500)).await;
    shutdown_tx.send(()).unwrap();
    let summary = handle.await.unwrap();

    assert_eq!(summary.pairs_scheduled, 3);
    assert_eq!(summary.tasks_aborted, 0);

    let (bets, wins) = split(&bus.published_on(TOPIC));
    assert_eq!(bets.len(), 3);
    assert_eq!(wins.len(), 3, "the last win lands inside the shutdown wait");
    for win in &wins {
        assert!(bets.iter().any(|bet| bet.bet_id() == win.bet_id()));
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_wait_is_bounded() {
    let bus = InMemoryEventBus::new();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(simulator(&bus, Duration::from_secs(1)).run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown_tx.send(()).unwrap();
    let summary = handle.await.unwrap();

    assert_eq!(summary.pairs_scheduled, 1);
    assert_eq!(summary.tasks_aborted, 1);
    assert_eq!(bus.len(), 1, "only the bet was published");
}

#[tokio::test(start_paused = true)]
async fn publish_failures_are_logged_and_do_not_stop_the_schedule() {
    let logs = SharedBuffer::new();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let bus = InMemoryEventBus::new();
    bus.fail_publishes(true);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(simulator(&bus, Duration::from_secs(5)).run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    shutdown_tx.send(()).unwrap();
    let summary = handle.await.unwrap();

    assert_eq!(summary.pairs_scheduled, 3);
    assert!(bus.is_empty());
    let output = logs.contents();
    assert!(output.contains("Failed to send bet"));
    assert!(output.contains("Failed to send win"));
}

#[tokio::test(start_paused = true)]
async fn bet_and_win_share_a_partition_in_order() {
    let bus = InMemoryEventBus::with_partitions(12);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(simulator(&bus, Duration::from_secs(5)).run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(7_500)).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();

    let records = bus.published_on(TOPIC);
    for bet_record in records.iter().filter(|r| matches!(decode(r), TransactionEvent::Bet(_))) {
        let bet = decode(bet_record);
        let win_record = records
            .iter()
            .find(|r| matches!(decode(r), TransactionEvent::Win(ref w) if w.bet_id == bet.bet_id()))
            .expect("every bet is settled");

        assert_eq!(win_record.partition, bet_record.partition);
        assert!(win_record.offset > bet_record.offset);
    }
}

#[tokio::test(start_paused = true)]
async fn closed_shutdown_channel_stops_the_run() {
    let bus = InMemoryEventBus::new();
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    drop(shutdown_tx);

    let summary = simulator(&bus, Duration::from_secs(5)).run(shutdown_rx).await;

    assert!(summary.pairs_scheduled <= 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_flush_runs_off_the_runtime_thread() {
    let bus = InMemoryEventBus::new();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    shutdown_tx.send(()).unwrap();

    // Current-thread runtime: anything run inline lands on this thread
    simulator(&bus, Duration::from_secs(1)).run(shutdown_rx).await;

    let flushes = bus.flush_threads();
    assert_eq!(flushes.len(), 1, "the producer is flushed once on shutdown");
    assert_ne!(flushes[0], std::thread::current().id());
}
