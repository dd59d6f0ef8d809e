//! Betstream simulator binary.
//!
//! This binary:
//! - Ensures the transactions topic exists (fatal if it cannot)
//! - Starts the transaction logger on its own consumer
//! - Publishes a bet every period and its win after the win delay
//! - Runs until Ctrl+C or SIGTERM, then drains pending wins
//!
//! # Usage
//!
//! ```bash
//! # Start a broker on localhost:9092, then
//! cargo run --bin betstream
//! ```

use anyhow::Context;
use betstream_core::environment::{Clock, SystemClock};
use betstream_core::event_bus::EventBus;
use betstream_core::topic::ensure_topic;
use betstream_redpanda::{RedpandaEventBus, RedpandaTopicAdmin};
use betstream_simulator::{
    BetGenerator, Config, SimulatorSettings, TransactionLogger, TransactionSimulator, metrics,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,betstream=debug,rdkafka=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        brokers = %config.redpanda.brokers,
        topic = %config.topic.name,
        "Configuration loaded"
    );

    match config.metrics_addr {
        Some(addr) => metrics::install_exporter(addr).context("metrics exporter")?,
        None => metrics::register_metrics(),
    }

    // Topic bootstrap; nothing else starts if this fails
    let admin = RedpandaTopicAdmin::new(&config.redpanda.brokers, config.admin_request_timeout())
        .context("admin client")?;
    let outcome = ensure_topic(&admin, &config.topic_spec())
        .await
        .with_context(|| format!("bootstrap of topic '{}'", config.topic.name))?;
    drop(admin);
    info!(topic = %config.topic.name, ?outcome, "Topic ready");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let consumer_bus = RedpandaEventBus::builder()
        .brokers(&config.redpanda.brokers)
        .consumer_group(&config.logger.consumer_group)
        .client_id(format!("transaction-logger-{}", clock.now_millis()))
        .auto_offset_reset(&config.logger.auto_offset_reset)
        .enable_auto_commit(true)
        .build_consumer()
        .context("consumer client")?;
    let logger = TransactionLogger::new(
        Arc::new(consumer_bus),
        &config.topic.name,
        config.logger.poll_timeout(),
    );
    let logger_task = logger.start();

    let producer_bus: Arc<dyn EventBus> = Arc::new(
        RedpandaEventBus::builder()
            .brokers(&config.redpanda.brokers)
            .producer_acks(&config.redpanda.producer_acks)
            .enable_idempotence(true)
            .compression(&config.redpanda.compression)
            .linger(Duration::from_millis(config.redpanda.linger_ms))
            .batch_size(config.redpanda.batch_size)
            .build()
            .context("producer client")?,
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let simulator = TransactionSimulator::new(
        producer_bus,
        BetGenerator::new(Arc::clone(&clock), config.simulator.win_delay()),
        SimulatorSettings {
            topic: config.topic.name.clone(),
            bet_period: config.simulator.bet_period(),
            shutdown_timeout: config.simulator.shutdown_timeout(),
        },
    );
    let simulator_task = tokio::spawn(simulator.run(shutdown_rx));

    info!("Press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!("Shutting down gracefully...");
    let _ = shutdown_tx.send(());
    let summary = simulator_task.await.context("simulator task")?;
    info!(
        pairs = summary.pairs_scheduled,
        aborted = summary.tasks_aborted,
        "Simulator finished"
    );

    logger.stop();
    if let Some(task) = logger_task {
        // One poll timeout for the loop to notice, plus headroom for the close
        let grace = config.logger.poll_timeout() + config.simulator.shutdown_timeout();
        if tokio::time::timeout(grace, task).await.is_err() {
            warn!("Transaction logger did not stop in time");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}
