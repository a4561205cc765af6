//! Saldo Watch — bank balance poller and daily CSV exporter
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the bank client, exporter, prediction runner and notification
//! bridge together, and runs the scheduler until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use saldo_watch::bank::client::BankClient;
use saldo_watch::bridge;
use saldo_watch::bridge::notifier::Notifier;
use saldo_watch::bridge::routes::BridgeState;
use saldo_watch::config;
use saldo_watch::engine::exporter::BalanceExporter;
use saldo_watch::engine::poller::Poller;
use saldo_watch::engine::scheduler::Scheduler;
use saldo_watch::prediction::PredictionRunner;
use saldo_watch::types::SessionContext;

/// Pending begin events before the bridge gets back-pressure.
const BEGIN_CHANNEL_CAPACITY: usize = 8;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("SALDO_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    info!(
        agent_name = %cfg.agent.name,
        poll_interval_secs = cfg.schedule.poll_interval_secs,
        prediction_interval_secs = cfg.schedule.prediction_interval_secs,
        export_path = %cfg.export.path.display(),
        "Saldo Watch starting up"
    );

    // -- Initialise components -------------------------------------------

    let session = Arc::new(SessionContext::new());
    let notifier = Notifier::new();
    let bank = Arc::new(BankClient::new(cfg.request_timeout())?);
    let exporter = BalanceExporter::new(cfg.export.path.clone());
    let poller = Arc::new(Poller::new(bank, exporter, notifier.clone(), session.clone()));

    let prediction = if cfg.prediction.enabled {
        Some(Arc::new(PredictionRunner::from_config(&cfg.prediction)))
    } else {
        info!("Prediction step disabled");
        None
    };

    let (begin_tx, begin_rx) = mpsc::channel(BEGIN_CHANNEL_CAPACITY);

    if cfg.bridge.enabled {
        let state = Arc::new(BridgeState {
            notifier: notifier.clone(),
            session: session.clone(),
            begin_tx: begin_tx.clone(),
            history_path: cfg.export.path.clone(),
        });
        bridge::spawn_bridge(state, cfg.bridge.port).await?;
    } else {
        warn!("Bridge disabled, waiting for startup credentials only");
    }

    match cfg.startup_credentials() {
        Some(credentials) => {
            info!(username = %credentials.username, "Using startup credentials");
            begin_tx.send(credentials).await?;
        }
        None => info!("No startup credentials, waiting for GET_AUTH_TICKET"),
    }
    drop(begin_tx);

    // -- Main loop -------------------------------------------------------

    let scheduler = Scheduler::new(
        poller,
        prediction,
        notifier,
        cfg.poll_interval(),
        cfg.prediction_interval(),
        begin_rx,
    );

    info!("Entering main loop. Press Ctrl+C to stop.");
    scheduler
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;

    let status = session.status().await;
    info!(
        cycles = status.cycles_run,
        skipped = status.cycles_skipped,
        records = status.records_appended,
        "Saldo Watch shut down cleanly."
    );

    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("saldo_watch=info"));

    let json_logging = std::env::var("SALDO_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
