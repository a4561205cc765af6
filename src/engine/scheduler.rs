//! Poll scheduler.
//!
//! Two independent repeating timers plus an on-demand trigger:
//! - prediction timer: fires immediately at startup, then every period;
//! - poll timer: first fires one full period after startup;
//! - begin events: store the received credentials and run a cycle now.
//!
//! Cycles and prediction runs are spawned so a slow script never delays a
//! poll. Poll cycles are serialized by the session's single-flight guard.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::poller::{Poller, Trigger};
use crate::bridge::notifier::Notifier;
use crate::prediction::PredictionRunner;
use crate::types::{Credentials, Notification};

pub struct Scheduler {
    poller: Arc<Poller>,
    prediction: Option<Arc<PredictionRunner>>,
    notifier: Notifier,
    poll_interval: Duration,
    prediction_interval: Duration,
    begin_rx: mpsc::Receiver<Credentials>,
}

impl Scheduler {
    pub fn new(
        poller: Arc<Poller>,
        prediction: Option<Arc<PredictionRunner>>,
        notifier: Notifier,
        poll_interval: Duration,
        prediction_interval: Duration,
        begin_rx: mpsc::Receiver<Credentials>,
    ) -> Self {
        Self {
            poller,
            prediction,
            notifier,
            poll_interval,
            prediction_interval,
            begin_rx,
        }
    }

    /// Run until `shutdown` resolves. Tasks still running are aborted.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut prediction_timer = interval(self.prediction_interval);
        prediction_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut poll_timer = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut tasks = JoinSet::new();
        let mut begin_open = true;
        tokio::pin!(shutdown);

        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            prediction_interval_secs = self.prediction_interval.as_secs(),
            prediction_enabled = self.prediction.is_some(),
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = prediction_timer.tick() => {
                    if let Some(runner) = &self.prediction {
                        let runner = Arc::clone(runner);
                        let notifier = self.notifier.clone();
                        tasks.spawn(async move {
                            let result = runner.run().await;
                            notifier.relay(Notification::prediction(&result)).await;
                        });
                    }
                }
                _ = poll_timer.tick() => {
                    self.spawn_cycle(&mut tasks, Trigger::Poll);
                }
                msg = self.begin_rx.recv(), if begin_open => {
                    match msg {
                        Some(credentials) => {
                            info!(username = %credentials.username, "Received credentials");
                            self.poller.session().set_credentials(credentials).await;
                            self.spawn_cycle(&mut tasks, Trigger::Begin);
                        }
                        None => {
                            debug!("Begin channel closed");
                            begin_open = false;
                        }
                    }
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Scheduled task panicked");
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received.");
                    break;
                }
            }
        }

        tasks.shutdown().await;
    }

    fn spawn_cycle(&self, tasks: &mut JoinSet<()>, trigger: Trigger) {
        let poller = Arc::clone(&self.poller);
        tasks.spawn(async move {
            poller.run_cycle(trigger).await;
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
