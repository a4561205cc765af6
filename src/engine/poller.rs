//! Poll cycle: login → fetch card accounts → relay → export.
//!
//! Each cycle logs in afresh with the session context's last-known
//! credentials. Failures end the cycle; nothing is retried.

use chrono::{Local, NaiveDate};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

use super::exporter::BalanceExporter;
use crate::bank::BankApi;
use crate::bridge::notifier::Notifier;
use crate::types::{Notification, SaldoError, SessionContext};

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A `GET_AUTH_TICKET` from the display side (or startup credentials).
    Begin,
    /// The periodic poll timer.
    Poll,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Begin => write!(f, "begin"),
            Trigger::Poll => write!(f, "poll"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No credentials have been received yet.
    NoSession,
    /// Another cycle is still running.
    InFlight,
}

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Records appended to the balance log.
    Exported(usize),
    Skipped(SkipReason),
    Failed(SaldoError),
}

/// Runs poll cycles against one session context.
pub struct Poller {
    bank: Arc<dyn BankApi>,
    exporter: BalanceExporter,
    notifier: Notifier,
    session: Arc<SessionContext>,
    today: fn() -> NaiveDate,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl Poller {
    pub fn new(
        bank: Arc<dyn BankApi>,
        exporter: BalanceExporter,
        notifier: Notifier,
        session: Arc<SessionContext>,
    ) -> Self {
        Self {
            bank,
            exporter,
            notifier,
            session,
            today: local_today,
        }
    }

    /// Override the date source (process-local calendar date by default).
    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    /// Run one cycle, tagged with a fresh cycle id for log correlation.
    pub async fn run_cycle(&self, trigger: Trigger) -> CycleOutcome {
        let span = tracing::info_span!("cycle", id = %uuid::Uuid::new_v4(), %trigger);
        let outcome = self.run_cycle_inner(trigger).instrument(span).await;

        match &outcome {
            CycleOutcome::Skipped(_) => self.session.record_skip(),
            CycleOutcome::Exported(n) => {
                self.session.record_cycle();
                self.session.record_appended(*n);
            }
            CycleOutcome::Failed(_) => self.session.record_cycle(),
        }
        outcome
    }

    async fn run_cycle_inner(&self, trigger: Trigger) -> CycleOutcome {
        if self.session.credentials().await.is_none() {
            debug!("No credentials yet, skipping cycle");
            return CycleOutcome::Skipped(SkipReason::NoSession);
        }

        // A begin event always gets its own cycle; a poll tick yields.
        let _guard = match trigger {
            Trigger::Begin => self.session.begin_cycle().await,
            Trigger::Poll => match self.session.try_begin_cycle() {
                Some(guard) => guard,
                None => {
                    warn!("Previous cycle still running, skipping");
                    return CycleOutcome::Skipped(SkipReason::InFlight);
                }
            },
        };

        // Re-read after the wait so a queued begin uses the newest credentials.
        let Some(credentials) = self.session.credentials().await else {
            return CycleOutcome::Skipped(SkipReason::NoSession);
        };

        info!(username = %credentials.username, "Starting cycle");

        // 1. Credential acquirer
        let ticket = match self.bank.login(&credentials).await {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, "Error getting authentication ticket");
                self.notifier.relay(Notification::auth_error(&e)).await;
                return CycleOutcome::Failed(e);
            }
        };
        self.session.record_login().await;

        // 2. Account fetcher
        let snapshot = match self.bank.card_accounts(&credentials.api_url, &ticket).await {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "Error getting card accounts");
                self.notifier.relay(Notification::card_accounts_error(&e)).await;
                return CycleOutcome::Failed(e);
            }
        };
        self.notifier.relay(Notification::card_accounts(snapshot.clone())).await;

        // 3. Exporter
        match self.exporter.export(&snapshot, (self.today)()).await {
            Ok(n) => {
                info!(records = n, "Cycle complete");
                CycleOutcome::Exported(n)
            }
            Err(e @ SaldoError::NoData(_)) => {
                warn!(error = %e, "Nothing to export");
                CycleOutcome::Failed(e)
            }
            Err(e) => {
                error!(error = %e, "Error writing saldo data");
                CycleOutcome::Failed(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
