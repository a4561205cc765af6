//! Shared domain types for Saldo Watch.
//!
//! Credentials and session tickets, the upstream card-accounts snapshot,
//! the derived daily balance record, outbound notifications, the explicit
//! session context passed into every poll cycle, and the error taxonomy.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

// ---------------------------------------------------------------------------
// Credentials & tickets
// ---------------------------------------------------------------------------

/// Login credentials for the banking API.
///
/// Held in memory only. The password is wrapped in a `SecretString` so it
/// never ends up in logs.
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
    /// Base URL of the banking API, e.g. `https://bank.example.com/api`.
    pub api_url: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::new(password.into()),
            api_url: api_url.into(),
        }
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Inbound `GET_AUTH_TICKET` payload from the display side.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTicketRequest {
    pub username: String,
    pub password: String,
    pub api_url: String,
}

impl From<AuthTicketRequest> for Credentials {
    fn from(req: AuthTicketRequest) -> Self {
        Credentials::new(req.username, req.password, req.api_url)
    }
}

/// Opaque session ticket issued by the login endpoint.
pub struct SessionTicket(SecretString);

impl SessionTicket {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for SessionTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionTicket([REDACTED])")
    }
}

// ---------------------------------------------------------------------------
// Upstream snapshot
// ---------------------------------------------------------------------------

/// Body of `GET /user/cardaccounts`.
///
/// Field names follow the upstream PascalCase. Unknown fields are kept at
/// every level so the snapshot can be relayed outward unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    #[serde(rename = "Cards", default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<Vec<Card>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Card {
    #[serde(rename = "Accounts", default, skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Vec<Account>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Kept as raw JSON; only interpreted when a record is derived.
    #[serde(rename = "Available", default, skip_serializing_if = "Option::is_none")]
    pub available: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccountSnapshot {
    /// Iterate every account under every card, in snapshot order.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.cards
            .iter()
            .flatten()
            .flat_map(|card| card.accounts.iter().flatten())
    }

    pub fn account_count(&self) -> usize {
        self.accounts().count()
    }
}

impl Account {
    /// The `Available` balance as an exact decimal, if it is a number.
    pub fn available_balance(&self) -> Option<Decimal> {
        match &self.available {
            Some(v @ Value::Number(_)) => serde_json::from_value(v.clone()).ok(),
            _ => None,
        }
    }

    /// Floor of the available balance (`-4.2` becomes `-5`).
    pub fn saldo(&self) -> Option<i64> {
        self.available_balance().and_then(|d| d.floor().to_i64())
    }
}

// ---------------------------------------------------------------------------
// Daily balance record
// ---------------------------------------------------------------------------

/// One persisted `date,saldo` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBalanceRecord {
    pub date: NaiveDate,
    pub saldo: i64,
}

impl fmt::Display for DailyBalanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.date.format("%Y-%m-%d"), self.saldo)
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// `{ "error": "..." }` payload shared by all failure notifications.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionPayload {
    Output(String),
    Error(ErrorPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CardAccountsPayload {
    Accounts {
        #[serde(rename = "cardAccounts")]
        card_accounts: AccountSnapshot,
    },
    Error(ErrorPayload),
}

/// Outbound message to the display side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "notification", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Notification {
    PredictionResult(PredictionPayload),
    AuthTicketResult(ErrorPayload),
    CardAccountsResult(CardAccountsPayload),
}

impl Notification {
    pub fn prediction(result: &Result<String, SaldoError>) -> Self {
        match result {
            Ok(output) => Self::PredictionResult(PredictionPayload::Output(output.clone())),
            Err(e) => Self::PredictionResult(PredictionPayload::Error(ErrorPayload {
                error: e.message(),
            })),
        }
    }

    pub fn auth_error(error: &SaldoError) -> Self {
        Self::AuthTicketResult(ErrorPayload { error: error.message() })
    }

    pub fn card_accounts(snapshot: AccountSnapshot) -> Self {
        Self::CardAccountsResult(CardAccountsPayload::Accounts { card_accounts: snapshot })
    }

    pub fn card_accounts_error(error: &SaldoError) -> Self {
        Self::CardAccountsResult(CardAccountsPayload::Error(ErrorPayload { error: error.message() }))
    }

    /// Wire name of the notification.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PredictionResult(_) => "PREDICTION_RESULT",
            Self::AuthTicketResult(_) => "AUTH_TICKET_RESULT",
            Self::CardAccountsResult(_) => "CARD_ACCOUNTS_RESULT",
        }
    }
}

/// A relayed notification with the time it was sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub notification: Notification,
}

// ---------------------------------------------------------------------------
// Session context
// ---------------------------------------------------------------------------

/// Explicit per-session state handed to every poll cycle.
///
/// Holds the last-known credentials and a single-flight guard so that at
/// most one cycle runs at a time.
#[derive(Debug)]
pub struct SessionContext {
    credentials: RwLock<Option<Arc<Credentials>>>,
    in_flight: Mutex<()>,
    last_login: RwLock<Option<DateTime<Utc>>>,
    cycles_run: AtomicU64,
    cycles_skipped: AtomicU64,
    records_appended: AtomicU64,
    start_time: DateTime<Utc>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            credentials: RwLock::new(None),
            in_flight: Mutex::new(()),
            last_login: RwLock::new(None),
            cycles_run: AtomicU64::new(0),
            cycles_skipped: AtomicU64::new(0),
            records_appended: AtomicU64::new(0),
            start_time: Utc::now(),
        }
    }

    /// Replace the stored credentials.
    pub async fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.write().await = Some(Arc::new(credentials));
    }

    pub async fn credentials(&self) -> Option<Arc<Credentials>> {
        self.credentials.read().await.clone()
    }

    /// Claim the single-flight slot. `None` if a cycle is already running.
    pub fn try_begin_cycle(&self) -> Option<MutexGuard<'_, ()>> {
        self.in_flight.try_lock().ok()
    }

    /// Wait for the single-flight slot; queues behind a running cycle.
    pub async fn begin_cycle(&self) -> MutexGuard<'_, ()> {
        self.in_flight.lock().await
    }

    pub async fn record_login(&self) {
        *self.last_login.write().await = Some(Utc::now());
    }

    pub fn record_cycle(&self) {
        self.cycles_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.cycles_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_appended(&self, count: usize) {
        self.records_appended.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub async fn status(&self) -> SessionStatus {
        let credentials = self.credentials.read().await;
        SessionStatus {
            has_credentials: credentials.is_some(),
            username: credentials.as_ref().map(|c| c.username.clone()),
            last_login: *self.last_login.read().await,
            cycles_run: self.cycles_run.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            records_appended: self.records_appended.load(Ordering::Relaxed),
            uptime_secs: (Utc::now() - self.start_time).num_seconds(),
        }
    }
}

/// Point-in-time view of a `SessionContext`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub has_credentials: bool,
    pub username: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub cycles_run: u64,
    pub cycles_skipped: u64,
    pub records_appended: u64,
    pub uptime_secs: i64,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures of a single poll or prediction cycle. None of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SaldoError {
    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("Unable to retrieve authentication ticket.")]
    MissingTicket,

    #[error("Card accounts fetch failed: {0}")]
    FetchFailure(String),

    #[error("Export failed: {0}")]
    ExportFailure(String),

    #[error("No data: {0}")]
    NoData(String),

    #[error("Prediction script failed: {0}")]
    ScriptFailure(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SaldoError {
    /// The bare message relayed in `{ "error": ... }` payloads.
    pub fn message(&self) -> String {
        match self {
            Self::AuthFailure(m)
            | Self::FetchFailure(m)
            | Self::ExportFailure(m)
            | Self::NoData(m)
            | Self::ScriptFailure(m)
            | Self::Storage(m)
            | Self::Config(m) => m.clone(),
            Self::MissingTicket => self.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
