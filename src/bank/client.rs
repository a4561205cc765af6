//! HTTP client for the banking API.
//!
//! Endpoints:
//! - `GET {api_url}/login` with HTTP Basic auth; the ticket comes back in the
//!   `AuthenticationTicket` response header.
//! - `GET {api_url}/user/cardaccounts` with the ticket in an
//!   `AuthenticationTicket` request header; JSON body `{Cards: [...]}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::BankApi;
use crate::types::{AccountSnapshot, Credentials, SaldoError, SessionTicket};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Header carrying the session ticket, both in the login response and on
/// authenticated requests. Header lookups are case-insensitive.
pub const TICKET_HEADER: &str = "AuthenticationTicket";

const LOGIN_PATH: &str = "/login";
const CARD_ACCOUNTS_PATH: &str = "/user/cardaccounts";

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// `reqwest`-backed banking API client.
pub struct BankClient {
    http: Client,
}

impl BankClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("SaldoWatch/0.1.0")
            .build()
            .context("Failed to build HTTP client for bank API")?;

        Ok(Self { http })
    }
}

/// Canonical reason phrase for a status, falling back to the numeric code.
fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_owned)
        .unwrap_or_else(|| status.as_str().to_owned())
}

#[async_trait]
impl BankApi for BankClient {
    async fn login(&self, credentials: &Credentials) -> Result<SessionTicket, SaldoError> {
        let url = format!("{}{LOGIN_PATH}", credentials.api_url);
        debug!(url = %url, username = %credentials.username, "Requesting authentication ticket");

        let resp = self
            .http
            .get(&url)
            .basic_auth(&credentials.username, Some(credentials.password()))
            .send()
            .await
            .map_err(|e| SaldoError::AuthFailure(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            warn!(status = %status, "Login rejected");
            return Err(SaldoError::AuthFailure(status_text(status)));
        }

        let ticket = resp
            .headers()
            .get(TICKET_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(SaldoError::MissingTicket)?;

        info!(username = %credentials.username, "Got authentication ticket");
        Ok(SessionTicket::new(ticket))
    }

    async fn card_accounts(
        &self,
        api_url: &str,
        ticket: &SessionTicket,
    ) -> Result<AccountSnapshot, SaldoError> {
        let url = format!("{api_url}{CARD_ACCOUNTS_PATH}");
        debug!(url = %url, "Fetching card accounts");

        let resp = self
            .http
            .get(&url)
            .header(TICKET_HEADER, ticket.expose())
            .send()
            .await
            .map_err(|e| SaldoError::FetchFailure(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            warn!(status = %status, "Card accounts request rejected");
            return Err(SaldoError::FetchFailure(status_text(status)));
        }

        let snapshot: AccountSnapshot = resp
            .json()
            .await
            .map_err(|e| SaldoError::FetchFailure(format!("invalid card accounts body: {e}")))?;

        info!(accounts = snapshot.account_count(), "Got card accounts");
        Ok(snapshot)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
