//! Banking API integration.
//!
//! Defines the `BankApi` trait (login + card-accounts fetch) and the
//! `reqwest`-backed implementation in [`client`].

pub mod client;

use async_trait::async_trait;

use crate::types::{AccountSnapshot, Credentials, SaldoError, SessionTicket};

/// Abstraction over the upstream banking API.
///
/// Each call is a single request with no retry.
#[async_trait]
pub trait BankApi: Send + Sync {
    /// Exchange username/password for a session ticket.
    ///
    /// Fails with `AuthFailure` on a non-200 status or transport error and
    /// with `MissingTicket` when a 200 response lacks the ticket header.
    async fn login(&self, credentials: &Credentials) -> Result<SessionTicket, SaldoError>;

    /// Fetch the current card-accounts snapshot using a session ticket.
    ///
    /// Fails with `FetchFailure` on a non-200 status, transport error or an
    /// undecodable body.
    async fn card_accounts(
        &self,
        api_url: &str,
        ticket: &SessionTicket,
    ) -> Result<AccountSnapshot, SaldoError>;
}
