//! Daily balance exporter.
//!
//! Turns a card-accounts snapshot into one `DailyBalanceRecord` per account
//! and appends the batch to the balance log. Nothing is written when the
//! snapshot carries no usable accounts.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::storage;
use crate::types::{AccountSnapshot, DailyBalanceRecord, SaldoError};

/// Derive one record per account, in snapshot order, all dated `date`.
///
/// Accounts without a numeric `Available` are skipped.
pub fn derive_records(snapshot: &AccountSnapshot, date: NaiveDate) -> Vec<DailyBalanceRecord> {
    snapshot
        .accounts()
        .enumerate()
        .filter_map(|(index, account)| match account.saldo() {
            Some(saldo) => Some(DailyBalanceRecord { date, saldo }),
            None => {
                warn!(index, available = ?account.available, "Account has no numeric balance, skipping");
                None
            }
        })
        .collect()
}

/// Appends derived records to a fixed balance log.
#[derive(Debug, Clone)]
pub struct BalanceExporter {
    path: PathBuf,
}

impl BalanceExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Export a snapshot. Returns the number of lines appended.
    pub async fn export(&self, snapshot: &AccountSnapshot, date: NaiveDate) -> Result<usize, SaldoError> {
        if snapshot.cards.is_none() {
            return Err(SaldoError::NoData("card accounts data not available".into()));
        }

        let records = derive_records(snapshot, date);
        if records.is_empty() {
            return Err(SaldoError::NoData("no saldo data available to export".into()));
        }

        storage::append_records(&self.path, &records).await?;

        info!(path = %self.path.display(), records = records.len(), %date, "Saldo data exported");
        Ok(records.len())
    }
}
