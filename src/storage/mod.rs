//! Persistence layer.
//!
//! The balance log is a plain CSV file of `YYYY-MM-DD,<integer>` lines with
//! no header. It is only ever appended to; each batch of records goes out in
//! a single write on a handle opened in append mode.

use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::types::{DailyBalanceRecord, SaldoError};

/// Render records as newline-terminated `date,saldo` lines.
pub fn render_records(records: &[DailyBalanceRecord]) -> Result<Vec<u8>, SaldoError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for record in records {
        writer
            .serialize(record)
            .map_err(|e| SaldoError::ExportFailure(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| SaldoError::ExportFailure(e.to_string()))
}

/// Append records to the balance log, creating the file if needed.
pub async fn append_records(path: &Path, records: &[DailyBalanceRecord]) -> Result<(), SaldoError> {
    let bytes = render_records(records)?;

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| SaldoError::ExportFailure(format!("{}: {e}", path.display())))?;

    file.write_all(&bytes)
        .await
        .map_err(|e| SaldoError::ExportFailure(format!("{}: {e}", path.display())))?;
    file.flush()
        .await
        .map_err(|e| SaldoError::ExportFailure(format!("{}: {e}", path.display())))?;

    debug!(path = %path.display(), records = records.len(), bytes = bytes.len(), "Records appended");
    Ok(())
}

/// Read the balance log back.
/// Returns an empty list if the file doesn't exist yet.
/// Malformed lines are skipped.
pub async fn read_history(path: &Path) -> Result<Vec<DailyBalanceRecord>, SaldoError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No balance log found");
            return Ok(Vec::new());
        }
        Err(e) => return Err(SaldoError::Storage(format!("{}: {e}", path.display()))),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes.as_slice());

    let mut records = Vec::new();
    for (line, row) in reader.deserialize::<DailyBalanceRecord>().enumerate() {
        match row {
            Ok(record) => records.push(record),
            Err(e) => warn!(path = %path.display(), line = line + 1, error = %e, "Skipping malformed balance line"),
        }
    }

    Ok(records)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
