//! Append-only transfer ledger (`<data_dir>/transfer.tsv`).
//!
//! One row per transfer: `<run_id>\t<timestamp>`. The ledger is the only record
//! of which runs have been sent to the analysis host, so it is never rewritten.
//! Membership is an exact match on the first field of a row; a run id that is
//! a prefix or substring of a recorded id is not a member.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use tracing::{debug, instrument};

/// `2024-07-16 14:03:12.123456`, local time.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub run_id: String,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct TransferLedger {
    path: PathBuf,
}

impl TransferLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ledger kept next to the runs in `data_dir`.
    pub fn in_data_dir(data_dir: &Path, ledger_file: &str) -> Self {
        Self::new(data_dir.join(ledger_file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if any row's first field is byte-for-byte `run_id`. A missing
    /// ledger is empty.
    #[instrument(skip_all, fields(ledger = %self.path.display(), run_id = %run_id))]
    pub fn has(&self, run_id: &str) -> Result<bool> {
        let Some(mut reader) = self.reader()? else {
            debug!("ledger does not exist yet");
            return Ok(false);
        };
        for record in reader.byte_records() {
            let record = record.with_context(|| format!("read {}", self.path.display()))?;
            if record.get(0) == Some(run_id.as_bytes()) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Append one record with a single write on an `O_APPEND` descriptor.
    ///
    /// Concurrent appenders each land a whole line; rows are never interleaved.
    #[instrument(skip_all, fields(ledger = %self.path.display(), run_id = %run_id))]
    pub fn append(&self, run_id: &str, timestamp: &str) -> Result<()> {
        validate_field("run id", run_id)?;
        validate_field("timestamp", timestamp)?;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());
        writer
            .write_record([run_id, timestamp])
            .context("encode ledger record")?;
        let line = writer
            .into_inner()
            .map_err(|err| err.into_error())
            .context("encode ledger record")?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open {} for append", self.path.display()))?;
        file.write_all(&line)
            .with_context(|| format!("append to {}", self.path.display()))?;
        file.sync_data()
            .with_context(|| format!("sync {}", self.path.display()))?;
        debug!(timestamp, "ledger entry appended");
        Ok(())
    }

    /// All rows in file order. Rows without a timestamp field are kept with an
    /// empty timestamp.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let Some(mut reader) = self.reader()? else {
            return Ok(Vec::new());
        };
        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record.with_context(|| format!("read {}", self.path.display()))?;
            let Some(run_id) = record.get(0) else {
                continue;
            };
            entries.push(LedgerEntry {
                run_id: run_id.to_string(),
                timestamp: record.get(1).unwrap_or("").to_string(),
            });
        }
        Ok(entries)
    }

    fn reader(&self) -> Result<Option<csv::Reader<fs::File>>> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).with_context(|| format!("open {}", self.path.display())),
        };
        Ok(Some(
            csv::ReaderBuilder::new()
                .delimiter(b'\t')
                .has_headers(false)
                .flexible(true)
                .from_reader(file),
        ))
    }
}

pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

fn validate_field(label: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("ledger {label} must be non-empty"));
    }
    if value.contains(['\t', '\n', '\r']) {
        return Err(anyhow!("ledger {label} {value:?} contains a separator"));
    }
    if value.trim() != value {
        return Err(anyhow!(
            "ledger {label} {value:?} has leading or trailing whitespace"
        ));
    }
    Ok(())
}
