//! rsync transfer of a run directory to the analysis host.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::types::Run;
use crate::io::config::TransferConfig;
use crate::io::process::run_command_with_timeout;

/// Parameters for one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub program: String,
    /// Local run directory; copied as a whole into `destination`.
    pub source: PathBuf,
    pub host: String,
    pub user: String,
    pub destination: String,
    pub options: Vec<String>,
    pub validate: bool,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl TransferRequest {
    pub fn for_run(run: &Run, cfg: &TransferConfig) -> Self {
        Self {
            program: cfg.rsync_program.clone(),
            source: run.path.clone(),
            host: cfg.host.clone(),
            user: cfg.user.clone(),
            destination: cfg.destination.clone(),
            options: cfg.rsync_options.clone(),
            validate: cfg.validate,
            timeout: Duration::from_secs(cfg.timeout_secs),
            output_limit_bytes: cfg.output_limit_bytes,
        }
    }

    pub fn remote_target(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.destination)
    }

    /// Arguments for the copying rsync call.
    pub fn rsync_args(&self) -> Vec<String> {
        let mut args = self.options.clone();
        args.push(self.source.display().to_string());
        args.push(self.remote_target());
        args
    }

    /// Arguments for the checksum dry-run that must report nothing pending.
    pub fn validation_args(&self) -> Vec<String> {
        let mut args = self.options.clone();
        args.extend(
            ["--dry-run", "--checksum", "--itemize-changes"]
                .into_iter()
                .map(str::to_string),
        );
        args.push(self.source.display().to_string());
        args.push(self.remote_target());
        args
    }
}

/// Abstraction over transfer backends. Implementations must be safe to repeat
/// for the same run: a second call may only re-send missing or changed data.
pub trait TransferAgent {
    fn transfer(&self, request: &TransferRequest) -> Result<()>;
}

/// Transfers with the system `rsync` over its default remote shell.
pub struct RsyncTransfer;

impl TransferAgent for RsyncTransfer {
    #[instrument(
        skip_all,
        fields(source = %request.source.display(), target = %request.remote_target())
    )]
    fn transfer(&self, request: &TransferRequest) -> Result<()> {
        info!("starting rsync");
        let mut cmd = Command::new(&request.program);
        cmd.args(request.rsync_args());
        let output = run_command_with_timeout(cmd, request.timeout, request.output_limit_bytes)?;
        if !output.success() {
            let summary = output.failure_summary("rsync");
            warn!(%summary, "rsync failed");
            return Err(anyhow!(summary));
        }

        if request.validate {
            let mut cmd = Command::new(&request.program);
            cmd.args(request.validation_args());
            let output =
                run_command_with_timeout(cmd, request.timeout, request.output_limit_bytes)?;
            if !output.success() {
                return Err(anyhow!(output.failure_summary("rsync validation")));
            }
            let stdout = output.stdout_lossy();
            let pending = pending_changes(&stdout);
            if !pending.is_empty() {
                warn!(pending = pending.len(), "transfer validation found differences");
                return Err(anyhow!(
                    "transfer validation found {} pending change(s), first: {}",
                    pending.len(),
                    pending[0]
                ));
            }
            debug!("transfer validated");
        }

        info!("rsync finished");
        Ok(())
    }
}

/// Itemized lines that describe content still to be sent or created.
fn pending_changes(itemized: &str) -> Vec<&str> {
    itemized
        .lines()
        .filter(|line| matches!(line.chars().next(), Some('<' | '>' | 'c' | 'h')))
        .collect()
}
