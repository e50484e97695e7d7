//! Advance a single run by at most one lifecycle step.
//!
//! Every call re-derives the stage from disk, so the driver can be invoked any
//! number of times, including from overlapping processes. The only durable
//! bookkeeping is the transfer ledger, which is appended strictly after a
//! successful transfer and strictly before archival.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::classifier::analysis_outcome;
use crate::core::instrument::MarkerVocabulary;
use crate::core::types::{AnalysisOutcome, ExitStatusRecord, Run, SampleSheetState, Stage};
use crate::io::archive::{ArchiveError, archive_run};
use crate::io::config::Config;
use crate::io::inspect::inspect;
use crate::io::launcher::{CommandContext, LaunchRequest, Launcher, render_command};
use crate::io::ledger::{TransferLedger, timestamp_now};
use crate::io::notify::{Notification, Notifier};
use crate::io::samplesheet::SampleSheetProvider;
use crate::io::transfer::{TransferAgent, TransferRequest};

/// What a single `advance` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The run directory is gone (archived by an earlier or concurrent pass).
    Vanished,
    /// Nothing to do until sequencing or analysis makes progress.
    Waiting { stage: Stage },
    /// Analysis pipeline started in the background.
    Launched,
    /// The pipeline could not be started at all.
    LaunchFailed { reason: String },
    /// Operator notified; no launch without a sample sheet.
    BlockedOnSampleSheet,
    /// Operator notified; a success exit status without analysis output is
    /// never trusted and never relaunched over.
    BlockedOnStaleExitStatus,
    /// Operator notified; terminal until someone intervenes.
    AnalysisFailed { code: Option<i32> },
    /// Ledger and run directory untouched; the next pass retries the transfer.
    TransferFailed { reason: String },
    Archived {
        /// False when the ledger already listed the run and only the move was retried.
        transferred_now: bool,
        destination: PathBuf,
    },
    /// Ledger entry kept; the next pass retries only the move.
    ArchiveFailed {
        transferred_now: bool,
        error: ArchiveError,
    },
}

impl AdvanceOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AdvanceOutcome::Vanished => "vanished",
            AdvanceOutcome::Waiting { .. } => "waiting",
            AdvanceOutcome::Launched => "launched",
            AdvanceOutcome::LaunchFailed { .. } => "launch-failed",
            AdvanceOutcome::BlockedOnSampleSheet => "blocked-on-sample-sheet",
            AdvanceOutcome::BlockedOnStaleExitStatus => "blocked-on-stale-exit-status",
            AdvanceOutcome::AnalysisFailed { .. } => "analysis-failed",
            AdvanceOutcome::TransferFailed { .. } => "transfer-failed",
            AdvanceOutcome::Archived { .. } => "archived",
            AdvanceOutcome::ArchiveFailed { .. } => "archive-failed",
        }
    }

    /// Infrastructure failure that a later pass will retry.
    pub fn is_retryable_failure(&self) -> bool {
        matches!(
            self,
            AdvanceOutcome::LaunchFailed { .. }
                | AdvanceOutcome::TransferFailed { .. }
                | AdvanceOutcome::ArchiveFailed { .. }
        )
    }

    pub fn needs_operator(&self) -> bool {
        matches!(
            self,
            AdvanceOutcome::BlockedOnSampleSheet
                | AdvanceOutcome::BlockedOnStaleExitStatus
                | AdvanceOutcome::AnalysisFailed { .. }
        )
    }
}

/// Side-effecting collaborators used by the driver.
pub struct Hooks<'a> {
    pub launcher: &'a dyn Launcher,
    pub transfer: &'a dyn TransferAgent,
    pub notifier: &'a dyn Notifier,
    pub sample_sheets: &'a dyn SampleSheetProvider,
}

/// Transition driver bound to one resolved configuration.
pub struct Driver<'a> {
    config: &'a Config,
    hooks: Hooks<'a>,
}

impl<'a> Driver<'a> {
    pub fn new(config: &'a Config, hooks: Hooks<'a>) -> Self {
        Self { config, hooks }
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    /// Inspect `run` and perform the single action its stage allows.
    ///
    /// Returns `Err` only for unexpected I/O problems (unreadable markers or
    /// ledger, unconfigured instrument); expected failures are outcomes.
    #[instrument(skip_all, fields(run_id = %run.id, instrument = %run.instrument))]
    pub fn advance(&self, run: &Run) -> Result<AdvanceOutcome> {
        let vocab = self
            .config
            .instrument(run.instrument)
            .ok_or_else(|| anyhow!("instrument {} is not configured", run.instrument))?
            .vocabulary();

        if !run.path.is_dir() {
            debug!(run_dir = %run.path.display(), "run directory no longer exists");
            return Ok(AdvanceOutcome::Vanished);
        }

        let inspection = inspect(&run.path, &vocab)?;
        let stage = inspection.stage;
        debug!(%stage, "run stage");

        let outcome = match (stage, inspection.facts.exit_status.as_ref()) {
            (Stage::AwaitingSequencing | Stage::AnalysisInProgress, _) => {
                AdvanceOutcome::Waiting { stage }
            }
            // Exit status without output: never launch over it.
            (Stage::AwaitingAnalysis { .. }, Some(record)) => {
                self.exit_status_without_output(run, record)
            }
            (
                Stage::AwaitingAnalysis {
                    sample_sheet: SampleSheetState::Present,
                },
                None,
            ) => self.launch(run, &vocab),
            (
                Stage::AwaitingAnalysis {
                    sample_sheet: SampleSheetState::Missing,
                },
                None,
            ) => self.handle_missing_sample_sheet(run, &vocab)?,
            (
                Stage::AnalysisComplete {
                    outcome: AnalysisOutcome::Failure { code },
                },
                _,
            ) => self.analysis_failed(run, code),
            (
                Stage::AnalysisComplete {
                    outcome: AnalysisOutcome::Success,
                },
                _,
            ) => self.transfer_and_archive(run)?,
        };

        if outcome.is_retryable_failure() {
            warn!(%stage, outcome = outcome.label(), "run not advanced");
        } else {
            info!(%stage, outcome = outcome.label(), "run processed");
        }
        Ok(outcome)
    }

    fn exit_status_without_output(&self, run: &Run, record: &ExitStatusRecord) -> AdvanceOutcome {
        match analysis_outcome(record) {
            AnalysisOutcome::Failure { code } => self.analysis_failed(run, code),
            AnalysisOutcome::Success => {
                self.notify(Notification::StaleExitStatus {
                    run_id: run.id.clone(),
                    run_dir: run.path.clone(),
                });
                AdvanceOutcome::BlockedOnStaleExitStatus
            }
        }
    }

    fn analysis_failed(&self, run: &Run, code: Option<i32>) -> AdvanceOutcome {
        self.notify(Notification::AnalysisFailed {
            run_id: run.id.clone(),
            run_dir: run.path.clone(),
            code,
        });
        AdvanceOutcome::AnalysisFailed { code }
    }

    fn launch(&self, run: &Run, vocab: &MarkerVocabulary) -> AdvanceOutcome {
        let analysis = &self.config.analysis;
        let command = match render_command(&analysis.command, &CommandContext { run, vocab }) {
            Ok(command) => command,
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(%reason, "could not render analysis command");
                return AdvanceOutcome::LaunchFailed { reason };
            }
        };
        let request = LaunchRequest::for_run(run, vocab, command, &analysis.log_prefix);
        match self.hooks.launcher.launch(&request) {
            Ok(()) => {
                info!(command = %request.command, "analysis launched");
                AdvanceOutcome::Launched
            }
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(%reason, "failed to start analysis; check the run logs");
                AdvanceOutcome::LaunchFailed { reason }
            }
        }
    }

    fn handle_missing_sample_sheet(
        &self,
        run: &Run,
        vocab: &MarkerVocabulary,
    ) -> Result<AdvanceOutcome> {
        let destination = run.path.join(&vocab.sample_sheet);
        match self.hooks.sample_sheets.provide(run, &destination) {
            Ok(true) => {
                let again = inspect(&run.path, vocab)?;
                if again.stage
                    == (Stage::AwaitingAnalysis {
                        sample_sheet: SampleSheetState::Present,
                    })
                {
                    info!("sample sheet generated");
                    return Ok(self.launch(run, vocab));
                }
                warn!(
                    stage = %again.stage,
                    "sample sheet provider reported success but run is not ready"
                );
            }
            Ok(false) => {}
            Err(err) => warn!(error = %format!("{err:#}"), "sample sheet provider failed"),
        }

        self.notify(Notification::MissingSampleSheet {
            run_id: run.id.clone(),
            run_dir: run.path.clone(),
        });
        Ok(AdvanceOutcome::BlockedOnSampleSheet)
    }

    fn transfer_and_archive(&self, run: &Run) -> Result<AdvanceOutcome> {
        let data_dir = run
            .data_dir()
            .ok_or_else(|| anyhow!("run {} has no parent directory", run.path.display()))?;
        let ledger = TransferLedger::in_data_dir(data_dir, &self.config.ledger_file);

        let transferred_now = if ledger.has(&run.id)? {
            info!(ledger = %ledger.path().display(), "already transferred; retrying archive only");
            false
        } else {
            let request = TransferRequest::for_run(run, &self.config.transfer);
            if let Err(err) = self.hooks.transfer.transfer(&request) {
                let reason = format!("{err:#}");
                warn!(%reason, "transfer failed; will retry on the next pass");
                return Ok(AdvanceOutcome::TransferFailed { reason });
            }
            ledger.append(&run.id, &timestamp_now())?;
            info!(target = %request.remote_target(), "run synced to analysis host");
            true
        };

        let archive_root = data_dir.join(&self.config.archive_dir);
        match archive_run(&run.path, &archive_root) {
            Ok(destination) => {
                self.notify(Notification::RunArchived {
                    run_id: run.id.clone(),
                    archived_to: destination.clone(),
                });
                Ok(AdvanceOutcome::Archived {
                    transferred_now,
                    destination,
                })
            }
            Err(error) => {
                warn!(%error, "archiving failed; will retry on the next pass");
                Ok(AdvanceOutcome::ArchiveFailed {
                    transferred_now,
                    error,
                })
            }
        }
    }

    fn notify(&self, notification: Notification) {
        if let Err(err) = self.hooks.notifier.notify(&notification) {
            warn!(error = %format!("{err:#}"), %notification, "notification delivery failed");
        }
    }
}
