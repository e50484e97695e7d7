//! Operator notifications.
//!
//! Delivery (email, chat) lives outside seqrun; the driver only emits
//! [`Notification`] values through a [`Notifier`].

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Sequencing finished but there is no sample sheet to launch analysis with.
    MissingSampleSheet { run_id: String, run_dir: PathBuf },
    /// The pipeline recorded a non-zero (or unreadable) exit status.
    AnalysisFailed {
        run_id: String,
        run_dir: PathBuf,
        code: Option<i32>,
    },
    /// A successful exit status exists but the analysis output does not, so
    /// the status cannot belong to the current output. Remove it to rerun.
    StaleExitStatus { run_id: String, run_dir: PathBuf },
    /// Transferred and moved into the archive directory.
    RunArchived { run_id: String, archived_to: PathBuf },
}

impl Notification {
    pub fn run_id(&self) -> &str {
        match self {
            Notification::MissingSampleSheet { run_id, .. }
            | Notification::AnalysisFailed { run_id, .. }
            | Notification::StaleExitStatus { run_id, .. }
            | Notification::RunArchived { run_id, .. } => run_id,
        }
    }

    /// Needs a human to act before the run can progress.
    pub fn needs_operator(&self) -> bool {
        !matches!(self, Notification::RunArchived { .. })
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::MissingSampleSheet { run_id, run_dir } => write!(
                f,
                "sample sheet not found for run {run_id} ({}); analysis not started",
                run_dir.display()
            ),
            Notification::AnalysisFailed {
                run_id,
                run_dir,
                code,
            } => match code {
                Some(code) => write!(
                    f,
                    "analysis pipeline exited with status {code} for run {run_id} ({})",
                    run_dir.display()
                ),
                None => write!(
                    f,
                    "analysis pipeline left an unreadable exit status for run {run_id} ({})",
                    run_dir.display()
                ),
            },
            Notification::StaleExitStatus { run_id, run_dir } => write!(
                f,
                "exit-status file present without analysis output for run {run_id} ({}); \
                 remove it to rerun analysis",
                run_dir.display()
            ),
            Notification::RunArchived {
                run_id,
                archived_to,
            } => write!(
                f,
                "run {run_id} transferred and archived to {}",
                archived_to.display()
            ),
        }
    }
}

pub trait Notifier {
    fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Default notifier: operator-facing events become log lines.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        if notification.needs_operator() {
            warn!(run_id = notification.run_id(), "operator notified: {notification}");
        } else {
            info!(run_id = notification.run_id(), "{notification}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_includes_exit_code() {
        let n = Notification::AnalysisFailed {
            run_id: "run-1".to_string(),
            run_dir: PathBuf::from("/data/run-1"),
            code: Some(1),
        };
        assert_eq!(
            n.to_string(),
            "analysis pipeline exited with status 1 for run run-1 (/data/run-1)"
        );
        assert!(n.needs_operator());
    }

    #[test]
    fn archived_runs_do_not_need_an_operator() {
        let n = Notification::RunArchived {
            run_id: "run-1".to_string(),
            archived_to: PathBuf::from("/data/nosync/run-1"),
        };
        assert!(!n.needs_operator());
        assert_eq!(n.run_id(), "run-1");
        LogNotifier.notify(&n).expect("log notifier never fails");
    }
}
