//! Shared deterministic types for run lifecycle logic.
//!
//! Nothing here touches the filesystem. A [`Stage`] is always derived from a
//! [`MarkerFacts`] snapshot and is never persisted.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::instrument::InstrumentClass;

/// One instrument output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub path: PathBuf,
    pub id: String,
    pub instrument: InstrumentClass,
}

impl Run {
    /// Build a run from its directory; the id is the directory base name.
    ///
    /// Returns `None` for paths without a usable base name (`/`, `..`) and
    /// for names that cannot be a ledger key (surrounding whitespace, control
    /// characters).
    pub fn new(path: impl Into<PathBuf>, instrument: InstrumentClass) -> Option<Self> {
        let path = path.into();
        let id = path.file_name()?.to_str()?.to_string();
        if id.trim() != id || id.chars().any(char::is_control) {
            return None;
        }
        Some(Self {
            path,
            id,
            instrument,
        })
    }

    /// Directory holding this run (and its ledger).
    pub fn data_dir(&self) -> Option<&Path> {
        self.path.parent()
    }
}

/// Parsed content of the exit-status marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum ExitStatusRecord {
    Code(i32),
    /// File exists but its first line is not an integer (empty, truncated, garbage).
    Unreadable(String),
}

/// Marker presence read from disk at a single inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarkerFacts {
    pub sequencing_complete: bool,
    pub demux_dir_present: bool,
    pub sample_sheet_present: bool,
    pub exit_status: Option<ExitStatusRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleSheetState {
    Present,
    /// Blocked until an operator (or a sample-sheet provider) supplies one.
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum AnalysisOutcome {
    Success,
    /// `code` is `None` when the exit-status file could not be parsed.
    Failure { code: Option<i32> },
}

/// Lifecycle stage of a run as observed in its directory.
///
/// Transfer and archival are not visible from run markers; they are tracked
/// by the ledger and by the run's location (see [`crate::advance::AdvanceOutcome`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "stage")]
pub enum Stage {
    AwaitingSequencing,
    AwaitingAnalysis { sample_sheet: SampleSheetState },
    AnalysisInProgress,
    AnalysisComplete { outcome: AnalysisOutcome },
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::AwaitingSequencing => "awaiting-sequencing",
            Stage::AwaitingAnalysis {
                sample_sheet: SampleSheetState::Present,
            } => "awaiting-analysis",
            Stage::AwaitingAnalysis {
                sample_sheet: SampleSheetState::Missing,
            } => "awaiting-sample-sheet",
            Stage::AnalysisInProgress => "analysis-in-progress",
            Stage::AnalysisComplete {
                outcome: AnalysisOutcome::Success,
            } => "analysis-succeeded",
            Stage::AnalysisComplete {
                outcome: AnalysisOutcome::Failure { .. },
            } => "analysis-failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Marker combinations that no well-behaved run should produce.
///
/// Anomalies never advance a run; the classifier falls back to the nearest
/// safe prior stage and reports what it saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "anomaly")]
pub enum Anomaly {
    /// Exit-status file exists but the demultiplexing directory does not.
    ExitStatusWithoutDemuxDir,
    /// Analysis output exists but sequencing has not been marked complete.
    OutputWithoutSequencingMarker,
    /// A marker path exists with the wrong file type (e.g. demux dir is a file).
    MarkerWrongKind { marker: String },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::ExitStatusWithoutDemuxDir => {
                f.write_str("exit-status file present without demultiplexing directory")
            }
            Anomaly::OutputWithoutSequencingMarker => {
                f.write_str("analysis output present before sequencing completed")
            }
            Anomaly::MarkerWrongKind { marker } => {
                write!(f, "marker {marker} exists with unexpected file type")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_is_directory_base_name() {
        let run = Run::new("/data/nanopore/20240716_AV242106_testrun", InstrumentClass::Nanopore)
            .expect("run");
        assert_eq!(run.id, "20240716_AV242106_testrun");
        assert_eq!(run.data_dir(), Some(Path::new("/data/nanopore")));
    }

    #[test]
    fn run_without_base_name_is_rejected() {
        assert!(Run::new("/", InstrumentClass::Element).is_none());
    }

    #[test]
    fn run_names_unusable_as_ledger_keys_are_rejected() {
        assert!(Run::new("/data/run-1 ", InstrumentClass::Nanopore).is_none());
        assert!(Run::new("/data/ run-1", InstrumentClass::Nanopore).is_none());
        assert!(Run::new("/data/run\t1", InstrumentClass::Nanopore).is_none());
        assert!(Run::new("/data/run 1", InstrumentClass::Nanopore).is_some());
    }

    #[test]
    fn stage_labels_distinguish_sub_states() {
        let blocked = Stage::AwaitingAnalysis {
            sample_sheet: SampleSheetState::Missing,
        };
        let failed = Stage::AnalysisComplete {
            outcome: AnalysisOutcome::Failure { code: Some(1) },
        };
        assert_eq!(blocked.to_string(), "awaiting-sample-sheet");
        assert_eq!(failed.to_string(), "analysis-failed");
    }
}
