//! Deterministic classification of marker facts into a lifecycle stage.

use crate::core::types::{
    AnalysisOutcome, Anomaly, ExitStatusRecord, MarkerFacts, SampleSheetState, Stage,
};

/// Stage plus any inconsistencies noticed while deriving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub stage: Stage,
    pub anomalies: Vec<Anomaly>,
}

/// Classify marker facts. First matching rule wins:
///
/// 1. no sequencing marker -> `AwaitingSequencing`
/// 2. no demux dir -> `AwaitingAnalysis` (qualified by sample sheet presence)
/// 3. demux dir without exit status -> `AnalysisInProgress`
/// 4. demux dir and exit status -> `AnalysisComplete`, success iff code is `0`
pub fn classify(facts: &MarkerFacts) -> Classification {
    let mut anomalies = Vec::new();

    if !facts.sequencing_complete {
        if facts.demux_dir_present || facts.exit_status.is_some() {
            anomalies.push(Anomaly::OutputWithoutSequencingMarker);
        }
        return Classification {
            stage: Stage::AwaitingSequencing,
            anomalies,
        };
    }

    if !facts.demux_dir_present {
        if facts.exit_status.is_some() {
            anomalies.push(Anomaly::ExitStatusWithoutDemuxDir);
        }
        let sample_sheet = if facts.sample_sheet_present {
            SampleSheetState::Present
        } else {
            SampleSheetState::Missing
        };
        return Classification {
            stage: Stage::AwaitingAnalysis { sample_sheet },
            anomalies,
        };
    }

    let stage = match &facts.exit_status {
        None => Stage::AnalysisInProgress,
        Some(record) => Stage::AnalysisComplete {
            outcome: analysis_outcome(record),
        },
    };
    Classification { stage, anomalies }
}

pub fn analysis_outcome(record: &ExitStatusRecord) -> AnalysisOutcome {
    match record {
        ExitStatusRecord::Code(0) => AnalysisOutcome::Success,
        ExitStatusRecord::Code(code) => AnalysisOutcome::Failure { code: Some(*code) },
        ExitStatusRecord::Unreadable(_) => AnalysisOutcome::Failure { code: None },
    }
}

/// Parse exit-status file contents; only the first line is significant.
pub fn parse_exit_status(contents: &str) -> ExitStatusRecord {
    let first = contents.lines().next().unwrap_or("").trim();
    match first.parse::<i32>() {
        Ok(code) => ExitStatusRecord::Code(code),
        Err(_) => ExitStatusRecord::Unreadable(first.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(seq: bool, demux: bool, sheet: bool, exit: Option<i32>) -> MarkerFacts {
        MarkerFacts {
            sequencing_complete: seq,
            demux_dir_present: demux,
            sample_sheet_present: sheet,
            exit_status: exit.map(ExitStatusRecord::Code),
        }
    }

    #[test]
    fn missing_sequencing_marker_wins_over_everything() {
        for demux in [false, true] {
            for sheet in [false, true] {
                for exit in [None, Some(0), Some(1)] {
                    let c = classify(&facts(false, demux, sheet, exit));
                    assert_eq!(c.stage, Stage::AwaitingSequencing);
                }
            }
        }
    }

    #[test]
    fn output_before_sequencing_is_reported() {
        let c = classify(&facts(false, true, true, Some(0)));
        assert_eq!(c.anomalies, vec![Anomaly::OutputWithoutSequencingMarker]);
        assert!(classify(&facts(false, false, true, None)).anomalies.is_empty());
    }

    #[test]
    fn awaiting_analysis_is_qualified_by_sample_sheet() {
        assert_eq!(
            classify(&facts(true, false, true, None)).stage,
            Stage::AwaitingAnalysis {
                sample_sheet: SampleSheetState::Present
            }
        );
        assert_eq!(
            classify(&facts(true, false, false, None)).stage,
            Stage::AwaitingAnalysis {
                sample_sheet: SampleSheetState::Missing
            }
        );
    }

    #[test]
    fn exit_status_without_demux_dir_falls_back_to_awaiting_analysis() {
        let c = classify(&facts(true, false, true, Some(0)));
        assert_eq!(
            c.stage,
            Stage::AwaitingAnalysis {
                sample_sheet: SampleSheetState::Present
            }
        );
        assert_eq!(c.anomalies, vec![Anomaly::ExitStatusWithoutDemuxDir]);
    }

    #[test]
    fn demux_dir_without_exit_status_is_in_progress() {
        let c = classify(&facts(true, true, true, None));
        assert_eq!(c.stage, Stage::AnalysisInProgress);
        assert!(c.anomalies.is_empty());
    }

    #[test]
    fn exit_code_decides_success() {
        assert_eq!(
            classify(&facts(true, true, true, Some(0))).stage,
            Stage::AnalysisComplete {
                outcome: AnalysisOutcome::Success
            }
        );
        assert_eq!(
            classify(&facts(true, true, true, Some(1))).stage,
            Stage::AnalysisComplete {
                outcome: AnalysisOutcome::Failure { code: Some(1) }
            }
        );
    }

    #[test]
    fn unreadable_exit_status_is_failure() {
        let f = MarkerFacts {
            exit_status: Some(ExitStatusRecord::Unreadable(String::new())),
            ..facts(true, true, true, None)
        };
        assert_eq!(
            classify(&f).stage,
            Stage::AnalysisComplete {
                outcome: AnalysisOutcome::Failure { code: None }
            }
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let f = facts(true, true, false, Some(2));
        assert_eq!(classify(&f), classify(&f));
    }

    #[test]
    fn parse_exit_status_reads_first_line_only() {
        assert_eq!(parse_exit_status("0\n"), ExitStatusRecord::Code(0));
        assert_eq!(parse_exit_status("  137 \ntrailing"), ExitStatusRecord::Code(137));
        assert_eq!(
            parse_exit_status(""),
            ExitStatusRecord::Unreadable(String::new())
        );
        assert_eq!(
            parse_exit_status("done\n0\n"),
            ExitStatusRecord::Unreadable("done".to_string())
        );
    }
}
