//! One scheduled pass over every configured data dir.

use std::path::Path;

use anyhow::{Result, anyhow};
use tracing::{error, info, instrument, warn};

use crate::advance::{AdvanceOutcome, Driver};
use crate::core::instrument::InstrumentClass;
use crate::core::types::Run;
use crate::io::discovery::{DiscoveryFilter, discover_in};

/// Counters for a finished pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub runs: usize,
    pub waiting: usize,
    pub launched: usize,
    pub archived: usize,
    /// Blocked on a sample sheet or failed analysis.
    pub needs_operator: usize,
    /// Launch, transfer or archive failures; retried next pass.
    pub retryable_failures: usize,
    /// Runs whose advance returned an error.
    pub errors: usize,
    /// Data dirs that could not be listed.
    pub data_dir_errors: usize,
}

impl PassSummary {
    fn record(&mut self, outcome: &AdvanceOutcome) {
        match outcome {
            AdvanceOutcome::Waiting { .. } => self.waiting += 1,
            AdvanceOutcome::Launched => self.launched += 1,
            AdvanceOutcome::Archived { .. } => self.archived += 1,
            AdvanceOutcome::Vanished => {}
            other if other.needs_operator() => self.needs_operator += 1,
            _ => self.retryable_failures += 1,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors == 0 && self.data_dir_errors == 0 && self.retryable_failures == 0
    }
}

/// Advance every run found under every configured data dir once.
///
/// A failing run or unreadable data dir is logged and skipped; it never stops
/// the rest of the pass. `on_run` is called after each successful advance.
#[instrument(skip_all)]
pub fn run_pass<F: FnMut(&Run, &AdvanceOutcome)>(
    driver: &Driver<'_>,
    mut on_run: F,
) -> Result<PassSummary> {
    let config = driver.config();
    let pattern = config.run_name_regex()?;
    let filter = DiscoveryFilter {
        archive_dir: &config.archive_dir,
        run_name_pattern: pattern.as_ref(),
    };

    let mut summary = PassSummary::default();
    for instrument in &config.instruments {
        for data_dir in &instrument.data_dirs {
            let runs = match discover_in(instrument, data_dir, filter) {
                Ok(runs) => runs,
                Err(err) => {
                    error!(
                        instrument = %instrument.class,
                        data_dir = %data_dir.display(),
                        error = %format!("{err:#}"),
                        "skipping data dir"
                    );
                    summary.data_dir_errors += 1;
                    continue;
                }
            };
            for run in runs {
                summary.runs += 1;
                match driver.advance(&run) {
                    Ok(outcome) => {
                        summary.record(&outcome);
                        on_run(&run, &outcome);
                    }
                    Err(err) => {
                        error!(
                            run_id = %run.id,
                            error = %format!("{err:#}"),
                            "failed to advance run"
                        );
                        summary.errors += 1;
                    }
                }
            }
        }
    }

    if summary.is_clean() {
        info!(?summary, "pass finished");
    } else {
        warn!(?summary, "pass finished with failures");
    }
    Ok(summary)
}

/// Advance a single run directory, e.g. for manual reprocessing.
pub fn process_run(
    driver: &Driver<'_>,
    run_dir: &Path,
    instrument: InstrumentClass,
) -> Result<AdvanceOutcome> {
    let run = Run::new(run_dir, instrument)
        .ok_or_else(|| anyhow!("{} is not a run directory", run_dir.display()))?;
    driver.advance(&run)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::core::types::Stage;
    use crate::test_support::{FakeHooks, TestSite};

    #[test]
    fn pass_advances_every_run_and_skips_the_archive() {
        let site = TestSite::new(InstrumentClass::Nanopore);
        site.run_dir("20240701_a").create();
        site.run_dir("20240702_b").ready().create();
        site.run_dir("20240703_c").analysed(0).create();
        fs::create_dir_all(site.archive_root().join("20240601_old")).expect("archived run");
        let hooks = FakeHooks::default();
        let mut seen = Vec::new();

        let summary = run_pass(&hooks.driver(&site.config), |run, outcome| {
            seen.push((run.id.clone(), outcome.label()));
        })
        .expect("pass");

        assert_eq!(
            seen,
            vec![
                ("20240701_a".to_string(), "waiting"),
                ("20240702_b".to_string(), "launched"),
                ("20240703_c".to_string(), "archived"),
            ]
        );
        assert_eq!(summary.runs, 3);
        assert!(summary.is_clean());
    }

    #[test]
    fn one_bad_data_dir_does_not_stop_the_pass() {
        let mut site = TestSite::new(InstrumentClass::Nanopore);
        site.run_dir("run-1").ready().create();
        let missing = site.data_dir.with_file_name("missing");
        site.config.instruments[0].data_dirs.insert(0, missing);
        let hooks = FakeHooks::default();

        let summary = run_pass(&hooks.driver(&site.config), |_, _| {}).expect("pass");

        assert_eq!(summary.data_dir_errors, 1);
        assert_eq!(summary.launched, 1);
        assert!(!summary.is_clean());
    }

    #[test]
    fn run_name_pattern_limits_discovery() {
        let mut site = TestSite::new(InstrumentClass::Nanopore);
        site.config.run_name_pattern = Some(r"^\d{8}_".to_string());
        site.run_dir("20240701_a").create();
        site.run_dir("scratch").ready().create();
        let hooks = FakeHooks::default();

        let summary = run_pass(&hooks.driver(&site.config), |_, _| {}).expect("pass");

        assert_eq!(summary.runs, 1);
        assert_eq!(summary.waiting, 1);
        assert_eq!(hooks.launcher.launches(), 0);
    }

    #[test]
    fn process_run_reports_stage_of_single_run() {
        let site = TestSite::new(InstrumentClass::Nanopore);
        let run_dir = site
            .run_dir("run-1")
            .sequenced()
            .with_sample_sheet()
            .with_demux_dir()
            .create();
        let hooks = FakeHooks::default();

        let outcome =
            process_run(&hooks.driver(&site.config), &run_dir, InstrumentClass::Nanopore)
                .expect("process");

        assert_eq!(
            outcome,
            AdvanceOutcome::Waiting {
                stage: Stage::AnalysisInProgress
            }
        );
    }
}
