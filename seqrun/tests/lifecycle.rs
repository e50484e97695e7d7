//! End-to-end lifecycle tests driving runs through repeated passes.
//!
//! Collaborators are fakes from `seqrun::test_support`; markers, ledger and
//! archive moves are real files in a temp data dir.

use std::fs;

use seqrun::advance::AdvanceOutcome;
use seqrun::core::instrument::InstrumentClass;
use seqrun::core::types::{SampleSheetState, Stage};
use seqrun::io::ledger::TransferLedger;
use seqrun::io::notify::Notification;
use seqrun::pass::run_pass;
use seqrun::test_support::{FakeHooks, ScriptedTransfer, TestSite};

/// Full lifecycle of one Element run across five passes:
///
/// 1. sequencing in progress -> waiting
/// 2. sequencing marker + manifest -> launched
/// 3. pipeline created its output dir -> waiting (analysis in progress)
/// 4. exit status `0` -> transferred, recorded, archived
/// 5. run no longer discovered
#[test]
fn element_run_goes_from_sequencing_to_archive() {
    let site = TestSite::new(InstrumentClass::Element);
    let vocab = site.vocab();
    let run_dir = site.run_dir("20240716_AV0001_0001").create();
    let hooks = FakeHooks::default();
    let driver = hooks.driver(&site.config);
    let run = site.run("20240716_AV0001_0001");

    assert_eq!(
        driver.advance(&run).expect("pass 1"),
        AdvanceOutcome::Waiting {
            stage: Stage::AwaitingSequencing
        }
    );

    fs::write(run_dir.join(&vocab.sequencing_complete), "{}").expect("RunUploaded.json");
    fs::write(run_dir.join(&vocab.sample_sheet), "[SAMPLES]\n").expect("RunManifest.csv");
    assert_eq!(driver.advance(&run).expect("pass 2"), AdvanceOutcome::Launched);
    let launch = hooks.launcher.requests.borrow()[0].clone();
    assert_eq!(launch.exit_status_file, ".exitcode_for_bases2fastq");

    fs::create_dir(run_dir.join(&vocab.demux_dir)).expect("Demultiplexing");
    assert_eq!(
        driver.advance(&run).expect("pass 3"),
        AdvanceOutcome::Waiting {
            stage: Stage::AnalysisInProgress
        }
    );

    fs::write(run_dir.join(&launch.exit_status_file), "0\n").expect("exit status");
    let archived_to = site.archive_root().join("20240716_AV0001_0001");
    assert_eq!(
        driver.advance(&run).expect("pass 4"),
        AdvanceOutcome::Archived {
            transferred_now: true,
            destination: archived_to.clone(),
        }
    );
    assert!(archived_to.join("Demultiplexing").is_dir());
    assert_eq!(hooks.launcher.launches(), 1);
    assert_eq!(hooks.transfer.calls(), 1);

    let summary = run_pass(&driver, |_, _| {}).expect("pass 5");
    assert_eq!(summary.runs, 0);
    assert_eq!(
        hooks.notifier.notifications(),
        vec![Notification::RunArchived {
            run_id: "20240716_AV0001_0001".to_string(),
            archived_to,
        }]
    );
}

/// Two back-to-back advances of a finished run: one transfer, one ledger row, one move.
#[test]
fn double_advance_transfers_and_moves_once() {
    let site = TestSite::new(InstrumentClass::Nanopore);
    site.run_dir("run-1").analysed(0).create();
    let hooks = FakeHooks::default();
    let first = hooks.driver(&site.config);
    let second = hooks.driver(&site.config);
    let run = site.run("run-1");

    assert!(matches!(
        first.advance(&run).expect("first"),
        AdvanceOutcome::Archived { .. }
    ));
    assert_eq!(second.advance(&run).expect("second"), AdvanceOutcome::Vanished);

    let entries = TransferLedger::new(site.ledger_path()).entries().expect("ledger");
    assert_eq!(entries.len(), 1);
    assert_eq!(hooks.transfer.calls(), 1);
    let archived: Vec<_> = fs::read_dir(site.archive_root())
        .expect("archive dir")
        .collect();
    assert_eq!(archived.len(), 1);
}

/// A failed transfer changes nothing; the next pass transfers and records exactly once.
#[test]
fn transfer_failure_then_success_records_one_row() {
    let site = TestSite::new(InstrumentClass::NextSeq);
    let run_dir = site.run_dir("240716_VH00001_1_AAAA").analysed(0).create();
    let hooks = FakeHooks {
        transfer: ScriptedTransfer::new(vec![Err("rsync exited with status 12".to_string())]),
        ..FakeHooks::default()
    };
    let driver = hooks.driver(&site.config);
    let run = site.run("240716_VH00001_1_AAAA");

    assert!(matches!(
        driver.advance(&run).expect("first"),
        AdvanceOutcome::TransferFailed { .. }
    ));
    assert!(run_dir.is_dir());
    assert!(!site.ledger_path().exists());

    assert!(matches!(
        driver.advance(&run).expect("second"),
        AdvanceOutcome::Archived {
            transferred_now: true,
            ..
        }
    ));
    let ledger = TransferLedger::new(site.ledger_path());
    assert_eq!(ledger.entries().expect("ledger").len(), 1);
    assert!(ledger.has("240716_VH00001_1_AAAA").expect("has"));
    assert_eq!(hooks.transfer.calls(), 2);
}

/// Exit status 1: operator notified on every pass, nothing transferred or moved.
#[test]
fn failed_analysis_only_notifies() {
    let site = TestSite::new(InstrumentClass::Nanopore);
    let run_dir = site.run_dir("run-1").analysed(1).create();
    let hooks = FakeHooks::default();
    let driver = hooks.driver(&site.config);

    for _ in 0..2 {
        let summary = run_pass(&driver, |_, _| {}).expect("pass");
        assert_eq!(summary.needs_operator, 1);
    }

    assert!(run_dir.is_dir());
    assert_eq!(hooks.transfer.calls(), 0);
    assert!(!site.ledger_path().exists());
    let sent = hooks.notifier.notifications();
    assert_eq!(sent.len(), 2);
    assert!(
        sent.iter()
            .all(|n| matches!(n, Notification::AnalysisFailed { code: Some(1), .. }))
    );
}

/// Launch does not create markers itself; until the pipeline writes its output
/// dir the run still classifies as awaiting analysis and is launched again.
#[test]
fn relaunch_before_pipeline_output_appears() {
    let site = TestSite::new(InstrumentClass::Nanopore);
    site.run_dir("run-1").ready().create();
    let hooks = FakeHooks::default();
    let driver = hooks.driver(&site.config);
    let run = site.run("run-1");

    assert_eq!(driver.advance(&run).expect("first"), AdvanceOutcome::Launched);
    assert_eq!(driver.advance(&run).expect("second"), AdvanceOutcome::Launched);
    assert_eq!(hooks.launcher.launches(), 2);

    let inspection =
        seqrun::io::inspect::inspect(&run.path, &site.vocab()).expect("inspect");
    assert_eq!(
        inspection.stage,
        Stage::AwaitingAnalysis {
            sample_sheet: SampleSheetState::Present
        }
    );
}

/// One broken run does not stop the others in the same pass.
#[test]
fn pass_isolates_failing_runs() {
    let site = TestSite::new(InstrumentClass::Nanopore);
    let broken = site.run_dir("run-a").analysed(0).create();
    site.run_dir("run-b").analysed(0).create();
    fs::create_dir_all(site.archive_root().join("run-a")).expect("occupy archive slot");
    let hooks = FakeHooks::default();
    let mut outcomes = Vec::new();

    let summary = run_pass(&hooks.driver(&site.config), |run, outcome| {
        outcomes.push((run.id.clone(), outcome.label()));
    })
    .expect("pass");

    assert_eq!(
        outcomes,
        vec![
            ("run-a".to_string(), "archive-failed"),
            ("run-b".to_string(), "archived"),
        ]
    );
    assert_eq!(summary.retryable_failures, 1);
    assert_eq!(summary.archived, 1);
    assert!(broken.is_dir());

    // Ledger already lists run-a, so the retry only attempts the move.
    fs::remove_dir(site.archive_root().join("run-a")).expect("free archive slot");
    let summary = run_pass(&hooks.driver(&site.config), |_, _| {}).expect("retry pass");
    assert_eq!(summary.archived, 1);
    assert_eq!(hooks.transfer.calls(), 2);
    assert_eq!(
        TransferLedger::new(site.ledger_path())
            .entries()
            .expect("ledger")
            .len(),
        2
    );
}
