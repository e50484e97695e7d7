//! Test-only helpers: on-disk run fixtures and scripted collaborators.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::advance::{Driver, Hooks};
use crate::core::instrument::{InstrumentClass, MarkerVocabulary};
use crate::core::types::Run;
use crate::io::config::{AnalysisConfig, Config, InstrumentConfig, TransferConfig};
use crate::io::launcher::{LaunchRequest, Launcher};
use crate::io::notify::{Notification, Notifier};
use crate::io::samplesheet::{NoSampleSheetProvider, SampleSheetProvider};
use crate::io::transfer::{TransferAgent, TransferRequest};

/// A temporary data dir with a matching single-instrument config.
pub struct TestSite {
    _temp: TempDir,
    pub data_dir: PathBuf,
    pub class: InstrumentClass,
    pub config: Config,
}

impl TestSite {
    pub fn new(class: InstrumentClass) -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let data_dir = temp.path().join("data");
        fs::create_dir_all(&data_dir).expect("create data dir");
        let config = site_config(class, &data_dir);
        Self {
            _temp: temp,
            data_dir,
            class,
            config,
        }
    }

    pub fn vocab(&self) -> MarkerVocabulary {
        self.class.default_vocabulary()
    }

    /// Start building a run directory named `name` under the data dir.
    pub fn run_dir(&self, name: &str) -> RunDirBuilder {
        RunDirBuilder::new(self.data_dir.join(name), self.vocab())
    }

    pub fn run(&self, name: &str) -> Run {
        Run::new(self.data_dir.join(name), self.class).expect("run")
    }

    pub fn archive_root(&self) -> PathBuf {
        self.data_dir.join(&self.config.archive_dir)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(&self.config.ledger_file)
    }

    /// Write the config as TOML for CLI tests.
    pub fn write_config(&self) -> PathBuf {
        let path = self.data_dir.parent().expect("temp root").join("seqrun.toml");
        let raw = toml::to_string(&self.config).expect("serialize config");
        fs::write(&path, raw).expect("write config");
        path
    }
}

/// Config for one instrument class watching `data_dir`.
pub fn site_config(class: InstrumentClass, data_dir: &Path) -> Config {
    Config {
        analysis: AnalysisConfig {
            command: "run-pipeline --sheet {{ sample_sheet }} --out {{ demux_dir }}".to_string(),
            ..AnalysisConfig::default()
        },
        transfer: TransferConfig {
            host: "analysis.example.org".to_string(),
            user: "seq".to_string(),
            destination: "/proj/incoming".to_string(),
            ..TransferConfig::default()
        },
        instruments: vec![InstrumentConfig {
            class,
            data_dirs: vec![data_dir.to_path_buf()],
            markers: Default::default(),
        }],
        ..Config::default()
    }
}

/// Builds a run directory with a chosen set of markers.
pub struct RunDirBuilder {
    path: PathBuf,
    vocab: MarkerVocabulary,
    sequencing_complete: bool,
    sample_sheet: bool,
    demux_dir: bool,
    exit_status: Option<String>,
}

impl RunDirBuilder {
    pub fn new(path: PathBuf, vocab: MarkerVocabulary) -> Self {
        Self {
            path,
            vocab,
            sequencing_complete: false,
            sample_sheet: false,
            demux_dir: false,
            exit_status: None,
        }
    }

    pub fn sequenced(mut self) -> Self {
        self.sequencing_complete = true;
        self
    }

    pub fn with_sample_sheet(mut self) -> Self {
        self.sample_sheet = true;
        self
    }

    pub fn with_demux_dir(mut self) -> Self {
        self.demux_dir = true;
        self
    }

    /// Raw exit-status file content, e.g. `"0\n"`.
    pub fn with_exit_status(mut self, content: &str) -> Self {
        self.exit_status = Some(content.to_string());
        self
    }

    /// Sequenced with a sample sheet, ready for launch.
    pub fn ready(self) -> Self {
        self.sequenced().with_sample_sheet()
    }

    /// Analysis finished with `code`.
    pub fn analysed(self, code: i32) -> Self {
        self.ready()
            .with_demux_dir()
            .with_exit_status(&format!("{code}\n"))
    }

    pub fn create(self) -> PathBuf {
        fs::create_dir_all(&self.path).expect("create run dir");
        fs::write(self.path.join("reads.pod5"), b"signal").expect("write payload");
        if self.sequencing_complete {
            fs::write(self.path.join(&self.vocab.sequencing_complete), b"done\n")
                .expect("write sequencing marker");
        }
        if self.sample_sheet {
            fs::write(self.path.join(&self.vocab.sample_sheet), b"sample_id,barcode\n")
                .expect("write sample sheet");
        }
        if self.demux_dir {
            fs::create_dir_all(self.path.join(&self.vocab.demux_dir)).expect("create demux dir");
        }
        if let Some(content) = &self.exit_status {
            fs::write(self.path.join(&self.vocab.exit_status), content)
                .expect("write exit status");
        }
        self.path
    }
}

/// Records launch requests; optionally fails every launch.
#[derive(Default)]
pub struct RecordingLauncher {
    pub requests: RefCell<Vec<LaunchRequest>>,
    pub fail_with: Option<String>,
}

impl RecordingLauncher {
    pub fn failing(reason: &str) -> Self {
        Self {
            fail_with: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn launches(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, request: &LaunchRequest) -> Result<()> {
        self.requests.borrow_mut().push(request.clone());
        match &self.fail_with {
            Some(reason) => Err(anyhow!("{reason}")),
            None => Ok(()),
        }
    }
}

/// Transfer agent returning queued results, then `Ok` once the queue is empty.
#[derive(Default)]
pub struct ScriptedTransfer {
    results: RefCell<VecDeque<std::result::Result<(), String>>>,
    pub requests: RefCell<Vec<TransferRequest>>,
}

impl ScriptedTransfer {
    pub fn new(results: Vec<std::result::Result<(), String>>) -> Self {
        Self {
            results: RefCell::new(results.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl TransferAgent for ScriptedTransfer {
    fn transfer(&self, request: &TransferRequest) -> Result<()> {
        self.requests.borrow_mut().push(request.clone());
        match self.results.borrow_mut().pop_front() {
            Some(Err(reason)) => Err(anyhow!("{reason}")),
            Some(Ok(())) | None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: RefCell<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.sent.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        self.sent.borrow_mut().push(notification.clone());
        Ok(())
    }
}

/// Sample-sheet provider that writes a sheet when asked, counting calls.
#[derive(Default)]
pub struct WritingSampleSheetProvider {
    pub calls: Cell<usize>,
}

impl SampleSheetProvider for WritingSampleSheetProvider {
    fn provide(&self, _run: &Run, destination: &Path) -> Result<bool> {
        self.calls.set(self.calls.get() + 1);
        fs::write(destination, b"sample_id,barcode\nS1,BC01\n")?;
        Ok(true)
    }
}

/// Fakes for every driver collaborator, owned together.
#[derive(Default)]
pub struct FakeHooks {
    pub launcher: RecordingLauncher,
    pub transfer: ScriptedTransfer,
    pub notifier: RecordingNotifier,
    pub sample_sheets: NoSampleSheetProvider,
}

impl FakeHooks {
    pub fn driver<'a>(&'a self, config: &'a Config) -> Driver<'a> {
        Driver::new(
            config,
            Hooks {
                launcher: &self.launcher,
                transfer: &self.transfer,
                notifier: &self.notifier,
                sample_sheets: &self.sample_sheets,
            },
        )
    }
}
