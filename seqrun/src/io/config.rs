//! seqrun configuration (`seqrun.toml`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use minijinja::Environment;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::instrument::{InstrumentClass, MarkerVocabulary};

pub const DEFAULT_CONFIG_PATH: &str = "seqrun.toml";

/// Top-level configuration, resolved once per process and passed by reference.
///
/// Missing scalar fields default to the values used on the production hosts;
/// `instruments`, the analysis command and the transfer target are required.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Archive directory name, created under each data dir.
    pub archive_dir: String,

    /// Transfer ledger filename, kept under each data dir.
    pub ledger_file: String,

    /// Only directories whose name matches are treated as runs.
    pub run_name_pattern: Option<String>,

    pub analysis: AnalysisConfig,
    pub transfer: TransferConfig,
    pub instruments: Vec<InstrumentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// minijinja template for the pipeline invocation.
    pub command: String,
    /// Prefix for the stdout/stderr log files written into the run directory.
    pub log_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TransferConfig {
    /// rsync executable, resolved through `PATH` unless absolute.
    pub rsync_program: String,
    pub host: String,
    pub user: String,
    pub destination: String,
    pub rsync_options: Vec<String>,
    /// Re-run rsync as a checksum dry-run and fail if anything is still pending.
    pub validate: bool,
    pub timeout_secs: u64,
    /// Truncate captured rsync stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstrumentConfig {
    pub class: InstrumentClass,
    pub data_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub markers: MarkerOverrides,
}

/// Per-instrument replacements for the default marker filenames.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MarkerOverrides {
    pub sequencing_complete: Option<String>,
    pub demux_dir: Option<String>,
    pub sample_sheet: Option<String>,
    pub exit_status: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            archive_dir: "nosync".to_string(),
            ledger_file: "transfer.tsv".to_string(),
            run_name_pattern: None,
            analysis: AnalysisConfig::default(),
            transfer: TransferConfig::default(),
            instruments: Vec::new(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            log_prefix: "analysis_".to_string(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            rsync_program: "rsync".to_string(),
            host: String::new(),
            user: String::new(),
            destination: String::new(),
            rsync_options: ["-r", "--no-o", "--no-g", "--chmod=g+rw"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            validate: false,
            timeout_secs: 24 * 60 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl InstrumentConfig {
    /// Default vocabulary for the class with any configured overrides applied.
    pub fn vocabulary(&self) -> MarkerVocabulary {
        let mut vocab = self.class.default_vocabulary();
        let overrides = &self.markers;
        if let Some(name) = &overrides.sequencing_complete {
            vocab.sequencing_complete = name.clone();
        }
        if let Some(name) = &overrides.demux_dir {
            vocab.demux_dir = name.clone();
        }
        if let Some(name) = &overrides.sample_sheet {
            vocab.sample_sheet = name.clone();
        }
        if let Some(name) = &overrides.exit_status {
            vocab.exit_status = name.clone();
        }
        vocab
    }
}

impl Config {
    pub fn instrument(&self, class: InstrumentClass) -> Option<&InstrumentConfig> {
        self.instruments.iter().find(|inst| inst.class == class)
    }

    pub fn run_name_regex(&self) -> Result<Option<Regex>> {
        self.run_name_pattern
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).with_context(|| format!("compile run_name_pattern {pattern:?}"))
            })
            .transpose()
    }

    pub fn validate(&self) -> Result<()> {
        require_plain_name("archive_dir", &self.archive_dir)?;
        require_plain_name("ledger_file", &self.ledger_file)?;
        self.run_name_regex()?;

        if self.analysis.command.trim().is_empty() {
            return Err(anyhow!("analysis.command must be non-empty"));
        }
        Environment::new()
            .template_from_str(&self.analysis.command)
            .context("analysis.command is not a valid template")?;

        let transfer = &self.transfer;
        for (field, value) in [
            ("transfer.rsync_program", &transfer.rsync_program),
            ("transfer.host", &transfer.host),
            ("transfer.user", &transfer.user),
            ("transfer.destination", &transfer.destination),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{field} must be non-empty"));
            }
        }
        if transfer.timeout_secs == 0 {
            return Err(anyhow!("transfer.timeout_secs must be > 0"));
        }
        if transfer.output_limit_bytes == 0 {
            return Err(anyhow!("transfer.output_limit_bytes must be > 0"));
        }

        if self.instruments.is_empty() {
            return Err(anyhow!("at least one [[instruments]] entry is required"));
        }
        for (idx, inst) in self.instruments.iter().enumerate() {
            if inst.data_dirs.is_empty() {
                return Err(anyhow!("instruments[{idx}] ({}) has no data_dirs", inst.class));
            }
            if self.instruments[..idx].iter().any(|prev| prev.class == inst.class) {
                return Err(anyhow!("instrument class {} configured twice", inst.class));
            }
            for name in inst.vocabulary().names() {
                require_plain_name(&format!("instruments[{idx}].markers"), name)?;
            }
        }
        Ok(())
    }
}

fn require_plain_name(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{field} must be non-empty"));
    }
    if value.contains('/') || value == "." || value == ".." {
        return Err(anyhow!("{field} must be a plain name, got {value:?}"));
    }
    Ok(())
}

/// Load and validate config from a TOML file.
pub fn load_config(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
