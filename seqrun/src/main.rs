//! Sequencing-run lifecycle automation.
//!
//! Meant to be invoked repeatedly from cron or a systemd timer. Each
//! invocation re-derives every run's stage from disk and performs at most one
//! step per run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use seqrun::advance::{Driver, Hooks};
use seqrun::core::instrument::{InstrumentClass, MarkerVocabulary};
use seqrun::exit_codes;
use seqrun::io::config::{Config, DEFAULT_CONFIG_PATH, load_config};
use seqrun::io::discovery::{DiscoveryFilter, discover_in};
use seqrun::io::inspect::inspect;
use seqrun::io::launcher::ShellLauncher;
use seqrun::io::notify::LogNotifier;
use seqrun::io::samplesheet::NoSampleSheetProvider;
use seqrun::io::transfer::RsyncTransfer;
use seqrun::logging;
use seqrun::pass::{process_run, run_pass};
use tracing::warn;

#[derive(Parser)]
#[command(
    name = "seqrun",
    version,
    about = "Drive sequencing runs through analysis, transfer and archival"
)]
struct Cli {
    /// Path to the TOML config.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log filter used when RUST_LOG is unset (e.g. `debug`, `seqrun=trace`).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Advance every discovered run by one step, or a single run with `--run`.
    Process {
        /// Process only this run directory.
        #[arg(long, requires = "instrument")]
        run: Option<PathBuf>,
        /// Instrument class of `--run`.
        #[arg(long)]
        instrument: Option<InstrumentClass>,
    },
    /// Print the stage of one run directory without changing anything.
    Inspect {
        dir: PathBuf,
        #[arg(long)]
        instrument: InstrumentClass,
        /// Emit the full inspection as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print every discovered run as `<class>\t<path>`.
    List,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref());
    if let Err(err) = run(cli) {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::INVALID);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Process { run, instrument } => {
            let config = load_config(&cli.config)?;
            cmd_process(&config, run.as_deref().zip(instrument))
        }
        Command::Inspect {
            dir,
            instrument,
            json,
        } => cmd_inspect(&cli.config, &dir, instrument, json),
        Command::List => cmd_list(&load_config(&cli.config)?),
    }
}

fn cmd_process(config: &Config, single: Option<(&Path, InstrumentClass)>) -> Result<()> {
    let hooks = Hooks {
        launcher: &ShellLauncher,
        transfer: &RsyncTransfer,
        notifier: &LogNotifier,
        sample_sheets: &NoSampleSheetProvider,
    };
    let driver = Driver::new(config, hooks);

    match single {
        Some((run_dir, instrument)) => {
            let outcome = process_run(&driver, run_dir, instrument)?;
            println!("{}\t{}", run_dir.display(), outcome.label());
        }
        None => {
            run_pass(&driver, |run, outcome| {
                println!("{}\t{}", run.id, outcome.label());
            })?;
        }
    }
    Ok(())
}

fn cmd_inspect(
    config_path: &Path,
    dir: &Path,
    instrument: InstrumentClass,
    json: bool,
) -> Result<()> {
    let vocab = inspect_vocabulary(config_path, instrument)?;
    let inspection = inspect(dir, &vocab)?;
    if json {
        let payload =
            serde_json::to_string_pretty(&inspection).context("serialize inspection")?;
        println!("{payload}");
    } else {
        println!("{}", inspection.stage);
        for anomaly in &inspection.anomalies {
            println!("anomaly: {anomaly}");
        }
    }
    Ok(())
}

/// Vocabulary for `inspect`: configured overrides when a config file exists,
/// otherwise the class defaults.
fn inspect_vocabulary(config_path: &Path, instrument: InstrumentClass) -> Result<MarkerVocabulary> {
    if !config_path.exists() {
        return Ok(instrument.default_vocabulary());
    }
    let config = load_config(config_path)?;
    Ok(match config.instrument(instrument) {
        Some(inst) => inst.vocabulary(),
        None => instrument.default_vocabulary(),
    })
}

fn cmd_list(config: &Config) -> Result<()> {
    let pattern = config.run_name_regex()?;
    let filter = DiscoveryFilter {
        archive_dir: &config.archive_dir,
        run_name_pattern: pattern.as_ref(),
    };
    for instrument in &config.instruments {
        for data_dir in &instrument.data_dirs {
            match discover_in(instrument, data_dir, filter) {
                Ok(runs) => {
                    for run in runs {
                        println!("{}\t{}", run.instrument, run.path.display());
                    }
                }
                Err(err) => warn!(error = %format!("{err:#}"), "skipping data dir"),
            }
        }
    }
    Ok(())
}
