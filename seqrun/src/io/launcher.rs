//! Fire-and-forget launch of the analysis pipeline.
//!
//! The launched shell writes the pipeline's exit code to the run's exit-status
//! marker when it finishes. seqrun never waits on the child; completion is
//! observed on a later pass by [`crate::io::inspect`].

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use minijinja::{Environment, UndefinedBehavior, context};
use tracing::{info, instrument};

use crate::core::instrument::MarkerVocabulary;
use crate::core::types::Run;

/// Everything needed to start one pipeline process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Run directory; also the working directory of the pipeline.
    pub workdir: PathBuf,
    /// Rendered pipeline command, interpreted by `sh -c`.
    pub command: String,
    /// Exit-status marker name, relative to `workdir`.
    pub exit_status_file: String,
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
}

impl LaunchRequest {
    pub fn for_run(run: &Run, vocab: &MarkerVocabulary, command: String, log_prefix: &str) -> Self {
        Self {
            workdir: run.path.clone(),
            command,
            exit_status_file: vocab.exit_status.clone(),
            stdout_log: run.path.join(format!("{log_prefix}stdout.log")),
            stderr_log: run.path.join(format!("{log_prefix}stderr.log")),
        }
    }

    /// Shell script that runs the command and records its exit code.
    ///
    /// The code is written to a temp file and renamed so the marker never
    /// appears half-written.
    pub fn wrapper_script(&self) -> String {
        let marker = shell_quote(&self.exit_status_file);
        let tmp = shell_quote(&format!("{}.tmp", self.exit_status_file));
        format!(
            "( {} ); echo $? > {tmp} && mv -f {tmp} {marker}",
            self.command
        )
    }
}

/// Abstraction over process launching so the driver can be tested without
/// spawning pipelines.
pub trait Launcher {
    /// Start the process and return once it is running. Must not wait for it.
    fn launch(&self, request: &LaunchRequest) -> Result<()>;
}

/// Launches `sh -c <wrapper>` detached into its own process group.
pub struct ShellLauncher;

impl Launcher for ShellLauncher {
    #[instrument(skip_all, fields(workdir = %request.workdir.display()))]
    fn launch(&self, request: &LaunchRequest) -> Result<()> {
        let stdout = open_log(&request.stdout_log)?;
        let stderr = open_log(&request.stderr_log)?;

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(request.wrapper_script())
            .current_dir(&request.workdir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("spawn pipeline in {}", request.workdir.display()))?;
        info!(pid = child.id(), command = %request.command, "pipeline started");
        Ok(())
    }
}

/// Values available to the `analysis.command` template.
#[derive(Debug, Clone)]
pub struct CommandContext<'a> {
    pub run: &'a Run,
    pub vocab: &'a MarkerVocabulary,
}

/// Render the configured command template for one run.
///
/// Unknown template variables are an error rather than an empty string.
pub fn render_command(template: &str, ctx: &CommandContext<'_>) -> Result<String> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    let tmpl = env
        .template_from_str(template)
        .context("parse analysis command template")?;
    let run = ctx.run;
    let rendered = tmpl
        .render(context! {
            run_dir => run.path.display().to_string(),
            run_id => run.id.as_str(),
            sample_sheet => run.path.join(&ctx.vocab.sample_sheet).display().to_string(),
            demux_dir => run.path.join(&ctx.vocab.demux_dir).display().to_string(),
            sequencer_type => run.instrument.sequencer_type(),
            run_type => run.instrument.run_type(),
        })
        .with_context(|| format!("render analysis command for {}", run.id))?;
    Ok(rendered)
}

fn open_log(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open pipeline log {}", path.display()))
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
