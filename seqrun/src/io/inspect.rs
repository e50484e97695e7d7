//! Read-only inspection of a run directory.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::core::classifier::{classify, parse_exit_status};
use crate::core::instrument::MarkerVocabulary;
use crate::core::types::{Anomaly, MarkerFacts, Stage};

/// Result of one inspection: what was on disk and what it means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub stage: Stage,
    pub facts: MarkerFacts,
    pub anomalies: Vec<Anomaly>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    File,
    Dir,
}

/// Classify a run directory. Never mutates the filesystem.
#[instrument(skip_all, fields(run_dir = %run_dir.display()))]
pub fn inspect(run_dir: &Path, vocab: &MarkerVocabulary) -> Result<Inspection> {
    let (facts, mut anomalies) = read_marker_facts(run_dir, vocab)?;
    let classification = classify(&facts);
    anomalies.extend(classification.anomalies);

    for anomaly in &anomalies {
        warn!(%anomaly, stage = %classification.stage, "anomalous run directory");
    }
    debug!(stage = %classification.stage, ?facts, "run inspected");
    Ok(Inspection {
        stage: classification.stage,
        facts,
        anomalies,
    })
}

/// Read marker presence. A marker of the wrong file type counts as absent.
pub fn read_marker_facts(
    run_dir: &Path,
    vocab: &MarkerVocabulary,
) -> Result<(MarkerFacts, Vec<Anomaly>)> {
    let mut anomalies = Vec::new();
    let mut present = |name: &str, kind: Kind| -> Result<bool> {
        let path = run_dir.join(name);
        match path_kind(&path)? {
            None => Ok(false),
            Some(found) if found == kind => Ok(true),
            Some(_) => {
                anomalies.push(Anomaly::MarkerWrongKind {
                    marker: name.to_string(),
                });
                Ok(false)
            }
        }
    };

    let sequencing_complete = present(&vocab.sequencing_complete, Kind::File)?;
    let demux_dir_present = present(&vocab.demux_dir, Kind::Dir)?;
    let sample_sheet_present = present(&vocab.sample_sheet, Kind::File)?;
    let exit_status_present = present(&vocab.exit_status, Kind::File)?;

    let exit_status = if exit_status_present {
        let path = run_dir.join(&vocab.exit_status);
        let raw = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        Some(parse_exit_status(&String::from_utf8_lossy(&raw)))
    } else {
        None
    };

    Ok((
        MarkerFacts {
            sequencing_complete,
            demux_dir_present,
            sample_sheet_present,
            exit_status,
        },
        anomalies,
    ))
}

fn path_kind(path: &Path) -> Result<Option<Kind>> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(Some(Kind::Dir)),
        Ok(_) => Ok(Some(Kind::File)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("stat {}", path.display())),
    }
}
