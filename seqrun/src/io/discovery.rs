//! Enumerate run directories under configured data dirs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, trace};

use crate::core::types::Run;
use crate::io::config::InstrumentConfig;

/// Directory filter applied to each data dir.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryFilter<'a> {
    /// Archive directory name; never treated as a run.
    pub archive_dir: &'a str,
    pub run_name_pattern: Option<&'a Regex>,
}

/// List candidate run directories directly under `data_dir`, sorted by name.
pub fn find_run_dirs(data_dir: &Path, filter: DiscoveryFilter<'_>) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in
        fs::read_dir(data_dir).with_context(|| format!("read data dir {}", data_dir.display()))?
    {
        let entry = entry.with_context(|| format!("read entry in {}", data_dir.display()))?;
        let path = entry.path();
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            trace!(path = %path.display(), "skipping non-utf8 entry");
            continue;
        };
        if name == filter.archive_dir || !path.is_dir() {
            continue;
        }
        if let Some(pattern) = filter.run_name_pattern
            && !pattern.is_match(name)
        {
            trace!(name, "skipping directory not matching run_name_pattern");
            continue;
        }
        found.push(path);
    }
    found.sort();
    debug!(data_dir = %data_dir.display(), count = found.len(), "run directories found");
    Ok(found)
}

/// Runs of one instrument in one data dir.
pub fn discover_in(
    instrument: &InstrumentConfig,
    data_dir: &Path,
    filter: DiscoveryFilter<'_>,
) -> Result<Vec<Run>> {
    Ok(find_run_dirs(data_dir, filter)?
        .into_iter()
        .filter_map(|path| Run::new(path, instrument.class))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(pattern: Option<&Regex>) -> DiscoveryFilter<'_> {
        DiscoveryFilter {
            archive_dir: "nosync",
            run_name_pattern: pattern,
        }
    }

    #[test]
    fn skips_archive_dir_and_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir(root.join("run-b")).expect("run b");
        fs::create_dir(root.join("run-a")).expect("run a");
        fs::create_dir(root.join("nosync")).expect("nosync");
        fs::create_dir(root.join("nosync").join("run-old")).expect("archived");
        fs::write(root.join("transfer.tsv"), "").expect("ledger");

        let found = find_run_dirs(root, filter(None)).expect("find");
        assert_eq!(found, vec![root.join("run-a"), root.join("run-b")]);
    }

    #[test]
    fn applies_run_name_pattern() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir(root.join("20240716_AV242106_testrun")).expect("run");
        fs::create_dir(root.join("scratch")).expect("scratch");
        let pattern = Regex::new(r"^\d{8}_").expect("regex");

        let found = find_run_dirs(root, filter(Some(&pattern))).expect("find");
        assert_eq!(found, vec![root.join("20240716_AV242106_testrun")]);
    }

    #[test]
    fn missing_data_dir_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = find_run_dirs(&temp.path().join("absent"), filter(None)).unwrap_err();
        assert!(err.to_string().contains("read data dir"));
    }
}
