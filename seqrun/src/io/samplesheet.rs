//! Hook for generating missing sample sheets (e.g. from a LIMS).

use std::path::Path;

use anyhow::Result;

use crate::core::types::Run;

pub trait SampleSheetProvider {
    /// Try to write a sample sheet for `run` at `destination`.
    ///
    /// Returns `Ok(true)` only if a sheet was written. The driver re-inspects
    /// the run afterwards and does not trust the return value alone.
    fn provide(&self, run: &Run, destination: &Path) -> Result<bool>;
}

/// Provider for sites without a sample-tracking integration: never supplies a sheet.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSampleSheetProvider;

impl SampleSheetProvider for NoSampleSheetProvider {
    fn provide(&self, _run: &Run, _destination: &Path) -> Result<bool> {
        Ok(false)
    }
}
