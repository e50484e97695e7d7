//! Sequencing-run lifecycle automation.
//!
//! Each run directory written by an instrument is moved through
//! sequencing, analysis, transfer and archival by repeated, stateless passes.
//! The stage of a run is always re-derived from marker files on disk; the only
//! persistent bookkeeping is a per-data-dir transfer ledger.
//!
//! - **[`core`]**: Pure logic (instrument vocabularies, stage classification).
//!   No I/O.
//! - **[`io`]**: Side effects (marker inspection, discovery, ledger, process
//!   launch, rsync, archival). External actions sit behind traits so the
//!   driver can be tested without spawning anything.
//!
//! [`advance`] moves one run by one step; [`pass`] applies it to every run
//! under every configured data dir.

pub mod advance;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pass;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
