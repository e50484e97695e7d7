//! Side-effecting operations: filesystem markers, ledger, processes, rsync.

pub mod archive;
pub mod config;
pub mod discovery;
pub mod inspect;
pub mod launcher;
pub mod ledger;
pub mod notify;
pub mod process;
pub mod samplesheet;
pub mod transfer;
