//! Stable exit codes for seqrun CLI commands.

/// Command finished. Per-run failures during a pass are logged, not reflected here.
pub const OK: i32 = 0;
/// Invalid config or arguments, or a command that could not run at all.
pub const INVALID: i32 = 1;
