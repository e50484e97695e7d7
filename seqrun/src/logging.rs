//! Process-wide tracing setup.
//!
//! Everything seqrun reports (run outcomes, operator notifications, pass
//! summaries) goes through `tracing` to stderr. Stdout is reserved for command
//! output such as `seqrun inspect --json`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when neither `RUST_LOG` nor `--log-level` is given.
pub const DEFAULT_LEVEL: &str = "info";

/// Initialize the global subscriber.
///
/// `RUST_LOG` wins over `cli_level`, which wins over [`DEFAULT_LEVEL`].
///
/// # Example
/// ```bash
/// RUST_LOG=seqrun=debug seqrun process
/// ```
pub fn init(cli_level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli_level.unwrap_or(DEFAULT_LEVEL)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
