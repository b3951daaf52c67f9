//! Diagnostic tracing for installer runs.
//!
//! Tracing output is for whoever is debugging a run: it goes to stderr, is
//! filtered by `RUST_LOG`, and is never persisted. The durable record of a run
//! is the step ledger (`io/ledger`, `install-state.json`), which is written
//! regardless of the log filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or unparsable.
const DEFAULT_FILTER: &str = "warn";

/// Install the global subscriber (compact format, stderr).
///
/// Stage spans carry the workspace and dry-run flag, so
/// `RUST_LOG=installer=debug installer install --dry-run` shows every ledger
/// write and skipped command. A second call is a no-op.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}
