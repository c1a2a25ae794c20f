//! Development-time tracing.
//!
//! Tracing is diagnostics only: `RUST_LOG` controls it and it goes to stderr.
//! Step transcripts written by `docagent replay` (`io/transcript`) are product
//! output and do not depend on it.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`. Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=docagent=debug docagent replay --root docs --script run.txt --flow answer
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
