//! Diagnostic output
//!
//! Logs go to stderr so stdout carries only readings.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `quiet` disables all diagnostics;
/// otherwise `RUST_LOG` applies, defaulting to `info`.
pub fn init(quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
