//! Logging infrastructure for Glyco.
//!
//! Logs go to stderr so command output on stdout stays clean.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging at WARN, overridable with `RUST_LOG`
///
/// Engine fallbacks and suppressed doses log at WARN, so they show by default.
pub fn init() {
    init_with_level("warn")
}

/// Initialize logging with a specific default level
///
/// # Arguments
/// * `default_level` - Default filter directive (e.g. `debug`, `glyco_core=info`)
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();
}

/// Initialize logging for testing (captures logs for test output)
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("glyco_core=debug"))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_test();
        init_test();
        init_with_level("info");
        tracing::debug!("logging initialized");
    }
}
