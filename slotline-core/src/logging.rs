//! Tracing bootstrap for the `slotline` binary.
//!
//! Logs go to stderr so command output on stdout (including `--json`) stays
//! machine-readable.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

use crate::errors::{Result, SlotlineError};

/// Variable read when `RUST_LOG` is unset.
pub const LOG_ENV: &str = "SLOTLINE_LOG";

// HTTP and websocket plumbing is noisy at debug level
const QUIET_DEPENDENCIES: &[&str] = &[
    "hyper=warn",
    "reqwest=warn",
    "tungstenite=warn",
    "tokio_tungstenite=warn",
];

/// Filter directives for a plain level such as `debug`; anything containing
/// a target or a comma is taken as a full directive string.
pub fn default_directives(level: &str) -> String {
    let level = level.trim();
    if level.is_empty() {
        return default_directives("info");
    }
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }
    let mut directives = vec![level.to_string()];
    directives.extend(QUIET_DEPENDENCIES.iter().map(|d| d.to_string()));
    directives.join(",")
}

/// Installs the fmt subscriber. `RUST_LOG` wins, then `SLOTLINE_LOG`, then `level`.
pub fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(LOG_ENV))
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level.unwrap_or("info"))));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .try_init()
        .map_err(|err| SlotlineError::GeneralError(err.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_levels_quiet_transport_crates() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("reqwest=warn"));
        assert!(directives.contains("tokio_tungstenite=warn"));
        assert_eq!(default_directives("  "), default_directives("info"));
    }

    #[test]
    fn full_directives_pass_through() {
        assert_eq!(default_directives("slotline_sync=trace"), "slotline_sync=trace");
        assert_eq!(default_directives("warn,slotline_engine=debug"), "warn,slotline_engine=debug");
    }
}
