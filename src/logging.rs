//! Logging setup
//!
//! Installs a `tracing` fmt subscriber filtered by `RUST_LOG`. When the
//! variable is unset the given directive is used, and the HTTP stack under
//! the transport is kept at `error` so transfer chatter stays out of the log.

use crate::error::{MirrorError, Result};
use tracing_subscriber::EnvFilter;

/// Directive used when the caller has no preference
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Crates whose logs are capped at `error`
const QUIET_CRATES: [&str; 3] = ["reqwest", "hyper", "rustls"];

/// Build the filter: `RUST_LOG` if set, otherwise `default_directive` plus
/// the quiet-crate caps.
pub fn build_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_directives(default_directive)))
}

fn fallback_directives(default_directive: &str) -> String {
    let mut directives = vec![default_directive.to_string()];
    directives.extend(QUIET_CRATES.iter().map(|c| format!("{}=error", c)));
    directives.join(",")
}

/// Initialize the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(default_directive: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(default_directive))
        .with_target(true)
        .try_init()
        .map_err(|e| MirrorError::config(format!("Failed to install logger: {}", e)))
}
