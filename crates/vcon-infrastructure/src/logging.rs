//! Logging bootstrap.
//!
//! Everything goes to stderr: stdout carries the MCP stdio transport and
//! must stay clean. The filter comes from `RUST_LOG`, falling back to the
//! given default directive.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber. Safe to call once.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
