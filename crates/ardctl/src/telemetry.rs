//! Log setup for the CLI. Logs go to stderr so command output stays clean.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Filter from a configured level, falling back to `info` when it doesn't parse.
fn filter_for(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| EnvFilter::default().add_directive(tracing::Level::INFO.into()))
}
