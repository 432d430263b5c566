//! Tracing setup for the command-line interface.

use tracing_subscriber::EnvFilter;

/// Filter used by `--debug`.
const DEBUG_FILTER: &str = "etl_config=debug,etl_config_cli=debug";

/// Build the log filter: `--debug` wins, then `RUST_LOG`, then warnings only.
pub fn filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new(DEBUG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays
/// machine-readable.
pub fn init(debug: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(debug))
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();
}
