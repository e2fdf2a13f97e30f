use tracing::metadata::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Level selected by the `-v` count; `None` defers to the config file
fn level_from_verbosity(verbosity: u8) -> Option<LevelFilter> {
    match verbosity {
        0 => None,
        1 => Some(LevelFilter::INFO),
        2 => Some(LevelFilter::DEBUG),
        _ => Some(LevelFilter::TRACE),
    }
}

/// Build the log filter: RUST_LOG wins, then `-v`, then the configured level.
pub fn log_filter(verbosity: u8, configured: &str) -> EnvFilter {
    let default = level_from_verbosity(verbosity)
        .unwrap_or_else(|| configured.parse().unwrap_or(LevelFilter::WARN));
    EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy()
}

/// Install the stderr fmt subscriber. A second call is a no-op.
pub fn init_logging(verbosity: u8, configured: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbosity, configured))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}
