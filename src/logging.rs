//! Process wide log subscriber. `log` records from every crate end up in the
//! `tracing-subscriber` fmt layer.

use tracing_subscriber::EnvFilter;

use config::Logging;

/// Directive used when `RUST_LOG` is not set
pub fn default_directive(config: Option<&Logging>) -> String {
    config
        .map(|logging| logging.level.trim().to_lowercase())
        .filter(|level| !level.is_empty())
        .unwrap_or_else(|| "info".to_string())
}

/// Installs the subscriber once, later calls keep the first one
pub fn init(config: Option<&Logging>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    if let Err(e) = ::tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("Log subscriber is not installed: {}", e);
    }
}
