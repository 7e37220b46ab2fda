//! Tracing setup, trimmed down from `infra-common::logging::setup` to what a
//! two-crate workspace needs -- no JSON/span toggles the spec never asks
//! for, just a level and whether to print file/line info.

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file_info: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_info: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_file_info(mut self, file_info: bool) -> Self {
        self.file_info = file_info;
        self
    }
}

/// Installs a global `tracing` subscriber. Safe to call once per process;
/// a second call is a no-op error that callers may ignore.
pub fn init_tracing(config: LoggingConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let _ = subscriber.try_init();
}
