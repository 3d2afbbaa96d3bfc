use anyhow::Result;
use clap::ValueEnum;
use fincrm_core::tracing::{InstrumentationConfig, init_tracing};
use tracing::Level;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}

/// Initialize logging for the CLI
///
/// Output goes to stderr so command results on stdout stay machine readable.
pub fn init_logging(log_level: Level, json: bool) -> Result<()> {
    let level = log_level.as_str().to_lowercase();
    let config = InstrumentationConfig {
        service_name: "fincrm-cli".to_string(),
        json,
        ..InstrumentationConfig::default()
    }
    .with_log_level(format!("fincrm={level},fincrm_core={level},fincrm_http={level}"));

    init_tracing(&config)
}
