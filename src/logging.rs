/*!
 * Logging setup for rxclaims binaries
 *
 * The library only emits `tracing` events: load summaries at `info`, the first
 * skipped records of each file at `warn`, per-file detail at `debug`. This
 * module installs the subscriber that renders them.
 */

use std::io;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::{Result, RxError};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-field output
    #[default]
    Pretty,
    /// Single-line output
    Compact,
    /// One JSON object per event
    Json,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level applied to rxclaims when `RUST_LOG` is not set
    pub level: Level,
    /// Output format
    pub format: LogFormat,
    /// Whether to include timestamps
    pub with_timestamps: bool,
    /// Whether to include the module path of each event
    pub with_target: bool,
    /// Whether to use ANSI colors
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::default(),
            with_timestamps: false,
            with_target: false,
            with_ansi: true,
        }
    }
}

impl LogConfig {
    /// Map `-v` counts and `--quiet` to a level.
    ///
    /// quiet: warn, 0: info, 1: debug, 2+: trace
    pub fn from_verbosity(verbosity: u8, quiet: bool) -> Self {
        let level = match (quiet, verbosity) {
            (true, _) => Level::WARN,
            (false, 0) => Level::INFO,
            (false, 1) => Level::DEBUG,
            (false, _) => Level::TRACE,
        };
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_timestamps(mut self, enable: bool) -> Self {
        self.with_timestamps = enable;
        self
    }

    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }

    /// The filter used when `RUST_LOG` is unset
    pub fn default_directive(&self) -> String {
        let level = self.level.as_str().to_lowercase();
        format!("warn,rxclaims={level},rxcli={level}")
    }
}

/// Install the global subscriber writing to stderr
pub fn init_logging(config: &LogConfig) -> Result<()> {
    init_logging_with_writer(config, io::stderr)
}

/// Install the global subscriber with a custom writer.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging_with_writer<W>(config: &LogConfig, writer: W) -> Result<()>
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let registry = tracing_subscriber::registry().with(filter);

    let installed = match (config.format, config.with_timestamps) {
        (LogFormat::Json, _) => registry
            .with(fmt::layer().json().with_writer(writer).with_target(config.with_target))
            .try_init(),
        (LogFormat::Compact, true) => registry
            .with(fmt::layer().compact().with_writer(writer)
                .with_ansi(config.with_ansi).with_target(config.with_target))
            .try_init(),
        (LogFormat::Compact, false) => registry
            .with(fmt::layer().compact().without_time().with_writer(writer)
                .with_ansi(config.with_ansi).with_target(config.with_target))
            .try_init(),
        (LogFormat::Pretty, true) => registry
            .with(fmt::layer().with_writer(writer)
                .with_ansi(config.with_ansi).with_target(config.with_target))
            .try_init(),
        (LogFormat::Pretty, false) => registry
            .with(fmt::layer().without_time().with_writer(writer)
                .with_ansi(config.with_ansi).with_target(config.with_target))
            .try_init(),
    };

    installed.map_err(|e| RxError::Custom {
        message: format!("Failed to initialize logging: {}", e),
        suggestion: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(LogConfig::from_verbosity(0, false).level, Level::INFO);
        assert_eq!(LogConfig::from_verbosity(1, false).level, Level::DEBUG);
        assert_eq!(LogConfig::from_verbosity(3, false).level, Level::TRACE);
        assert_eq!(LogConfig::from_verbosity(2, true).level, Level::WARN);
    }

    #[test]
    fn test_default_directive_scopes_crate() {
        let config = LogConfig::from_verbosity(1, false);
        assert_eq!(config.default_directive(), "warn,rxclaims=debug,rxcli=debug");
    }
}
