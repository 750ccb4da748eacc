//! Logging configuration.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable selecting the log filter (falls back to `RUST_LOG`).
pub const ENV_LOG: &str = "SQLWRAP_LOG";

/// Environment variable selecting the log format (`pretty` or `json`).
pub const ENV_LOG_FORMAT: &str = "SQLWRAP_LOG_FORMAT";

/// Environment variable naming a log file.
pub const ENV_LOG_FILE: &str = "SQLWRAP_LOG_FILE";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, defaulting to [`LogFormat::Pretty`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directives.
    pub filter: String,
    /// Append to this file instead of writing to stderr.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds the configuration from `SQLWRAP_LOG*` variables.
    ///
    /// `verbose` raises the default level from `warn` to `debug`.
    #[must_use]
    pub fn from_env(verbose: bool) -> Self {
        Self::from_lookup(verbose, |key| std::env::var(key).ok())
    }

    /// Builds the configuration from variables looked up through `lookup`.
    #[must_use]
    pub fn from_lookup(verbose: bool, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default_filter = if verbose { "sqlwrap=debug,info" } else { "warn" };
        Self {
            format: lookup(ENV_LOG_FORMAT)
                .map(|f| LogFormat::parse(&f))
                .unwrap_or_default(),
            filter: lookup(ENV_LOG)
                .or_else(|| lookup("RUST_LOG"))
                .filter(|f| !f.trim().is_empty())
                .unwrap_or_else(|| default_filter.to_string()),
            file: lookup(ENV_LOG_FILE)
                .filter(|f| !f.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Builds the `EnvFilter`, falling back to `warn` for invalid directives.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::from_lookup(false, |_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.filter, "warn");
        assert!(config.file.is_none());
        assert_eq!(
            LoggingConfig::from_lookup(true, |_| None).filter,
            "sqlwrap=debug,info"
        );
    }

    #[test]
    fn test_lookup_overrides() {
        let config = LoggingConfig::from_lookup(true, |key| match key {
            ENV_LOG_FORMAT => Some("JSON".to_string()),
            "RUST_LOG" => Some("trace".to_string()),
            ENV_LOG_FILE => Some("/tmp/sqlwrap.log".to_string()),
            _ => None,
        });
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter, "trace");
        assert_eq!(config.file, Some(PathBuf::from("/tmp/sqlwrap.log")));
    }

    #[test]
    fn test_sqlwrap_log_wins_over_rust_log() {
        let config = LoggingConfig::from_lookup(false, |key| match key {
            ENV_LOG => Some("sqlwrap=trace".to_string()),
            "RUST_LOG" => Some("info".to_string()),
            _ => None,
        });
        assert_eq!(config.filter, "sqlwrap=trace");
    }
}
