//! Logger setup for the bridge and its driver.
//!
//! Everything logs through the `log` facade; this module only installs the
//! `env_logger` backend. `RUST_LOG`, when set, wins over the configured level.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum level written by the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }

    pub fn to_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "none" => Ok(LogLevel::Off),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Log configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum log level
    pub level: LogLevel,
    /// Prefix records with a timestamp
    pub timestamps: bool,
    /// Per-target overrides such as `wlframe::display=trace`
    pub filters: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            timestamps: true,
            filters: Vec::new(),
        }
    }
}

impl LogConfig {
    /// The `env_logger` filter string this configuration describes.
    pub fn filter_spec(&self) -> String {
        let mut spec = self.level.as_str().to_string();
        for filter in &self.filters {
            spec.push(',');
            spec.push_str(filter);
        }
        spec
    }
}

/// Install the global logger.
///
/// Returns `false` when a logger was already installed; the existing one is
/// left untouched.
pub fn init_logging(config: &LogConfig) -> bool {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.filter_spec()));
    if !config.timestamps {
        builder.format_timestamp(None);
    }
    builder.try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!("DEBUG".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Error.to_filter(), log::LevelFilter::Error);
    }

    #[test]
    fn test_filter_spec_appends_overrides() {
        let config = LogConfig {
            level: LogLevel::Warn,
            timestamps: false,
            filters: vec!["wlframe::display=trace".into()],
        };
        assert_eq!(config.filter_spec(), "warn,wlframe::display=trace");
        assert_eq!(LogConfig::default().filter_spec(), "info");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LogConfig::default();
        init_logging(&config);
        assert!(!init_logging(&config));
    }
}
