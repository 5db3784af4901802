//! Log severity levels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum severity a sink accepts. Ordered `Debug < Info < Warn < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    /// Effective level when no override applies.
    pub const DEFAULT: Level = Level::Info;

    /// Parse `DEBUG|INFO|WARN|ERROR`, case-insensitive. Anything else is `None`.
    pub fn parse(raw: &str) -> Option<Level> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Some(Level::Debug),
            "INFO" => Some(Level::Info),
            "WARN" => Some(Level::Warn),
            "ERROR" => Some(Level::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    /// Map a `tracing` level. TRACE has no counterpart.
    pub fn from_tracing(level: &tracing::Level) -> Option<Level> {
        match *level {
            tracing::Level::TRACE => None,
            tracing::Level::DEBUG => Some(Level::Debug),
            tracing::Level::INFO => Some(Level::Info),
            tracing::Level::WARN => Some(Level::Warn),
            tracing::Level::ERROR => Some(Level::Error),
        }
    }

    pub fn as_tracing(&self) -> tracing::Level {
        match self {
            Level::Debug => tracing::Level::DEBUG,
            Level::Info => tracing::Level::INFO,
            Level::Warn => tracing::Level::WARN,
            Level::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(Level::parse("debug"), Some(Level::Debug));
        assert_eq!(Level::parse("Warn"), Some(Level::Warn));
        assert_eq!(Level::parse(" ERROR "), Some(Level::Error));
        assert_eq!(Level::parse("verbose"), None);
        assert_eq!(Level::parse("warning"), None);
        assert_eq!(Level::parse(""), None);
    }

    #[test]
    fn test_tracing_mapping() {
        assert_eq!(Level::from_tracing(&tracing::Level::TRACE), None);
        assert_eq!(Level::from_tracing(&tracing::Level::WARN), Some(Level::Warn));
        assert_eq!(Level::Error.as_tracing(), tracing::Level::ERROR);
    }
}
