//! Hierarchical log level resolution.
//!
//! Operators tune verbosity per subsystem with keys like
//!
//! ```text
//! LOG_LEVEL=WARN                  root, applies to every namespace
//! LOG_LEVEL_SERVICE=ERROR         namespace ["service"] and its children
//! LOG_LEVEL_SERVICE_API=DEBUG     namespace ["service", "api"] and its children
//! ```
//!
//! Resolution walks from the full namespace towards the root and returns the
//! first configured level, so the most specific override wins. Without any
//! match the level is [`Level::DEFAULT`].

use std::collections::HashMap;
use std::fmt;

use crate::config::ConfigSource;
use crate::logging::level::Level;

/// Key prefix for level overrides.
pub const LOG_LEVEL_PREFIX: &str = "LOG_LEVEL";

const SEPARATOR: &str = "_";

/// A logical subsystem name such as `["service", "api", "v1"]`.
///
/// Segments may carry their own separators (`"com.example"`); lookups split
/// them so `["com.example"]` and `["com", "example"]` are the same namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct NamespacePath {
    segments: Vec<String>,
}

impl NamespacePath {
    /// The empty path; only the root override applies to it.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(|s| s.as_ref().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Namespace of a `tracing` target (`my_crate::http::server`).
    pub fn from_target(target: &str) -> Self {
        Self::new(target.split("::"))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Segments as used for lookups: split on every non-alphanumeric
    /// character and upper-cased.
    pub fn canonical(&self) -> Vec<String> {
        self.segments
            .iter()
            .flat_map(|segment| split_canonical(segment))
            .collect()
    }

    /// Full override key for this namespace, e.g. `LOG_LEVEL_SERVICE_API`.
    pub fn config_key(&self) -> String {
        let canonical = self.canonical();
        if canonical.is_empty() {
            LOG_LEVEL_PREFIX.to_string()
        } else {
            format!("{}{}{}", LOG_LEVEL_PREFIX, SEPARATOR, canonical.join(SEPARATOR))
        }
    }
}

impl fmt::Display for NamespacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl From<&[&str]> for NamespacePath {
    fn from(segments: &[&str]) -> Self {
        Self::new(segments.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for NamespacePath {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

fn split_canonical(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_uppercase)
}

/// Maps namespaces to their effective level.
///
/// The override table is built once and never mutated, so a resolver can be
/// shared across threads without synchronization.
#[derive(Debug, Clone, Default)]
pub struct LevelResolver {
    /// Normalized namespace key (`""` for root) → level.
    overrides: HashMap<String, Level>,
}

impl LevelResolver {
    /// Collect every `LOG_LEVEL[_*]` key from a configuration source.
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        Self::from_entries(source.entries())
    }

    /// Build from raw key/value pairs. Unrelated keys and unrecognized level
    /// names are ignored.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut overrides = HashMap::new();
        for (key, value) in entries {
            let Some(namespace) = override_namespace(key.as_ref()) else {
                continue;
            };
            if let Some(level) = Level::parse(value.as_ref()) {
                overrides.insert(namespace, level);
            }
        }
        Self { overrides }
    }

    /// Effective level for a namespace. Never fails.
    pub fn resolve(&self, path: &NamespacePath) -> Level {
        let canonical = path.canonical();
        (0..=canonical.len())
            .rev()
            .find_map(|len| self.overrides.get(&canonical[..len].join(SEPARATOR)))
            .copied()
            .unwrap_or(Level::DEFAULT)
    }

    /// The most verbose level any namespace can resolve to.
    pub fn lowest_level(&self) -> Level {
        let configured = self.overrides.values().min().copied();
        if self.overrides.contains_key("") {
            // Root is set, so the default is unreachable.
            configured.unwrap_or(Level::DEFAULT)
        } else {
            configured.map_or(Level::DEFAULT, |l| l.min(Level::DEFAULT))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// Active overrides keyed by normalized namespace (`""` for root).
    pub fn overrides(&self) -> impl Iterator<Item = (&str, Level)> {
        self.overrides.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Normalized namespace of an override key, or `None` if the key is not one.
fn override_namespace(key: &str) -> Option<String> {
    let key = key.to_ascii_uppercase();
    let rest = key.strip_prefix(LOG_LEVEL_PREFIX)?;
    if rest.is_empty() {
        return Some(String::new());
    }
    let rest = rest.strip_prefix(SEPARATOR)?;
    let parts: Vec<String> = split_canonical(rest).collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join(SEPARATOR))
}
