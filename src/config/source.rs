//! Environment-style configuration sources.
//!
//! Every setting is addressed by an upper-case, underscore separated key
//! (`HEALTH_SERVER_PORT`, `LOG_LEVEL_SERVICE_API`). Sources only answer string
//! lookups; typed parsing lives in `loader.rs`.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::loader::ConfigError;

/// A read-only lookup of environment-style keys.
pub trait ConfigSource: Send + Sync {
    /// Look up a single key. Empty values are reported as absent.
    fn get(&self, key: &str) -> Option<String>;

    /// All key/value pairs known to the source.
    ///
    /// Used where keys are discovered rather than known up front, such as the
    /// `LOG_LEVEL_*` override table.
    fn entries(&self) -> Vec<(String, String)>;
}

/// Process environment, captured once at construction.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    vars: BTreeMap<String, String>,
}

impl EnvSource {
    /// Snapshot the current process environment.
    pub fn new() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }
}

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        non_empty(self.vars.get(key))
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// In-memory source, mainly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    vars: BTreeMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ConfigSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        non_empty(self.vars.get(key))
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// A TOML document flattened into environment-style keys.
///
/// Nested tables are joined with `_` and upper-cased, so
///
/// ```toml
/// [otel.tracing]
/// sample_rate = 0.5
/// ```
///
/// becomes `OTEL_TRACING_SAMPLE_RATE=0.5`. Arrays are not supported and are
/// skipped.
#[derive(Debug, Clone, Default)]
pub struct TomlSource {
    vars: BTreeMap<String, String>,
}

impl TomlSource {
    /// Parse a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(content)?;
        let mut vars = BTreeMap::new();
        flatten(&mut vars, "", &table);
        Ok(Self { vars })
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

fn flatten(vars: &mut BTreeMap<String, String>, prefix: &str, table: &toml::Table) {
    for (key, value) in table {
        let name = if prefix.is_empty() {
            key.to_uppercase()
        } else {
            format!("{}_{}", prefix, key.to_uppercase())
        };

        match value {
            toml::Value::Table(inner) => flatten(vars, &name, inner),
            toml::Value::String(s) => {
                vars.insert(name, s.clone());
            }
            toml::Value::Integer(i) => {
                vars.insert(name, i.to_string());
            }
            toml::Value::Float(f) => {
                vars.insert(name, f.to_string());
            }
            toml::Value::Boolean(b) => {
                vars.insert(name, b.to_string());
            }
            toml::Value::Datetime(dt) => {
                vars.insert(name, dt.to_string());
            }
            toml::Value::Array(_) => {
                tracing::warn!(key = %name, "Ignoring array value in config file");
            }
        }
    }
}

impl ConfigSource for TomlSource {
    fn get(&self, key: &str) -> Option<String> {
        non_empty(self.vars.get(key))
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<T: ConfigSource + ?Sized> ConfigSource for Box<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn entries(&self) -> Vec<(String, String)> {
        (**self).entries()
    }
}

/// Sources consulted in order; the first one holding a key wins.
#[derive(Default)]
pub struct LayeredSource {
    layers: Vec<Box<dyn ConfigSource>>,
}

impl LayeredSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer with lower precedence than every layer added before it.
    pub fn push(mut self, source: impl ConfigSource + 'static) -> Self {
        self.layers.push(Box::new(source));
        self
    }
}

impl ConfigSource for LayeredSource {
    fn get(&self, key: &str) -> Option<String> {
        self.layers.iter().find_map(|layer| layer.get(key))
    }

    fn entries(&self) -> Vec<(String, String)> {
        let mut merged = BTreeMap::new();
        // Lowest precedence first so higher layers overwrite.
        for layer in self.layers.iter().rev() {
            for (k, v) in layer.entries() {
                if !v.is_empty() {
                    merged.insert(k, v);
                }
            }
        }
        merged.into_iter().collect()
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}
