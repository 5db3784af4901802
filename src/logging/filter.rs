//! Applies level overrides to plain `tracing` events.
//!
//! A callsite's target (`my_crate::db::pool`) is treated as the namespace
//! `["my_crate", "db", "pool"]`, so `LOG_LEVEL_MY_CRATE_DB=DEBUG` enables
//! debug events from that module tree.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::level_filters::LevelFilter;
use tracing::subscriber::Interest;
use tracing::Metadata;
use tracing_subscriber::layer::{Context, Filter};

use crate::logging::level::Level;
use crate::logging::resolver::{LevelResolver, NamespacePath};
use crate::logging::sink::SINK_TARGET;

/// Per-layer filter backed by a [`LevelResolver`].
#[derive(Debug, Clone)]
pub struct NamespaceFilter {
    resolver: Arc<LevelResolver>,
    /// Resolved level per target.
    cache: Arc<DashMap<String, Level>>,
}

impl NamespaceFilter {
    pub fn new(resolver: Arc<LevelResolver>) -> Self {
        Self {
            resolver,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Whether an event at `level` from `target` passes.
    pub fn allows(&self, target: &str, level: &tracing::Level) -> bool {
        // Sink records were gated by their logger already.
        if target == SINK_TARGET {
            return true;
        }
        let Some(level) = Level::from_tracing(level) else {
            return false;
        };
        level >= self.level_for(target)
    }

    fn level_for(&self, target: &str) -> Level {
        if let Some(level) = self.cache.get(target) {
            return *level;
        }
        let level = self.resolver.resolve(&NamespacePath::from_target(target));
        self.cache.insert(target.to_string(), level);
        level
    }
}

impl<S> Filter<S> for NamespaceFilter {
    fn enabled(&self, meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        self.allows(meta.target(), meta.level())
    }

    fn callsite_enabled(&self, meta: &'static Metadata<'static>) -> Interest {
        // The override table never changes, so the answer can be cached.
        if self.allows(meta.target(), meta.level()) {
            Interest::always()
        } else {
            Interest::never()
        }
    }

    fn max_level_hint(&self) -> Option<LevelFilter> {
        Some(LevelFilter::from_level(
            self.resolver.lowest_level().as_tracing(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(entries: &[(&str, &str)]) -> NamespaceFilter {
        NamespaceFilter::new(Arc::new(LevelResolver::from_entries(
            entries.iter().copied(),
        )))
    }

    #[test]
    fn test_default_info() {
        let f = filter(&[]);
        assert!(f.allows("my_crate::db", &tracing::Level::INFO));
        assert!(!f.allows("my_crate::db", &tracing::Level::DEBUG));
        assert!(!f.allows("my_crate::db", &tracing::Level::TRACE));
    }

    #[test]
    fn test_target_overrides() {
        let f = filter(&[("LOG_LEVEL_MY_CRATE_DB", "DEBUG"), ("LOG_LEVEL_HYPER", "ERROR")]);
        assert!(f.allows("my_crate::db::pool", &tracing::Level::DEBUG));
        assert!(!f.allows("my_crate::http", &tracing::Level::DEBUG));
        assert!(!f.allows("hyper::proto", &tracing::Level::WARN));
        assert!(f.allows("hyper::proto", &tracing::Level::ERROR));
    }

    #[test]
    fn test_sink_target_passes() {
        let f = filter(&[("LOG_LEVEL", "ERROR")]);
        assert!(f.allows(SINK_TARGET, &tracing::Level::DEBUG));
    }

    #[test]
    fn test_cache_is_consistent() {
        let f = filter(&[("LOG_LEVEL_APP", "WARN")]);
        assert!(!f.allows("app", &tracing::Level::INFO));
        assert!(!f.allows("app", &tracing::Level::INFO));
        assert!(f.allows("app", &tracing::Level::WARN));
        assert_eq!(f.cache.len(), 1);
    }

    #[test]
    fn test_max_level_hint() {
        let f = filter(&[("LOG_LEVEL_APP", "DEBUG")]);
        assert_eq!(
            <NamespaceFilter as Filter<tracing_subscriber::Registry>>::max_level_hint(&f),
            Some(LevelFilter::DEBUG)
        );
    }
}
