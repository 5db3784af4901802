//! Log sampling.
//!
//! Events are counted per level and message in one-second windows; records
//! written through a [`Logger`](crate::logging::Logger) are additionally keyed
//! by logger name, plain events by target. The first `initial` events of a
//! window pass, after that every `thereafter`-th one does.
//!
//! Counters live in a fixed table indexed by the key's hash. Colliding keys
//! share a budget. Each output layer owns its own [`SamplingFilter`], so an
//! event is counted once per output that would write it.

use std::collections::hash_map::DefaultHasher;
use std::fmt::{self, Write as _};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::subscriber::Interest;
use tracing::{Event, Metadata};
use tracing_subscriber::layer::{Context, Filter};

use crate::config::LogSamplingConfig;

const TICK: Duration = Duration::from_secs(1);
const COUNTERS: usize = 4096;

#[derive(Default)]
struct Counter {
    /// Nanoseconds since the sampler started at which the window ends.
    reset_at: AtomicU64,
    count: AtomicU64,
}

impl Counter {
    /// Count one event at `now` and return its position in the window.
    fn increment(&self, now: u64) -> u64 {
        let reset_at = self.reset_at.load(Ordering::Acquire);
        if reset_at > now {
            return self.count.fetch_add(1, Ordering::AcqRel) + 1;
        }

        self.count.store(1, Ordering::Release);
        let next = now.saturating_add(TICK.as_nanos() as u64);
        if self
            .reset_at
            .compare_exchange(reset_at, next, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Another thread opened the window first.
            return self.count.fetch_add(1, Ordering::AcqRel) + 1;
        }
        1
    }
}

struct Sampler {
    initial: u64,
    thereafter: u64,
    started: Instant,
    counters: Box<[Counter]>,
}

/// Per-layer filter that drops repeated events once a window's budget is
/// spent. `initial = 0` lets everything through.
pub struct SamplingFilter {
    sampler: Option<Sampler>,
}

impl fmt::Debug for SamplingFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("SamplingFilter");
        if let Some(sampler) = &self.sampler {
            out.field("initial", &sampler.initial)
                .field("thereafter", &sampler.thereafter);
        }
        out.finish()
    }
}

impl SamplingFilter {
    pub fn new(config: LogSamplingConfig) -> Self {
        let sampler = config.is_enabled().then(|| Sampler {
            initial: config.initial,
            thereafter: config.thereafter,
            started: Instant::now(),
            counters: (0..COUNTERS).map(|_| Counter::default()).collect(),
        });
        Self { sampler }
    }

    /// Whether the event hashed to `key` passes at `elapsed` since start.
    fn sample(&self, key: u64, elapsed: Duration) -> bool {
        let Some(sampler) = &self.sampler else {
            return true;
        };
        let counter = &sampler.counters[(key % COUNTERS as u64) as usize];
        let n = counter.increment(elapsed.as_nanos() as u64);
        if n <= sampler.initial {
            return true;
        }
        sampler.thereafter > 0 && (n - sampler.initial) % sampler.thereafter == 0
    }
}

impl<S> Filter<S> for SamplingFilter {
    fn enabled(&self, _meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        true
    }

    fn callsite_enabled(&self, _meta: &'static Metadata<'static>) -> Interest {
        Interest::always()
    }

    fn event_enabled(&self, event: &Event<'_>, _cx: &Context<'_, S>) -> bool {
        let Some(sampler) = &self.sampler else {
            return true;
        };
        let meta = event.metadata();
        let mut key = KeyVisitor::new(meta.level(), meta.target());
        event.record(&mut key);
        self.sample(key.finish(), sampler.started.elapsed())
    }

    fn max_level_hint(&self) -> Option<LevelFilter> {
        Some(LevelFilter::TRACE)
    }
}

/// Hashes level, target, `logger` and `message` without allocating.
struct KeyVisitor {
    hasher: DefaultHasher,
}

impl KeyVisitor {
    fn new(level: &tracing::Level, target: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        level.hash(&mut hasher);
        target.hash(&mut hasher);
        Self { hasher }
    }

    fn finish(self) -> u64 {
        self.hasher.finish()
    }
}

impl Visit for KeyVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if matches!(field.name(), "message" | "logger") {
            field.name().hash(&mut self.hasher);
            value.hash(&mut self.hasher);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            field.name().hash(&mut self.hasher);
            let _ = write!(HashWriter(&mut self.hasher), "{:?}", value);
        }
    }
}

struct HashWriter<'a>(&'a mut DefaultHasher);

impl fmt::Write for HashWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write(s.as_bytes());
        Ok(())
    }
}
