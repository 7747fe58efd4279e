//! Append-only metric storage shared by every virtual user.
//!
//! Metrics are registered up front, before any virtual user is spawned. Once the registry is
//! frozen behind an `Arc` writers only ever touch atomics or push onto a lock-free bucket, so
//! recording never waits on a reader.
use metrics_util::AtomicBucket;
use stampede_core::{
    ConfigError, CounterSummary, GaugeSummary, MetricKind, MetricSummary, MetricsSnapshot,
    RateSummary, TrendSummary, CHECKS, HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED,
    ITERATIONS, ITERATION_DURATION, VUS,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fraction of boolean outcomes that were `true`.
pub struct Rate {
    trues: AtomicU64,
    total: AtomicU64,
    #[cfg(feature = "metrics")]
    mirror: (metrics::Counter, metrics::Counter),
}

impl Rate {
    fn new(_name: &str) -> Self {
        Self {
            trues: AtomicU64::new(0),
            total: AtomicU64::new(0),
            #[cfg(feature = "metrics")]
            mirror: (
                metrics::counter!(_name.to_string(), "outcome" => "true"),
                metrics::counter!(_name.to_string(), "outcome" => "false"),
            ),
        }
    }

    pub fn add(&self, value: bool) {
        if value {
            self.trues.fetch_add(1, Ordering::Relaxed);
        }
        self.total.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        {
            let mirror = if value { &self.mirror.0 } else { &self.mirror.1 };
            mirror.increment(1);
        }
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    fn summarize(&self) -> RateSummary {
        RateSummary::new(
            self.trues.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
        )
    }
}

/// Distribution of durations, kept in milliseconds.
pub struct Trend {
    values: AtomicBucket<f64>,
    #[cfg(feature = "metrics")]
    mirror: metrics::Histogram,
}

impl Trend {
    fn new(_name: &str) -> Self {
        #[cfg(feature = "metrics")]
        metrics::describe_histogram!(_name.to_string(), metrics::Unit::Milliseconds, "");

        Self {
            values: AtomicBucket::new(),
            #[cfg(feature = "metrics")]
            mirror: metrics::histogram!(_name.to_string()),
        }
    }

    pub fn add(&self, duration: Duration) {
        let ms = duration.as_nanos() as f64 / 1_000_000.;
        self.values.push(ms);

        #[cfg(feature = "metrics")]
        self.mirror.record(ms);
    }

    pub fn count(&self) -> usize {
        let mut count = 0;
        self.values.data_with(|block| count += block.len());
        count
    }

    fn summarize(&self) -> TrendSummary {
        TrendSummary::from_samples(self.values.data())
    }
}

pub struct Counter {
    count: AtomicU64,
    #[cfg(feature = "metrics")]
    mirror: metrics::Counter,
}

impl Counter {
    fn new(_name: &str) -> Self {
        Self {
            count: AtomicU64::new(0),
            #[cfg(feature = "metrics")]
            mirror: metrics::counter!(_name.to_string()),
        }
    }

    pub fn add(&self, n: u64) {
        self.count.fetch_add(n, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        self.mirror.increment(n);
    }

    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn summarize(&self, elapsed: Duration) -> CounterSummary {
        let count = self.get();
        let secs = elapsed.as_secs_f64();
        CounterSummary {
            count,
            rate: if secs > 0. { count as f64 / secs } else { 0. },
        }
    }
}

/// Last written value plus the extremes it has taken.
pub struct Gauge {
    value: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
    #[cfg(feature = "metrics")]
    mirror: metrics::Gauge,
}

impl Gauge {
    fn new(_name: &str) -> Self {
        Self {
            value: AtomicU64::new(0),
            min: AtomicU64::new(u64::MAX),
            max: AtomicU64::new(0),
            #[cfg(feature = "metrics")]
            mirror: metrics::gauge!(_name.to_string()),
        }
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
        self.min.fetch_min(value, Ordering::Relaxed);
        self.max.fetch_max(value, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        self.mirror.set(value as f64);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    fn summarize(&self) -> GaugeSummary {
        let min = self.min.load(Ordering::Relaxed);
        GaugeSummary {
            value: self.get(),
            min: if min == u64::MAX { 0 } else { min },
            max: self.max.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone)]
pub enum Metric {
    Trend(Arc<Trend>),
    Rate(Arc<Rate>),
    Counter(Arc<Counter>),
    Gauge(Arc<Gauge>),
}

impl Metric {
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Trend(_) => MetricKind::Trend,
            Metric::Rate(_) => MetricKind::Rate,
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Gauge(_) => MetricKind::Gauge,
        }
    }

    fn summarize(&self, elapsed: Duration) -> MetricSummary {
        match self {
            Metric::Trend(t) => MetricSummary::Trend(t.summarize()),
            Metric::Rate(r) => MetricSummary::Rate(r.summarize()),
            Metric::Counter(c) => MetricSummary::Counter(c.summarize(elapsed)),
            Metric::Gauge(g) => MetricSummary::Gauge(g.summarize()),
        }
    }
}

/// Named metrics of a run.
///
/// Registration needs `&mut self`; once the run starts the registry is only shared immutably and
/// every write goes through the `Arc` handles returned at registration.
#[derive(Default)]
pub struct MetricRegistry {
    metrics: BTreeMap<String, Metric>,
}

macro_rules! register_fn {
    ($fn_name:ident, $variant:ident, $ty:ident) => {
        /// Returns the existing metric of that name, or registers a new one.
        pub fn $fn_name(&mut self, name: &str) -> Result<Arc<$ty>, ConfigError> {
            let metric = self
                .metrics
                .entry(name.to_string())
                .or_insert_with(|| Metric::$variant(Arc::new($ty::new(name))));

            match metric {
                Metric::$variant(inner) => Ok(inner.clone()),
                other => Err(ConfigError::MetricKindConflict {
                    metric: name.to_string(),
                    existing: other.kind(),
                    requested: MetricKind::$variant,
                }),
            }
        }
    };
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    register_fn!(trend, Trend, Trend);
    register_fn!(rate, Rate, Rate);
    register_fn!(counter, Counter, Counter);
    register_fn!(gauge, Gauge, Gauge);

    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    pub fn kind(&self, name: &str) -> Option<MetricKind> {
        self.metrics.get(name).map(Metric::kind)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    /// Aggregates of every registered metric. `elapsed` scales counter rates.
    pub fn snapshot(&self, elapsed: Duration) -> MetricsSnapshot {
        self.metrics
            .iter()
            .map(|(name, metric)| (name.clone(), metric.summarize(elapsed)))
            .collect()
    }
}

/// Handles to the metrics recorded for every run regardless of scenario.
#[derive(Clone)]
pub struct BuiltinMetrics {
    pub http_req_duration: Arc<Trend>,
    pub http_req_failed: Arc<Rate>,
    pub http_reqs: Arc<Counter>,
    pub checks: Arc<Rate>,
    pub iterations: Arc<Counter>,
    pub iteration_duration: Arc<Trend>,
    pub vus: Arc<Gauge>,
}

impl BuiltinMetrics {
    pub fn register(registry: &mut MetricRegistry) -> Result<Self, ConfigError> {
        Ok(Self {
            http_req_duration: registry.trend(HTTP_REQ_DURATION)?,
            http_req_failed: registry.rate(HTTP_REQ_FAILED)?,
            http_reqs: registry.counter(HTTP_REQS)?,
            checks: registry.rate(CHECKS)?,
            iterations: registry.counter(ITERATIONS)?,
            iteration_duration: registry.trend(ITERATION_DURATION)?,
            vus: registry.gauge(VUS)?,
        })
    }
}
