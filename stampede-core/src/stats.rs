use crate::{Aggregation, NoDataPolicy};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Trend,
    Rate,
    Counter,
    Gauge,
}

impl MetricKind {
    pub fn supports(&self, aggregation: Aggregation) -> bool {
        use Aggregation::*;
        match self {
            MetricKind::Trend => matches!(aggregation, Avg | Min | Max | Med | Percentile(_)),
            MetricKind::Rate => matches!(aggregation, Rate),
            MetricKind::Counter => matches!(aggregation, Count | Rate),
            MetricKind::Gauge => matches!(aggregation, Value | Min | Max),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Trend => write!(f, "trend"),
            MetricKind::Rate => write!(f, "rate"),
            MetricKind::Counter => write!(f, "counter"),
            MetricKind::Gauge => write!(f, "gauge"),
        }
    }
}

/// Distribution of durations, in milliseconds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub med: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    #[serde(skip)]
    sorted: Vec<f64>,
}

impl TrendSummary {
    pub fn from_samples(mut samples: Vec<f64>) -> Self {
        samples.retain(|v| v.is_finite());
        if samples.is_empty() {
            return Self::default();
        }
        samples.sort_by(f64::total_cmp);

        let pct = |q| percentile(&samples, q).unwrap_or_default();
        Self {
            count: samples.len() as u64,
            min: samples[0],
            max: samples[samples.len() - 1],
            avg: statistical::mean(&samples),
            med: pct(50.),
            p90: pct(90.),
            p95: pct(95.),
            p99: pct(99.),
            sorted: samples,
        }
    }

    /// Interpolated from the samples when present. A summary read back from a report has none,
    /// so only the stored points are available.
    pub fn percentile(&self, q: f64) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        if !self.sorted.is_empty() {
            return percentile(&self.sorted, q);
        }

        [
            (0., self.min),
            (50., self.med),
            (90., self.p90),
            (95., self.p95),
            (99., self.p99),
            (100., self.max),
        ]
        .into_iter()
        .find(|(at, _)| *at == q)
        .map(|(_, value)| value)
    }
}

/// Linear interpolation between the closest ranks of an ascending slice.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    match sorted.len() {
        0 => None,
        1 => Some(sorted[0]),
        n => {
            let rank = (q / 100.).clamp(0., 1.) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RateSummary {
    pub passes: u64,
    pub fails: u64,
    pub rate: f64,
}

impl RateSummary {
    pub fn new(passes: u64, total: u64) -> Self {
        let rate = if total == 0 {
            0.
        } else {
            passes as f64 / total as f64
        };
        Self {
            passes,
            fails: total.saturating_sub(passes),
            rate,
        }
    }

    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterSummary {
    pub count: u64,
    /// Count per second over the run duration.
    pub rate: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GaugeSummary {
    pub value: u64,
    pub min: u64,
    pub max: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricSummary {
    Trend(TrendSummary),
    Rate(RateSummary),
    Counter(CounterSummary),
    Gauge(GaugeSummary),
}

impl MetricSummary {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricSummary::Trend(_) => MetricKind::Trend,
            MetricSummary::Rate(_) => MetricKind::Rate,
            MetricSummary::Counter(_) => MetricKind::Counter,
            MetricSummary::Gauge(_) => MetricKind::Gauge,
        }
    }

    /// `None` when the metric never received a sample or the aggregation does not apply.
    pub fn aggregate(&self, aggregation: Aggregation) -> Option<f64> {
        use Aggregation::*;
        match self {
            MetricSummary::Trend(t) if t.count == 0 => None,
            MetricSummary::Trend(t) => match aggregation {
                Avg => Some(t.avg),
                Min => Some(t.min),
                Max => Some(t.max),
                Med => Some(t.med),
                Percentile(q) => t.percentile(q),
                _ => None,
            },
            MetricSummary::Rate(r) if r.total() == 0 => None,
            MetricSummary::Rate(r) => matches!(aggregation, Rate).then_some(r.rate),
            MetricSummary::Counter(c) if c.count == 0 => None,
            MetricSummary::Counter(c) => match aggregation {
                Count => Some(c.count as f64),
                Rate => Some(c.rate),
                _ => None,
            },
            MetricSummary::Gauge(g) => match aggregation {
                Value => Some(g.value as f64),
                Min => Some(g.min as f64),
                Max => Some(g.max as f64),
                _ => None,
            },
        }
    }
}

impl fmt::Display for MetricSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricSummary::Trend(t) => write!(
                f,
                "avg={:.2}ms min={:.2}ms med={:.2}ms max={:.2}ms p(90)={:.2}ms p(95)={:.2}ms p(99)={:.2}ms count={}",
                t.avg, t.min, t.med, t.max, t.p90, t.p95, t.p99, t.count
            ),
            MetricSummary::Rate(r) => write!(
                f,
                "{:.2}% ✓ {} ✗ {}",
                r.rate * 100.,
                r.passes,
                r.fails
            ),
            MetricSummary::Counter(c) => write!(f, "{} {:.2}/s", c.count, c.rate),
            MetricSummary::Gauge(g) => write!(f, "{} min={} max={}", g.value, g.min, g.max),
        }
    }
}

pub type MetricsSnapshot = BTreeMap<String, MetricSummary>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail,
    NoData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
    pub outcome: Outcome,
    pub passed: bool,
}

impl fmt::Display for ThresholdResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { "✓" } else { "✗" };
        match self.observed {
            Some(observed) => write!(
                f,
                "{mark} {}: {} (observed {observed:.4})",
                self.metric, self.expression
            ),
            None => write!(f, "{mark} {}: {} (no data)", self.metric, self.expression),
        }
    }
}

/// Pass/fail for every threshold plus the overall result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub no_data: NoDataPolicy,
    pub results: Vec<ThresholdResult>,
    pub passed: bool,
}

impl Verdict {
    pub fn failures(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

/// Everything known about a finished run. Serialized as the summary report.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub scenario: String,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub duration: Duration,
    pub base_url: String,
    pub authenticated: bool,
    pub metrics: MetricsSnapshot,
    pub verdict: Verdict,
}

impl RunSummary {
    pub fn metric(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.get(name)
    }

    pub fn trend(&self, name: &str) -> Option<&TrendSummary> {
        match self.metrics.get(name) {
            Some(MetricSummary::Trend(t)) => Some(t),
            _ => None,
        }
    }

    pub fn rate(&self, name: &str) -> Option<&RateSummary> {
        match self.metrics.get(name) {
            Some(MetricSummary::Rate(r)) => Some(r),
            _ => None,
        }
    }

    pub fn counter(&self, name: &str) -> Option<&CounterSummary> {
        match self.metrics.get(name) {
            Some(MetricSummary::Counter(c)) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scenario: {} ({})", self.scenario, self.run_id)?;
        writeln!(f, "target:   {}", self.base_url)?;
        writeln!(
            f,
            "duration: {}",
            humantime::format_duration(Duration::from_millis(self.duration.as_millis() as u64))
        )?;
        writeln!(f, "auth:     {}", self.authenticated)?;
        writeln!(f)?;

        let width = self.metrics.keys().map(String::len).max().unwrap_or(0);
        for (name, summary) in &self.metrics {
            writeln!(f, "  {name:.<width$}..: {summary}")?;
        }

        if !self.verdict.results.is_empty() {
            writeln!(f)?;
            writeln!(f, "thresholds:")?;
            for result in &self.verdict.results {
                writeln!(f, "  {result}")?;
            }
        }

        writeln!(f)?;
        write!(
            f,
            "verdict: {}",
            if self.verdict.passed { "PASS" } else { "FAIL" }
        )
    }
}
