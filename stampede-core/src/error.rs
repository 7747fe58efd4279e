use crate::MetricKind;
use thiserror::Error;

/// Problems detected before any load is generated. All of them are fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("At least one load stage is required.")]
    NoStages,

    #[error("Invalid base url `{url}`: {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("Invalid threshold `{expression}` for `{metric}`: {reason}")]
    Threshold {
        metric: String,
        expression: String,
        reason: String,
    },

    #[error("At least one threshold is required.")]
    NoThresholds,

    #[error("Threshold list for `{0}` is empty.")]
    EmptyThresholds(String),

    #[error("Threshold references unknown metric `{0}`.")]
    UnknownMetric(String),

    #[error("Aggregation `{aggregation}` is not available on {kind} metric `{metric}`.")]
    Aggregation {
        metric: String,
        aggregation: String,
        kind: MetricKind,
    },

    #[error("Metric `{metric}` is already registered as a {existing}, not a {requested}.")]
    MetricKindConflict {
        metric: String,
        existing: MetricKind,
        requested: MetricKind,
    },

    #[error("Invalid no-data policy `{0}`, expected `pass` or `fail`.")]
    NoDataPolicy(String),
}
