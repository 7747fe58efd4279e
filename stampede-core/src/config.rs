use crate::{
    ConfigError, DEFAULT_BASE_URL, DEFAULT_GRACEFUL_STOP, DEFAULT_LOGIN_PATH,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_SUMMARY_PATH, DEFAULT_THINK_TIME, DEFAULT_TOKEN_POINTER,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{serde_as, DeserializeAs, SerializeAs};
use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Durations written the human way (`"30s"`, `"1m 30s"`, `"250ms"`).
pub struct HumanDuration;

impl SerializeAs<Duration> for HumanDuration {
    fn serialize_as<S>(source: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&humantime::format_duration(*source))
    }
}

impl<'de> DeserializeAs<'de, Duration> for HumanDuration {
    fn deserialize_as<D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// A window of time during which the virtual user count moves linearly towards `target`.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde_as(as = "HumanDuration")]
    pub duration: Duration,
    pub target: usize,
}

impl Stage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

/// One or several threshold expressions for a single metric.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdExprs {
    One(String),
    Many(Vec<String>),
}

impl ThresholdExprs {
    pub fn expressions(&self) -> &[String] {
        match self {
            ThresholdExprs::One(expr) => std::slice::from_ref(expr),
            ThresholdExprs::Many(exprs) => exprs,
        }
    }

    pub fn push(&mut self, expr: String) {
        if let ThresholdExprs::One(existing) = self {
            let first = std::mem::take(existing);
            *self = ThresholdExprs::Many(vec![first]);
        }
        if let ThresholdExprs::Many(exprs) = self {
            exprs.push(expr);
        }
    }
}

/// What a threshold whose metric never received a sample counts as.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDataPolicy {
    #[default]
    Pass,
    Fail,
}

impl FromStr for NoDataPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass" => Ok(NoDataPolicy::Pass),
            "fail" => Ok(NoDataPolicy::Fail),
            _ => Err(ConfigError::NoDataPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for NoDataPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoDataPolicy::Pass => write!(f, "pass"),
            NoDataPolicy::Fail => write!(f, "fail"),
        }
    }
}

/// Login performed once before the load phase.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoginConfig {
    pub path: String,
    pub token_pointer: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_LOGIN_PATH.to_string(),
            token_pointer: DEFAULT_TOKEN_POINTER.to_string(),
            email: None,
            password: None,
        }
    }
}

impl fmt::Debug for LoginConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginConfig")
            .field("path", &self.path)
            .field("token_pointer", &self.token_pointer)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub base_url: String,
    pub start_vus: usize,
    pub stages: Vec<Stage>,
    pub thresholds: BTreeMap<String, ThresholdExprs>,
    #[serde_as(as = "HumanDuration")]
    pub think_time: Duration,
    #[serde_as(as = "HumanDuration")]
    pub graceful_stop: Duration,
    #[serde_as(as = "HumanDuration")]
    pub request_timeout: Duration,
    pub max_rps: Option<NonZeroU32>,
    pub no_data: NoDataPolicy,
    pub summary_path: PathBuf,
    pub login: LoginConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        let stages = vec![
            Stage::new(Duration::from_secs(30), 10),
            Stage::new(Duration::from_secs(60), 50),
            Stage::new(Duration::from_secs(30), 100),
            Stage::new(Duration::from_secs(30), 0),
        ];

        let thresholds = [
            ("http_req_duration", "p(95)<500"),
            ("errors", "rate<0.1"),
            ("health_latency", "p(99)<200"),
        ]
        .into_iter()
        .map(|(metric, expr)| (metric.to_string(), ThresholdExprs::One(expr.to_string())))
        .collect();

        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            start_vus: 0,
            stages,
            thresholds,
            think_time: DEFAULT_THINK_TIME,
            graceful_stop: DEFAULT_GRACEFUL_STOP,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_rps: None,
            no_data: NoDataPolicy::default(),
            summary_path: PathBuf::from(DEFAULT_SUMMARY_PATH),
            login: LoginConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    /// Parsed base url. Only absolute `http`/`https` urls are accepted.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::BaseUrl {
            url: self.base_url.clone(),
            reason,
        };

        let url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" if url.has_host() => Ok(url),
            "http" | "https" => Err(invalid("missing host".to_string())),
            scheme => Err(invalid(format!("unsupported scheme `{scheme}`"))),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;
        if self.stages.is_empty() {
            return Err(ConfigError::NoStages);
        }
        if self.thresholds.is_empty() {
            return Err(ConfigError::NoThresholds);
        }
        for (metric, exprs) in &self.thresholds {
            if exprs.expressions().is_empty() {
                return Err(ConfigError::EmptyThresholds(metric.clone()));
            }
        }
        Ok(())
    }

    /// Sum of all stage durations.
    pub fn total_duration(&self) -> Duration {
        self.stages
            .iter()
            .fold(Duration::ZERO, |acc, stage| acc.saturating_add(stage.duration))
    }

    pub fn add_threshold(&mut self, metric: &str, expr: &str) {
        match self.thresholds.get_mut(metric) {
            Some(exprs) => exprs.push(expr.to_string()),
            None => {
                self.thresholds
                    .insert(metric.to_string(), ThresholdExprs::One(expr.to_string()));
            }
        }
    }

    pub fn has_login(&self) -> bool {
        self.login.email.is_some() && self.login.password.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_reference_profile() {
        let config = RunConfig::default();
        assert_eq!(config.stages.len(), 4);
        assert_eq!(config.total_duration(), Duration::from_secs(150));
        assert_eq!(config.stages[2].target, 100);
        assert_eq!(config.thresholds.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_human_durations() {
        let config: RunConfig = serde_json::from_str(
            r#"{
                "base_url": "http://localhost:8080",
                "stages": [{ "duration": "10s", "target": 5 }, { "duration": "1m 30s", "target": 0 }],
                "think_time": "250ms",
                "thresholds": { "errors": "rate<0.1", "http_req_duration": ["p(95)<500", "avg<200"] }
            }"#,
        )
        .unwrap();

        assert_eq!(config.stages[0], Stage::new(Duration::from_secs(10), 5));
        assert_eq!(config.stages[1].duration, Duration::from_secs(90));
        assert_eq!(config.think_time, Duration::from_millis(250));
        assert_eq!(
            config.thresholds["http_req_duration"].expressions(),
            &["p(95)<500".to_string(), "avg<200".to_string()]
        );
        assert_eq!(config.graceful_stop, DEFAULT_GRACEFUL_STOP);
    }

    #[test]
    fn rejects_unknown_fields() {
        let res = serde_json::from_str::<RunConfig>(r#"{ "stagez": [] }"#);
        assert!(res.is_err());
    }

    #[test]
    fn rejects_bad_base_urls() {
        assert!(matches!(
            RunConfig::new("not a url").validate(),
            Err(ConfigError::BaseUrl { .. })
        ));
        assert!(matches!(
            RunConfig::new("ftp://backend").validate(),
            Err(ConfigError::BaseUrl { .. })
        ));
    }

    #[test]
    fn requires_stages() {
        let config = RunConfig {
            stages: vec![],
            ..RunConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoStages));
    }

    #[test]
    fn requires_thresholds() {
        let config = RunConfig {
            thresholds: BTreeMap::new(),
            ..RunConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NoThresholds));
    }

    #[test]
    fn empty_threshold_list_is_rejected() {
        let mut config = RunConfig::default();
        config
            .thresholds
            .insert("errors".to_string(), ThresholdExprs::Many(vec![]));
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyThresholds("errors".to_string()))
        );
    }

    #[test]
    fn add_threshold_accumulates() {
        let mut config = RunConfig::default();
        config.add_threshold("errors", "rate<0.05");
        assert_eq!(config.thresholds["errors"].expressions().len(), 2);
    }

    #[test]
    fn password_is_masked_and_not_serialized() {
        let mut config = RunConfig::default();
        config.login.email = Some("admin@example.com".to_string());
        config.login.password = Some("hunter2".to_string());

        assert!(!format!("{config:?}").contains("hunter2"));
        assert!(!serde_json::to_string(&config).unwrap().contains("hunter2"));
        assert!(config.has_login());
    }

    #[test]
    fn no_data_policy_from_str() {
        assert_eq!("FAIL".parse::<NoDataPolicy>(), Ok(NoDataPolicy::Fail));
        assert!("maybe".parse::<NoDataPolicy>().is_err());
    }
}
