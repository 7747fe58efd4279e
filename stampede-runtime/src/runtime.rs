//! Command line runtime for stampede.
//!
//! Configuration is layered: built-in defaults, then the JSON config file, then command line
//! flags and their environment variables.
use crate::error::RuntimeError;
use crate::report::write_summary;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use stampede::prelude::*;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
#[allow(unused)]
use tracing::{debug, error, info, instrument, warn};

pub const EXIT_PASSED: u8 = 0;
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Same code k6 uses when thresholds are crossed.
pub const EXIT_THRESHOLDS_FAILED: u8 = 99;

#[derive(Parser, Debug, Default)]
#[command(name = "stampede", version, about = "Staged HTTP load test with threshold verdicts")]
pub struct StampedeCli {
    /// Base url of the service under test.
    #[arg(long, env = "BACKEND_URL")]
    pub base_url: Option<String>,

    /// Login identifier. Without it (or the password) authenticated groups are skipped.
    #[arg(long, env = "LOAD_TEST_EMAIL")]
    pub login_email: Option<String>,

    #[arg(long, env = "LOAD_TEST_PASSWORD", hide_env_values = true)]
    pub login_password: Option<String>,

    /// JSON file with stages, thresholds and run options.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Where to write the JSON summary.
    #[arg(short, long)]
    pub summary: Option<PathBuf>,

    /// Verdict of thresholds whose metric never received data: `pass` or `fail`.
    #[arg(long)]
    pub no_data: Option<NoDataPolicy>,

    /// Serve live metrics for Prometheus on this address.
    #[arg(long)]
    pub prometheus: Option<SocketAddr>,
}

/// Runs a scenario from the command line and turns the verdict into an exit status.
///
/// # Example
///
/// ```ignore
/// use stampede_runtime::StampedeRuntime;
///
/// #[tokio::main]
/// async fn main() -> std::process::ExitCode {
///     StampedeRuntime::new().run_with_args().await
/// }
/// ```
pub struct StampedeRuntime {
    scenario: Scenario,
    config: RunConfig,
    prometheus: Option<SocketAddr>,
}

impl Default for StampedeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl StampedeRuntime {
    pub fn new() -> Self {
        Self {
            scenario: default_scenario(),
            config: RunConfig::default(),
            prometheus: None,
        }
    }

    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = scenario;
        self
    }

    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn prometheus(mut self, addr: SocketAddr) -> Self {
        self.prometheus = Some(addr);
        self
    }

    pub fn run_config(&self) -> &RunConfig {
        &self.config
    }

    /// Applies the process arguments and environment.
    pub async fn with_args(self) -> Result<Self, RuntimeError> {
        self.with_cli(StampedeCli::parse()).await
    }

    pub async fn with_cli(mut self, cli: StampedeCli) -> Result<Self, RuntimeError> {
        if let Some(path) = &cli.config {
            self.config = load_config(path).await?;
        }
        if let Some(base_url) = cli.base_url {
            self.config.base_url = base_url;
        }
        if let Some(email) = cli.login_email {
            self.config.login.email = Some(email);
        }
        if let Some(password) = cli.login_password {
            self.config.login.password = Some(password);
        }
        if let Some(summary) = cli.summary {
            self.config.summary_path = summary;
        }
        if let Some(policy) = cli.no_data {
            self.config.no_data = policy;
        }
        if cli.prometheus.is_some() {
            self.prometheus = cli.prometheus;
        }

        self.config.validate()?;
        Ok(self)
    }

    /// Runs the load test, prints the summary and writes the report.
    #[instrument(name = "stampede", skip_all)]
    pub async fn run(self) -> Result<RunSummary, RuntimeError> {
        if let Some(addr) = self.prometheus {
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .map_err(|e| RuntimeError::Prometheus(e.to_string()))?;
            info!("Serving metrics on {addr}");
        }

        let summary_path = self.config.summary_path.clone();
        let summary = LoadTest::new(self.scenario)
            .config(self.config)
            .await?;

        println!("{summary}");

        match write_summary(&summary_path, &summary).await {
            Ok(()) => info!("Summary written to {}", summary_path.display()),
            // The verdict still stands without the report.
            Err(err) => error!("{err}"),
        }

        Ok(summary)
    }

    pub async fn run_with_args(self) -> ExitCode {
        let runtime = match self.with_args().await {
            Ok(runtime) => runtime,
            Err(err) => {
                error!("{err}");
                return ExitCode::from(EXIT_CONFIG_ERROR);
            }
        };
        ExitCode::from(exit_status(&runtime.run().await))
    }
}

pub async fn load_config(path: &Path) -> Result<RunConfig, RuntimeError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| RuntimeError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
    let config: RunConfig =
        serde_json::from_str(&raw).map_err(|source| RuntimeError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

pub fn exit_status(result: &Result<RunSummary, RuntimeError>) -> u8 {
    match result {
        Ok(summary) if summary.verdict.passed => EXIT_PASSED,
        Ok(_) => EXIT_THRESHOLDS_FAILED,
        Err(err) => {
            error!("{err}");
            EXIT_CONFIG_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stampede_core::{ConfigError, ThresholdExprs, Verdict};
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn write_config(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn parses_flags() {
        let cli = StampedeCli::try_parse_from([
            "stampede",
            "--base-url",
            "http://localhost:3000",
            "--no-data",
            "fail",
            "--summary",
            "out/summary.json",
            "--prometheus",
            "127.0.0.1:9000",
        ])
        .unwrap();

        assert_eq!(cli.base_url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(cli.no_data, Some(NoDataPolicy::Fail));
        assert_eq!(cli.summary, Some(PathBuf::from("out/summary.json")));
        assert_eq!(cli.prometheus, Some("127.0.0.1:9000".parse().unwrap()));
    }

    #[test]
    fn rejects_unknown_no_data_policy() {
        assert!(StampedeCli::try_parse_from(["stampede", "--no-data", "maybe"]).is_err());
    }

    #[tokio::test]
    async fn flags_override_config_file() {
        let dir = tempdir().unwrap();
        let path = write_config(
            &dir,
            "config.json",
            r#"{
                "base_url": "http://from-file:8080",
                "stages": [{ "duration": "10s", "target": 5 }],
                "thresholds": { "errors": ["rate<0.05", "rate<0.5"] },
                "think_time": "250ms"
            }"#,
        );

        let cli = StampedeCli {
            config: Some(path),
            base_url: Some("http://from-flag:9090".to_string()),
            login_email: Some("admin@example.com".to_string()),
            login_password: Some("admin123".to_string()),
            ..StampedeCli::default()
        };
        let runtime = StampedeRuntime::new().with_cli(cli).await.unwrap();
        let config = runtime.run_config();

        assert_eq!(config.base_url, "http://from-flag:9090");
        assert_eq!(config.stages, vec![Stage::new(Duration::from_secs(10), 5)]);
        assert_eq!(config.think_time, Duration::from_millis(250));
        assert_eq!(
            config.thresholds.get("errors"),
            Some(&ThresholdExprs::Many(vec![
                "rate<0.05".to_string(),
                "rate<0.5".to_string()
            ]))
        );
        assert!(config.has_login());
    }

    #[tokio::test]
    async fn bad_config_files_are_errors() {
        let dir = tempdir().unwrap();
        let with_config = |path: PathBuf| StampedeCli {
            config: Some(path),
            ..StampedeCli::default()
        };

        let missing = StampedeRuntime::new()
            .with_cli(with_config(dir.path().join("missing.json")))
            .await;
        assert!(matches!(missing, Err(RuntimeError::ConfigRead { .. })));

        let bad = write_config(&dir, "bad.json", r#"{ "stages": [], "unknown_field": 1 }"#);
        let invalid = StampedeRuntime::new().with_cli(with_config(bad)).await;
        assert!(matches!(invalid, Err(RuntimeError::ConfigParse { .. })));

        let empty_stages = write_config(&dir, "empty.json", r#"{ "stages": [] }"#);
        let err = StampedeRuntime::new().with_cli(with_config(empty_stages)).await;
        assert!(matches!(
            err,
            Err(RuntimeError::Config(ConfigError::NoStages))
        ));

        let no_thresholds = write_config(&dir, "open.json", r#"{ "thresholds": {} }"#);
        let err = StampedeRuntime::new().with_cli(with_config(no_thresholds)).await;
        assert!(matches!(
            err,
            Err(RuntimeError::Config(ConfigError::NoThresholds))
        ));
    }

    #[tracing_test::traced_test]
    #[test]
    fn exit_statuses() {
        let mut summary = RunSummary {
            run_id: uuid::Uuid::new_v4(),
            scenario: "backend".to_string(),
            started_at: time::OffsetDateTime::UNIX_EPOCH,
            duration: Duration::ZERO,
            base_url: "http://backend:8080/".to_string(),
            authenticated: false,
            metrics: Default::default(),
            verdict: Verdict {
                no_data: NoDataPolicy::Pass,
                results: vec![],
                passed: true,
            },
        };
        assert_eq!(exit_status(&Ok(summary.clone())), EXIT_PASSED);

        summary.verdict.passed = false;
        assert_eq!(exit_status(&Ok(summary)), EXIT_THRESHOLDS_FAILED);

        let err = RuntimeError::Config(ConfigError::NoStages);
        assert_eq!(exit_status(&Err(err)), EXIT_CONFIG_ERROR);
        assert!(logs_contain("At least one load stage is required."));
    }
}
