mod utils;

use mock_service::MockConfig;
use stampede::prelude::*;
use stampede_runtime::runtime::{exit_status, EXIT_PASSED, EXIT_THRESHOLDS_FAILED};
use stampede_runtime::{StampedeCli, StampedeRuntime};
use std::time::Duration;
use tempfile::tempdir;
use utils::mock;

fn quick_config() -> RunConfig {
    RunConfig {
        stages: vec![Stage::new(Duration::from_secs(1), 2)],
        think_time: Duration::from_millis(100),
        ..RunConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(30_000)]
async fn runtime_writes_summary_report() {
    let mock = mock(MockConfig::default()).await;
    let dir = tempdir().unwrap();
    let path = dir.path().join("summary.json");

    let runtime = StampedeRuntime::new()
        .config(quick_config())
        .with_cli(StampedeCli {
            base_url: Some(mock.base_url()),
            summary: Some(path.clone()),
            ..StampedeCli::default()
        })
        .await
        .unwrap();

    let result = runtime.run().await;
    assert_eq!(exit_status(&result), EXIT_PASSED);

    let raw = std::fs::read_to_string(&path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["scenario"], "backend");
    assert_eq!(json["authenticated"], false);
    assert_eq!(json["verdict"]["passed"], true);
    assert!(json["metrics"]["health_latency"]["count"].as_u64().unwrap() > 0);
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(30_000)]
async fn crossed_thresholds_map_to_exit_status() {
    let mock = mock(MockConfig::default().health_status(503)).await;
    let dir = tempdir().unwrap();

    let runtime = StampedeRuntime::new()
        .config(quick_config())
        .with_cli(StampedeCli {
            base_url: Some(mock.base_url()),
            summary: Some(dir.path().join("summary.json")),
            ..StampedeCli::default()
        })
        .await
        .unwrap();

    let result = runtime.run().await;
    assert_eq!(exit_status(&result), EXIT_THRESHOLDS_FAILED);
    assert!(dir.path().join("summary.json").exists());
}
