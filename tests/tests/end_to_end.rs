mod utils;

use mock_service::{Hits, MockConfig, DEFAULT_EMAIL, DEFAULT_PASSWORD};
use stampede::prelude::*;
use stampede_core::Outcome;
use std::time::Duration;
use utils::mock;

fn short_run(base_url: &str) -> LoadTest {
    LoadTest::new(default_scenario())
        .base_url(base_url)
        .stages(&[Stage::new(Duration::from_secs(2), 3)])
        .think_time(Duration::from_millis(100))
        .graceful_stop(Duration::from_secs(2))
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(30_000)]
async fn unauthenticated_run_passes() {
    let mock = mock(MockConfig::default().delay(Duration::from_millis(10))).await;

    let summary = short_run(&mock.base_url()).await.unwrap();

    assert!(summary.verdict.passed, "{summary}");
    assert!(!summary.authenticated);
    assert_eq!(summary.rate("errors").unwrap().rate, 0.);
    assert_eq!(summary.trend("users_latency").unwrap().count, 0);
    assert!(summary.trend("health_latency").unwrap().count > 0);

    let hits = &mock.state.hits;
    assert_eq!(Hits::get(&hits.login), 0);
    assert_eq!(Hits::get(&hits.users), 0);
    assert_eq!(Hits::get(&hits.health), Hits::get(&hits.geo));
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(30_000)]
async fn authenticated_run_lists_users() {
    let mock = mock(MockConfig::default()).await;

    let summary = short_run(&mock.base_url())
        .login(DEFAULT_EMAIL, DEFAULT_PASSWORD)
        .await
        .unwrap();

    assert!(summary.verdict.passed, "{summary}");
    assert!(summary.authenticated);
    assert_eq!(summary.rate("errors").unwrap().rate, 0.);
    assert!(summary.trend("users_latency").unwrap().count > 0);

    let hits = &mock.state.hits;
    assert_eq!(Hits::get(&hits.login), 1);
    assert!(Hits::get(&hits.users) > 0);
    assert_eq!(Hits::get(&hits.unauthorized), 0);
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(30_000)]
async fn rejected_login_skips_authenticated_groups() {
    let mock = mock(MockConfig::default().login_status(401)).await;

    let summary = short_run(&mock.base_url())
        .login(DEFAULT_EMAIL, DEFAULT_PASSWORD)
        .await
        .unwrap();

    assert!(!summary.authenticated);
    assert!(summary.verdict.passed, "{summary}");
    assert_eq!(summary.verdict.results.len(), 3);

    let hits = &mock.state.hits;
    assert_eq!(Hits::get(&hits.login), 1);
    assert_eq!(Hits::get(&hits.users), 0);
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(30_000)]
async fn failing_health_fails_the_verdict() {
    let mock = mock(MockConfig::default().health_status(500)).await;

    let summary = short_run(&mock.base_url()).await.unwrap();

    assert!(!summary.verdict.passed);
    let errors = summary
        .verdict
        .failures()
        .find(|r| r.metric == "errors")
        .unwrap();
    assert_eq!(errors.outcome, Outcome::Fail);
    assert_eq!(errors.observed, Some(0.5));
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(30_000)]
async fn unreachable_backend_counts_as_errors() {
    utils::init();
    // Bind and drop to get a port nobody listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();

    let summary = short_run(&format!("http://{addr}"))
        .stages(&[Stage::new(Duration::from_secs(1), 1)])
        .request_timeout(Duration::from_millis(500))
        .await
        .unwrap();

    assert!(!summary.verdict.passed);
    assert_eq!(summary.rate("errors").unwrap().rate, 1.);
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(30_000)]
async fn silent_login_endpoint_does_not_stall_the_run() {
    utils::init();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let silent = tokio::spawn(async move {
        let mut held = vec![];
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let summary = short_run(&format!("http://{addr}"))
        .login(DEFAULT_EMAIL, DEFAULT_PASSWORD)
        .stages(&[Stage::new(Duration::from_secs(1), 1)])
        .request_timeout(Duration::from_millis(300))
        .await
        .unwrap();

    assert!(!summary.authenticated);
    assert!(!summary.verdict.passed);
    assert_eq!(summary.rate("errors").unwrap().rate, 1.);
    silent.abort();
}

#[cfg(feature = "integration")]
#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(60_000)]
async fn sustained_load_stays_within_thresholds() {
    let mock = mock(MockConfig::default().delay(Duration::from_millis(50))).await;

    let summary = LoadTest::new(default_scenario())
        .base_url(&mock.base_url())
        .stages(&[Stage::new(Duration::from_secs(10), 5)])
        .await
        .unwrap();

    assert!(summary.verdict.passed, "{summary}");
    assert_eq!(summary.rate("errors").unwrap().rate, 0.);

    let health = summary.trend("health_latency").unwrap();
    assert!(health.p95 >= 50., "p95 {}", health.p95);
    assert!(health.p95 < 100., "p95 {}", health.p95);
}
