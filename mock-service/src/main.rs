use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use mock_service::MockConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw.parse().with_context(|| format!("parsing {name}={raw}")),
        Err(_) => Ok(default),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_service=debug,tower_http=info")),
        )
        .init();

    let addr: SocketAddr = env_or("MOCK_ADDR", "0.0.0.0:8080".parse()?)?;
    let delay_ms: u64 = env_or("MOCK_DELAY_MS", 0)?;
    let health_status: u16 = env_or("MOCK_HEALTH_STATUS", 200)?;

    if let Ok(metrics_addr) = std::env::var("MOCK_PROMETHEUS") {
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr.parse::<SocketAddr>()?)
            .install()?;
    }

    let config = MockConfig::default()
        .delay(Duration::from_millis(delay_ms))
        .health_status(health_status);
    mock_service::run(addr, config).await
}
