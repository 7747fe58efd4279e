use mock_service::{MockConfig, MockHandle};
use std::sync::OnceLock;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("stampede=debug,mock_service=info")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Starts a mock backend on an ephemeral port. It stops when the handle drops.
#[allow(unused)]
pub async fn mock(config: MockConfig) -> MockHandle {
    init();
    mock_service::spawn("127.0.0.1:0".parse().unwrap(), config)
        .await
        .unwrap()
}
