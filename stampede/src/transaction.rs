use crate::recorder::{BuiltinMetrics, Counter, Rate, Trend};
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use governor::DefaultDirectRateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

/// Per-request bookkeeping shared by every virtual user.
#[derive(Clone)]
pub(crate) struct TransactionData {
    pub limiter: Option<Arc<DefaultDirectRateLimiter>>,
    pub duration: Arc<Trend>,
    pub failed: Arc<Rate>,
    pub reqs: Arc<Counter>,
}

impl TransactionData {
    pub fn new(builtins: &BuiltinMetrics, limiter: Option<Arc<DefaultDirectRateLimiter>>) -> Self {
        Self {
            limiter,
            duration: builtins.http_req_duration.clone(),
            failed: builtins.http_req_failed.clone(),
            reqs: builtins.http_reqs.clone(),
        }
    }
}

/// Sends `request` once the global limiter allows it and records the builtin request metrics.
///
/// The returned duration excludes time spent waiting on the limiter.
pub(crate) async fn transaction<C: Transport>(
    hook: &TransactionData,
    transport: &C,
    request: HttpRequest,
) -> (Result<HttpResponse, TransportError>, Duration) {
    if let Some(limiter) = &hook.limiter {
        limiter.until_ready().await;
    }

    let start = Instant::now();
    let res = transport.send(request).await;
    let elapsed = start.elapsed();

    hook.reqs.add(1);
    hook.duration.add(elapsed);
    let failed = match &res {
        Ok(response) => response.status >= 400,
        Err(err) => {
            trace!("Request failed after {elapsed:?}: {err}");
            true
        }
    };
    hook.failed.add(failed);

    (res, elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::MetricRegistry;
    use crate::transport::mock::{MockTransport, Reply};
    use governor::{Quota, RateLimiter};
    use std::num::NonZeroU32;
    use url::Url;

    fn request(path: &str) -> HttpRequest {
        HttpRequest::get(Url::parse("http://backend:8080").unwrap().join(path).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn records_builtin_request_metrics() {
        let mut registry = MetricRegistry::new();
        let builtins = BuiltinMetrics::register(&mut registry).unwrap();
        let hook = TransactionData::new(&builtins, None);
        let transport = MockTransport::new(&[
            ("/ok", Reply::ok("").delayed(Duration::from_millis(50))),
            ("/boom", Reply::status(500, "")),
            ("/down", Reply::Fail(TransportError::Timeout)),
        ]);

        let (res, elapsed) = transaction(&hook, &transport, request("/ok")).await;
        assert!(res.is_ok());
        assert!(elapsed >= Duration::from_millis(50));

        transaction(&hook, &transport, request("/boom")).await;
        transaction(&hook, &transport, request("/down")).await;

        assert_eq!(builtins.http_reqs.get(), 3);
        assert_eq!(builtins.http_req_duration.count(), 3);
        assert_eq!(builtins.http_req_failed.total(), 3);

        let snapshot = registry.snapshot(Duration::from_secs(1));
        let failed = snapshot[stampede_core::HTTP_REQ_FAILED]
            .aggregate(stampede_core::Aggregation::Rate)
            .unwrap();
        assert!((failed - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn limiter_gates_requests() {
        let mut registry = MetricRegistry::new();
        let builtins = BuiltinMetrics::register(&mut registry).unwrap();
        let limiter = RateLimiter::direct(Quota::per_second(NonZeroU32::new(20).unwrap()));
        let hook = TransactionData::new(&builtins, Some(Arc::new(limiter)));
        let transport = MockTransport::new(&[("/ok", Reply::ok(""))]);

        let start = std::time::Instant::now();
        for _ in 0..25 {
            transaction(&hook, &transport, request("/ok")).await;
        }
        // The burst allowance covers the first 20, the remaining 5 wait ~50ms each.
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(transport.calls(), 25);
    }
}
