//! Stand-in for the backend under test: health, login, users and geographic data.
use anyhow::Context;
use axum::{
    debug_handler,
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use metrics::counter;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
#[allow(unused)]
use tracing::{debug, info, warn};

pub const DEFAULT_EMAIL: &str = "admin@example.com";
pub const DEFAULT_PASSWORD: &str = "admin123";
pub const DEFAULT_TOKEN: &str = "mock-service-token";

#[derive(Clone, Debug)]
pub struct MockConfig {
    /// Added to every response.
    pub delay: Duration,
    /// Standard deviation of a normally distributed jitter on top of `delay`.
    pub jitter: Option<Duration>,
    pub health_status: u16,
    /// When set, the login endpoint answers with this status regardless of the credentials.
    pub login_status: Option<u16>,
    pub email: String,
    pub password: String,
    pub token: String,
    /// Requests above this rate get a 503.
    pub max_rps: Option<NonZeroU32>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            jitter: None,
            health_status: 200,
            login_status: None,
            email: DEFAULT_EMAIL.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            token: DEFAULT_TOKEN.to_string(),
            max_rps: None,
        }
    }
}

impl MockConfig {
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn jitter(mut self, std_dev: Duration) -> Self {
        self.jitter = Some(std_dev);
        self
    }

    pub fn health_status(mut self, status: u16) -> Self {
        self.health_status = status;
        self
    }

    pub fn login_status(mut self, status: u16) -> Self {
        self.login_status = Some(status);
        self
    }

    pub fn max_rps(mut self, rps: NonZeroU32) -> Self {
        self.max_rps = Some(rps);
        self
    }
}

/// Per-route hit counters, readable from tests.
#[derive(Debug, Default)]
pub struct Hits {
    pub health: AtomicU64,
    pub login: AtomicU64,
    pub users: AtomicU64,
    pub geo: AtomicU64,
    pub unauthorized: AtomicU64,
}

impl Hits {
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

pub struct MockState {
    config: MockConfig,
    /// Current status of `/health`, adjustable while the service runs.
    health_status: AtomicU16,
    limiter: Option<DefaultDirectRateLimiter>,
    pub hits: Hits,
}

impl MockState {
    fn new(config: MockConfig) -> Self {
        Self {
            health_status: AtomicU16::new(config.health_status),
            limiter: config
                .max_rps
                .map(|rps| RateLimiter::direct(Quota::per_second(rps))),
            config,
            hits: Hits::default(),
        }
    }

    pub fn set_health_status(&self, status: u16) {
        self.health_status.store(status, Ordering::Relaxed);
    }

    async fn respond_after_delay(&self) -> Result<(), StatusCode> {
        let mut delay = self.config.delay;
        if let Some(std_dev) = self.config.jitter {
            if let Ok(normal) = Normal::new(0., std_dev.as_secs_f64()) {
                let offset = normal.sample(&mut rand::thread_rng());
                delay = Duration::from_secs_f64((delay.as_secs_f64() + offset).max(0.));
            }
        }
        tokio::time::sleep(delay).await;

        match &self.limiter {
            Some(limiter) if limiter.check().is_err() => Err(StatusCode::SERVICE_UNAVAILABLE),
            _ => Ok(()),
        }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|token| token == self.config.token)
    }
}

type SharedState = Arc<MockState>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/users", get(users))
        .route("/api/v1/users/:id", get(user))
        .route("/api/v1/geo", get(geo))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct MockHandle {
    pub addr: SocketAddr,
    pub state: SharedState,
    pub task: JoinHandle<()>,
}

impl MockHandle {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Binds `addr` and serves in a background task.
pub async fn spawn(addr: SocketAddr, config: MockConfig) -> anyhow::Result<MockHandle> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    let addr = listener.local_addr()?;
    let state = Arc::new(MockState::new(config));
    let app = router(state.clone());

    let task = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!("Mock service stopped: {err}");
        }
    });
    info!("Mock service listening on {addr}");

    Ok(MockHandle { addr, state, task })
}

/// Serves until the process exits.
pub async fn run(addr: SocketAddr, config: MockConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Mock service listening on {}", listener.local_addr()?);
    axum::serve(listener, router(Arc::new(MockState::new(config)))).await?;
    Ok(())
}

#[debug_handler]
async fn health(State(state): State<SharedState>) -> Result<(StatusCode, &'static str), StatusCode> {
    counter!("mock_service.requests", "route" => "health").increment(1);
    state.hits.health.fetch_add(1, Ordering::Relaxed);
    state.respond_after_delay().await?;

    let status = StatusCode::from_u16(state.health_status.load(Ordering::Relaxed))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok((status, "ok"))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[debug_handler]
async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, StatusCode> {
    counter!("mock_service.requests", "route" => "login").increment(1);
    state.hits.login.fetch_add(1, Ordering::Relaxed);
    state.respond_after_delay().await?;

    if let Some(status) = state.config.login_status {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status != StatusCode::OK {
            return Err(status);
        }
    }

    if req.email == state.config.email && req.password == state.config.password {
        debug!("Issued token for {}", req.email);
        Ok(Json(json!({ "token": state.config.token })))
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

const USERS: [(u64, &str); 3] = [(1, "Ada Lovelace"), (2, "Grace Hopper"), (3, "Alan Turing")];

#[debug_handler]
async fn users(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    counter!("mock_service.requests", "route" => "users").increment(1);
    state.hits.users.fetch_add(1, Ordering::Relaxed);
    if !state.authorized(&headers) {
        state.hits.unauthorized.fetch_add(1, Ordering::Relaxed);
        return Err(StatusCode::UNAUTHORIZED);
    }
    state.respond_after_delay().await?;

    let users: Vec<Value> = USERS
        .iter()
        .map(|(id, name)| json!({ "id": id, "name": name }))
        .collect();
    Ok(Json(json!({ "users": users })))
}

#[debug_handler]
async fn user(
    State(state): State<SharedState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    counter!("mock_service.requests", "route" => "user").increment(1);
    state.hits.users.fetch_add(1, Ordering::Relaxed);
    if !state.authorized(&headers) {
        state.hits.unauthorized.fetch_add(1, Ordering::Relaxed);
        return Err(StatusCode::UNAUTHORIZED);
    }
    state.respond_after_delay().await?;

    USERS
        .iter()
        .find(|(user_id, _)| *user_id == id)
        .map(|(id, name)| Json(json!({ "id": id, "name": name })))
        .ok_or(StatusCode::NOT_FOUND)
}

#[debug_handler]
async fn geo(State(state): State<SharedState>) -> Result<Json<Value>, StatusCode> {
    counter!("mock_service.requests", "route" => "geo").increment(1);
    state.hits.geo.fetch_add(1, Ordering::Relaxed);
    state.respond_after_delay().await?;

    Ok(Json(json!({
        "regions": [
            { "code": "ANT", "name": "Antioquia" },
            { "code": "CUN", "name": "Cundinamarca" },
            { "code": "VAC", "name": "Valle del Cauca" }
        ]
    })))
}
