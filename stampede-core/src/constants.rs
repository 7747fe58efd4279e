use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://backend:8080";

/// Pause between two iterations of the same virtual user.
pub const DEFAULT_THINK_TIME: Duration = Duration::from_secs(1);

/// How long in-flight iterations may finish once the last stage has ended.
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_SUMMARY_PATH: &str = "reports/summary.json";

pub const DEFAULT_LOGIN_PATH: &str = "/api/v1/auth/login";

/// JSON pointer to the bearer token inside the login response body.
pub const DEFAULT_TOKEN_POINTER: &str = "/token";

pub const LOGIN_SUCCESS_STATUS: u16 = 200;

/// Interval at which the driver reconciles the virtual user pool with the ramp.
pub const RAMP_TICK: Duration = Duration::from_millis(100);

pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const HTTP_REQS: &str = "http_reqs";
pub const CHECKS: &str = "checks";
pub const ITERATIONS: &str = "iterations";
pub const ITERATION_DURATION: &str = "iteration_duration";
pub const VUS: &str = "vus";
