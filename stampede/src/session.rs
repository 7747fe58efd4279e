//! One-time authentication performed before any virtual user starts.
use crate::transport::{endpoint, HttpRequest, Transport};
use serde::Serialize;
use std::time::Duration;
use stampede_core::{LoginConfig, LOGIN_SUCCESS_STATUS};
use url::Url;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Bearer token shared read-only by every iteration of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Credential {
    Bearer(String),
    #[default]
    Absent,
}

impl Credential {
    pub fn token(&self) -> Option<&str> {
        match self {
            Credential::Bearer(token) => Some(token),
            Credential::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Credential::Bearer(_))
    }
}

impl From<Option<String>> for Credential {
    fn from(token: Option<String>) -> Self {
        token.map_or(Credential::Absent, Credential::Bearer)
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Logs in once. Every failure degrades to [`Credential::Absent`]; nothing here is fatal.
///
/// A login endpoint that does not answer within `timeout` counts as a failure.
#[instrument(name = "setup", skip_all, fields(path = %login.path))]
pub async fn bootstrap<C: Transport>(
    transport: &C,
    base_url: &Url,
    login: &LoginConfig,
    timeout: Duration,
) -> Credential {
    let (Some(email), Some(password)) = (login.email.as_deref(), login.password.as_deref()) else {
        info!("No login credentials supplied, running unauthenticated.");
        return Credential::Absent;
    };

    let url = match endpoint(base_url, &login.path) {
        Ok(url) => url,
        Err(err) => {
            warn!("Unable to build login url: {err}");
            return Credential::Absent;
        }
    };

    let body = match serde_json::to_value(LoginRequest { email, password }) {
        Ok(body) => body,
        Err(err) => {
            warn!("Unable to encode login request: {err}");
            return Credential::Absent;
        }
    };

    let request = HttpRequest::post(url).json(body).timeout(timeout);
    let res = match transport.send(request).await {
        Ok(res) => res,
        Err(err) => {
            warn!("Login request failed, running unauthenticated: {err}");
            return Credential::Absent;
        }
    };

    if res.status != LOGIN_SUCCESS_STATUS {
        warn!(
            "Login returned status {}, running unauthenticated.",
            res.status
        );
        return Credential::Absent;
    }

    let credential = Credential::from(parse_token(&res.body, &login.token_pointer));
    if credential.is_present() {
        info!("Authenticated as {email}.");
    } else {
        warn!(
            "Login response has no token at `{}`, running unauthenticated.",
            login.token_pointer
        );
    }
    credential
}

/// Extracts a non-empty string token at `pointer`. Malformed bodies yield `None`.
pub(crate) fn parse_token(body: &str, pointer: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer(pointer)?
        .as_str()
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}
