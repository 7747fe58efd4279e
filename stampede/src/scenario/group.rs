use super::check::Check;
use crate::recorder::Trend;
use crate::transport::{HttpRequest, HttpResponse, Method};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// One named request within an iteration, plus what to do with its response.
#[derive(Clone, Debug)]
pub struct Group {
    pub(crate) name: String,
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Option<Value>,
    pub(crate) authenticated: bool,
    pub(crate) trend: Option<String>,
    pub(crate) checks: Vec<Check>,
    pub(crate) extract: Vec<(String, String)>,
    pub(crate) needs: Vec<String>,
}

impl Group {
    pub fn new(name: &str, method: Method, path: &str) -> Self {
        Self {
            name: name.to_string(),
            method,
            path: path.to_string(),
            headers: vec![],
            body: None,
            authenticated: false,
            trend: None,
            checks: vec![],
            extract: vec![],
            needs: vec![],
        }
    }

    pub fn get(name: &str, path: &str) -> Self {
        Self::new(name, Method::GET, path)
    }

    pub fn post(name: &str, path: &str) -> Self {
        Self::new(name, Method::POST, path)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Send the run's bearer token. Without one the group is skipped.
    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }

    /// Record the request duration into the named trend, in addition to `http_req_duration`.
    pub fn trend(mut self, metric: &str) -> Self {
        self.trend = Some(metric.to_string());
        self
    }

    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Store the value at `pointer` in the response body under `key` for later groups.
    pub fn extract(mut self, key: &str, pointer: &str) -> Self {
        self.extract.push((key.to_string(), pointer.to_string()));
        self
    }

    /// Skip this group unless an earlier group stored `key`.
    pub fn needs(mut self, key: &str) -> Self {
        self.needs.push(key.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn requires_auth(&self) -> bool {
        self.authenticated
    }

    pub(crate) fn request(&self, url: Url, token: Option<&str>, timeout: Duration) -> HttpRequest {
        let mut request = HttpRequest::new(self.method.clone(), url).timeout(timeout);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        if let Some(token) = token {
            request = request.bearer(token);
        }
        if let Some(body) = &self.body {
            request = request.json(body.clone());
        }
        request
    }
}

/// A group with its trend resolved against the registry.
#[derive(Clone)]
pub(crate) struct BoundGroup {
    pub group: Group,
    pub trend: Option<Arc<Trend>>,
}

/// Substitutes `{key}` placeholders from `context`. Returns the first missing key on failure.
pub(crate) fn render_path(path: &str, context: &HashMap<String, String>) -> Result<String, String> {
    let mut rendered = String::with_capacity(path.len());
    let mut rest = path;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        let key = &rest[open + 1..open + close];
        let value = context.get(key).ok_or_else(|| key.to_string())?;

        rendered.push_str(&rest[..open]);
        rendered.push_str(value);
        rest = &rest[open + close + 1..];
    }

    rendered.push_str(rest);
    Ok(rendered)
}

/// Strings are taken verbatim, other scalars in their JSON form. Null and missing yield `None`.
pub(crate) fn extract_value(response: &HttpResponse, pointer: &str) -> Option<String> {
    match response.json()?.pointer(pointer)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
