use crate::transport::{HttpResponse, TransportError};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

type Predicate = Arc<dyn Fn(&HttpResponse) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum CheckKind {
    Status(u16),
    DurationBelow(Duration),
    BodyContains(String),
    /// Body is JSON and has a non-null value at the pointer.
    JsonPointer(String),
    Predicate(Predicate),
}

impl fmt::Debug for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::Status(code) => f.debug_tuple("Status").field(code).finish(),
            CheckKind::DurationBelow(d) => f.debug_tuple("DurationBelow").field(d).finish(),
            CheckKind::BodyContains(s) => f.debug_tuple("BodyContains").field(s).finish(),
            CheckKind::JsonPointer(p) => f.debug_tuple("JsonPointer").field(p).finish(),
            CheckKind::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// A named assertion on a single response.
#[derive(Clone, Debug)]
pub struct Check {
    name: String,
    kind: CheckKind,
}

impl Check {
    pub fn new(name: &str, kind: CheckKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }

    pub fn status(code: u16) -> Self {
        Self::new(&format!("status is {code}"), CheckKind::Status(code))
    }

    pub fn duration_below(bound: Duration) -> Self {
        Self::new(
            &format!("response time < {}ms", bound.as_millis()),
            CheckKind::DurationBelow(bound),
        )
    }

    pub fn body_contains(needle: &str) -> Self {
        Self::new(
            &format!("body contains `{needle}`"),
            CheckKind::BodyContains(needle.to_string()),
        )
    }

    pub fn json_pointer(pointer: &str) -> Self {
        Self::new(
            &format!("body has `{pointer}`"),
            CheckKind::JsonPointer(pointer.to_string()),
        )
    }

    pub fn predicate<F>(name: &str, predicate: F) -> Self
    where
        F: Fn(&HttpResponse) -> bool + Send + Sync + 'static,
    {
        Self::new(name, CheckKind::Predicate(Arc::new(predicate)))
    }

    /// Replaces the generated name.
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &CheckKind {
        &self.kind
    }

    /// A request that never produced a response fails every check.
    pub fn evaluate(
        &self,
        response: &Result<HttpResponse, TransportError>,
        elapsed: Duration,
    ) -> bool {
        let Ok(response) = response else {
            return false;
        };

        match &self.kind {
            CheckKind::Status(code) => response.status == *code,
            CheckKind::DurationBelow(bound) => elapsed < *bound,
            CheckKind::BodyContains(needle) => response.body.contains(needle.as_str()),
            CheckKind::JsonPointer(pointer) => response
                .json()
                .and_then(|body| body.pointer(pointer).cloned())
                .is_some_and(|value| !value.is_null()),
            CheckKind::Predicate(predicate) => predicate(response),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
}
