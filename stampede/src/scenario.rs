//! Scenario definitions and the per-iteration executor.
//!
//! Only the definitions are public. Iterations are run by [`LoadTest`](crate::LoadTest):
//!
//! ```compile_fail
//! use stampede::scenario::Executor;
//! ```
mod check;
mod executor;
mod group;

pub use check::{Check, CheckKind, CheckOutcome};
pub(crate) use executor::Executor;
pub use group::Group;

use crate::recorder::{MetricRegistry, Rate};
use group::BoundGroup;
use stampede_core::ConfigError;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_ERROR_METRIC: &str = "errors";

/// An ordered list of groups run by every virtual user on each iteration.
#[derive(Clone, Debug)]
pub struct Scenario {
    name: String,
    groups: Vec<Group>,
    error_metric: String,
}

impl Scenario {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            groups: vec![],
            error_metric: DEFAULT_ERROR_METRIC.to_string(),
        }
    }

    pub fn group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    /// Rate metric receiving one outcome per executed group, `true` when it failed.
    pub fn error_metric(mut self, metric: &str) -> Self {
        self.error_metric = metric.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Registers the scenario's metrics. Must happen before the run so the registry can be frozen.
    pub(crate) fn bind(&self, registry: &mut MetricRegistry) -> Result<BoundScenario, ConfigError> {
        let errors = registry.rate(&self.error_metric)?;
        let groups = self
            .groups
            .iter()
            .map(|group| {
                let trend = group
                    .trend
                    .as_deref()
                    .map(|name| registry.trend(name))
                    .transpose()?;
                Ok(BoundGroup {
                    group: group.clone(),
                    trend,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(BoundScenario { groups, errors })
    }
}

/// The backend smoke workload: health, authenticated user listing and geographic data.
pub fn default_scenario() -> Scenario {
    Scenario::new("backend")
        .group(
            Group::get("Health Check", "/health")
                .trend("health_latency")
                .check(Check::status(200))
                .check(Check::duration_below(Duration::from_millis(100))),
        )
        .group(
            Group::get("API - List users", "/api/v1/users")
                .authenticated()
                .trend("users_latency")
                .check(Check::status(200))
                .check(Check::duration_below(Duration::from_millis(500))),
        )
        .group(Group::get("API - Geographic data", "/api/v1/geo").check(Check::status(200)))
}

pub(crate) struct BoundScenario {
    pub groups: Vec<BoundGroup>,
    pub errors: Arc<Rate>,
}
