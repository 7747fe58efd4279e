use super::check::CheckOutcome;
use super::group::{extract_value, render_path, BoundGroup};
use super::BoundScenario;
use crate::recorder::BuiltinMetrics;
use crate::session::Credential;
use crate::transaction::{transaction, TransactionData};
use crate::transport::{endpoint, Transport};
use governor::DefaultDirectRateLimiter;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Unauthenticated,
    MissingData(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOutcome {
    /// No request was sent and no metric was touched.
    Skipped(SkipReason),
    Completed {
        /// `None` when no response was received.
        status: Option<u16>,
        /// `None` when no request was sent.
        duration: Option<Duration>,
        checks: Vec<CheckOutcome>,
        failed: bool,
    },
}

impl GroupOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, GroupOutcome::Skipped(_))
    }

    pub fn failed(&self) -> bool {
        matches!(self, GroupOutcome::Completed { failed: true, .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub name: String,
    pub outcome: GroupOutcome,
}

/// What happened during one pass over the scenario's groups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IterationResult {
    pub groups: Vec<GroupReport>,
    pub context: HashMap<String, String>,
    pub duration: Duration,
}

impl IterationResult {
    pub fn group(&self, name: &str) -> Option<&GroupOutcome> {
        self.groups
            .iter()
            .find(|g| g.name == name)
            .map(|g| &g.outcome)
    }
}

/// Runs iterations of a bound scenario. Shared by every virtual user of a run.
pub struct Executor<C> {
    scenario: BoundScenario,
    builtins: BuiltinMetrics,
    hook: TransactionData,
    transport: C,
    base_url: Url,
    credential: Arc<Credential>,
    request_timeout: Duration,
}

impl<C: Transport> Executor<C> {
    pub(crate) fn new(
        scenario: BoundScenario,
        builtins: BuiltinMetrics,
        transport: C,
        base_url: Url,
        credential: Arc<Credential>,
        limiter: Option<Arc<DefaultDirectRateLimiter>>,
        request_timeout: Duration,
    ) -> Self {
        let hook = TransactionData::new(&builtins, limiter);
        Self {
            scenario,
            builtins,
            hook,
            transport,
            base_url,
            credential,
            request_timeout,
        }
    }

    /// Runs every group in order. Groups never abort the iteration.
    pub async fn run_iteration(&self) -> IterationResult {
        let start = Instant::now();
        let mut context = HashMap::new();
        let mut groups = Vec::with_capacity(self.scenario.groups.len());

        for bound in &self.scenario.groups {
            let outcome = self.run_group(bound, &mut context).await;
            groups.push(GroupReport {
                name: bound.group.name.clone(),
                outcome,
            });
        }

        let duration = start.elapsed();
        self.builtins.iterations.add(1);
        self.builtins.iteration_duration.add(duration);

        IterationResult {
            groups,
            context,
            duration,
        }
    }

    async fn run_group(
        &self,
        bound: &BoundGroup,
        context: &mut HashMap<String, String>,
    ) -> GroupOutcome {
        let group = &bound.group;

        let token = match (group.authenticated, self.credential.token()) {
            (true, None) => {
                trace!("Skipping `{}`: no credential", group.name);
                return GroupOutcome::Skipped(SkipReason::Unauthenticated);
            }
            (true, token) => token,
            (false, _) => None,
        };

        if let Some(key) = group.needs.iter().find(|key| !context.contains_key(*key)) {
            trace!("Skipping `{}`: `{key}` was not produced", group.name);
            return GroupOutcome::Skipped(SkipReason::MissingData(key.clone()));
        }

        let path = match render_path(&group.path, context) {
            Ok(path) => path,
            Err(key) => {
                trace!("Skipping `{}`: `{key}` was not produced", group.name);
                return GroupOutcome::Skipped(SkipReason::MissingData(key));
            }
        };

        let (response, duration) = match endpoint(&self.base_url, &path) {
            Ok(url) => {
                let request = group.request(url, token, self.request_timeout);
                let (response, elapsed) = transaction(&self.hook, &self.transport, request).await;
                if let Some(trend) = &bound.trend {
                    trend.add(elapsed);
                }
                (response, Some(elapsed))
            }
            Err(err) => (Err(err), None),
        };

        let checks: Vec<CheckOutcome> = group
            .checks
            .iter()
            .map(|check| {
                let passed = check.evaluate(&response, duration.unwrap_or_default());
                self.builtins.checks.add(passed);
                CheckOutcome {
                    name: check.name().to_string(),
                    passed,
                }
            })
            .collect();

        let failed = response.is_err() || checks.iter().any(|c| !c.passed);
        self.scenario.errors.add(failed);

        let status = match &response {
            Ok(res) => {
                for (key, pointer) in &group.extract {
                    if let Some(value) = extract_value(res, pointer) {
                        context.insert(key.clone(), value);
                    }
                }
                Some(res.status)
            }
            Err(err) => {
                debug!("`{}` failed: {err}", group.name);
                None
            }
        };

        GroupOutcome::Completed {
            status,
            duration,
            checks,
            failed,
        }
    }
}
