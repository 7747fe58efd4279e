//! Turns the end-of-run metric snapshot into a verdict.
use crate::recorder::MetricRegistry;
use stampede_core::{
    ConfigError, MetricsSnapshot, NoDataPolicy, Outcome, ThresholdExprs, ThresholdResult,
    ThresholdRule, Verdict,
};
use std::collections::BTreeMap;

/// Threshold rules checked against the registry at startup.
#[derive(Clone, Debug)]
pub struct ThresholdEvaluator {
    rules: Vec<ThresholdRule>,
    no_data: NoDataPolicy,
}

impl ThresholdEvaluator {
    /// Parses every expression and checks it against the metric it names.
    ///
    /// Every metric must already be registered, so the scenario and the builtins have to be
    /// bound first.
    pub fn compile(
        thresholds: &BTreeMap<String, ThresholdExprs>,
        registry: &MetricRegistry,
        no_data: NoDataPolicy,
    ) -> Result<Self, ConfigError> {
        if thresholds.is_empty() {
            return Err(ConfigError::NoThresholds);
        }

        let mut rules = vec![];
        for (metric, exprs) in thresholds {
            if exprs.expressions().is_empty() {
                return Err(ConfigError::EmptyThresholds(metric.clone()));
            }

            let kind = registry
                .kind(metric)
                .ok_or_else(|| ConfigError::UnknownMetric(metric.clone()))?;

            for expr in exprs.expressions() {
                let rule = ThresholdRule::parse(metric, expr)?;
                if !kind.supports(rule.aggregation) {
                    return Err(ConfigError::Aggregation {
                        metric: metric.clone(),
                        aggregation: rule.aggregation.to_string(),
                        kind,
                    });
                }
                rules.push(rule);
            }
        }

        Ok(Self { rules, no_data })
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    /// Results follow metric name order, then declaration order.
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Verdict {
        let results: Vec<ThresholdResult> = self
            .rules
            .iter()
            .map(|rule| self.evaluate_rule(rule, snapshot))
            .collect();
        let passed = results.iter().all(|r| r.passed);

        Verdict {
            no_data: self.no_data,
            results,
            passed,
        }
    }

    fn evaluate_rule(&self, rule: &ThresholdRule, snapshot: &MetricsSnapshot) -> ThresholdResult {
        let observed = snapshot
            .get(&rule.metric)
            .and_then(|summary| summary.aggregate(rule.aggregation));

        let outcome = match observed {
            Some(value) if rule.comparison.holds(value, rule.bound) => Outcome::Pass,
            Some(_) => Outcome::Fail,
            None => Outcome::NoData,
        };
        let passed = match outcome {
            Outcome::Pass => true,
            Outcome::Fail => false,
            Outcome::NoData => self.no_data == NoDataPolicy::Pass,
        };

        ThresholdResult {
            metric: rule.metric.clone(),
            expression: rule.expression.clone(),
            observed,
            outcome,
            passed,
        }
    }
}
