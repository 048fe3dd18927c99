use crate::types::{QualityChecks, WorkOutput};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use taskforce_core::{TaskforceError, TaskforceResult};
use tracing::warn;

/// Outcome of one quality check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed(String),
    Failed(String),
    Warning(String),
}

/// A named predicate evaluated over a handler's output.
///
/// Returning an error or panicking never fails the run: the evaluator turns
/// both into a warning.
pub trait QualityPredicate: Send + Sync {
    fn name(&self) -> &str;
    fn check(&self, output: &WorkOutput) -> TaskforceResult<CheckOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    AtLeast,
    AtMost,
}

/// Compares a numeric metric against a threshold.
#[derive(Debug, Clone)]
pub struct MetricThreshold {
    name: String,
    metric: String,
    threshold: f64,
    bound: Bound,
}

impl MetricThreshold {
    pub fn at_least(metric: impl Into<String>, threshold: f64) -> Self {
        let metric = metric.into();
        Self {
            name: format!("{metric} >= {threshold}"),
            metric,
            threshold,
            bound: Bound::AtLeast,
        }
    }

    pub fn at_most(metric: impl Into<String>, threshold: f64) -> Self {
        let metric = metric.into();
        Self {
            name: format!("{metric} <= {threshold}"),
            metric,
            threshold,
            bound: Bound::AtMost,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl QualityPredicate for MetricThreshold {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, output: &WorkOutput) -> TaskforceResult<CheckOutcome> {
        let Some(&value) = output.metrics.get(&self.metric) else {
            return Ok(CheckOutcome::Warning(format!(
                "{}: metric '{}' not reported",
                self.name, self.metric
            )));
        };
        let ok = match self.bound {
            Bound::AtLeast => value >= self.threshold,
            Bound::AtMost => value <= self.threshold,
        };
        Ok(if ok {
            CheckOutcome::Passed(self.name.clone())
        } else {
            CheckOutcome::Failed(format!("{} (got {value})", self.name))
        })
    }
}

/// Requires a boolean metric (reported as 0/1) to be set.
#[derive(Debug, Clone)]
pub struct FlagAsserted {
    name: String,
    flag: String,
}

impl FlagAsserted {
    pub fn new(flag: impl Into<String>) -> Self {
        let flag = flag.into();
        Self {
            name: format!("{flag} asserted"),
            flag,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl QualityPredicate for FlagAsserted {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, output: &WorkOutput) -> TaskforceResult<CheckOutcome> {
        Ok(match output.metrics.get(&self.flag) {
            None => CheckOutcome::Warning(format!("{}: flag '{}' not reported", self.name, self.flag)),
            Some(v) if *v != 0.0 => CheckOutcome::Passed(self.name.clone()),
            Some(_) => CheckOutcome::Failed(self.name.clone()),
        })
    }
}

/// Requires at least one artifact of a given type.
#[derive(Debug, Clone)]
pub struct ArtifactPresent {
    name: String,
    kind: String,
}

impl ArtifactPresent {
    pub fn new(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        Self {
            name: format!("produces a {kind} artifact"),
            kind,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl QualityPredicate for ArtifactPresent {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, output: &WorkOutput) -> TaskforceResult<CheckOutcome> {
        let found = output.artifacts.iter().any(|a| a.kind == self.kind);
        Ok(if found {
            CheckOutcome::Passed(self.name.clone())
        } else {
            CheckOutcome::Failed(self.name.clone())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    MinMetric,
    MaxMetric,
    FlagAsserted,
    ArtifactKind,
}

/// Declarative form of a predicate, as written in `[[quality.rules]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRule {
    pub role: String,
    pub kind: RuleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
}

impl QualityRule {
    pub fn new(role: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            role: role.into(),
            kind,
            name: None,
            metric: None,
            threshold: None,
            artifact_type: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_artifact_type(mut self, kind: impl Into<String>) -> Self {
        self.artifact_type = Some(kind.into());
        self
    }

    /// Build the predicate. Fails when a field the kind needs is missing.
    pub fn to_predicate(&self) -> TaskforceResult<Arc<dyn QualityPredicate>> {
        let metric = || {
            self.metric.clone().ok_or_else(|| {
                TaskforceError::Config(format!("{:?} rule for '{}' needs a metric", self.kind, self.role))
            })
        };
        let threshold = || {
            self.threshold.ok_or_else(|| {
                TaskforceError::Config(format!("{:?} rule for '{}' needs a threshold", self.kind, self.role))
            })
        };

        let predicate: Arc<dyn QualityPredicate> = match self.kind {
            RuleKind::MinMetric => {
                let mut p = MetricThreshold::at_least(metric()?, threshold()?);
                if let Some(name) = &self.name {
                    p = p.named(name);
                }
                Arc::new(p)
            }
            RuleKind::MaxMetric => {
                let mut p = MetricThreshold::at_most(metric()?, threshold()?);
                if let Some(name) = &self.name {
                    p = p.named(name);
                }
                Arc::new(p)
            }
            RuleKind::FlagAsserted => {
                let mut p = FlagAsserted::new(metric()?);
                if let Some(name) = &self.name {
                    p = p.named(name);
                }
                Arc::new(p)
            }
            RuleKind::ArtifactKind => {
                let kind = self.artifact_type.clone().ok_or_else(|| {
                    TaskforceError::Config(format!(
                        "artifact_kind rule for '{}' needs an artifact_type",
                        self.role
                    ))
                })?;
                let mut p = ArtifactPresent::new(kind);
                if let Some(name) = &self.name {
                    p = p.named(name);
                }
                Arc::new(p)
            }
        };
        Ok(predicate)
    }
}

const NON_EMPTY_OUTPUT: &str = "output is non-empty";
const HAS_ARTIFACT: &str = "at least one artifact produced";

/// Runs the baseline checks plus any predicates registered for a role.
#[derive(Clone, Default)]
pub struct QualityGateEvaluator {
    predicates: HashMap<String, Vec<Arc<dyn QualityPredicate>>>,
}

impl QualityGateEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: &[QualityRule]) -> TaskforceResult<Self> {
        let mut evaluator = Self::new();
        for rule in rules {
            evaluator.register(rule.role.clone(), rule.to_predicate()?);
        }
        Ok(evaluator)
    }

    pub fn register(&mut self, role: impl Into<String>, predicate: Arc<dyn QualityPredicate>) {
        self.predicates.entry(role.into()).or_default().push(predicate);
    }

    pub fn predicate_count(&self, role: &str) -> usize {
        self.predicates.get(role).map_or(0, Vec::len)
    }

    pub fn evaluate(&self, role: &str, output: &WorkOutput) -> QualityChecks {
        let mut checks = QualityChecks::default();

        if output.output.trim().is_empty() {
            checks.failed.push(NON_EMPTY_OUTPUT.to_string());
        } else {
            checks.passed.push(NON_EMPTY_OUTPUT.to_string());
        }
        if output.artifacts.is_empty() {
            checks.warnings.push(format!("{HAS_ARTIFACT}: none"));
        } else {
            checks.passed.push(HAS_ARTIFACT.to_string());
        }

        for predicate in self.predicates.get(role).into_iter().flatten() {
            let name = predicate.name().to_string();
            match catch_unwind(AssertUnwindSafe(|| predicate.check(output))) {
                Ok(Ok(CheckOutcome::Passed(msg))) => checks.passed.push(msg),
                Ok(Ok(CheckOutcome::Failed(msg))) => checks.failed.push(msg),
                Ok(Ok(CheckOutcome::Warning(msg))) => checks.warnings.push(msg),
                Ok(Err(e)) => {
                    warn!(role, check = %name, error = %e, "Quality check errored");
                    checks.warnings.push(format!("{name}: check errored: {e}"));
                }
                Err(_) => {
                    warn!(role, check = %name, "Quality check panicked");
                    checks.warnings.push(format!("{name}: check panicked"));
                }
            }
        }

        checks
    }
}

impl std::fmt::Debug for QualityGateEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut roles: Vec<(&String, usize)> =
            self.predicates.iter().map(|(r, p)| (r, p.len())).collect();
        roles.sort();
        f.debug_struct("QualityGateEvaluator")
            .field("predicates", &roles)
            .finish()
    }
}
