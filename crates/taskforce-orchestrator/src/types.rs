use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use taskforce_core::{ErrorKind, TaskforceError, WorkUnit};
use uuid::Uuid;

/// Complexity class derived for a work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityClass {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ComplexityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComplexityClass::Low => write!(f, "low"),
            ComplexityClass::Medium => write!(f, "medium"),
            ComplexityClass::High => write!(f, "high"),
        }
    }
}

/// Result of analysing a work unit at the start of a run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub complexity_class: ComplexityClass,
    /// Human-readable effort estimate, e.g. "10 minutes".
    pub estimated_effort: String,
    pub estimated_minutes: u32,
    pub approach: String,
    pub requires_collaboration: bool,
    /// Collaborator roles in the order they will be asked.
    pub collaborators: Vec<String>,
    pub risks: Vec<String>,
}

/// Status of a run. Transitions only go `InProgress` → `Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::InProgress => write!(f, "in_progress"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// An artifact produced by a handler. The content is an opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub content: String,
}

impl Artifact {
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Priority attached to a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// A follow-up suggestion surfaced alongside a run's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: Priority,
    pub description: String,
    pub reasoning: String,
}

/// Structured error stored on a failed run or collaboration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RunError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&TaskforceError> for RunError {
    fn from(err: &TaskforceError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// Outcome of a single collaboration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaborationStatus {
    Completed,
    Failed,
}

/// One entry in a run's `collaborations` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationRecord {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    pub status: CollaborationStatus,
    /// Output summary of the nested run, when it produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    pub timestamp: DateTime<Utc>,
}

impl CollaborationRecord {
    pub fn completed(role: impl Into<String>, handler: impl Into<String>, result: String) -> Self {
        Self {
            role: role.into(),
            handler: Some(handler.into()),
            status: CollaborationStatus::Completed,
            result: Some(result),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(role: impl Into<String>, handler: Option<String>, error: RunError) -> Self {
        Self {
            role: role.into(),
            handler,
            status: CollaborationStatus::Failed,
            result: None,
            error: Some(error),
            timestamp: Utc::now(),
        }
    }

    /// Keep whatever partial output the nested run produced.
    pub fn with_result(mut self, result: Option<String>) -> Self {
        self.result = result.filter(|r| !r.is_empty());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == CollaborationStatus::Completed
    }
}

/// Findings of the quality gate, bucketed by outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityChecks {
    pub passed: Vec<String>,
    pub failed: Vec<String>,
    pub warnings: Vec<String>,
}

impl QualityChecks {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.warnings.is_empty()
    }

    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len() + self.warnings.len()
    }
}

/// What a handler's work function returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkOutput {
    pub output: String,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    /// Numeric metrics (coverage, finding counts, flags as 0/1).
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl WorkOutput {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

/// The externally visible record of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub work_unit_id: Uuid,
    pub handler_name: String,
    pub role: String,
    pub status: RunStatus,
    pub output: String,
    pub artifacts: Vec<Artifact>,
    pub recommendations: Vec<Recommendation>,
    pub collaborations: Vec<CollaborationRecord>,
    pub quality_checks: QualityChecks,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
    /// Collaboration nesting depth (0 for a caller's own submission).
    #[serde(default)]
    pub depth: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
}

impl RunResult {
    /// Open a run for `unit` on the named handler.
    pub fn open(unit: &WorkUnit, handler_name: &str, role: &str, depth: u32) -> Self {
        Self {
            work_unit_id: unit.id,
            handler_name: handler_name.to_string(),
            role: role.to_string(),
            status: RunStatus::InProgress,
            output: String::new(),
            artifacts: Vec::new(),
            recommendations: Vec::new(),
            collaborations: Vec::new(),
            quality_checks: QualityChecks::default(),
            metrics: BTreeMap::new(),
            analysis: None,
            depth,
            started_at: Utc::now(),
            completed_at: None,
            failed_at: None,
            error: None,
        }
    }

    pub fn is_final(&self) -> bool {
        self.status != RunStatus::InProgress
    }

    /// Finalize as completed. Returns false if the run was already final.
    pub fn complete(&mut self) -> bool {
        if self.is_final() {
            return false;
        }
        self.status = RunStatus::Completed;
        self.completed_at = Some(Utc::now());
        true
    }

    /// Finalize as failed. Returns false if the run was already final.
    pub fn fail(&mut self, error: RunError) -> bool {
        if self.is_final() {
            return false;
        }
        self.status = RunStatus::Failed;
        self.failed_at = Some(Utc::now());
        self.error = Some(error);
        true
    }

    /// Copy a handler's output into the record.
    pub fn absorb(&mut self, output: WorkOutput) {
        self.output = output.output;
        self.artifacts = output.artifacts;
        self.metrics = output.metrics;
    }
}

/// Lifecycle checkpoints, each with a fixed progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Started,
    Analyzed,
    WorkCompleted,
    Collaborated,
    Finalized,
}

impl RunStage {
    pub fn checkpoint(self) -> f32 {
        match self {
            RunStage::Started => 0.1,
            RunStage::Analyzed => 0.3,
            RunStage::WorkCompleted => 0.7,
            RunStage::Collaborated => 0.9,
            RunStage::Finalized => 1.0,
        }
    }
}

/// A progress notification for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub work_unit_id: Uuid,
    pub handler_name: String,
    pub stage: RunStage,
    pub progress: f32,
    pub timestamp: DateTime<Utc>,
}

/// Metrics tracked per handler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandlerMetrics {
    pub runs: u32,
    pub failures: u32,
    pub collaborations: u32,
    pub duration_ms: u64,
}

/// Real-time snapshot of a handler worker's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerState {
    pub name: String,
    pub role: String,
    /// Most recently started work unit while any run is active.
    pub current_work_unit: Option<Uuid>,
    /// Runs in flight; a handler can serve several units at once.
    pub active_runs: u32,
    pub status: WorkerStatus,
    pub metrics: HandlerMetrics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Idle,
    Working,
    Error,
}
