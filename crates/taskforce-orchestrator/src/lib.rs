//! Task orchestration core: routes work units to role-tagged handlers and
//! drives each run through analysis, work, collaboration and quality gates.
//!
//! Handlers are registered once at startup; runs then proceed concurrently
//! with no shared mutable state beyond the monitor.
//!
//! # Main types
//!
//! - [`Orchestrator`] — Lifecycle manager; `submit`, `submit_async` and `submit_team`.
//! - [`HandlerRegistry`] — Name-keyed, registration-ordered handler catalog.
//! - [`CapabilityMatcher`] — Role > expertise > keyword matching over configuration.
//! - [`TaskAnalyzer`] — Complexity, effort and collaboration heuristics.
//! - [`CollaborationBroker`] — Depth- and cycle-limited nested runs.
//! - [`QualityGateEvaluator`] — Baseline checks plus per-role predicates.
//! - [`TeamAssembler`] — Feature identifier → team roles.
//! - [`InvocationPlanner`] — Plans and audits bulk invocations.

/// Task analysis heuristics.
pub mod analyzer;
/// Collaboration fan-out and nested runs.
pub mod broker;
/// TOML configuration.
pub mod config;
/// Lifecycle manager.
pub mod engine;
/// Handler contract and the configuration-driven handler.
pub mod handler;
/// Bulk invocation planning and verification.
pub mod invocation;
/// Capability matching.
pub mod matcher;
/// Handler state and metrics monitoring.
pub mod monitor;
/// Built-in handler catalog and defaults.
pub mod profiles;
/// Per-run progress reporting.
pub mod progress;
/// Quality gates.
pub mod quality;
/// Handler registry.
pub mod registry;
/// Team assembly from feature identifiers.
pub mod team;
/// Shared orchestration types (RunResult, Analysis, Artifact, etc.).
pub mod types;

pub use analyzer::{AnalyzerConfig, TaskAnalyzer};
pub use broker::{CollaborationBroker, RunExecutor};
pub use config::{LifecycleConfig, OrchestratorConfig};
pub use engine::{Orchestrator, RunHandle, TeamRunSummary};
pub use handler::{ConfiguredHandler, Handler, HandlerCapabilities};
pub use invocation::{Confirmation, InvocationPlan, InvocationPlanner, InvocationPolicy, InvocationReport};
pub use matcher::{CapabilityMatcher, MatchReason};
pub use monitor::HandlerMonitor;
pub use profiles::default_definitions;
pub use progress::ProgressFn;
pub use quality::{CheckOutcome, QualityGateEvaluator, QualityPredicate, QualityRule};
pub use registry::{HandlerDefinition, HandlerRegistry};
pub use team::{FeatureIdentifier, TeamAssembler, TeamFlags, TeamPolicy};
pub use types::{
    Analysis, Artifact, CollaborationRecord, ComplexityClass, HandlerMetrics, HandlerState,
    ProgressEvent, QualityChecks, Recommendation, RunError, RunResult, RunStage, RunStatus,
    WorkOutput, WorkerStatus,
};
