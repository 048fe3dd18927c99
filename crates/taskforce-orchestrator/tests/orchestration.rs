//! End-to-end lifecycle tests.
//!
//! Drives work units through the orchestrator with scripted handlers and checks
//! run status, progress ordering, collaboration records and team assembly.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taskforce_core::{ErrorKind, TaskforceError, TaskforceResult, WorkUnit};
use taskforce_orchestrator::*;

// ---------------------------------------------------------------------------
// Scripted handlers
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Behavior {
    Succeed,
    Fail,
    Panic,
    Sleep(Duration),
}

struct ScriptedHandler {
    definition: HandlerDefinition,
    behavior: Behavior,
}

impl ScriptedHandler {
    fn boxed(definition: HandlerDefinition, behavior: Behavior) -> Arc<dyn Handler> {
        Arc::new(Self {
            definition,
            behavior,
        })
    }
}

#[async_trait]
impl Handler for ScriptedHandler {
    fn definition(&self) -> &HandlerDefinition {
        &self.definition
    }

    async fn work(&self, unit: &WorkUnit, _analysis: &Analysis) -> TaskforceResult<WorkOutput> {
        match &self.behavior {
            Behavior::Succeed => Ok(WorkOutput::new(format!(
                "{} done: {}",
                self.definition.name, unit.description
            ))
            .with_artifact(Artifact::new("report", "out.md", "# done"))),
            Behavior::Fail => Err(TaskforceError::HandlerExecutionFailed("disk full".into())),
            Behavior::Panic => panic!("handler bug"),
            Behavior::Sleep(d) => {
                tokio::time::sleep(*d).await;
                Ok(WorkOutput::new(format!("{} finished late", self.definition.name)))
            }
        }
    }
}

fn registry_of(handlers: Vec<Arc<dyn Handler>>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    for handler in handlers {
        registry.register(handler).unwrap();
    }
    registry
}

fn catalog() -> Orchestrator {
    Orchestrator::from_config(&OrchestratorConfig::default()).unwrap()
}

/// Orchestrator that records every progress event, nested runs included.
fn recording(registry: HandlerRegistry) -> (Orchestrator, Arc<Mutex<Vec<ProgressEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let orch = Orchestrator::new(registry).with_progress(move |e| sink.lock().unwrap().push(e.clone()));
    (orch, events)
}

fn assert_progress_well_formed(progress: &[f32]) {
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
    assert_eq!(progress.iter().filter(|p| **p == 1.0).count(), 1, "{progress:?}");
    assert_eq!(progress.last(), Some(&1.0));
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_simple_frontend_unit_is_low_complexity() {
    let unit = WorkUnit::new("build a simple login form").with_role("frontend");
    let run = catalog().submit(unit).await.unwrap();

    let analysis = run.analysis.unwrap();
    assert_eq!(analysis.complexity_class, ComplexityClass::Low);
    assert_eq!(analysis.estimated_effort, "10 minutes");
    assert_eq!(run.status, RunStatus::Completed);
}

#[test]
fn test_low_complexity_identifier_team() {
    let team = TeamAssembler::default()
        .assemble("1.1.1.1.0.0", &TeamFlags::default())
        .unwrap();
    assert!((5..=7).contains(&team.len()), "{team:?}");
    for role in ["product", "backend", "qa"] {
        assert!(team.iter().any(|r| r == role));
    }
}

#[test]
fn test_maximal_customer_facing_team() {
    let assembler = TeamAssembler::default();
    let small = assembler
        .assemble("1.1.1.1.0.0", &TeamFlags::default())
        .unwrap();
    let flags = TeamFlags {
        customer_facing: true,
        ..TeamFlags::default()
    };
    let large = assembler.assemble("4.8.5.4.5.7", &flags).unwrap();

    assert!(large.len() >= 15, "{large:?}");
    let oversight: Vec<&String> = large
        .iter()
        .filter(|r| ["compliance", "legal"].contains(&r.as_str()))
        .collect();
    assert!(!oversight.is_empty());
    assert!(oversight.iter().all(|r| !small.contains(r)));
}

#[test]
fn test_malformed_identifier_fails_fast() {
    let err = TeamAssembler::default()
        .assemble("4.8.x", &TeamFlags::default())
        .unwrap_err();
    assert!(matches!(err, TaskforceError::InvalidIdentifier(_)));
}

#[tokio::test]
async fn test_failing_work_function_fails_run() {
    let orch = Orchestrator::new(registry_of(vec![ScriptedHandler::boxed(
        HandlerDefinition::new("flaky", "backend"),
        Behavior::Fail,
    )]));
    let run = orch
        .submit(WorkUnit::new("anything").with_role("backend"))
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    let error = run.error.unwrap();
    assert_eq!(error.kind, ErrorKind::HandlerExecutionFailed);
    assert!(error.message.contains("disk full"));
    assert!(run.artifacts.is_empty());
    assert!(run.failed_at.is_some());
}

#[tokio::test]
async fn test_partial_collaboration_keeps_parent_completed() {
    let registry = registry_of(vec![
        ScriptedHandler::boxed(
            HandlerDefinition::new("lead", "backend").with_collaborators(["qa", "ghost"]),
            Behavior::Succeed,
        ),
        Arc::new(ConfiguredHandler::new(HandlerDefinition::new("qa-engineer", "qa"))),
    ]);
    let orch = Orchestrator::new(registry);
    let unit = WorkUnit::new("Coordinate the billing API rollout").with_role("backend");
    let run = orch.submit(unit).await.unwrap();

    assert!(run.analysis.as_ref().unwrap().requires_collaboration);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.collaborations.len(), 2);

    let qa = &run.collaborations[0];
    assert_eq!(qa.role, "qa");
    assert!(qa.is_success());
    assert!(qa.result.as_ref().unwrap().contains("Assist with: Coordinate"));

    let ghost = &run.collaborations[1];
    assert_eq!(ghost.role, "ghost");
    assert!(!ghost.is_success());
    assert_eq!(ghost.error.as_ref().unwrap().kind, ErrorKind::HandlerNotFound);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn test_role_request_matches_exactly_one_catalog_handler() {
    let orch = catalog();
    let registry = orch.registry();
    for role in registry.roles() {
        let unit = WorkUnit::new("build the api and the form").with_role(role.clone());
        let accepting: Vec<String> = registry
            .all()
            .iter()
            .filter(|h| h.can_handle(&unit, orch.matcher()))
            .map(|h| h.definition().role.clone())
            .collect();
        assert_eq!(accepting, vec![role]);
    }
}

#[tokio::test]
async fn test_final_timestamps_are_exclusive() {
    let orch = Orchestrator::new(registry_of(vec![
        ScriptedHandler::boxed(HandlerDefinition::new("ok", "backend"), Behavior::Succeed),
        ScriptedHandler::boxed(HandlerDefinition::new("bad", "qa"), Behavior::Fail),
    ]));

    let done = orch.submit(WorkUnit::new("x").with_role("backend")).await.unwrap();
    assert!(done.completed_at.is_some() && done.failed_at.is_none());

    let failed = orch.submit(WorkUnit::new("x").with_role("qa")).await.unwrap();
    assert!(failed.failed_at.is_some() && failed.completed_at.is_none());
}

#[tokio::test]
async fn test_async_progress_is_monotonic() {
    let orch = Arc::new(catalog());
    let handle = orch
        .submit_async(WorkUnit::new("Coordinate a complex checkout page").with_role("frontend"))
        .unwrap();
    let id = handle.work_unit_id();
    let (run, events) = handle.wait_with_progress().await.unwrap();

    assert_eq!(run.work_unit_id, id);
    assert!(events.iter().all(|e| e.work_unit_id == id));
    let progress: Vec<f32> = events.iter().map(|e| e.progress).collect();
    assert_eq!(progress, vec![0.1, 0.3, 0.7, 0.9, 1.0]);
}

#[tokio::test]
async fn test_progress_on_failure_still_finalizes() {
    let orch = Arc::new(Orchestrator::new(registry_of(vec![ScriptedHandler::boxed(
        HandlerDefinition::new("bad", "qa"),
        Behavior::Fail,
    )])));
    let mut handle = orch.submit_async(WorkUnit::new("x").with_role("qa")).unwrap();

    let mut progress = Vec::new();
    while let Some(event) = handle.next_progress().await {
        progress.push(event.progress);
    }
    assert_eq!(progress, vec![0.1, 0.3, 1.0]);
    assert_progress_well_formed(&progress);
    assert_eq!(handle.wait().await.unwrap().status, RunStatus::Failed);
}

#[tokio::test]
async fn test_no_collaboration_means_no_records() {
    let orch = catalog();
    for description in [
        "build a simple login form",
        "Render the profile page",
        "",
        "An advanced form wizard",
    ] {
        let run = orch
            .submit(WorkUnit::new(description).with_role("frontend"))
            .await
            .unwrap();
        let analysis = run.analysis.unwrap();
        if !analysis.requires_collaboration {
            assert!(run.collaborations.is_empty(), "{description}");
        }
    }
}

#[test]
fn test_team_size_monotonic_in_complexity_positions() {
    let assembler = TeamAssembler::default();
    let flags = TeamFlags::default();
    let pairs = [
        ("2.0.0.0.0.0", "2.9.0.0.0.0"),
        ("2.3.0.0.0.0", "2.3.4.0.0.0"),
        ("3.0.0.5.0.0", "3.0.0.6.0.0"),
        ("0.1.1.1.1.1", "0.1.1.1.1.9"),
        ("7.2.2.2.2.2", "7.2.2.2.8.2"),
    ];
    for (small, large) in pairs {
        let small_team = assembler.assemble(small, &flags).unwrap();
        let large_team = assembler.assemble(large, &flags).unwrap();
        assert!(small_team.iter().all(|r| large_team.contains(r)), "{small} vs {large}");
    }
}

#[test]
fn test_matching_is_idempotent() {
    let orch = catalog();
    let unit = WorkUnit::new("Expose a database endpoint").with_expertise(["rust"]);
    for handler in orch.registry().all() {
        let first = handler.can_handle(&unit, orch.matcher());
        let second = handler.can_handle(&unit, orch.matcher());
        assert_eq!(first, second, "{}", handler.definition().name);
    }
}

// ---------------------------------------------------------------------------
// Deadlines, panics and nesting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_work_timeout_fails_run() {
    let orch = Orchestrator::new(registry_of(vec![ScriptedHandler::boxed(
        HandlerDefinition::new("slow", "backend"),
        Behavior::Sleep(Duration::from_secs(30)),
    )]))
    .with_work_timeout(Duration::from_millis(50));

    let run = orch
        .submit(WorkUnit::new("x").with_role("backend"))
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error.unwrap().kind, ErrorKind::Timeout);
}

#[tokio::test]
async fn test_panicking_work_function_fails_run() {
    let orch = Orchestrator::new(registry_of(vec![ScriptedHandler::boxed(
        HandlerDefinition::new("buggy", "backend"),
        Behavior::Panic,
    )]));
    let run = orch
        .submit(WorkUnit::new("x").with_role("backend"))
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error.unwrap().kind, ErrorKind::HandlerExecutionFailed);

    let state = orch.monitor().get_state("buggy").await.unwrap();
    assert_eq!(state.status, WorkerStatus::Error);
}

fn mutual_pair() -> HandlerRegistry {
    registry_of(vec![
        ScriptedHandler::boxed(
            HandlerDefinition::new("api", "backend").with_collaborators(["qa"]),
            Behavior::Succeed,
        ),
        ScriptedHandler::boxed(
            HandlerDefinition::new("tester", "qa").with_collaborators(["backend"]),
            Behavior::Succeed,
        ),
    ])
}

fn finalized_runs(events: &Mutex<Vec<ProgressEvent>>) -> usize {
    events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.stage == RunStage::Finalized)
        .map(|e| e.work_unit_id)
        .collect::<HashSet<_>>()
        .len()
}

#[tokio::test]
async fn test_mutual_hints_stop_at_depth_limit() {
    let (orch, events) = recording(mutual_pair());
    let run = orch
        .submit(WorkUnit::new("Coordinate the release").with_role("backend"))
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.collaborations.len(), 1);
    assert!(run.collaborations[0].is_success());
    // Root run plus one nested run, nothing deeper.
    assert_eq!(finalized_runs(&events), 2);
}

#[tokio::test]
async fn test_mutual_hints_stop_at_cycle() {
    let (orch, events) = recording(mutual_pair());
    let orch = orch.with_broker(CollaborationBroker::new().with_max_depth(5));
    let run = orch
        .submit(WorkUnit::new("Coordinate the release").with_role("backend"))
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(finalized_runs(&events), 2);
}

#[tokio::test]
async fn test_collaborations_keep_issue_order() {
    let registry = registry_of(vec![
        ScriptedHandler::boxed(
            HandlerDefinition::new("lead", "backend").with_collaborators(["slow", "fast"]),
            Behavior::Succeed,
        ),
        ScriptedHandler::boxed(
            HandlerDefinition::new("tortoise", "slow"),
            Behavior::Sleep(Duration::from_millis(80)),
        ),
        ScriptedHandler::boxed(HandlerDefinition::new("hare", "fast"), Behavior::Succeed),
    ]);
    let run = Orchestrator::new(registry)
        .submit(WorkUnit::new("Coordinate the launch").with_role("backend"))
        .await
        .unwrap();

    let roles: Vec<&str> = run.collaborations.iter().map(|c| c.role.as_str()).collect();
    assert_eq!(roles, vec!["slow", "fast"]);
    assert!(run.collaborations.iter().all(CollaborationRecord::is_success));
}

#[tokio::test]
async fn test_nested_progress_reaches_callback() {
    let (orch, events) = recording(mutual_pair());
    orch.submit(WorkUnit::new("Coordinate the release").with_role("backend"))
        .await
        .unwrap();

    let events = events.lock().unwrap();
    let ids: HashSet<_> = events.iter().map(|e| e.work_unit_id).collect();
    for id in ids {
        let progress: Vec<f32> = events
            .iter()
            .filter(|e| e.work_unit_id == id)
            .map(|e| e.progress)
            .collect();
        assert_progress_well_formed(&progress);
    }
}

/// Collaborator whose work outlives the collaboration deadline.
struct LateCollaborator {
    definition: HandlerDefinition,
    finished: Arc<AtomicBool>,
}

#[async_trait]
impl Handler for LateCollaborator {
    fn definition(&self) -> &HandlerDefinition {
        &self.definition
    }

    async fn work(&self, _unit: &WorkUnit, _analysis: &Analysis) -> TaskforceResult<WorkOutput> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(WorkOutput::new("too late"))
    }
}

#[tokio::test]
async fn test_collaboration_timeout_closes_nested_run() {
    let finished = Arc::new(AtomicBool::new(false));
    let registry = registry_of(vec![
        ScriptedHandler::boxed(
            HandlerDefinition::new("lead", "backend").with_collaborators(["qa"]),
            Behavior::Succeed,
        ),
        Arc::new(LateCollaborator {
            definition: HandlerDefinition::new("tester", "qa"),
            finished: Arc::clone(&finished),
        }),
    ]);
    let (orch, events) = recording(registry);
    let orch = orch.with_broker(CollaborationBroker::new().with_timeout(Duration::from_millis(50)));

    let run = orch
        .submit(WorkUnit::new("Coordinate the release").with_role("backend"))
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.collaborations.len(), 1);
    assert_eq!(
        run.collaborations[0].error.as_ref().unwrap().kind,
        ErrorKind::Timeout
    );

    let tester = orch.monitor().get_state("tester").await.unwrap();
    assert_eq!(tester.active_runs, 0);
    assert_eq!(tester.status, WorkerStatus::Error);
    assert_eq!(tester.metrics.runs, 1);
    assert_eq!(tester.metrics.failures, 1);

    let nested: Vec<f32> = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.handler_name == "tester")
        .map(|e| e.progress)
        .collect();
    assert_eq!(nested, vec![0.1, 0.3, 1.0]);

    // The cancelled work task must not keep running in the background.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!finished.load(Ordering::SeqCst));
    let tester = orch.monitor().get_state("tester").await.unwrap();
    assert_eq!(tester.metrics.runs, 1);
}

// ---------------------------------------------------------------------------
// Bulk invocation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_plan_execute_verify() {
    let orch = catalog();
    let planner = InvocationPlanner::new(InvocationPolicy::default()).unwrap();
    let plan = planner.plan("Leadership review of the pricing change", orch.registry());
    assert_eq!(plan.request_type, "leadership_review");

    let summary = orch.submit_team(&plan.roles, &plan.request_text).await;
    let report = planner.verify(&plan, &summary.completed_roles(), &summary.failed_roles());

    assert_eq!(report.invoked.len(), plan.roles.len());
    assert_eq!(report.completion_rate, 1.0);
    assert!(report.success);
}
