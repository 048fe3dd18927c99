use crate::registry::HandlerRegistry;
use crate::types::{HandlerMetrics, HandlerState, WorkerStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Tracks state and metrics for every handler the orchestrator runs.
pub struct HandlerMonitor {
    states: Arc<RwLock<HashMap<String, HandlerState>>>,
}

impl HandlerMonitor {
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Pre-populate an idle entry for each registered handler.
    pub fn for_registry(registry: &HandlerRegistry) -> Self {
        let states = registry
            .definitions()
            .into_iter()
            .map(|def| (def.name.clone(), idle_state(&def.name, &def.role)))
            .collect();
        Self {
            states: Arc::new(RwLock::new(states)),
        }
    }

    /// Mark a handler as working on a unit.
    pub async fn start_run(&self, name: &str, role: &str, work_unit_id: Uuid) {
        let mut states = self.states.write().await;
        let state = states
            .entry(name.to_string())
            .or_insert_with(|| idle_state(name, role));
        state.current_work_unit = Some(work_unit_id);
        state.active_runs += 1;
        state.status = WorkerStatus::Working;
    }

    /// Record the end of a run. The handler goes idle once no run is in flight,
    /// or into `Error` if the last one failed.
    pub async fn finish_run(&self, name: &str, duration_ms: u64, success: bool) {
        let mut states = self.states.write().await;
        apply_finish(&mut states, name, duration_ms, success);
    }

    /// Like [`finish_run`](Self::finish_run) but without waiting for the lock.
    /// Returns `false` if the lock was busy and nothing was recorded.
    pub fn try_finish_run(&self, name: &str, duration_ms: u64, success: bool) -> bool {
        match self.states.try_write() {
            Ok(mut states) => {
                apply_finish(&mut states, name, duration_ms, success);
                true
            }
            Err(_) => false,
        }
    }

    pub async fn record_collaborations(&self, name: &str, count: usize) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(name) {
            state.metrics.collaborations += u32::try_from(count).unwrap_or(u32::MAX);
        }
    }

    /// Snapshot of all handler states, ordered by name.
    pub async fn snapshot(&self) -> Vec<HandlerState> {
        let states = self.states.read().await;
        let mut all: Vec<HandlerState> = states.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub async fn get_state(&self, name: &str) -> Option<HandlerState> {
        let states = self.states.read().await;
        states.get(name).cloned()
    }

    pub async fn aggregate_metrics(&self) -> HandlerMetrics {
        let states = self.states.read().await;
        let mut total = HandlerMetrics::default();
        for state in states.values() {
            total.runs += state.metrics.runs;
            total.failures += state.metrics.failures;
            total.collaborations += state.metrics.collaborations;
            total.duration_ms += state.metrics.duration_ms;
        }
        total
    }

    /// Serialize the current state as JSON (for dashboards and the CLI).
    pub async fn to_json(&self) -> serde_json::Value {
        let states = self.snapshot().await;
        let aggregate = self.aggregate_metrics().await;
        serde_json::json!({
            "handlers": states,
            "aggregate": aggregate,
        })
    }
}

fn apply_finish(
    states: &mut HashMap<String, HandlerState>,
    name: &str,
    duration_ms: u64,
    success: bool,
) {
    if let Some(state) = states.get_mut(name) {
        state.active_runs = state.active_runs.saturating_sub(1);
        state.metrics.runs += 1;
        state.metrics.duration_ms += duration_ms;
        if !success {
            state.metrics.failures += 1;
        }
        if state.active_runs == 0 {
            state.current_work_unit = None;
            state.status = if success {
                WorkerStatus::Idle
            } else {
                WorkerStatus::Error
            };
        }
    }
}

impl Default for HandlerMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn idle_state(name: &str, role: &str) -> HandlerState {
    HandlerState {
        name: name.to_string(),
        role: role.to_string(),
        current_work_unit: None,
        active_runs: 0,
        status: WorkerStatus::Idle,
        metrics: HandlerMetrics::default(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::registry::HandlerDefinition;

    fn monitor() -> HandlerMonitor {
        let registry = HandlerRegistry::from_definitions(vec![
            HandlerDefinition::new("backend-engineer", "backend"),
            HandlerDefinition::new("qa-engineer", "qa"),
        ])
        .unwrap();
        HandlerMonitor::for_registry(&registry)
    }

    #[tokio::test]
    async fn test_initial_state() {
        let states = monitor().snapshot().await;
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].name, "backend-engineer");
        for state in &states {
            assert_eq!(state.status, WorkerStatus::Idle);
            assert!(state.current_work_unit.is_none());
        }
    }

    #[tokio::test]
    async fn test_start_and_finish_run() {
        let monitor = monitor();
        let id = Uuid::new_v4();

        monitor.start_run("qa-engineer", "qa", id).await;
        let state = monitor.get_state("qa-engineer").await.unwrap();
        assert_eq!(state.status, WorkerStatus::Working);
        assert_eq!(state.current_work_unit, Some(id));

        monitor.finish_run("qa-engineer", 40, true).await;
        let state = monitor.get_state("qa-engineer").await.unwrap();
        assert_eq!(state.status, WorkerStatus::Idle);
        assert!(state.current_work_unit.is_none());
        assert_eq!(state.metrics.runs, 1);
        assert_eq!(state.metrics.duration_ms, 40);
    }

    #[tokio::test]
    async fn test_overlapping_runs_stay_working() {
        let monitor = monitor();
        monitor.start_run("qa-engineer", "qa", Uuid::new_v4()).await;
        monitor.start_run("qa-engineer", "qa", Uuid::new_v4()).await;
        monitor.finish_run("qa-engineer", 10, true).await;

        let state = monitor.get_state("qa-engineer").await.unwrap();
        assert_eq!(state.status, WorkerStatus::Working);
        assert_eq!(state.active_runs, 1);
    }

    #[tokio::test]
    async fn test_try_finish_run_respects_lock() {
        let monitor = monitor();
        monitor.start_run("qa-engineer", "qa", Uuid::new_v4()).await;

        {
            let _held = monitor.states.read().await;
            assert!(!monitor.try_finish_run("qa-engineer", 1, false));
        }
        assert!(monitor.try_finish_run("qa-engineer", 1, false));

        let state = monitor.get_state("qa-engineer").await.unwrap();
        assert_eq!(state.active_runs, 0);
        assert_eq!(state.status, WorkerStatus::Error);
        assert_eq!(state.metrics.runs, 1);
    }

    #[tokio::test]
    async fn test_failure_marks_error() {
        let monitor = monitor();
        monitor.start_run("backend-engineer", "backend", Uuid::new_v4()).await;
        monitor.finish_run("backend-engineer", 5, false).await;
        let state = monitor.get_state("backend-engineer").await.unwrap();
        assert_eq!(state.status, WorkerStatus::Error);
        assert_eq!(state.metrics.failures, 1);
    }

    #[tokio::test]
    async fn test_unknown_handler_is_tracked_on_start() {
        let monitor = HandlerMonitor::new();
        monitor.start_run("adhoc", "ops", Uuid::new_v4()).await;
        assert_eq!(monitor.get_state("adhoc").await.unwrap().role, "ops");
    }

    #[tokio::test]
    async fn test_aggregate_and_json() {
        let monitor = monitor();
        monitor.start_run("backend-engineer", "backend", Uuid::new_v4()).await;
        monitor.finish_run("backend-engineer", 100, true).await;
        monitor.record_collaborations("backend-engineer", 2).await;
        monitor.start_run("qa-engineer", "qa", Uuid::new_v4()).await;
        monitor.finish_run("qa-engineer", 50, false).await;

        let total = monitor.aggregate_metrics().await;
        assert_eq!(total.runs, 2);
        assert_eq!(total.failures, 1);
        assert_eq!(total.collaborations, 2);
        assert_eq!(total.duration_ms, 150);

        let json = monitor.to_json().await;
        assert_eq!(json["handlers"].as_array().unwrap().len(), 2);
        assert_eq!(json["aggregate"]["runs"], 2);
    }
}
