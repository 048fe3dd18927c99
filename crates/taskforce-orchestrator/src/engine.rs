use crate::analyzer::TaskAnalyzer;
use crate::broker::{CollaborationBroker, RunExecutor};
use crate::config::OrchestratorConfig;
use crate::handler::Handler;
use crate::matcher::CapabilityMatcher;
use crate::monitor::HandlerMonitor;
use crate::profiles::default_keywords;
use crate::progress::{ProgressFn, ProgressReporter};
use crate::quality::QualityGateEvaluator;
use crate::registry::HandlerRegistry;
use crate::types::{Analysis, ProgressEvent, RunError, RunResult, RunStage, RunStatus, WorkOutput};
use async_trait::async_trait;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskforce_core::{TaskforceError, TaskforceResult, WorkUnit};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Drives work units through their lifecycle:
/// match → analyze → work → recommend → collaborate → quality gate → finalize.
pub struct Orchestrator {
    registry: Arc<HandlerRegistry>,
    matcher: CapabilityMatcher,
    analyzer: TaskAnalyzer,
    quality: QualityGateEvaluator,
    broker: CollaborationBroker,
    monitor: Arc<HandlerMonitor>,
    work_timeout: Duration,
    on_progress: Option<ProgressFn>,
}

impl Orchestrator {
    /// Create an orchestrator over `registry` with the built-in keyword table,
    /// baseline quality checks, and default deadlines.
    pub fn new(registry: HandlerRegistry) -> Self {
        let monitor = Arc::new(HandlerMonitor::for_registry(&registry));
        Self {
            registry: Arc::new(registry),
            matcher: CapabilityMatcher::new(default_keywords()),
            analyzer: TaskAnalyzer::default(),
            quality: QualityGateEvaluator::new(),
            broker: CollaborationBroker::new(),
            monitor,
            work_timeout: Duration::from_secs(300),
            on_progress: None,
        }
    }

    /// Build the registry and every component from `config`.
    pub fn from_config(config: &OrchestratorConfig) -> TaskforceResult<Self> {
        Self::with_registry(config, config.build_registry()?)
    }

    /// Use `config` for everything except the handlers.
    pub fn with_registry(config: &OrchestratorConfig, registry: HandlerRegistry) -> TaskforceResult<Self> {
        config.validate()?;
        let lifecycle = &config.lifecycle;
        Ok(Self::new(registry)
            .with_matcher(CapabilityMatcher::new(config.matcher.keywords.clone()))
            .with_analyzer(TaskAnalyzer::new(config.analyzer.clone()))
            .with_quality(QualityGateEvaluator::from_rules(&config.quality.rules)?)
            .with_broker(
                CollaborationBroker::new()
                    .with_max_depth(lifecycle.max_collaboration_depth)
                    .with_timeout(lifecycle.collaboration_timeout()),
            )
            .with_work_timeout(lifecycle.work_timeout()))
    }

    pub fn with_matcher(mut self, matcher: CapabilityMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_analyzer(mut self, analyzer: TaskAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_quality(mut self, quality: QualityGateEvaluator) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_broker(mut self, broker: CollaborationBroker) -> Self {
        self.broker = broker;
        self
    }

    /// Deadline for a single handler work function.
    pub fn with_work_timeout(mut self, timeout: Duration) -> Self {
        self.work_timeout = timeout;
        self
    }

    /// Register a callback invoked for every progress event of every run,
    /// nested collaboration runs included.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn monitor(&self) -> &Arc<HandlerMonitor> {
        &self.monitor
    }

    pub fn matcher(&self) -> &CapabilityMatcher {
        &self.matcher
    }

    /// Run `unit` to completion.
    ///
    /// Only a unit no handler accepts is an error; everything that goes wrong
    /// once a handler is chosen is reported on the returned [`RunResult`].
    pub async fn submit(&self, unit: WorkUnit) -> TaskforceResult<RunResult> {
        let handler = self.matcher.select(&self.registry, &unit)?;
        let progress = self.reporter(&unit, &handler);
        Ok(self.run(handler, unit, 0, progress).await)
    }

    /// Start `unit` in the background and return a handle for progress and
    /// the final result.
    pub fn submit_async(self: &Arc<Self>, unit: WorkUnit) -> TaskforceResult<RunHandle> {
        let handler = self.matcher.select(&self.registry, &unit)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let progress = self.reporter(&unit, &handler).with_sink(tx);
        let work_unit_id = unit.id;

        let this = Arc::clone(self);
        let join = tokio::spawn(async move { this.run(handler, unit, 0, progress).await });

        Ok(RunHandle {
            work_unit_id,
            progress: rx,
            join,
        })
    }

    /// Run one unit per role concurrently, all sharing `description`.
    ///
    /// Roles no handler accepts are reported as unmatched instead of failing
    /// the whole batch.
    pub async fn submit_team(&self, roles: &[String], description: &str) -> TeamRunSummary {
        let mut unmatched = Vec::new();
        let mut pending = Vec::new();
        for role in roles {
            let unit = WorkUnit::new(description).with_role(role.clone());
            match self.matcher.select(&self.registry, &unit) {
                Ok(handler) => {
                    let progress = self.reporter(&unit, &handler);
                    pending.push(self.run(handler, unit, 0, progress));
                }
                Err(_) => unmatched.push(role.clone()),
            }
        }

        let runs = join_all(pending).await;
        let summary = TeamRunSummary { runs, unmatched };
        info!(
            completed = summary.completed_roles().len(),
            failed = summary.failed_roles().len(),
            unmatched = summary.unmatched.len(),
            "Orchestrator: team run complete"
        );
        summary
    }

    fn reporter(&self, unit: &WorkUnit, handler: &Arc<dyn Handler>) -> ProgressReporter {
        ProgressReporter::new(unit.id, handler.definition().name.clone())
            .with_callback(self.on_progress.clone())
    }

    async fn run(
        &self,
        handler: Arc<dyn Handler>,
        unit: WorkUnit,
        depth: u32,
        progress: ProgressReporter,
    ) -> RunResult {
        let definition = handler.definition().clone();
        let mut run = RunResult::open(&unit, &definition.name, &definition.role, depth);

        info!(
            work_unit_id = %unit.id,
            handler = %definition.name,
            depth,
            "Lifecycle: run started"
        );
        self.monitor
            .start_run(&definition.name, &definition.role, unit.id)
            .await;
        let mut guard = RunGuard {
            monitor: Arc::clone(&self.monitor),
            handler_name: definition.name.clone(),
            work_unit_id: unit.id,
            start: Instant::now(),
            progress,
            settled: false,
        };
        guard.progress.emit(RunStage::Started);

        let analysis = self.analyzer.analyze(&unit, &definition);
        run.analysis = Some(analysis.clone());
        guard.progress.emit(RunStage::Analyzed);

        let output = match self.perform(handler, &unit, &analysis).await {
            Ok(output) => output,
            Err(e) => {
                error!(
                    work_unit_id = %unit.id,
                    handler = %definition.name,
                    error = %e,
                    "Lifecycle: work failed"
                );
                run.fail(RunError::from(&e));
                return self.finish(run, guard).await;
            }
        };
        guard.progress.emit(RunStage::WorkCompleted);

        run.recommendations = self.analyzer.recommend(&analysis, &output.artifacts);

        if analysis.requires_collaboration {
            let records = self
                .broker
                .collaborate(&self.registry, self, &definition, &unit, &analysis, depth)
                .await;
            self.monitor
                .record_collaborations(&definition.name, records.len())
                .await;
            run.collaborations = records;
            guard.progress.emit(RunStage::Collaborated);
        }

        run.quality_checks = self.quality.evaluate(&definition.role, &output);
        run.absorb(output);
        run.complete();
        self.finish(run, guard).await
    }

    /// Execute the handler's work function on its own task, under the work
    /// deadline. Panics and timeouts come back as errors.
    async fn perform(
        &self,
        handler: Arc<dyn Handler>,
        unit: &WorkUnit,
        analysis: &Analysis,
    ) -> TaskforceResult<WorkOutput> {
        let unit = unit.clone();
        let analysis = analysis.clone();
        let task = tokio::spawn(async move { handler.work(&unit, &analysis).await });
        let _abort = AbortOnDrop(task.abort_handle());

        match tokio::time::timeout(self.work_timeout, task).await {
            Ok(Ok(result)) => result.map_err(|e| match e {
                TaskforceError::HandlerExecutionFailed(_) | TaskforceError::Timeout(_) => e,
                other => TaskforceError::HandlerExecutionFailed(other.to_string()),
            }),
            Ok(Err(join_error)) => Err(TaskforceError::HandlerExecutionFailed(format!(
                "work function panicked: {join_error}"
            ))),
            Err(_) => Err(TaskforceError::Timeout(format!(
                "work function exceeded {:?}",
                self.work_timeout
            ))),
        }
    }

    async fn finish(&self, run: RunResult, mut guard: RunGuard) -> RunResult {
        let duration_ms = elapsed_ms(guard.start);
        let success = run.status == RunStatus::Completed;
        self.monitor
            .finish_run(&run.handler_name, duration_ms, success)
            .await;
        guard.settled = true;
        guard.progress.emit(RunStage::Finalized);

        info!(
            work_unit_id = %run.work_unit_id,
            handler = %run.handler_name,
            status = %run.status,
            collaborations = run.collaborations.len(),
            duration_ms,
            "Lifecycle: run finalized"
        );
        run
    }
}

#[async_trait]
impl RunExecutor for Orchestrator {
    async fn execute(&self, handler: Arc<dyn Handler>, unit: WorkUnit, depth: u32) -> RunResult {
        let progress = self.reporter(&unit, &handler);
        self.run(handler, unit, depth, progress).await
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Closes out a run whose future is dropped before `finish`, as happens when
/// a collaboration deadline cancels a nested run. The run counts as failed.
struct RunGuard {
    monitor: Arc<HandlerMonitor>,
    handler_name: String,
    work_unit_id: Uuid,
    start: Instant,
    progress: ProgressReporter,
    settled: bool,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let duration_ms = elapsed_ms(self.start);
        warn!(
            work_unit_id = %self.work_unit_id,
            handler = %self.handler_name,
            duration_ms,
            "Lifecycle: run cancelled before finalizing"
        );
        if !self
            .monitor
            .try_finish_run(&self.handler_name, duration_ms, false)
        {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let monitor = Arc::clone(&self.monitor);
                let name = self.handler_name.clone();
                runtime.spawn(async move { monitor.finish_run(&name, duration_ms, false).await });
            }
        }
        self.progress.emit(RunStage::Finalized);
    }
}

/// Aborts the spawned work task when the run stops waiting for it.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Handle to a run started with [`Orchestrator::submit_async`].
pub struct RunHandle {
    work_unit_id: Uuid,
    progress: mpsc::UnboundedReceiver<ProgressEvent>,
    join: JoinHandle<RunResult>,
}

impl RunHandle {
    pub fn work_unit_id(&self) -> Uuid {
        self.work_unit_id
    }

    /// Next progress event, or `None` once the run has finalized and every
    /// event has been received.
    pub async fn next_progress(&mut self) -> Option<ProgressEvent> {
        self.progress.recv().await
    }

    pub async fn wait(self) -> TaskforceResult<RunResult> {
        self.join.await.map_err(|e| {
            TaskforceError::HandlerExecutionFailed(format!("run task did not finish: {e}"))
        })
    }

    /// Wait for the result, then drain every progress event not yet received.
    pub async fn wait_with_progress(mut self) -> TaskforceResult<(RunResult, Vec<ProgressEvent>)> {
        let result = (&mut self.join).await.map_err(|e| {
            TaskforceError::HandlerExecutionFailed(format!("run task did not finish: {e}"))
        })?;
        let mut events = Vec::new();
        while let Some(event) = self.progress.recv().await {
            events.push(event);
        }
        Ok((result, events))
    }
}

/// Outcome of [`Orchestrator::submit_team`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRunSummary {
    pub runs: Vec<RunResult>,
    pub unmatched: Vec<String>,
}

impl TeamRunSummary {
    pub fn completed_roles(&self) -> Vec<String> {
        self.roles_with(RunStatus::Completed)
    }

    pub fn failed_roles(&self) -> Vec<String> {
        self.roles_with(RunStatus::Failed)
    }

    fn roles_with(&self, status: RunStatus) -> Vec<String> {
        self.runs
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.role.clone())
            .collect()
    }
}
