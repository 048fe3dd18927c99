use crate::handler::Handler;
use crate::registry::{HandlerDefinition, HandlerRegistry};
use crate::types::{Analysis, CollaborationRecord, RunError, RunResult, RunStatus};
use async_trait::async_trait;
use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use taskforce_core::{ErrorKind, WorkUnit};
use tracing::{info, warn};

/// Context key holding the serialized parent unit on a derived unit.
pub const ORIGINAL_TASK_KEY: &str = "originalTask";
/// Context key holding the roles already involved in a collaboration chain.
pub const COLLABORATION_CHAIN_KEY: &str = "collaborationChain";

/// Runs a nested work unit through the full lifecycle.
///
/// Implemented by the orchestrator; the broker only sees this seam, which
/// keeps recursion between the two explicit and boxed.
#[async_trait]
pub trait RunExecutor: Send + Sync {
    async fn execute(&self, handler: Arc<dyn Handler>, unit: WorkUnit, depth: u32) -> RunResult;
}

/// Fans a run out to its collaborator roles, enforcing depth and cycle limits.
#[derive(Debug, Clone)]
pub struct CollaborationBroker {
    /// Deepest nesting level a collaboration may start from (root = 0).
    max_depth: u32,
    timeout: Duration,
}

impl CollaborationBroker {
    /// Create a broker with default limits (max_depth=1, timeout=120s).
    pub fn new() -> Self {
        Self {
            max_depth: 1,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Collaborate with every role in `analysis.collaborators`.
    ///
    /// Never fails: each role yields exactly one record, in the order the
    /// roles were listed, whatever happened to the nested run.
    pub async fn collaborate(
        &self,
        registry: &HandlerRegistry,
        executor: &dyn RunExecutor,
        requester: &HandlerDefinition,
        unit: &WorkUnit,
        analysis: &Analysis,
        depth: u32,
    ) -> Vec<CollaborationRecord> {
        let mut chain = collaboration_chain(unit);
        if !chain.contains(&requester.role) {
            chain.push(requester.role.clone());
        }

        let mut attempts: Vec<BoxFuture<'_, CollaborationRecord>> = Vec::new();
        for role in &analysis.collaborators {
            let role = role.clone();

            if depth >= self.max_depth {
                warn!(role = %role, depth, "Broker: depth limit reached");
                let err = RunError::new(
                    ErrorKind::CollaborationFailed,
                    format!("collaboration depth limit {} reached", self.max_depth),
                );
                attempts.push(async move { CollaborationRecord::failed(role, None, err) }.boxed());
                continue;
            }

            if chain.contains(&role) {
                warn!(role = %role, chain = ?chain, "Broker: collaboration cycle");
                let err = RunError::new(
                    ErrorKind::CollaborationFailed,
                    format!("role {role} is already part of this collaboration chain"),
                );
                attempts.push(async move { CollaborationRecord::failed(role, None, err) }.boxed());
                continue;
            }

            let Some(handler) = registry.find_by_role(&role) else {
                warn!(role = %role, "Broker: no handler registered for role");
                let err = RunError::new(
                    ErrorKind::HandlerNotFound,
                    format!("no handler registered for role {role}"),
                );
                attempts.push(async move { CollaborationRecord::failed(role, None, err) }.boxed());
                continue;
            };

            let derived = derive_unit(unit, &role, &chain);
            let timeout = self.timeout;
            attempts.push(
                async move {
                    let name = handler.definition().name.clone();
                    match tokio::time::timeout(timeout, executor.execute(handler, derived, depth + 1)).await {
                        Ok(run) => record_for(role, name, run),
                        Err(_) => {
                            warn!(role = %role, handler = %name, "Broker: collaboration timed out");
                            let err = RunError::new(
                                ErrorKind::Timeout,
                                format!("collaboration with {name} exceeded {timeout:?}"),
                            );
                            CollaborationRecord::failed(role, Some(name), err)
                        }
                    }
                }
                .boxed(),
            );
        }

        let records = join_all(attempts).await;
        info!(
            requester = %requester.name,
            attempted = records.len(),
            succeeded = records.iter().filter(|r| r.is_success()).count(),
            "Broker: collaboration complete"
        );
        records
    }
}

impl Default for CollaborationBroker {
    fn default() -> Self {
        Self::new()
    }
}

fn record_for(role: String, handler: String, run: RunResult) -> CollaborationRecord {
    match run.status {
        RunStatus::Completed => CollaborationRecord::completed(role, handler, run.output),
        _ => {
            let err = run.error.map(|e| {
                RunError::new(ErrorKind::CollaborationFailed, format!("{}: {}", e.kind, e.message))
            });
            let err = err.unwrap_or_else(|| {
                RunError::new(ErrorKind::CollaborationFailed, "nested run did not complete")
            });
            CollaborationRecord::failed(role, Some(handler), err).with_result(Some(run.output))
        }
    }
}

/// Roles already recorded on `unit` by earlier collaboration hops.
pub fn collaboration_chain(unit: &WorkUnit) -> Vec<String> {
    unit.context
        .get(COLLABORATION_CHAIN_KEY)
        .and_then(Value::as_array)
        .map(|roles| {
            roles
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Build the unit a collaborator receives: pinned to `role`, with the parent
/// unit and the chain so far in its context.
pub fn derive_unit(original: &WorkUnit, role: &str, chain: &[String]) -> WorkUnit {
    let original_value = serde_json::to_value(original).unwrap_or(Value::Null);
    WorkUnit::new(format!("Assist with: {}", original.description))
        .with_role(role)
        .with_context(ORIGINAL_TASK_KEY, original_value)
        .with_context(COLLABORATION_CHAIN_KEY, Value::from(chain.to_vec()))
}
