use crate::types::{ProgressEvent, RunStage};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Callback invoked for every progress event.
pub type ProgressFn = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Emits the checkpoints of a single run.
///
/// Checkpoints that would not advance progress are dropped, and
/// [`RunStage::Finalized`] is emitted at most once, so subscribers always
/// see a non-decreasing sequence ending at 1.0.
pub struct ProgressReporter {
    work_unit_id: Uuid,
    handler_name: String,
    last: f32,
    finalized: bool,
    sink: Option<mpsc::UnboundedSender<ProgressEvent>>,
    callback: Option<ProgressFn>,
}

impl ProgressReporter {
    pub fn new(work_unit_id: Uuid, handler_name: impl Into<String>) -> Self {
        Self {
            work_unit_id,
            handler_name: handler_name.into(),
            last: 0.0,
            finalized: false,
            sink: None,
            callback: None,
        }
    }

    pub fn with_sink(mut self, sink: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_callback(mut self, callback: Option<ProgressFn>) -> Self {
        self.callback = callback;
        self
    }

    /// Emit `stage` if it advances progress. Returns whether it was emitted.
    pub fn emit(&mut self, stage: RunStage) -> bool {
        let progress = stage.checkpoint();
        if self.finalized || progress <= self.last {
            return false;
        }
        self.last = progress;
        self.finalized = stage == RunStage::Finalized;
        debug!(
            work_unit_id = %self.work_unit_id,
            handler = %self.handler_name,
            stage = ?stage,
            progress,
            "Lifecycle: checkpoint"
        );

        let event = ProgressEvent {
            work_unit_id: self.work_unit_id,
            handler_name: self.handler_name.clone(),
            stage,
            progress,
            timestamp: Utc::now(),
        };
        if let Some(callback) = &self.callback {
            callback(&event);
        }
        if let Some(sink) = &self.sink {
            // The receiver may have been dropped; the run carries on regardless.
            let _ = sink.send(event);
        }
        true
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}
