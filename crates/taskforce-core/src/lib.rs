//! Core types and error definitions for the Taskforce orchestration core.
//!
//! This crate provides the foundational types shared across all Taskforce crates:
//! the unified error enum, serializable error kinds, the [`WorkUnit`] model that
//! callers submit, and capability tag sets used by handler definitions.
//!
//! # Main types
//!
//! - [`TaskforceError`] — Unified error enum for all Taskforce subsystems.
//! - [`TaskforceResult`] — Convenience alias for `Result<T, TaskforceError>`.
//! - [`ErrorKind`] — Serializable classification of an error, stored on run results.
//! - [`WorkUnit`] — A single requested piece of work.
//! - [`CapabilitySet`] — Allowed capability tags, with `*` meaning unrestricted.

/// Capability tag sets for handler definitions.
pub mod capability;
/// Work units submitted to the orchestrator.
pub mod work;

pub use capability::CapabilitySet;
pub use work::{Requirements, WorkUnit};

use serde::{Deserialize, Serialize};

// --- Error types ---

/// Top-level error type for the Taskforce core.
///
/// Registry, dispatch and team-assembly errors are raised to callers; the
/// execution variants are folded into run results by the lifecycle engine.
#[derive(Debug, thiserror::Error)]
pub enum TaskforceError {
    /// A handler with the same name is already registered.
    #[error("Duplicate handler: {0}")]
    DuplicateHandler(String),

    /// No handler is registered under the requested name or role.
    #[error("Handler not found: {0}")]
    HandlerNotFound(String),

    /// No registered handler accepts the submitted work unit.
    #[error("No matching handler: {0}")]
    NoMatchingHandler(String),

    /// A handler's work function returned an error or panicked.
    #[error("Handler execution failed: {0}")]
    HandlerExecutionFailed(String),

    /// A collaboration attempt could not be carried out.
    #[error("Collaboration failed: {0}")]
    CollaborationFailed(String),

    /// A feature identifier could not be parsed.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A deadline expired before the operation finished.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskforceError {
    /// Classify this error for reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskforceError::DuplicateHandler(_) => ErrorKind::DuplicateHandler,
            TaskforceError::HandlerNotFound(_) => ErrorKind::HandlerNotFound,
            TaskforceError::NoMatchingHandler(_) => ErrorKind::NoMatchingHandler,
            TaskforceError::HandlerExecutionFailed(_) => ErrorKind::HandlerExecutionFailed,
            TaskforceError::CollaborationFailed(_) => ErrorKind::CollaborationFailed,
            TaskforceError::InvalidIdentifier(_) => ErrorKind::InvalidIdentifier,
            TaskforceError::Timeout(_) => ErrorKind::Timeout,
            TaskforceError::Config(_) => ErrorKind::Config,
            TaskforceError::Json(_) | TaskforceError::Io(_) => ErrorKind::Internal,
        }
    }
}

/// A convenience `Result` alias using [`TaskforceError`].
pub type TaskforceResult<T> = Result<T, TaskforceError>;

/// Serializable classification of a [`TaskforceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`TaskforceError::DuplicateHandler`].
    DuplicateHandler,
    /// See [`TaskforceError::HandlerNotFound`].
    HandlerNotFound,
    /// See [`TaskforceError::NoMatchingHandler`].
    NoMatchingHandler,
    /// See [`TaskforceError::HandlerExecutionFailed`].
    HandlerExecutionFailed,
    /// See [`TaskforceError::CollaborationFailed`].
    CollaborationFailed,
    /// See [`TaskforceError::InvalidIdentifier`].
    InvalidIdentifier,
    /// See [`TaskforceError::Timeout`].
    Timeout,
    /// See [`TaskforceError::Config`].
    Config,
    /// Serialization or I/O failures inside the core.
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::DuplicateHandler => "duplicate_handler",
            ErrorKind::HandlerNotFound => "handler_not_found",
            ErrorKind::NoMatchingHandler => "no_matching_handler",
            ErrorKind::HandlerExecutionFailed => "handler_execution_failed",
            ErrorKind::CollaborationFailed => "collaboration_failed",
            ErrorKind::InvalidIdentifier => "invalid_identifier",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Config => "config",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}
