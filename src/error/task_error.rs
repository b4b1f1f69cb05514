//! Task-level error types.

use serde_json::Value;
use thiserror::Error;

/// Errors produced by a task body.
///
/// [`TaskError::Abort`] is the cooperative short-circuit signal: it ends the
/// chain with a failure outcome but is never routed to the error handler and
/// never logged as an error. Everything else is a task failure and reaches
/// the chain's error handler (or the factory default) before the chain
/// finishes with `false`.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("chain aborted")]
    Abort,
    #[error("task failed: {message}")]
    Failed {
        message: String,
        detail: Option<Value>,
    },
}

impl TaskError {
    /// Shorthand for a failure without structured detail.
    pub fn failed(message: impl Into<String>) -> Self {
        TaskError::Failed {
            message: message.into(),
            detail: None,
        }
    }

    /// A failure carrying a structured detail payload for diagnostics.
    pub fn failed_with_detail(message: impl Into<String>, detail: Value) -> Self {
        TaskError::Failed {
            message: message.into(),
            detail: Some(detail),
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, TaskError::Abort)
    }
}

impl From<String> for TaskError {
    fn from(message: String) -> Self {
        TaskError::Failed {
            message,
            detail: None,
        }
    }
}

impl From<&str> for TaskError {
    fn from(message: &str) -> Self {
        TaskError::failed(message)
    }
}
