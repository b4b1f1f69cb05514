//! Chain-level protocol errors.

use thiserror::Error;

/// Programming-error conditions surfaced synchronously to the caller.
///
/// These never travel through the chain's error handler: they indicate the
/// host misused the engine, not that a task failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("chain has already been executed")]
    AlreadyExecuted,
    #[error("tasks cannot be appended to a chain that has started executing")]
    ExecutingAppend,
    #[error("continuation for action {action_index} was already invoked")]
    ContinuationAlreadyInvoked { action_index: usize },
}
