use serde_json::Value;

use crate::core::chain::TaskCompletion;
use crate::error::TaskError;

/// Which execution context a task requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextAffinity {
    /// Must run on the host's foreground context.
    Foreground,
    /// Must run on the background context.
    Background,
    /// No preference: runs on whatever thread the previous task's
    /// continuation happened to call from.
    Current,
}

/// The two completion styles a task body can have.
///
/// Direct bodies hand back their output as a return value. Deferred bodies
/// receive a [`TaskCompletion`] and must invoke it exactly once, possibly
/// after delegating to a foreign callback-style API.
pub(crate) enum TaskBody {
    Direct(Box<dyn FnOnce(Value) -> Result<Value, TaskError> + Send>),
    Deferred(Box<dyn FnOnce(Value, TaskCompletion) + Send>),
}

/// One queued unit of chain work.
pub(crate) struct TaskHolder {
    /// Append-order sequence number, used for diagnostics.
    pub(crate) action_index: usize,
    pub(crate) affinity: ContextAffinity,
    pub(crate) body: TaskBody,
}
