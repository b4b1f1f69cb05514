//! Error types for the chain engine.
//!
//! Two layers: [`TaskError`] for failures raised by task bodies (user
//! domain), [`ChainError`] for protocol violations by the host (programming
//! errors, surfaced synchronously).

mod chain_error;
mod task_error;

pub use chain_error::ChainError;
pub use task_error::TaskError;

use std::any::Any;

/// Extract a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
