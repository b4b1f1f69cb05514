pub mod chain;
pub(crate) mod current_chain;
pub mod shutdown;
pub mod task;
pub mod task_data;

pub use chain::{DoneCallback, ErrorHandler, TaskChain, TaskCompletion};
pub use shutdown::ShutdownSignal;
pub use task::ContextAffinity;
pub use task_data::TaskData;
