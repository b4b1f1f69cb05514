//! Scheduler port consumed by the chain engine.
//!
//! The engine never owns threads. It borrows whichever threads the host's
//! [`GameScheduler`] runs posted callbacks on, and only ever distinguishes
//! two logical execution contexts: foreground (the host's constrained "main"
//! context) and background (everything else). Context switches are always
//! expressed as "post a callback to run later", never as a blocking wait.
//!
//! Two adapters ship with the crate: [`TokioScheduler`] for real hosts on a
//! tokio runtime, and [`FakeScheduler`] for deterministic tests.

mod fake;
mod tokio_scheduler;

pub use fake::{FakeScheduler, SchedulerCall};
pub use tokio_scheduler::{ForegroundExecutor, TokioScheduler};

use std::time::Duration;

/// A callback posted to one of the two execution contexts.
pub type ScheduledTask = Box<dyn FnOnce() + Send>;

/// A callback scheduled after a delay; told whether the delay actually
/// elapsed or was interrupted (e.g. by host shutdown).
pub type DelayedTask = Box<dyn FnOnce(DelayResult) + Send>;

/// A hook invoked when the host shuts the scheduler down.
pub type ShutdownHook = Box<dyn FnOnce() + Send>;

/// Outcome of a delayed post. An interrupted delay aborts the chain that
/// requested it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayResult {
    Elapsed,
    Interrupted,
}

/// The port a host scheduler implements so chains can hop between contexts.
///
/// Delay semantics are host-defined: a "tick" carries no wall-clock
/// guarantee. Implementations must eventually run every posted callback
/// exactly once (or, for delays, report [`DelayResult::Interrupted`] once).
pub trait GameScheduler: Send + Sync {
    /// Whether the calling thread is currently the foreground context.
    fn is_foreground_thread(&self) -> bool;

    /// Post a callback to run on the foreground context.
    fn post_to_foreground(&self, task: ScheduledTask);

    /// Post a callback to run on the background context.
    fn post_to_background(&self, task: ScheduledTask);

    /// Post a callback after the given number of host ticks.
    fn post_after_ticks(&self, ticks: u32, task: DelayedTask);

    /// Post a callback after a wall-clock delay.
    fn post_delayed(&self, delay: Duration, task: DelayedTask);

    /// Register a hook to run when the host shuts down.
    fn register_shutdown_hook(&self, hook: ShutdownHook);
}
