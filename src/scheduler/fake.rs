use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{DelayResult, DelayedTask, GameScheduler, ScheduledTask, ShutdownHook};

/// One recorded call against the [`FakeScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCall {
    PostForeground,
    PostBackground,
    DelayTicks(u32),
    Delay(Duration),
}

/// Deterministic in-process scheduler for tests.
///
/// Every post runs inline on the calling thread while a simulated context
/// flag is flipped, so a whole chain executes synchronously inside
/// `execute()`. Each scheduler call is recorded so tests can assert exactly
/// which context switches the engine requested, and in what order.
pub struct FakeScheduler {
    foreground: AtomicBool,
    interrupt_delays: AtomicBool,
    calls: Mutex<Vec<SchedulerCall>>,
    hooks: Mutex<Vec<ShutdownHook>>,
}

impl FakeScheduler {
    /// A scheduler whose calling thread starts as the foreground context.
    pub fn new() -> Self {
        FakeScheduler {
            foreground: AtomicBool::new(true),
            interrupt_delays: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            hooks: Mutex::new(Vec::new()),
        }
    }

    /// A scheduler whose calling thread starts as the background context.
    pub fn starting_on_background() -> Self {
        let scheduler = Self::new();
        scheduler.foreground.store(false, Ordering::SeqCst);
        scheduler
    }

    /// Override the simulated current context.
    pub fn set_foreground(&self, foreground: bool) {
        self.foreground.store(foreground, Ordering::SeqCst);
    }

    /// Snapshot of every scheduler call made so far, in order.
    pub fn calls(&self) -> Vec<SchedulerCall> {
        self.calls.lock().clone()
    }

    /// Make subsequent delays report [`DelayResult::Interrupted`].
    pub fn interrupt_delays(&self) {
        self.interrupt_delays.store(true, Ordering::SeqCst);
    }

    /// Run registered shutdown hooks, as a host would on shutdown.
    pub fn fire_shutdown(&self) {
        let hooks: Vec<ShutdownHook> = std::mem::take(&mut *self.hooks.lock());
        for hook in hooks {
            hook();
        }
    }

    fn delay_result(&self) -> DelayResult {
        if self.interrupt_delays.load(Ordering::SeqCst) {
            DelayResult::Interrupted
        } else {
            DelayResult::Elapsed
        }
    }
}

impl Default for FakeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl GameScheduler for FakeScheduler {
    fn is_foreground_thread(&self) -> bool {
        self.foreground.load(Ordering::SeqCst)
    }

    fn post_to_foreground(&self, task: ScheduledTask) {
        self.calls.lock().push(SchedulerCall::PostForeground);
        self.foreground.store(true, Ordering::SeqCst);
        task();
    }

    fn post_to_background(&self, task: ScheduledTask) {
        self.calls.lock().push(SchedulerCall::PostBackground);
        self.foreground.store(false, Ordering::SeqCst);
        task();
    }

    fn post_after_ticks(&self, ticks: u32, task: DelayedTask) {
        self.calls.lock().push(SchedulerCall::DelayTicks(ticks));
        task(self.delay_result());
    }

    fn post_delayed(&self, delay: Duration, task: DelayedTask) {
        self.calls.lock().push(SchedulerCall::Delay(delay));
        task(self.delay_result());
    }

    fn register_shutdown_hook(&self, hook: ShutdownHook) {
        self.hooks.lock().push(hook);
    }
}
