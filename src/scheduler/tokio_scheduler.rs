use parking_lot::Mutex;
use std::cell::Cell;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{DelayResult, DelayedTask, GameScheduler, ScheduledTask, ShutdownHook};
use crate::core::shutdown::ShutdownSignal;

thread_local! {
    static FOREGROUND_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Host adapter backed by a tokio runtime.
///
/// Foreground work goes into a single-consumer queue drained by the host
/// through the paired [`ForegroundExecutor`]; background work runs on the
/// runtime's blocking pool (task bodies are allowed to block). Delays sleep
/// on the runtime, raced against the scheduler's shutdown token so in-flight
/// delays report [`DelayResult::Interrupted`] instead of hanging.
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
    foreground_tx: mpsc::UnboundedSender<ScheduledTask>,
    tick: Duration,
    shutdown: ShutdownSignal,
    hooks: Mutex<Vec<ShutdownHook>>,
}

impl TokioScheduler {
    /// Create a scheduler on the current tokio runtime.
    ///
    /// `tick` defines the wall-clock length of one host tick for
    /// [`GameScheduler::post_after_ticks`]. Must be called from within a
    /// runtime; panics otherwise, same as [`tokio::runtime::Handle::current`].
    pub fn new(tick: Duration) -> (std::sync::Arc<Self>, ForegroundExecutor) {
        Self::with_handle(tokio::runtime::Handle::current(), tick)
    }

    /// Create a scheduler on an explicit runtime handle.
    pub fn with_handle(
        handle: tokio::runtime::Handle,
        tick: Duration,
    ) -> (std::sync::Arc<Self>, ForegroundExecutor) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = std::sync::Arc::new(TokioScheduler {
            handle,
            foreground_tx: tx,
            tick,
            shutdown: ShutdownSignal::new(),
            hooks: Mutex::new(Vec::new()),
        });
        (scheduler, ForegroundExecutor { rx })
    }

    /// Trigger shutdown: interrupt in-flight delays and run registered hooks.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
        let hooks: Vec<ShutdownHook> = std::mem::take(&mut *self.hooks.lock());
        for hook in hooks {
            hook();
        }
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }
}

impl GameScheduler for TokioScheduler {
    fn is_foreground_thread(&self) -> bool {
        FOREGROUND_THREAD.with(|flag| flag.get())
    }

    fn post_to_foreground(&self, task: ScheduledTask) {
        // Dropped (not leaked) if the executor is gone; the host is shutting
        // down and draining mode bypasses posting anyway.
        let _ = self.foreground_tx.send(task);
    }

    fn post_to_background(&self, task: ScheduledTask) {
        self.handle.spawn_blocking(task);
    }

    fn post_after_ticks(&self, ticks: u32, task: DelayedTask) {
        let delay = self.tick.saturating_mul(ticks);
        let shutdown = self.shutdown.clone();
        let tx = self.foreground_tx.clone();
        self.handle.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(Box::new(move || task(DelayResult::Elapsed)));
                }
                _ = shutdown.cancelled() => task(DelayResult::Interrupted),
            }
        });
    }

    fn post_delayed(&self, delay: Duration, task: DelayedTask) {
        let shutdown = self.shutdown.clone();
        self.handle.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => task(DelayResult::Elapsed),
                _ = shutdown.cancelled() => task(DelayResult::Interrupted),
            }
        });
    }

    fn register_shutdown_hook(&self, hook: ShutdownHook) {
        self.hooks.lock().push(hook);
    }
}

/// Consumer side of the foreground queue.
///
/// The host decides which thread is "foreground" by draining this executor
/// there: a game loop calls [`run_until_idle`](Self::run_until_idle) once per
/// frame, a dedicated main thread can park in [`run`](Self::run).
pub struct ForegroundExecutor {
    rx: mpsc::UnboundedReceiver<ScheduledTask>,
}

impl ForegroundExecutor {
    /// Drain all currently queued foreground work on the calling thread.
    /// Returns the number of callbacks run.
    pub fn run_until_idle(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            Self::run_marked(task);
            ran += 1;
        }
        ran
    }

    /// Run foreground work until every sender is dropped.
    pub async fn run(mut self) {
        while let Some(task) = self.rx.recv().await {
            Self::run_marked(task);
        }
    }

    // The foreground mark is scoped to each callback: with a multi-threaded
    // runtime the executor future may migrate between worker threads, so a
    // sticky thread flag would go stale.
    fn run_marked(task: ScheduledTask) {
        FOREGROUND_THREAD.with(|flag| flag.set(true));
        task();
        FOREGROUND_THREAD.with(|flag| flag.set(false));
    }
}
