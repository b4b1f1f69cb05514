//! Task chain — the chain state and its dispatch loop.
//!
//! A [`TaskChain`] owns an ordered task queue and drives it to completion,
//! hopping between the foreground and background execution contexts through
//! the [`GameScheduler`] port as each task's [`ContextAffinity`] demands,
//! feeding every task's output value to the next task's input. Exactly one
//! outcome notification (success or failure) is delivered per chain, no
//! matter how many errors occurred along the way.

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use uuid::Uuid;

use crate::core::current_chain;
use crate::core::shutdown::ShutdownSignal;
use crate::core::task::{ContextAffinity, TaskBody, TaskHolder};
use crate::core::task_data::TaskData;
use crate::error::{panic_message, ChainError, TaskError};
use crate::factory::SharedChainRegistry;
use crate::scheduler::{DelayResult, GameScheduler};

/// Completion handler: receives `true` on success, `false` on abort/failure.
pub type DoneCallback = Box<dyn FnOnce(bool) + Send>;

/// Error handler: receives the task error and the failing task's action
/// index (`None` when the error came from the done callback).
pub type ErrorHandler = Arc<dyn Fn(&TaskError, Option<usize>) + Send + Sync>;

/// Process-wide default error handler slot, shared by all chains of a factory.
pub(crate) type DefaultErrorHandlerSlot = Arc<RwLock<Option<ErrorHandler>>>;

type AbortAction = Box<dyn FnOnce() + Send>;

pub(crate) struct SharedHandle {
    pub(crate) name: String,
    pub(crate) registry: Weak<dyn SharedChainRegistry>,
}

struct ChainState {
    queue: VecDeque<TaskHolder>,
    /// Output of the just-completed task; cleared before the next body runs
    /// so references are not held past their use.
    previous: Option<Value>,
    on_foreground: bool,
    data: TaskData,
    done_callback: Option<DoneCallback>,
    error_handler: Option<ErrorHandler>,
}

pub(crate) struct ChainInner {
    id: Uuid,
    scheduler: Arc<dyn GameScheduler>,
    shutdown: ShutdownSignal,
    default_error_handler: DefaultErrorHandlerSlot,
    shared_handle: Option<SharedHandle>,
    state: Mutex<ChainState>,
    action_counter: AtomicUsize,
    current_action: AtomicUsize,
    executed: AtomicBool,
    finished: AtomicBool,
}

/// A chain of tasks executed strictly in append order, one at a time.
///
/// Cloning yields another handle to the same chain. Obtain chains from a
/// [`ChainFactory`](crate::factory::ChainFactory), append tasks with the
/// `foreground_*` / `background_*` / `current_*` families, then call one of
/// the `execute*` methods.
#[derive(Clone)]
pub struct TaskChain {
    inner: Arc<ChainInner>,
}

impl TaskChain {
    pub(crate) fn new(
        scheduler: Arc<dyn GameScheduler>,
        shutdown: ShutdownSignal,
        default_error_handler: DefaultErrorHandlerSlot,
        shared_handle: Option<SharedHandle>,
    ) -> Self {
        TaskChain {
            inner: Arc::new(ChainInner {
                id: Uuid::new_v4(),
                scheduler,
                shutdown,
                default_error_handler,
                shared_handle,
                state: Mutex::new(ChainState {
                    queue: VecDeque::new(),
                    previous: None,
                    on_foreground: false,
                    data: TaskData::new(),
                    done_callback: None,
                    error_handler: None,
                }),
                action_counter: AtomicUsize::new(0),
                current_action: AtomicUsize::new(0),
                executed: AtomicBool::new(false),
                finished: AtomicBool::new(false),
            }),
        }
    }

    // ================================
    // Introspection
    // ================================

    /// The chain currently executing on the calling thread, if any.
    ///
    /// Usable inside task bodies, abort actions, error handlers and done
    /// callbacks. A deferred task must call this before handing control to
    /// another thread.
    pub fn current_chain() -> Option<TaskChain> {
        current_chain::current()
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// The shared registry name, for chains created via
    /// [`ChainFactory::shared_chain`](crate::factory::ChainFactory::shared_chain).
    pub fn shared_name(&self) -> Option<&str> {
        self.inner.shared_handle.as_ref().map(|h| h.name.as_str())
    }

    pub fn is_shared(&self) -> bool {
        self.inner.shared_handle.is_some()
    }

    pub fn is_executed(&self) -> bool {
        self.inner.executed.load(Ordering::SeqCst)
    }

    pub fn is_done(&self) -> bool {
        self.inner.finished.load(Ordering::SeqCst)
    }

    /// Action index of the task that is executing (or last executed).
    /// Useful in error and done handlers to know where the chain was when it
    /// aborted or failed.
    pub fn current_action_index(&self) -> usize {
        self.inner.current_action.load(Ordering::SeqCst)
    }

    /// Replace the done callback.
    pub fn set_done_callback<F>(&self, done: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.inner.state.lock().done_callback = Some(Box::new(done));
    }

    /// Replace the chain error handler.
    pub fn set_error_handler<E>(&self, handler: E)
    where
        E: Fn(&TaskError, Option<usize>) + Send + Sync + 'static,
    {
        self.inner.state.lock().error_handler = Some(Arc::new(handler));
    }

    // ================================
    // Task data (per-chain key/value store)
    // ================================

    pub fn has_data(&self, key: &str) -> bool {
        self.inner.state.lock().data.has(key)
    }

    pub fn get_data(&self, key: &str) -> Option<Value> {
        self.inner.state.lock().data.get(key)
    }

    /// Fetch a stored value, deserialized to the type expected at the call
    /// site. Returns `None` when absent or of an incompatible shape.
    pub fn get_data_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_data(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Store a value for tasks further down the chain; returns the previous
    /// value for the key, if any.
    pub fn set_data(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.inner.state.lock().data.set(key, value)
    }

    pub fn remove_data(&self, key: &str) -> Option<Value> {
        self.inner.state.lock().data.remove(key)
    }

    /// Store the previous task's output under `key` and forward it unchanged
    /// to the next task.
    pub fn store_as_data(self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.current(move |value| {
            if let Some(chain) = TaskChain::current_chain() {
                chain.set_data(key, value.clone());
            }
            Ok(value)
        })
    }

    /// Read `key` from task data and pass it to the next task, bypassing the
    /// normal previous-value plumbing. Missing keys yield `Value::Null`.
    pub fn return_data(self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.current_first(move || {
            Ok(TaskChain::current_chain()
                .and_then(|chain| chain.get_data(&key))
                .unwrap_or(Value::Null))
        })
    }

    // ================================
    // Abort-if combinators
    // ================================

    /// Abort the chain if the previous task's output equals `if_value`
    /// (value equality, `Null` included); otherwise forward it unchanged.
    pub fn abort_if(self, if_value: Value) -> Self {
        self.abort_if_matches(if_value, false, None)
    }

    /// [`abort_if`](Self::abort_if), running `action` before the abort.
    pub fn abort_if_with<F>(self, if_value: Value, action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.abort_if_matches(if_value, false, Some(Box::new(action)))
    }

    /// Abort the chain if the previous task's output differs from
    /// `if_not_value`; otherwise forward it unchanged.
    pub fn abort_if_not(self, if_not_value: Value) -> Self {
        self.abort_if_matches(if_not_value, true, None)
    }

    /// [`abort_if_not`](Self::abort_if_not), running `action` before the abort.
    pub fn abort_if_not_with<F>(self, if_not_value: Value, action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.abort_if_matches(if_not_value, true, Some(Box::new(action)))
    }

    /// Abort the chain if the previous task produced no value (`Null`).
    pub fn abort_if_null(self) -> Self {
        self.abort_if(Value::Null)
    }

    /// [`abort_if_null`](Self::abort_if_null), running `action` before the abort.
    pub fn abort_if_null_with<F>(self, action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.abort_if_with(Value::Null, action)
    }

    fn abort_if_matches(self, expected: Value, negate: bool, action: Option<AbortAction>) -> Self {
        self.current(move |value| {
            if (value == expected) != negate {
                if let Some(action) = action {
                    run_abort_action(action);
                }
                Err(TaskError::Abort)
            } else {
                Ok(value)
            }
        })
    }

    // ================================
    // Delays
    // ================================

    /// Pause the chain for the given number of host ticks. Tick length is
    /// host-defined. The pause preserves no context: the next task's
    /// affinity decides where it runs. Aborts the chain if the delay is
    /// interrupted.
    pub fn delay_ticks(self, ticks: u32) -> Self {
        self.add(
            ContextAffinity::Current,
            TaskBody::Deferred(Box::new(move |input, completion| {
                let scheduler = Arc::clone(&completion.chain.inner.scheduler);
                scheduler.post_after_ticks(
                    ticks,
                    Box::new(move |result| match result {
                        DelayResult::Elapsed => {
                            let _ = completion.complete(input);
                        }
                        DelayResult::Interrupted => completion.abort(),
                    }),
                );
            })),
        )
    }

    /// Pause the chain for a wall-clock duration. Aborts the chain if the
    /// delay is interrupted.
    pub fn delay(self, duration: Duration) -> Self {
        self.add(
            ContextAffinity::Current,
            TaskBody::Deferred(Box::new(move |input, completion| {
                let scheduler = Arc::clone(&completion.chain.inner.scheduler);
                scheduler.post_delayed(
                    duration,
                    Box::new(move |result| match result {
                        DelayResult::Elapsed => {
                            let _ = completion.complete(input);
                        }
                        DelayResult::Interrupted => completion.abort(),
                    }),
                );
            })),
        )
    }

    // ================================
    // Appending tasks: direct-return bodies
    // ================================

    /// Run a transform on the foreground context: takes the previous task's
    /// output, returns the next task's input.
    pub fn foreground<F>(self, f: F) -> Self
    where
        F: FnOnce(Value) -> Result<Value, TaskError> + Send + 'static,
    {
        self.add(ContextAffinity::Foreground, TaskBody::Direct(Box::new(f)))
    }

    /// Run a producer on the foreground context: no input, returns output.
    pub fn foreground_first<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Result<Value, TaskError> + Send + 'static,
    {
        self.add(
            ContextAffinity::Foreground,
            TaskBody::Direct(Box::new(move |_| f())),
        )
    }

    /// Run a consumer on the foreground context: takes input, no output.
    pub fn foreground_last<F>(self, f: F) -> Self
    where
        F: FnOnce(Value) -> Result<(), TaskError> + Send + 'static,
    {
        self.add(
            ContextAffinity::Foreground,
            TaskBody::Direct(Box::new(move |value| f(value).map(|_| Value::Null))),
        )
    }

    /// Run a side effect on the foreground context: no input, no output.
    pub fn foreground_run<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        self.add(
            ContextAffinity::Foreground,
            TaskBody::Direct(Box::new(move |_| f().map(|_| Value::Null))),
        )
    }

    /// [`foreground`](Self::foreground), on the background context.
    pub fn background<F>(self, f: F) -> Self
    where
        F: FnOnce(Value) -> Result<Value, TaskError> + Send + 'static,
    {
        self.add(ContextAffinity::Background, TaskBody::Direct(Box::new(f)))
    }

    /// [`foreground_first`](Self::foreground_first), on the background context.
    pub fn background_first<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Result<Value, TaskError> + Send + 'static,
    {
        self.add(
            ContextAffinity::Background,
            TaskBody::Direct(Box::new(move |_| f())),
        )
    }

    /// [`foreground_last`](Self::foreground_last), on the background context.
    pub fn background_last<F>(self, f: F) -> Self
    where
        F: FnOnce(Value) -> Result<(), TaskError> + Send + 'static,
    {
        self.add(
            ContextAffinity::Background,
            TaskBody::Direct(Box::new(move |value| f(value).map(|_| Value::Null))),
        )
    }

    /// [`foreground_run`](Self::foreground_run), on the background context.
    pub fn background_run<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        self.add(
            ContextAffinity::Background,
            TaskBody::Direct(Box::new(move |_| f().map(|_| Value::Null))),
        )
    }

    /// [`foreground`](Self::foreground), with no context preference: runs on
    /// whatever thread the previous task's continuation called from.
    pub fn current<F>(self, f: F) -> Self
    where
        F: FnOnce(Value) -> Result<Value, TaskError> + Send + 'static,
    {
        self.add(ContextAffinity::Current, TaskBody::Direct(Box::new(f)))
    }

    /// [`foreground_first`](Self::foreground_first), with no context preference.
    pub fn current_first<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Result<Value, TaskError> + Send + 'static,
    {
        self.add(
            ContextAffinity::Current,
            TaskBody::Direct(Box::new(move |_| f())),
        )
    }

    /// [`foreground_last`](Self::foreground_last), with no context preference.
    pub fn current_last<F>(self, f: F) -> Self
    where
        F: FnOnce(Value) -> Result<(), TaskError> + Send + 'static,
    {
        self.add(
            ContextAffinity::Current,
            TaskBody::Direct(Box::new(move |value| f(value).map(|_| Value::Null))),
        )
    }

    /// [`foreground_run`](Self::foreground_run), with no context preference.
    pub fn current_run<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Result<(), TaskError> + Send + 'static,
    {
        self.add(
            ContextAffinity::Current,
            TaskBody::Direct(Box::new(move |_| f().map(|_| Value::Null))),
        )
    }

    // ================================
    // Appending tasks: self-completing bodies
    // ================================
    //
    // A deferred body receives the previous task's output and a
    // TaskCompletion it must invoke exactly once, possibly from a foreign
    // callback. Consumer and side-effect shapes are expressed by calling
    // `TaskCompletion::finish()` instead of `complete(value)`.

    /// Deferred transform on the foreground context. Don't block inside the
    /// body; this form exists for delegating to callback-only APIs.
    pub fn foreground_callback<F>(self, f: F) -> Self
    where
        F: FnOnce(Value, TaskCompletion) + Send + 'static,
    {
        self.add(ContextAffinity::Foreground, TaskBody::Deferred(Box::new(f)))
    }

    /// Deferred producer on the foreground context: no input.
    pub fn foreground_first_callback<F>(self, f: F) -> Self
    where
        F: FnOnce(TaskCompletion) + Send + 'static,
    {
        self.add(
            ContextAffinity::Foreground,
            TaskBody::Deferred(Box::new(move |_, completion| f(completion))),
        )
    }

    /// [`foreground_callback`](Self::foreground_callback), on the background context.
    pub fn background_callback<F>(self, f: F) -> Self
    where
        F: FnOnce(Value, TaskCompletion) + Send + 'static,
    {
        self.add(ContextAffinity::Background, TaskBody::Deferred(Box::new(f)))
    }

    /// [`foreground_first_callback`](Self::foreground_first_callback), on the
    /// background context.
    pub fn background_first_callback<F>(self, f: F) -> Self
    where
        F: FnOnce(TaskCompletion) + Send + 'static,
    {
        self.add(
            ContextAffinity::Background,
            TaskBody::Deferred(Box::new(move |_, completion| f(completion))),
        )
    }

    /// [`foreground_callback`](Self::foreground_callback), with no context preference.
    pub fn current_callback<F>(self, f: F) -> Self
    where
        F: FnOnce(Value, TaskCompletion) + Send + 'static,
    {
        self.add(ContextAffinity::Current, TaskBody::Deferred(Box::new(f)))
    }

    /// [`foreground_first_callback`](Self::foreground_first_callback), with no
    /// context preference.
    pub fn current_first_callback<F>(self, f: F) -> Self
    where
        F: FnOnce(TaskCompletion) + Send + 'static,
    {
        self.add(
            ContextAffinity::Current,
            TaskBody::Deferred(Box::new(move |_, completion| f(completion))),
        )
    }

    fn add(self, affinity: ContextAffinity, body: TaskBody) -> Self {
        if !self.is_shared() && self.inner.executed.load(Ordering::SeqCst) {
            // Programming error, kept out of the error-handler path on purpose.
            panic!("{}", ChainError::ExecutingAppend);
        }
        let action_index = self.inner.action_counter.fetch_add(1, Ordering::SeqCst);
        self.inner.state.lock().queue.push_back(TaskHolder {
            action_index,
            affinity,
            body,
        });
        self
    }

    // ================================
    // Execution
    // ================================

    /// Finished appending tasks; begin executing them.
    pub fn execute(self) -> Result<(), ChainError> {
        self.execute_inner(None, None)
    }

    /// [`execute`](Self::execute) with a done callback receiving the success flag.
    pub fn execute_done<F>(self, done: F) -> Result<(), ChainError>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.execute_inner(Some(Box::new(done)), None)
    }

    /// [`execute`](Self::execute) with an error handler only.
    pub fn execute_error<E>(self, on_error: E) -> Result<(), ChainError>
    where
        E: Fn(&TaskError, Option<usize>) + Send + Sync + 'static,
    {
        self.execute_inner(None, Some(Arc::new(on_error)))
    }

    /// [`execute`](Self::execute) with both a done callback and an error
    /// handler.
    pub fn execute_with<F, E>(self, done: F, on_error: E) -> Result<(), ChainError>
    where
        F: FnOnce(bool) + Send + 'static,
        E: Fn(&TaskError, Option<usize>) + Send + Sync + 'static,
    {
        self.execute_inner(Some(Box::new(done)), Some(Arc::new(on_error)))
    }

    fn execute_inner(
        self,
        done: Option<DoneCallback>,
        on_error: Option<ErrorHandler>,
    ) -> Result<(), ChainError> {
        {
            let mut state = self.inner.state.lock();
            if done.is_some() {
                state.done_callback = done;
            }
            if on_error.is_some() {
                state.error_handler = on_error;
            }
        }
        if self.inner.executed.swap(true, Ordering::SeqCst) {
            if self.is_shared() {
                // Repeated starts of a shared chain silently no-op.
                return Ok(());
            }
            return Err(ChainError::AlreadyExecuted);
        }
        self.inner.state.lock().on_foreground = self.inner.scheduler.is_foreground_thread();
        self.advance();
        Ok(())
    }

    // ================================
    // Dispatch loop
    // ================================

    /// Pop and dispatch the next task, switching contexts as necessary.
    pub(crate) fn advance(&self) {
        let holder = self.inner.state.lock().queue.pop_front();
        let Some(holder) = holder else {
            self.inner.state.lock().previous = None;
            self.finish(true);
            return;
        };

        let on_foreground = self.inner.state.lock().on_foreground;
        // Draining bypasses context requirements so queued chains can flush
        // without a scheduler that may no longer accept postings.
        let draining = self.inner.shutdown.is_triggered();

        match holder.affinity {
            ContextAffinity::Current => self.run_task(holder),
            _ if draining => self.run_task(holder),
            ContextAffinity::Background if !on_foreground => self.run_task(holder),
            ContextAffinity::Background => {
                let chain = self.clone();
                self.inner.scheduler.post_to_background(Box::new(move || {
                    chain.inner.state.lock().on_foreground = false;
                    chain.run_task(holder);
                }));
            }
            ContextAffinity::Foreground if on_foreground => self.run_task(holder),
            ContextAffinity::Foreground => {
                let chain = self.clone();
                self.inner.scheduler.post_to_foreground(Box::new(move || {
                    chain.inner.state.lock().on_foreground = true;
                    chain.run_task(holder);
                }));
            }
        }
    }

    fn run_task(&self, holder: TaskHolder) {
        let TaskHolder {
            action_index, body, ..
        } = holder;
        let input = self
            .inner
            .state
            .lock()
            .previous
            .take()
            .unwrap_or(Value::Null);
        self.inner.current_action.store(action_index, Ordering::SeqCst);

        let completion = TaskCompletion {
            chain: self.clone(),
            action_index,
            completed: Arc::new(AtomicBool::new(false)),
        };
        let _guard = current_chain::enter(self.clone());

        match body {
            TaskBody::Direct(f) => {
                match panic::catch_unwind(AssertUnwindSafe(move || f(input))) {
                    Ok(Ok(value)) => {
                        // Fresh completion: the only possible error is a
                        // finished chain, which complete() absorbs.
                        let _ = completion.complete(value);
                    }
                    Ok(Err(TaskError::Abort)) => self.abort_chain(),
                    Ok(Err(err)) => {
                        self.handle_error(&err, Some(action_index));
                        self.abort_chain();
                    }
                    Err(payload) => {
                        let err = TaskError::failed(panic_message(payload.as_ref()));
                        self.handle_error(&err, Some(action_index));
                        self.abort_chain();
                    }
                }
            }
            TaskBody::Deferred(f) => {
                let body_completion = completion.clone();
                if let Err(payload) =
                    panic::catch_unwind(AssertUnwindSafe(move || f(input, body_completion)))
                {
                    // Only treat the panic as the task's failure if the body
                    // had not already handed off its result.
                    if !completion.completed.load(Ordering::SeqCst) {
                        let err = TaskError::failed(panic_message(payload.as_ref()));
                        self.handle_error(&err, Some(action_index));
                        self.abort_chain();
                    } else {
                        tracing::error!(
                            action_index,
                            "deferred task panicked after completing: {}",
                            panic_message(payload.as_ref())
                        );
                    }
                }
            }
        }
    }

    /// Cooperative abort: drop the pending value, clear the remaining queue
    /// and finish with a failure outcome.
    pub(crate) fn abort_chain(&self) {
        {
            let mut state = self.inner.state.lock();
            state.previous = None;
            state.queue.clear();
        }
        self.finish(false);
    }

    /// Single exit point for every outcome. Idempotent: only the first
    /// caller's outcome is honored.
    pub(crate) fn finish(&self, success: bool) {
        if self.inner.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = &self.inner.shared_handle {
            if let Some(registry) = handle.registry.upgrade() {
                registry.deregister(&handle.name);
            }
        }
        let done = self.inner.state.lock().done_callback.take();
        if let Some(done) = done {
            let _guard = current_chain::enter(self.clone());
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || done(success))) {
                let err = TaskError::failed(format!(
                    "done callback panicked: {}",
                    panic_message(payload.as_ref())
                ));
                self.handle_error(&err, None);
            }
        }
    }

    pub(crate) fn handle_error(&self, err: &TaskError, action_index: Option<usize>) {
        let handler = {
            let state = self.inner.state.lock();
            state
                .error_handler
                .clone()
                .or_else(|| self.inner.default_error_handler.read().clone())
        };
        match handler {
            Some(handler) => {
                let _guard = current_chain::enter(self.clone());
                if panic::catch_unwind(AssertUnwindSafe(|| handler(err, action_index))).is_err() {
                    tracing::error!(
                        action_index = ?action_index,
                        "error handler panicked while handling: {err}"
                    );
                }
            }
            None => {
                tracing::error!(
                    action_index = ?action_index,
                    "unhandled task chain error: {err}"
                );
            }
        }
    }
}

fn run_abort_action(action: AbortAction) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(action)) {
        let index = TaskChain::current_chain().map(|chain| chain.current_action_index());
        tracing::error!(
            action_index = ?index,
            "abort action panicked: {}",
            panic_message(payload.as_ref())
        );
    }
}

/// The continuation handed to a self-completing task.
///
/// Must be invoked exactly once. Clones share the same execute-once guard,
/// so a foreign API may hold several copies safely.
#[derive(Clone)]
pub struct TaskCompletion {
    pub(crate) chain: TaskChain,
    action_index: usize,
    completed: Arc<AtomicBool>,
}

impl TaskCompletion {
    /// Supply the task's output and dispatch the next task.
    ///
    /// Re-samples the calling thread's context first: a foreign callback may
    /// complete from a thread the engine did not schedule. Completing after
    /// the chain already aborted is silently absorbed; a second completion is
    /// a protocol violation and does not run the next task again.
    pub fn complete(&self, value: Value) -> Result<(), ChainError> {
        {
            let mut state = self.chain.inner.state.lock();
            if self.chain.inner.finished.load(Ordering::SeqCst) {
                return Ok(());
            }
            if self.completed.swap(true, Ordering::SeqCst) {
                tracing::error!(
                    action_index = self.action_index,
                    "task continuation invoked more than once"
                );
                return Err(ChainError::ContinuationAlreadyInvoked {
                    action_index: self.action_index,
                });
            }
            state.on_foreground = self.chain.inner.scheduler.is_foreground_thread();
            state.previous = Some(value);
        }
        self.chain.advance();
        Ok(())
    }

    /// Complete without an output value (consumer / side-effect shapes).
    pub fn finish(&self) -> Result<(), ChainError> {
        self.complete(Value::Null)
    }

    /// Cooperatively abort the chain instead of completing.
    pub fn abort(&self) {
        if self.completed.swap(true, Ordering::SeqCst) {
            tracing::error!(
                action_index = self.action_index,
                "abort() called on an already-completed task"
            );
            return;
        }
        self.chain.abort_chain();
    }

    /// Fail the chain: routes the error to the error handler, then finishes
    /// with a failure outcome. `TaskError::Abort` behaves like
    /// [`abort`](Self::abort).
    pub fn fail(&self, err: TaskError) {
        if self.completed.swap(true, Ordering::SeqCst) {
            tracing::error!(
                action_index = self.action_index,
                "fail() called on an already-completed task: {err}"
            );
            return;
        }
        if !err.is_abort() {
            self.chain.handle_error(&err, Some(self.action_index));
        }
        self.chain.abort_chain();
    }

    pub fn action_index(&self) -> usize {
        self.action_index
    }
}
