//! Chain factory: the entry point binding chains to a scheduler.
//!
//! One factory per scheduler. It owns the drain signal, the default error
//! handler slot and the registry of shared (named) chains.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::core::chain::{DefaultErrorHandlerSlot, ErrorHandler, SharedHandle, TaskChain};
use crate::core::shutdown::ShutdownSignal;
use crate::error::TaskError;
use crate::scheduler::GameScheduler;

/// Deregistration hook for named chains. The factory implements this; chains
/// hold it weakly so an abandoned factory does not keep finished chains
/// registered.
pub trait SharedChainRegistry: Send + Sync {
    fn deregister(&self, name: &str);
}

struct FactoryInner {
    scheduler: Arc<dyn GameScheduler>,
    shutdown: ShutdownSignal,
    default_error_handler: DefaultErrorHandlerSlot,
    shared: DashMap<String, TaskChain>,
}

impl SharedChainRegistry for FactoryInner {
    fn deregister(&self, name: &str) {
        self.shared.remove(name);
    }
}

/// Creates [`TaskChain`]s bound to one [`GameScheduler`].
#[derive(Clone)]
pub struct ChainFactory {
    inner: Arc<FactoryInner>,
}

impl ChainFactory {
    pub fn new(scheduler: Arc<dyn GameScheduler>) -> Self {
        let shutdown = ShutdownSignal::new();
        {
            let shutdown = shutdown.clone();
            scheduler.register_shutdown_hook(Box::new(move || shutdown.trigger()));
        }
        ChainFactory {
            inner: Arc::new(FactoryInner {
                scheduler,
                shutdown,
                default_error_handler: Arc::new(RwLock::new(None)),
                shared: DashMap::new(),
            }),
        }
    }

    /// A fresh, anonymous chain.
    pub fn chain(&self) -> TaskChain {
        TaskChain::new(
            Arc::clone(&self.inner.scheduler),
            self.inner.shutdown.clone(),
            Arc::clone(&self.inner.default_error_handler),
            None,
        )
    }

    /// The live chain registered under `name`, creating one if none is
    /// running. Named chains accept appended tasks even after they start
    /// and deregister themselves when they finish, so callers across the
    /// process can serialize work on a common queue.
    pub fn shared_chain(&self, name: impl Into<String>) -> TaskChain {
        let name = name.into();
        let entry = self.inner.shared.entry(name.clone());
        entry
            .or_insert_with(|| {
                let registry: Arc<dyn SharedChainRegistry> =
                    Arc::clone(&self.inner) as Arc<dyn SharedChainRegistry>;
                TaskChain::new(
                    Arc::clone(&self.inner.scheduler),
                    self.inner.shutdown.clone(),
                    Arc::clone(&self.inner.default_error_handler),
                    Some(SharedHandle {
                        name,
                        registry: Arc::downgrade(&registry),
                    }),
                )
            })
            .clone()
    }

    /// Fallback handler for chains that set none of their own.
    pub fn set_default_error_handler<E>(&self, handler: E)
    where
        E: Fn(&TaskError, Option<usize>) + Send + Sync + 'static,
    {
        *self.inner.default_error_handler.write() = Some(Arc::new(handler));
    }

    pub fn clear_default_error_handler(&self) {
        *self.inner.default_error_handler.write() = None;
    }

    /// The current factory-wide fallback handler, if any.
    pub fn default_error_handler(&self) -> Option<ErrorHandler> {
        self.inner.default_error_handler.read().clone()
    }

    /// Enter drain mode: pending delays are interrupted and chains that
    /// execute from here on run every task inline on the calling thread,
    /// ignoring context affinity, so queued work can flush.
    pub fn shutdown(&self) {
        self.inner.shutdown.trigger();
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.inner.shutdown.clone()
    }

    pub fn scheduler(&self) -> Arc<dyn GameScheduler> {
        Arc::clone(&self.inner.scheduler)
    }
}
