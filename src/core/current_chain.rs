//! Thread-scoped "currently executing chain" slot.
//!
//! Saved and restored (never merely set and cleared) around every task body,
//! abort action, error handler, and done callback, so a task that starts a
//! second chain inline on the same thread does not corrupt the outer chain's
//! context.

use std::cell::RefCell;

use crate::core::chain::TaskChain;

thread_local! {
    static CURRENT_CHAIN: RefCell<Option<TaskChain>> = const { RefCell::new(None) };
}

/// RAII guard restoring the previous occupant of the slot on drop, including
/// during unwinding.
pub(crate) struct CurrentChainGuard {
    prev: Option<TaskChain>,
}

pub(crate) fn enter(chain: TaskChain) -> CurrentChainGuard {
    let prev = CURRENT_CHAIN.with(|slot| slot.borrow_mut().replace(chain));
    CurrentChainGuard { prev }
}

pub(crate) fn current() -> Option<TaskChain> {
    CURRENT_CHAIN.with(|slot| slot.borrow().clone())
}

impl Drop for CurrentChainGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        CURRENT_CHAIN.with(|slot| *slot.borrow_mut() = prev);
    }
}
