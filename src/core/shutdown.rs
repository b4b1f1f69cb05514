/// Draining signal owned by the chain factory.
///
/// Once triggered, every context-switch decision in the dispatch loop runs
/// the task inline on the current thread instead of posting it, so queued
/// chains can flush to completion without depending on a scheduler that may
/// no longer accept postings.
#[derive(Clone)]
pub struct ShutdownSignal {
    token: tokio_util::sync::CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            token: tokio_util::sync::CancellationToken::new(),
        }
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
