//! chainwork is a chain execution engine for programs split between a
//! single serialized "foreground" context and a pool of "background"
//! threads, such as game servers with a main tick loop.
//!
//! A [`TaskChain`] is an ordered list of heterogeneous tasks executed
//! strictly one at a time. Each task declares where it wants to run
//! ([`ContextAffinity`]) and the engine hops between contexts through the
//! [`GameScheduler`](scheduler::GameScheduler) port, threading each task's
//! output into the next task's input. Chains support cooperative abort,
//! routed error handling, per-chain key/value data, pauses, and shared
//! named chains that serialize work from many call sites.
//!
//! ```no_run
//! use chainwork::{ChainFactory, TaskError};
//! use chainwork::scheduler::TokioScheduler;
//! use serde_json::json;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn demo() {
//! let (scheduler, foreground) = TokioScheduler::new(Duration::from_millis(50));
//! let factory = ChainFactory::new(scheduler);
//!
//! factory
//!     .chain()
//!     .background_first(|| Ok(json!("loaded off-thread")))
//!     .abort_if_null()
//!     .foreground_last(|value| {
//!         println!("applying {value} on the foreground");
//!         Ok(())
//!     })
//!     .execute_done(|ok| println!("chain finished, success = {ok}"))
//!     .unwrap();
//!
//! foreground.run().await;
//! # }
//! ```

pub mod core;
pub mod error;
pub mod factory;
pub mod scheduler;

pub use crate::core::{
    ContextAffinity, DoneCallback, ErrorHandler, ShutdownSignal, TaskChain, TaskCompletion,
    TaskData,
};
pub use crate::error::{ChainError, TaskError};
pub use crate::factory::{ChainFactory, SharedChainRegistry};
