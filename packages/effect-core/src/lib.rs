//! effect-core: describe side effects as data, perform them elsewhere.
//!
//! Application code builds [`Effect`] values: an inert intent plus an ordered
//! chain of success/error handlers. A [`Dispatcher`] maps each intent to a
//! [`Performer`], which reports through a one-shot [`ResultBox`].
//!
//! # Architecture
//!
//! - **Immutable effects**: `.on()` appends to a persistent chain
//! - **Trampolined runner**: every step is queued, so stack depth stays
//!   constant however long the chain or deep the nesting
//! - **Outcomes as data**: handler failures and panics become [`ErrorInfo`]
//!   through guarded invocation
//! - **Explicit dispatchers**: no process-wide default; compose layers with
//!   [`ComposedDispatcher`] or [`TypeDispatcher::merge`]

pub mod config;
pub mod continuation;
pub mod dispatcher;
pub mod effect;
pub mod error;
pub mod guard;
pub mod ids;
pub mod intent;
pub mod intents;
mod logging;
pub mod parallel;
pub mod result_box;
pub mod sync;
mod trampoline;
pub mod value;


#[doc(hidden)]
pub use log as __log;

// Re-exports for convenience
pub use config::{ConfigError, EffectConfig, FailurePolicy, ParallelConfig, PerformOptions};
pub use continuation::{perform, perform_with, perform_with_fault};
pub use dispatcher::{ComposedDispatcher, Dispatcher, DispatcherRef, Performer, TypeDispatcher};
pub use effect::{wrap, Callback, Effect, ErrorHandler, Outcome, SuccessHandler};
pub use error::{ErrorInfo, IntentMismatch, MessageError, PanicError, PerformError};
pub use guard::{guard, invoke_guarded};
pub use ids::{BoxId, RunId};
pub use intent::{downcast_intent, intent_key, Intent};
pub use intents::{
    base_dispatcher, blocking_dispatcher, ConstantIntent, Delay, ErrorIntent, FuncIntent,
};
pub use parallel::{inline_parallel_performer, parallel, Gather, ParallelEffects, ParallelFailure};
pub use result_box::ResultBox;
pub use sync::{sync_perform, sync_perform_with};
pub use value::{Opaque, Value};
