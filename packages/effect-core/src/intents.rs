//! Small stock intents and the dispatchers that perform them.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::ParallelConfig;
use crate::dispatcher::{Performer, TypeDispatcher};
use crate::effect::Outcome;
use crate::error::ErrorInfo;
use crate::parallel::{inline_parallel_performer, ParallelEffects};
use crate::value::Value;

/// Resolves to a fixed value.
#[derive(Debug, Clone)]
pub struct ConstantIntent {
    pub result: Value,
}

impl ConstantIntent {
    pub fn new(result: impl Into<Value>) -> Self {
        ConstantIntent {
            result: result.into(),
        }
    }
}

/// Fails with a fixed error.
#[derive(Debug, Clone)]
pub struct ErrorIntent {
    pub error: ErrorInfo,
}

impl ErrorIntent {
    pub fn new(error: ErrorInfo) -> Self {
        ErrorIntent { error }
    }
}

type IntentFn = dyn Fn() -> Outcome + Send + Sync;

/// Resolves to whatever the wrapped function returns.
///
/// The function is opaque, so effects built on it cannot be inspected or
/// performed differently in tests. Meant for wrapping existing side-effecting
/// code, not for new intents.
#[derive(Clone)]
pub struct FuncIntent {
    func: Arc<IntentFn>,
}

impl FuncIntent {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn() -> Outcome + Send + Sync + 'static,
    {
        FuncIntent {
            func: Arc::new(func),
        }
    }

    pub fn call(&self) -> Outcome {
        (self.func)()
    }
}

impl fmt::Debug for FuncIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FuncIntent(..)")
    }
}

/// Let `duration` pass, then resolve to `Value::Unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delay {
    pub duration: Duration,
}

impl Delay {
    pub fn new(duration: Duration) -> Self {
        Delay { duration }
    }
}

pub fn perform_constant() -> Performer {
    Performer::sync(|_, intent: &ConstantIntent| Ok(intent.result.clone()))
}

pub fn perform_error() -> Performer {
    Performer::sync(|_, intent: &ErrorIntent| Err(intent.error.clone()))
}

pub fn perform_func() -> Performer {
    Performer::sync(|_, intent: &FuncIntent| intent.call())
}

/// Performs a [`Delay`] by blocking the calling thread.
pub fn perform_delay_blocking() -> Performer {
    Performer::sync(|_, intent: &Delay| {
        thread::sleep(intent.duration);
        Ok(Value::Unit)
    })
}

/// Performers for [`ConstantIntent`], [`ErrorIntent`] and [`FuncIntent`].
pub fn base_dispatcher() -> TypeDispatcher {
    TypeDispatcher::new()
        .with::<ConstantIntent>(perform_constant())
        .with::<ErrorIntent>(perform_error())
        .with::<FuncIntent>(perform_func())
}

/// [`base_dispatcher`] plus blocking [`Delay`] and inline
/// [`ParallelEffects`], for programs that perform effects without any async
/// runtime.
pub fn blocking_dispatcher(parallel: ParallelConfig) -> TypeDispatcher {
    base_dispatcher()
        .with::<Delay>(perform_delay_blocking())
        .with::<ParallelEffects>(inline_parallel_performer(parallel))
}
