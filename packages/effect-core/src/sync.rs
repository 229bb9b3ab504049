//! Synchronous extraction of an effect's result.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::PerformOptions;
use crate::continuation::perform_isolated;
use crate::dispatcher::DispatcherRef;
use crate::effect::{Callback, Effect, Outcome};
use crate::error::PerformError;
use crate::value::Value;

/// Perform `effect` and return its final result.
///
/// Every performer reached through the effect and its handlers must settle
/// its box before returning. If the run goes idle without a result this
/// fails with [`PerformError::NotSynchronous`]; it never waits. A failed
/// effect comes back as [`PerformError::Failed`] holding the original error.
/// Called from inside a performer or handler, the effect still runs to
/// completion before this returns.
pub fn sync_perform(dispatcher: &DispatcherRef, effect: Effect) -> Result<Value, PerformError> {
    sync_perform_with(dispatcher, effect, PerformOptions::default())
}

pub fn sync_perform_with(
    dispatcher: &DispatcherRef,
    effect: Effect,
    options: PerformOptions,
) -> Result<Value, PerformError> {
    let slot: Arc<Mutex<Option<Outcome>>> = Arc::new(Mutex::new(None));
    let on_success = Arc::clone(&slot);
    let on_error = Arc::clone(&slot);
    let collected = effect.on(
        Callback::new()
            .success(move |value| {
                on_success.lock().get_or_insert(Ok(value));
                Ok(Value::Unit)
            })
            .error(move |error| {
                on_error.lock().get_or_insert(Err(error));
                Ok(Value::Unit)
            }),
    );

    perform_isolated(dispatcher, collected, options)?;

    let outcome = slot.lock().take();
    match outcome {
        Some(Ok(value)) => Ok(value),
        Some(Err(error)) => Err(PerformError::Failed(error)),
        None => Err(PerformError::not_synchronous(format!("{effect:?}"))),
    }
}
