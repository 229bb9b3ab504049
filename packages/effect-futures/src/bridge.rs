//! Futures-returning `perform` and future-backed performers.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use effect_core::{
    perform_with_fault, Callback, DispatcherRef, Effect, ErrorInfo, Intent, Outcome,
    PerformError, PerformOptions, Performer, ResultBox, Value,
};
use futures::channel::oneshot;
use futures::task::{Spawn, SpawnExt};
use futures::FutureExt;
use parking_lot::Mutex;

/// Shared executor handle that future-backed performers spawn onto.
pub type SpawnerRef = Arc<dyn Spawn + Send + Sync>;

type Delivery = Result<Value, PerformError>;
type DeliverySlot = Mutex<Option<oneshot::Sender<Delivery>>>;

fn deliver(slot: &DeliverySlot, delivery: Delivery) {
    if let Some(sender) = slot.lock().take() {
        // The caller may have dropped the future; nobody to tell then.
        let _ = sender.send(delivery);
    }
}

/// Final result of an effect started with [`perform`].
///
/// Resolves to the value the effect's chain ends with, or to
/// [`PerformError::Failed`] carrying the original error, or to
/// [`PerformError::NoPerformer`] if some effect of the run had no performer.
/// If the chain is dropped without ever producing a result (a performer
/// dropped its box) it resolves to [`PerformError::Abandoned`].
#[must_use = "futures do nothing unless polled"]
pub struct EffectFuture {
    intent: &'static str,
    receiver: oneshot::Receiver<Delivery>,
}

impl Future for EffectFuture {
    type Output = Result<Value, PerformError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.receiver.poll_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(delivery)) => Poll::Ready(delivery),
            Poll::Ready(Err(oneshot::Canceled)) => {
                Poll::Ready(Err(PerformError::abandoned(self.intent)))
            }
        }
    }
}

/// Perform `effect` and return a future of its final result.
///
/// The effect starts immediately; synchronous parts of it have already run
/// when this returns, unless it was called from inside a performer or
/// handler, in which case the effect is queued behind the current run.
pub fn perform(dispatcher: &DispatcherRef, effect: Effect) -> EffectFuture {
    perform_with(dispatcher, effect, PerformOptions::default())
}

pub fn perform_with(
    dispatcher: &DispatcherRef,
    effect: Effect,
    options: PerformOptions,
) -> EffectFuture {
    let intent = effect.intent().type_name();
    let (sender, receiver) = oneshot::channel();
    let on_success = Arc::new(Mutex::new(Some(sender)));
    let on_error = Arc::clone(&on_success);
    let on_fault = Arc::clone(&on_success);
    let collected = effect.on(
        Callback::new()
            .success(move |value| {
                deliver(&on_success, Ok(value));
                Ok(Value::Unit)
            })
            .error(move |error| {
                deliver(&on_error, Err(PerformError::Failed(error)));
                Ok(Value::Unit)
            }),
    );
    perform_with_fault(dispatcher, collected, options, move |fault| {
        deliver(&on_fault, Err(fault));
    });
    EffectFuture { intent, receiver }
}

/// Spawn `future` and settle `result_box` with its output.
///
/// A panic inside the future fails the box with a
/// [`PanicError`](effect_core::PanicError). If the executor refuses the task
/// the box fails with the spawn error.
pub fn future_to_box<Fut>(spawner: &SpawnerRef, future: Fut, result_box: ResultBox)
where
    Fut: Future<Output = Outcome> + Send + 'static,
{
    let settle = result_box.clone();
    let task = AssertUnwindSafe(future).catch_unwind().map(move |caught| {
        let outcome = caught.unwrap_or_else(|panic| Err(ErrorInfo::from_panic(panic)));
        settle.settle(outcome);
    });
    if let Err(error) = spawner.spawn(task) {
        log::error!("could not spawn performer future: {error}");
        result_box.fail(ErrorInfo::new(error));
    }
}

/// Performer for intents of type `T` whose work is a future.
///
/// `f` builds the future from the dispatcher and the intent; the future's
/// output settles the box.
pub fn future_performer<T, F, Fut>(spawner: SpawnerRef, f: F) -> Performer
where
    T: Intent,
    F: Fn(&DispatcherRef, Arc<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    Performer::typed(move |dispatcher, intent: Arc<T>, result_box| {
        future_to_box(&spawner, f(dispatcher, intent), result_box);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use effect_core::{base_dispatcher, ConstantIntent, ErrorIntent, MessageError, TypeDispatcher};
    use futures::executor::{block_on, ThreadPool};

    #[derive(Debug)]
    struct Slow(i64);

    fn pool() -> SpawnerRef {
        Arc::new(ThreadPool::new().expect("thread pool"))
    }

    #[test]
    fn test_perform_resolves_to_value() {
        let dispatcher = base_dispatcher().into_ref();
        let value = block_on(perform(&dispatcher, Effect::new(ConstantIntent::new("foo"))));
        assert_eq!(value.expect("value").as_str(), Some("foo"));
    }

    #[test]
    fn test_perform_resolves_to_original_error() {
        let dispatcher = base_dispatcher().into_ref();
        let original = ErrorInfo::new(MessageError("nope".into()));
        let effect = Effect::new(ErrorIntent::new(original.clone()));
        let err = block_on(perform(&dispatcher, effect)).unwrap_err();
        assert!(err.as_failure().is_some_and(|e| e.same_error(&original)));
    }

    #[test]
    fn test_missing_performer_resolves_immediately() {
        let dispatcher = TypeDispatcher::new().into_ref();
        let err = block_on(perform(&dispatcher, Effect::new(Slow(1)))).unwrap_err();
        assert!(err.is_no_performer());
    }

    #[test]
    fn test_dropped_box_is_abandoned() {
        let dispatcher = TypeDispatcher::new()
            .with_performer(|_, _: Arc<Slow>, result_box| drop(result_box))
            .into_ref();
        let err = block_on(perform(&dispatcher, Effect::new(Slow(1)))).unwrap_err();
        assert!(matches!(err, PerformError::Abandoned { ref intent } if intent.ends_with("Slow")));
    }

    #[test]
    fn test_future_performer_runs_on_pool() {
        let spawner = pool();
        let dispatcher = TypeDispatcher::new()
            .with::<Slow>(future_performer(spawner, |_, intent: Arc<Slow>| async move {
                Ok(Value::Int(intent.0 * 2))
            }))
            .into_ref();
        let effect = Effect::new(Slow(21))
            .on_success(|v| Ok(Value::Int(v.as_int().unwrap_or_default() + 1)));
        let value = block_on(perform(&dispatcher, effect)).expect("value");
        assert_eq!(value.as_int(), Some(43));
    }

    #[test]
    fn test_panicking_future_fails_box() {
        let spawner = pool();
        let dispatcher = TypeDispatcher::new()
            .with::<Slow>(future_performer(spawner, |_, _: Arc<Slow>| async move {
                if true {
                    panic!("future exploded");
                }
                Ok(Value::Unit)
            }))
            .into_ref();
        let err = block_on(perform(&dispatcher, Effect::new(Slow(0)))).unwrap_err();
        let failure = err.as_failure().expect("failure");
        assert_eq!(
            failure
                .downcast_ref::<effect_core::PanicError>()
                .map(|p| p.message.as_str()),
            Some("future exploded")
        );
    }

    #[test]
    fn test_future_to_box_settles_detached_box() {
        let spawner = pool();
        let (tx, rx) = oneshot::channel();
        let result_box = ResultBox::from_fn(move |outcome| {
            let _ = tx.send(outcome);
        });
        future_to_box(&spawner, async { Ok(Value::from("later")) }, result_box);
        let outcome = block_on(rx).expect("settled");
        assert_eq!(outcome.expect("value").as_str(), Some("later"));
    }
}
