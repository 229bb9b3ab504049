//! Non-blocking performers for the core's `ParallelEffects` and `Delay`.

use std::sync::Arc;

use effect_core::{
    Delay, ErrorInfo, FailurePolicy, ParallelConfig, ParallelEffects, ParallelFailure,
    PerformError, Performer, TypeDispatcher, Value,
};
use futures::future::{join_all, try_join_all};
use futures::FutureExt;

use crate::bridge::{future_performer, perform, SpawnerRef};
use crate::clock::ClockRef;

fn parallel_failure(index: usize, error: PerformError) -> ErrorInfo {
    ErrorInfo::new(ParallelFailure {
        index,
        cause: error.into_error_info(),
    })
}

/// Performs [`ParallelEffects`] by starting every sub-effect and joining
/// their futures on `spawner`.
///
/// All sub-effects are started before any result is awaited. Results come
/// back in input order; with [`FailurePolicy::FailFast`] the aggregate fails
/// on the first failure to arrive, with [`FailurePolicy::WaitAll`] on the
/// lowest-index failure once all have finished.
pub fn joined_parallel_performer(spawner: SpawnerRef, config: ParallelConfig) -> Performer {
    future_performer(spawner, move |dispatcher, intent: Arc<ParallelEffects>| {
        let started: Vec<_> = intent
            .effects()
            .iter()
            .enumerate()
            .map(|(index, effect)| {
                perform(dispatcher, effect.clone()).map(move |result| (index, result))
            })
            .collect();
        let policy = config.failure_policy;
        async move {
            match policy {
                FailurePolicy::FailFast => {
                    let tagged = started.into_iter().map(|future| {
                        future.map(|(index, result)| {
                            result.map_err(|error| parallel_failure(index, error))
                        })
                    });
                    try_join_all(tagged).await.map(Value::List)
                }
                FailurePolicy::WaitAll => {
                    let mut values = Vec::new();
                    for (index, result) in join_all(started).await {
                        match result {
                            Ok(value) => values.push(value),
                            Err(error) => return Err(parallel_failure(index, error)),
                        }
                    }
                    Ok(Value::List(values))
                }
            }
        }
    })
}

/// Performs [`Delay`] by scheduling the box's success on `clock`.
pub fn delay_performer(clock: ClockRef) -> Performer {
    Performer::typed(move |_, intent: Arc<Delay>, result_box| {
        clock.call_later(
            intent.duration,
            Box::new(move || {
                result_box.succeed(Value::Unit);
            }),
        );
    })
}

/// Dispatcher for the intents that need a runtime: [`ParallelEffects`] and
/// [`Delay`]. Compose it with the application's own dispatchers.
pub fn futures_dispatcher(
    spawner: SpawnerRef,
    clock: ClockRef,
    parallel: ParallelConfig,
) -> TypeDispatcher {
    TypeDispatcher::new()
        .with::<ParallelEffects>(joined_parallel_performer(spawner, parallel))
        .with::<Delay>(delay_performer(clock))
}
