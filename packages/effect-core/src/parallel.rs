//! Parallel aggregation intent and index-correlated result gathering.
//!
//! [`ParallelEffects`] is data only. How the sub-effects actually run is up
//! to whichever dispatcher handles the intent; every such dispatcher must
//! deliver results in input order. [`Gather`] does that bookkeeping and
//! [`inline_parallel_performer`] is the environment-agnostic strategy.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{FailurePolicy, ParallelConfig, PerformOptions};
use crate::continuation::perform_with_fault;
use crate::dispatcher::{DispatcherRef, Performer};
use crate::effect::{Callback, Effect, Outcome};
use crate::error::ErrorInfo;
use crate::result_box::ResultBox;
use crate::trampoline;
use crate::value::Value;

/// Run these effects and collect their results in order.
#[derive(Debug, Clone)]
pub struct ParallelEffects {
    effects: Vec<Effect>,
}

impl ParallelEffects {
    pub fn new(effects: impl IntoIterator<Item = Effect>) -> Self {
        ParallelEffects {
            effects: effects.into_iter().collect(),
        }
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// One effect whose result is a [`Value::List`] of the results of `effects`,
/// position for position.
pub fn parallel(effects: impl IntoIterator<Item = Effect>) -> Effect {
    Effect::new(ParallelEffects::new(effects))
}

/// Failure of an aggregate, naming the input position that failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parallel effect {index} failed: {cause}")]
pub struct ParallelFailure {
    pub index: usize,
    #[source]
    pub cause: ErrorInfo,
}

struct GatherState {
    slots: Vec<Option<Value>>,
    remaining: usize,
    first_failure: Option<(usize, ErrorInfo)>,
    done: bool,
}

/// Collects N outcomes, arriving in any order, into one ordered result.
///
/// The aggregate box is settled exactly once: with the ordered list when
/// every slot succeeded, or with a [`ParallelFailure`] according to the
/// [`FailurePolicy`]. Outcomes arriving after that are dropped.
pub struct Gather {
    result_box: ResultBox,
    policy: FailurePolicy,
    state: Mutex<GatherState>,
}

impl Gather {
    pub fn new(len: usize, result_box: ResultBox, policy: FailurePolicy) -> Arc<Self> {
        let gather = Arc::new(Gather {
            result_box,
            policy,
            state: Mutex::new(GatherState {
                slots: vec![None; len],
                remaining: len,
                first_failure: None,
                done: false,
            }),
        });
        if len == 0 {
            gather.state.lock().done = true;
            gather.result_box.succeed(Vec::new());
        }
        gather
    }

    /// True once the aggregate box has been (or is being) settled.
    pub fn is_done(&self) -> bool {
        self.state.lock().done
    }

    /// Record the outcome for input position `index`.
    pub fn complete(&self, index: usize, outcome: Outcome) {
        let settle = {
            let mut state = self.state.lock();
            if state.done || index >= state.slots.len() || state.slots[index].is_some() {
                return;
            }
            match outcome {
                Ok(value) => {
                    state.slots[index] = Some(value);
                    state.remaining -= 1;
                }
                Err(cause) => match self.policy {
                    FailurePolicy::FailFast => {
                        state.done = true;
                        drop(state);
                        self.result_box
                            .fail(ErrorInfo::new(ParallelFailure { index, cause }));
                        return;
                    }
                    FailurePolicy::WaitAll => {
                        state.remaining -= 1;
                        let lower = state
                            .first_failure
                            .as_ref()
                            .map_or(true, |(first, _)| index < *first);
                        if lower {
                            state.first_failure = Some((index, cause));
                        }
                        // Keep the slot marked so a repeat outcome is ignored.
                        state.slots[index] = Some(Value::Unit);
                    }
                },
            }
            if state.remaining > 0 {
                return;
            }
            state.done = true;
            match state.first_failure.take() {
                Some((index, cause)) => Err(ErrorInfo::new(ParallelFailure { index, cause })),
                None => Ok(Value::List(
                    state.slots.iter_mut().map(|slot| slot.take().unwrap_or_default()).collect(),
                )),
            }
        };
        self.result_box.settle(settle);
    }
}

/// Performer for [`ParallelEffects`] that needs no runtime of its own.
///
/// Sub-effects are started in input order with the top-level dispatcher,
/// each queued on the thread's trampoline behind the one before it.
/// Synchronous sub-effects therefore run one after another; asynchronous ones
/// overlap however their performers allow. Under [`FailurePolicy::FailFast`]
/// no further sub-effect is started once one has failed.
pub fn inline_parallel_performer(config: ParallelConfig) -> Performer {
    Performer::typed(move |dispatcher, intent: Arc<ParallelEffects>, result_box| {
        let gather = Gather::new(intent.len(), result_box, config.failure_policy);
        start_from(Arc::clone(dispatcher), intent, gather, 0);
    })
}

/// Start sub-effect `index`, then queue the start of the next one so that
/// this one gets to run first.
fn start_from(
    dispatcher: DispatcherRef,
    intent: Arc<ParallelEffects>,
    gather: Arc<Gather>,
    index: usize,
) {
    let Some(effect) = intent.effects().get(index) else {
        return;
    };
    if gather.is_done() {
        return;
    }
    let on_success = Arc::clone(&gather);
    let on_error = Arc::clone(&gather);
    let on_fault = Arc::clone(&gather);
    let tracked = effect.on(
        Callback::new()
            .success(move |value| {
                on_success.complete(index, Ok(value));
                Ok(Value::Unit)
            })
            .error(move |error| {
                on_error.complete(index, Err(error));
                Ok(Value::Unit)
            }),
    );
    perform_with_fault(&dispatcher, tracked, PerformOptions::default(), move |fault| {
        on_fault.complete(index, Err(fault.into_error_info()));
    });
    trampoline::defer(move || start_from(dispatcher, intent, gather, index + 1));
}
