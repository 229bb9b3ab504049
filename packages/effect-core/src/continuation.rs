//! Trampolined continuation runner.
//!
//! Every step of effect evaluation is queued as a [`Bounce`] instead of being
//! called directly. A run's bounces are popped by one driver at a time, and
//! runs started from inside another run's performer or handler are queued on
//! the thread's trampoline rather than driven on top of it. Long callback
//! chains, deeply nested effects and nested parallel effects therefore use
//! constant native stack. A run goes idle when a performer holds its box;
//! settling the box later schedules the next bounce and restarts the driver
//! on whichever thread settled it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::config::PerformOptions;
use crate::dispatcher::DispatcherRef;
use crate::effect::{Chain, Effect, Outcome};
use crate::effect_debug_log;
use crate::error::PerformError;
use crate::guard::{guard, invoke_guarded};
use crate::ids::RunId;
use crate::result_box::ResultBox;
use crate::trampoline::{self, Ready};
use crate::value::Value;

/// One queued step.
enum Bounce {
    /// Look up a performer for the effect's intent and invoke it.
    Perform(Effect),
    /// Apply `chain` to an outcome.
    Resolve { chain: Chain, outcome: Outcome },
}

type FaultFn = Box<dyn FnOnce(PerformError) + Send>;

/// Where a no-performer fault of the run goes.
enum FaultReport {
    /// Held for `perform_with`, which is still running on `origin`.
    Caller {
        origin: ThreadId,
        fault: Option<PerformError>,
    },
    /// Handed to a callback, at most once.
    Notify(FaultFn),
    /// Nobody is waiting; log it.
    Log,
}

struct RunState {
    queue: VecDeque<Bounce>,
    driving: bool,
    report: FaultReport,
    bounces: u64,
}

/// The trampoline for one `perform` invocation.
pub(crate) struct Runner {
    id: RunId,
    dispatcher: DispatcherRef,
    options: PerformOptions,
    state: Mutex<RunState>,
}

/// The rest of a run, bound into a [`ResultBox`].
pub(crate) struct Continuation {
    runner: Arc<Runner>,
    chain: Chain,
}

impl Continuation {
    pub(crate) fn resume(self, outcome: Outcome) {
        let Continuation { runner, chain } = self;
        runner.schedule(Bounce::Resolve { chain, outcome });
    }
}

impl Runner {
    fn new(dispatcher: &DispatcherRef, options: PerformOptions, report: FaultReport) -> Arc<Self> {
        Arc::new(Runner {
            id: RunId::fresh(),
            dispatcher: Arc::clone(dispatcher),
            options,
            state: Mutex::new(RunState {
                queue: VecDeque::new(),
                driving: false,
                report,
                bounces: 0,
            }),
        })
    }

    /// Queue `bounce`. Unless the run already has a driver, hand the run to
    /// this thread's trampoline.
    fn schedule(self: &Arc<Self>, bounce: Bounce) {
        {
            let mut state = self.state.lock();
            state.queue.push_back(bounce);
            if state.driving {
                return;
            }
            state.driving = true;
        }
        trampoline::enter(Ready::Drive(Arc::clone(self)));
    }

    pub(crate) fn drive(self: &Arc<Self>) {
        loop {
            let bounce = {
                let mut state = self.state.lock();
                match state.queue.pop_front() {
                    Some(bounce) => {
                        state.bounces += 1;
                        bounce
                    }
                    None => {
                        state.driving = false;
                        effect_debug_log!("{} idle after {} bounces", self.id, state.bounces);
                        return;
                    }
                }
            };
            match bounce {
                Bounce::Perform(effect) => self.perform_step(effect),
                Bounce::Resolve { chain, outcome } => self.resolve_step(chain, outcome),
            }
        }
    }

    fn perform_step(self: &Arc<Self>, effect: Effect) {
        let (intent, chain) = effect.into_parts();
        let intent_name = intent.as_ref().type_name();
        let Some(performer) = self.dispatcher.lookup(intent.as_ref()) else {
            self.record_fault(PerformError::no_performer(intent_name));
            return;
        };
        effect_debug_log!("{} performing {:?}", self.id, intent);

        let result_box = ResultBox::for_continuation(
            intent_name,
            Continuation {
                runner: Arc::clone(self),
                chain,
            },
        );
        let held = result_box.clone();
        let invoked = guard(|| {
            performer.perform(&self.dispatcher, intent, result_box);
            Ok(())
        });
        if let Err(error) = invoked {
            if held.is_settled() {
                log::warn!("performer for {intent_name} panicked after settling its box: {error}");
            } else {
                held.fail(error);
            }
        }
    }

    fn resolve_step(self: &Arc<Self>, mut chain: Chain, outcome: Outcome) {
        let mut outcome = match outcome {
            Ok(Value::Effect(inner)) if self.options.recurse_effects => {
                effect_debug_log!("{} flattening nested {:?}", self.id, inner);
                self.schedule(Bounce::Perform(inner.with_chain(chain)));
                return;
            }
            other => other,
        };

        // Pairs without a handler for this kind of outcome are skipped here;
        // the first applicable handler ends this bounce.
        while let Some(callback) = chain.pop_front() {
            outcome = match (outcome, callback.success_handler(), callback.error_handler()) {
                (Ok(value), Some(handler), _) => {
                    let next = invoke_guarded(|v| handler(v), value);
                    self.schedule(Bounce::Resolve {
                        chain,
                        outcome: next,
                    });
                    return;
                }
                (Err(error), _, Some(handler)) => {
                    let next = invoke_guarded(|e| handler(e), error);
                    self.schedule(Bounce::Resolve {
                        chain,
                        outcome: next,
                    });
                    return;
                }
                (passed, _, _) => passed,
            };
        }

        if let Err(error) = outcome {
            log::warn!(
                "{} finished with an unhandled failure ({}): {}",
                self.id,
                error.kind(),
                error
            );
        }
    }

    fn record_fault(&self, fault: PerformError) {
        let notify = {
            let mut state = self.state.lock();
            state.queue.clear();
            match &mut state.report {
                FaultReport::Caller {
                    origin,
                    fault: held @ None,
                } if *origin == thread::current().id() => {
                    *held = Some(fault);
                    return;
                }
                FaultReport::Notify(_) => {
                    match std::mem::replace(&mut state.report, FaultReport::Log) {
                        FaultReport::Notify(notify) => notify,
                        _ => return,
                    }
                }
                _ => {
                    log::error!("{} stopped: {fault}", self.id);
                    return;
                }
            }
        };
        notify(fault);
    }

    /// Stop holding faults for the caller and return the one held, if any.
    /// Faults recorded from now on are logged.
    fn close_report(&self) -> Option<PerformError> {
        let mut state = self.state.lock();
        match std::mem::replace(&mut state.report, FaultReport::Log) {
            FaultReport::Caller { fault, .. } => fault,
            other => {
                state.report = other;
                None
            }
        }
    }
}

/// Perform `effect` with default [`PerformOptions`].
///
/// Returns once the run goes idle: either the chain finished, or a performer
/// is holding its box. The effect's final outcome is only observable through
/// handlers attached to it. The only error returned is
/// [`PerformError::NoPerformer`], in which case no handler has run for the
/// effect that lacked a performer.
///
/// Called from inside a performer or handler, the effect is queued behind
/// the run already being driven on this thread and starts once the caller
/// returns. A missing performer found then is logged, not returned; use
/// [`perform_with_fault`] to receive it.
pub fn perform(dispatcher: &DispatcherRef, effect: Effect) -> Result<(), PerformError> {
    perform_with(dispatcher, effect, PerformOptions::default())
}

pub fn perform_with(
    dispatcher: &DispatcherRef,
    effect: Effect,
    options: PerformOptions,
) -> Result<(), PerformError> {
    let report = FaultReport::Caller {
        origin: thread::current().id(),
        fault: None,
    };
    let runner = Runner::new(dispatcher, options, report);
    runner.schedule(Bounce::Perform(effect));
    match runner.close_report() {
        Some(fault) => Err(fault),
        None => Ok(()),
    }
}

/// Perform `effect`, handing a no-performer fault to `on_fault` whenever it
/// is found, synchronously or after an asynchronous resume.
///
/// This is how performers start sub-effects: the sub-run is queued on the
/// active trampoline and a wiring mistake still reaches the performer.
pub fn perform_with_fault<F>(
    dispatcher: &DispatcherRef,
    effect: Effect,
    options: PerformOptions,
    on_fault: F,
) where
    F: FnOnce(PerformError) + Send + 'static,
{
    let runner = Runner::new(dispatcher, options, FaultReport::Notify(Box::new(on_fault)));
    runner.schedule(Bounce::Perform(effect));
}

/// [`perform_with`] on a trampoline of its own, so the run has gone idle
/// when this returns even if called from inside another run.
pub(crate) fn perform_isolated(
    dispatcher: &DispatcherRef,
    effect: Effect,
    options: PerformOptions,
) -> Result<(), PerformError> {
    trampoline::isolated(|| perform_with(dispatcher, effect, options))
}
