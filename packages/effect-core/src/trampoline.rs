//! Per-thread trampoline shared by every run driven on a thread.
//!
//! The first run to need driving on a thread becomes the trampoline and
//! loops over a ready queue. Runs started or resumed while it is active
//! (from inside a performer or a handler) are queued behind it instead of
//! being driven on top of the current native stack frame.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::continuation::Runner;

pub(crate) enum Ready {
    Drive(Arc<Runner>),
    Task(Box<dyn FnOnce()>),
}

impl Ready {
    fn run(self) {
        match self {
            Ready::Drive(runner) => runner.drive(),
            Ready::Task(task) => task(),
        }
    }
}

thread_local! {
    static READY: RefCell<Option<VecDeque<Ready>>> = const { RefCell::new(None) };
}

/// Clears the thread's trampoline even if a step unwinds.
struct Active;

impl Drop for Active {
    fn drop(&mut self) {
        READY.with(|ready| *ready.borrow_mut() = None);
    }
}

/// Run `item` now if no trampoline is active on this thread, otherwise queue
/// it behind the active one.
pub(crate) fn enter(item: Ready) {
    let queued = READY.with(|ready| {
        let mut ready = ready.borrow_mut();
        match ready.as_mut() {
            Some(queue) => {
                queue.push_back(item);
                None
            }
            None => {
                *ready = Some(VecDeque::new());
                Some(item)
            }
        }
    });
    let Some(first) = queued else {
        return;
    };

    let _active = Active;
    let mut next = Some(first);
    while let Some(item) = next {
        item.run();
        next = READY.with(|ready| ready.borrow_mut().as_mut().and_then(VecDeque::pop_front));
    }
}

/// Run `task` once everything already queued on this thread has had its turn.
pub(crate) fn defer(task: impl FnOnce() + 'static) {
    enter(Ready::Task(Box::new(task)));
}

/// Run `f` on a fresh trampoline, with the thread's active queue set aside
/// until it returns.
pub(crate) fn isolated<R>(f: impl FnOnce() -> R) -> R {
    struct Restore(Option<VecDeque<Ready>>);

    impl Drop for Restore {
        fn drop(&mut self) {
            let saved = self.0.take();
            READY.with(|ready| *ready.borrow_mut() = saved);
        }
    }

    let _restore = Restore(READY.with(|ready| ready.borrow_mut().take()));
    f()
}
