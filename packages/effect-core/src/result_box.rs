//! The one-shot completion sink handed to performers.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::continuation::Continuation;
use crate::effect::Outcome;
use crate::error::ErrorInfo;
use crate::ids::BoxId;
use crate::value::Value;

enum Sink {
    Chain(Continuation),
    Callback(Box<dyn FnOnce(Outcome) + Send>),
}

impl Sink {
    fn deliver(self, outcome: Outcome) {
        match self {
            Sink::Chain(k) => k.resume(outcome),
            Sink::Callback(f) => f(outcome),
        }
    }
}

struct BoxInner {
    id: BoxId,
    intent: &'static str,
    sink: Mutex<Option<Sink>>,
}

impl Drop for BoxInner {
    fn drop(&mut self) {
        if self.sink.get_mut().is_some() {
            log::debug!(
                "{} for {} dropped without being settled; its effect will never complete",
                self.id,
                self.intent
            );
        }
    }
}

/// Where a performer puts its result.
///
/// A `ResultBox` is a cheap cloneable handle over a one-shot latch: the first
/// call to [`succeed`](Self::succeed), [`fail`](Self::fail) or
/// [`settle`](Self::settle) on any clone delivers the outcome. Every later
/// call is a no-op that returns `false` and logs a warning. A box that is
/// never settled leaves its effect pending forever.
#[derive(Clone)]
pub struct ResultBox {
    inner: Arc<BoxInner>,
}

impl ResultBox {
    pub(crate) fn for_continuation(intent: &'static str, k: Continuation) -> Self {
        Self::with_sink(intent, Sink::Chain(k))
    }

    /// A box whose outcome is handed to `f`. Used by bridges that need a box
    /// outside of a running effect, and by tests.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        Self::with_sink("<detached>", Sink::Callback(Box::new(f)))
    }

    fn with_sink(intent: &'static str, sink: Sink) -> Self {
        ResultBox {
            inner: Arc::new(BoxInner {
                id: BoxId::fresh(),
                intent,
                sink: Mutex::new(Some(sink)),
            }),
        }
    }

    pub fn id(&self) -> BoxId {
        self.inner.id
    }

    pub fn is_settled(&self) -> bool {
        self.inner.sink.lock().is_none()
    }

    /// Report success. Returns `true` if this call settled the box.
    pub fn succeed(&self, value: impl Into<Value>) -> bool {
        self.settle(Ok(value.into()))
    }

    /// Report failure. Returns `true` if this call settled the box.
    pub fn fail(&self, error: ErrorInfo) -> bool {
        self.settle(Err(error))
    }

    /// Deliver `outcome` unless the box was already settled.
    pub fn settle(&self, outcome: Outcome) -> bool {
        let sink = self.inner.sink.lock().take();
        match sink {
            Some(sink) => {
                sink.deliver(outcome);
                true
            }
            None => {
                log::warn!(
                    "{} for {} settled more than once; ignoring {}",
                    self.inner.id,
                    self.inner.intent,
                    if outcome.is_ok() { "success" } else { "failure" }
                );
                false
            }
        }
    }
}

impl fmt::Debug for ResultBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultBox")
            .field("id", &self.inner.id)
            .field("intent", &self.inner.intent)
            .field("settled", &self.is_settled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_box() -> (ResultBox, Arc<Mutex<Vec<Outcome>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let result_box = ResultBox::from_fn(move |outcome| sink.lock().push(outcome));
        (result_box, seen)
    }

    #[test]
    fn test_succeed_delivers_once() {
        let (result_box, seen) = recording_box();
        assert!(!result_box.is_settled());
        assert!(result_box.succeed("first"));
        assert!(result_box.is_settled());
        assert!(!result_box.succeed("second"));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].as_ref().ok().and_then(Value::as_str), Some("first"));
    }

    #[test]
    fn test_fail_after_succeed_is_ignored() {
        let (result_box, seen) = recording_box();
        assert!(result_box.succeed(1i64));
        assert!(!result_box.fail(ErrorInfo::msg("late")));
        assert_eq!(seen.lock().len(), 1);
        assert!(seen.lock()[0].is_ok());
    }

    #[test]
    fn test_clones_share_the_latch() {
        let (result_box, seen) = recording_box();
        let other = result_box.clone();
        assert!(other.fail(ErrorInfo::msg("boom")));
        assert!(!result_box.succeed(()));
        assert!(result_box.is_settled());
        assert_eq!(result_box.id(), other.id());
        assert!(seen.lock()[0].is_err());
    }
}
