//! The Effect value and its callback chain.
//!
//! An [`Effect`] pairs an intent with an ordered chain of (success, error)
//! handler pairs. Effects are immutable: [`Effect::on`] returns a new effect
//! sharing structure with the old one.

use std::fmt;
use std::sync::Arc;

use crate::error::ErrorInfo;
use crate::intent::Intent;
use crate::value::Value;

/// Resolution of an effect or a handler: `Ok` for success, `Err` for failure.
pub type Outcome = Result<Value, ErrorInfo>;

pub type SuccessHandler = Arc<dyn Fn(Value) -> Outcome + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(ErrorInfo) -> Outcome + Send + Sync>;

pub(crate) type Chain = im::Vector<Callback>;

/// One (success, error) pair of a callback chain. Either side may be absent;
/// an absent side lets an outcome of that kind pass through unchanged.
#[derive(Clone, Default)]
pub struct Callback {
    success: Option<SuccessHandler>,
    error: Option<ErrorHandler>,
}

impl Callback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Outcome + Send + Sync + 'static,
    {
        self.success = Some(Arc::new(f));
        self
    }

    pub fn error<F>(mut self, f: F) -> Self
    where
        F: Fn(ErrorInfo) -> Outcome + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(f));
        self
    }

    pub fn has_success(&self) -> bool {
        self.success.is_some()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub(crate) fn success_handler(&self) -> Option<&SuccessHandler> {
        self.success.as_ref()
    }

    pub(crate) fn error_handler(&self) -> Option<&ErrorHandler> {
        self.error.as_ref()
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("success", &self.has_success())
            .field("error", &self.has_error())
            .finish()
    }
}

/// An intent plus the handlers to run once it has been performed.
#[derive(Clone)]
pub struct Effect {
    intent: Arc<dyn Intent>,
    callbacks: Chain,
}

/// Wrap an intent in an effect with an empty chain.
pub fn wrap<I: Intent>(intent: I) -> Effect {
    Effect::new(intent)
}

impl Effect {
    pub fn new<I: Intent>(intent: I) -> Self {
        Self::from_shared(Arc::new(intent))
    }

    pub fn from_shared(intent: Arc<dyn Intent>) -> Self {
        Effect {
            intent,
            callbacks: Chain::new(),
        }
    }

    pub fn intent(&self) -> &dyn Intent {
        self.intent.as_ref()
    }

    pub fn shared_intent(&self) -> Arc<dyn Intent> {
        Arc::clone(&self.intent)
    }

    /// Borrow the intent as its concrete type.
    pub fn intent_as<T: Intent>(&self) -> Option<&T> {
        self.intent().as_any().downcast_ref::<T>()
    }

    pub fn callbacks(&self) -> impl Iterator<Item = &Callback> {
        self.callbacks.iter()
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Return a new effect with `callback` appended to the chain.
    pub fn on(&self, callback: Callback) -> Effect {
        let mut callbacks = self.callbacks.clone();
        callbacks.push_back(callback);
        Effect {
            intent: Arc::clone(&self.intent),
            callbacks,
        }
    }

    pub fn on_success<F>(&self, f: F) -> Effect
    where
        F: Fn(Value) -> Outcome + Send + Sync + 'static,
    {
        self.on(Callback::new().success(f))
    }

    pub fn on_error<F>(&self, f: F) -> Effect
    where
        F: Fn(ErrorInfo) -> Outcome + Send + Sync + 'static,
    {
        self.on(Callback::new().error(f))
    }

    pub(crate) fn into_parts(self) -> (Arc<dyn Intent>, Chain) {
        (self.intent, self.callbacks)
    }

    /// Append the remaining chain of an outer effect after this effect's own.
    pub(crate) fn with_chain(self, chain: Chain) -> Effect {
        let Effect {
            intent,
            mut callbacks,
        } = self;
        callbacks.append(chain);
        Effect { intent, callbacks }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("intent", &self.intent)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Ping(u8);

    #[test]
    fn test_wrap_has_empty_chain() {
        let effect = wrap(Ping(1));
        assert_eq!(effect.callback_count(), 0);
        assert_eq!(effect.intent_as::<Ping>(), Some(&Ping(1)));
        assert!(effect.intent_as::<String>().is_none());
    }

    #[test]
    fn test_on_does_not_mutate_receiver() {
        let base = Effect::new(Ping(1));
        let one = base.on_success(Ok);
        let two = one.on_error(Err);
        assert_eq!(base.callback_count(), 0);
        assert_eq!(one.callback_count(), 1);
        assert_eq!(two.callback_count(), 2);

        let kinds: Vec<(bool, bool)> = two
            .callbacks()
            .map(|cb| (cb.has_success(), cb.has_error()))
            .collect();
        assert_eq!(kinds, vec![(true, false), (false, true)]);
    }

    #[test]
    fn test_attached_effects_share_intent() {
        let base = Effect::new(Ping(3));
        let derived = base.on(Callback::new());
        assert!(Arc::ptr_eq(&base.shared_intent(), &derived.shared_intent()));
    }

    #[test]
    fn test_with_chain_appends_outer_after_inner() {
        let inner = Effect::new(Ping(1)).on(Callback::new().success(Ok));
        let outer = Effect::new(Ping(2))
            .on(Callback::new().error(Err))
            .on(Callback::new());
        let (_, chain) = outer.into_parts();
        let merged = inner.with_chain(chain);
        let kinds: Vec<(bool, bool)> = merged
            .callbacks()
            .map(|cb| (cb.has_success(), cb.has_error()))
            .collect();
        assert_eq!(kinds, vec![(true, false), (false, true), (false, false)]);
        assert_eq!(merged.intent_as::<Ping>(), Some(&Ping(1)));
    }

    #[test]
    fn test_debug_shows_intent() {
        let effect = Effect::new(Ping(5)).on_success(Ok);
        let rendered = format!("{effect:?}");
        assert!(rendered.contains("Ping(5)"));
        assert!(rendered.contains("callbacks: 1"));
    }
}
