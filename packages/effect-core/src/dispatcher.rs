//! Dispatcher protocol: mapping intents to performers.
//!
//! A [`Dispatcher`] is a pure lookup from an intent to a [`Performer`].
//! [`TypeDispatcher`] keys performers by the intent's `TypeId`;
//! [`ComposedDispatcher`] tries several dispatchers in order.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::effect::Outcome;
use crate::effect_debug_log;
use crate::error::ErrorInfo;
use crate::guard::guard;
use crate::intent::{downcast_intent, intent_key, Intent};
use crate::result_box::ResultBox;

/// Looks up the performer for an intent. Lookup must not have side effects.
pub trait Dispatcher: Send + Sync {
    fn lookup(&self, intent: &dyn Intent) -> Option<Performer>;
}

/// Shared dispatcher handle threaded through every `perform` call.
pub type DispatcherRef = Arc<dyn Dispatcher>;

impl<F> Dispatcher for F
where
    F: Fn(&dyn Intent) -> Option<Performer> + Send + Sync,
{
    fn lookup(&self, intent: &dyn Intent) -> Option<Performer> {
        self(intent)
    }
}

type PerformFn = dyn Fn(&DispatcherRef, Arc<dyn Intent>, ResultBox) + Send + Sync;

/// Carries out an intent, reporting through the given [`ResultBox`].
///
/// A performer must settle the box exactly once, either before returning or
/// later from anywhere. It also receives the top-level dispatcher so it can
/// perform sub-effects with the same wiring.
#[derive(Clone)]
pub struct Performer(Arc<PerformFn>);

impl Performer {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&DispatcherRef, Arc<dyn Intent>, ResultBox) + Send + Sync + 'static,
    {
        Performer(Arc::new(f))
    }

    /// Performer for one concrete intent type. A foreign intent fails the box
    /// with an [`IntentMismatch`](crate::IntentMismatch).
    pub fn typed<T, F>(f: F) -> Self
    where
        T: Intent,
        F: Fn(&DispatcherRef, Arc<T>, ResultBox) + Send + Sync + 'static,
    {
        Performer::new(move |dispatcher, intent, result_box| {
            match downcast_intent::<T>(intent) {
                Ok(intent) => f(dispatcher, intent, result_box),
                Err(mismatch) => {
                    result_box.fail(ErrorInfo::new(mismatch));
                }
            }
        })
    }

    /// Adapt a plain "return a value or an error" function into a performer.
    ///
    /// The function runs under [`guard`] and its outcome settles the box
    /// before the performer returns.
    pub fn sync<T, F>(f: F) -> Self
    where
        T: Intent,
        F: Fn(&DispatcherRef, &T) -> Outcome + Send + Sync + 'static,
    {
        Performer::typed(move |dispatcher, intent: Arc<T>, result_box| {
            result_box.settle(guard(|| f(dispatcher, &intent)));
        })
    }

    pub fn perform(&self, dispatcher: &DispatcherRef, intent: Arc<dyn Intent>, result_box: ResultBox) {
        (self.0)(dispatcher, intent, result_box)
    }
}

impl fmt::Debug for Performer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Performer")
    }
}

#[derive(Clone)]
struct Entry {
    intent: &'static str,
    performer: Performer,
}

/// Dispatch table keyed by intent type.
#[derive(Clone, Default)]
pub struct TypeDispatcher {
    performers: HashMap<TypeId, Entry>,
}

impl TypeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `performer` for intents of type `T`, returning the one it
    /// replaced.
    pub fn register<T: Intent>(&mut self, performer: Performer) -> Option<Performer> {
        self.performers
            .insert(
                TypeId::of::<T>(),
                Entry {
                    intent: type_name::<T>(),
                    performer,
                },
            )
            .map(|entry| entry.performer)
    }

    pub fn with<T: Intent>(mut self, performer: Performer) -> Self {
        self.register::<T>(performer);
        self
    }

    pub fn with_performer<T, F>(self, f: F) -> Self
    where
        T: Intent,
        F: Fn(&DispatcherRef, Arc<T>, ResultBox) + Send + Sync + 'static,
    {
        self.with::<T>(Performer::typed(f))
    }

    pub fn with_sync<T, F>(self, f: F) -> Self
    where
        T: Intent,
        F: Fn(&DispatcherRef, &T) -> Outcome + Send + Sync + 'static,
    {
        self.with::<T>(Performer::sync(f))
    }

    /// New dispatcher with the entries of both, preferring `other` where both
    /// handle the same intent type.
    pub fn merge(&self, other: &TypeDispatcher) -> TypeDispatcher {
        let mut performers = self.performers.clone();
        performers.extend(
            other
                .performers
                .iter()
                .map(|(key, entry)| (*key, entry.clone())),
        );
        TypeDispatcher { performers }
    }

    pub fn handles<T: Intent>(&self) -> bool {
        self.performers.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.performers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.performers.is_empty()
    }

    /// Intent type names this table handles, sorted.
    pub fn intent_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.performers.values().map(|e| e.intent).collect();
        names.sort_unstable();
        names
    }

    pub fn into_ref(self) -> DispatcherRef {
        Arc::new(self)
    }
}

impl Dispatcher for TypeDispatcher {
    fn lookup(&self, intent: &dyn Intent) -> Option<Performer> {
        let found = self.performers.get(&intent_key(intent));
        effect_debug_log!(
            "type dispatcher lookup {} -> {}",
            intent.type_name(),
            if found.is_some() { "hit" } else { "miss" }
        );
        found.map(|entry| entry.performer.clone())
    }
}

impl fmt::Debug for TypeDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDispatcher")
            .field("intents", &self.intent_names())
            .finish()
    }
}

/// Tries each dispatcher in order; the first match wins.
#[derive(Clone, Default)]
pub struct ComposedDispatcher {
    dispatchers: Vec<DispatcherRef>,
}

impl ComposedDispatcher {
    pub fn new(dispatchers: Vec<DispatcherRef>) -> Self {
        ComposedDispatcher { dispatchers }
    }

    /// Append a lower-priority layer.
    pub fn then(mut self, dispatcher: DispatcherRef) -> Self {
        self.dispatchers.push(dispatcher);
        self
    }

    pub fn len(&self) -> usize {
        self.dispatchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatchers.is_empty()
    }

    pub fn into_ref(self) -> DispatcherRef {
        Arc::new(self)
    }
}

impl Dispatcher for ComposedDispatcher {
    fn lookup(&self, intent: &dyn Intent) -> Option<Performer> {
        self.dispatchers
            .iter()
            .find_map(|dispatcher| dispatcher.lookup(intent))
    }
}

impl fmt::Debug for ComposedDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedDispatcher")
            .field("layers", &self.dispatchers.len())
            .finish()
    }
}
