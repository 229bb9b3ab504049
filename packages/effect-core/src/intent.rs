//! Intents: inert, application-defined descriptions of what should happen.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::IntentMismatch;

/// Any `'static`, `Debug`, thread-safe type is an intent.
///
/// Intents carry no behaviour; a [`Dispatcher`](crate::Dispatcher) decides how
/// each one is performed, keyed by the intent's `TypeId`.
///
/// Call these methods through `&dyn Intent` (e.g. `effect.intent()`), not on
/// an `Arc<dyn Intent>` directly, which is itself an `Intent`.
pub trait Intent: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Type name of the concrete intent, for diagnostics.
    fn type_name(&self) -> &'static str;
}

impl<T: Any + fmt::Debug + Send + Sync> Intent for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// Stable dispatch key of an intent.
pub fn intent_key(intent: &dyn Intent) -> TypeId {
    intent.as_any().type_id()
}

/// Recover the concrete intent type from a shared intent.
pub fn downcast_intent<T: Intent>(intent: Arc<dyn Intent>) -> Result<Arc<T>, IntentMismatch> {
    let mismatch = IntentMismatch {
        expected: type_name::<T>(),
        found: intent.as_ref().type_name(),
    };
    if !intent.as_ref().as_any().is::<T>() {
        return Err(mismatch);
    }
    intent.into_any_arc().downcast::<T>().map_err(|_| mismatch)
}
