//! Values that flow through callback chains.
//!
//! Handlers are free to change the shape of a result, so chains carry a
//! dynamic value. Common shapes are native variants; anything else is wrapped
//! in [`Value::Opaque`].

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::effect::Effect;
use crate::error::ErrorInfo;

/// A value that can flow through a callback chain.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    /// An effect produced as a result. When effect recursion is enabled the
    /// runner performs it instead of passing it to the next handler.
    Effect(Effect),
    /// A captured failure held as ordinary data (e.g. returned by an error
    /// handler that wants to report what it recovered from).
    Failure(ErrorInfo),
    Opaque(Opaque),
}

/// Arbitrary shared data with its type name kept for diagnostics.
#[derive(Clone)]
pub struct Opaque {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Opaque {
            type_name: type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque<{}>", self.type_name)
    }
}

impl Value {
    /// Wrap an arbitrary value.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(Opaque::new(value))
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    pub fn is_effect(&self) -> bool {
        matches!(self, Value::Effect(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_effect(&self) -> Option<&Effect> {
        match self {
            Value::Effect(effect) => Some(effect),
            _ => None,
        }
    }

    pub fn as_failure(&self) -> Option<&ErrorInfo> {
        match self {
            Value::Failure(error) => Some(error),
            _ => None,
        }
    }

    /// Borrow the payload of an [`Value::Opaque`] as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Opaque(opaque) => opaque.downcast_ref::<T>(),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Effect> for Value {
    fn from(effect: Effect) -> Self {
        Value::Effect(effect)
    }
}

impl From<ErrorInfo> for Value {
    fn from(error: ErrorInfo) -> Self {
        Value::Failure(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from_primitives() {
        assert!(matches!(Value::from(42i64), Value::Int(42)));
        assert!(matches!(Value::from(7i32), Value::Int(7)));
        assert!(matches!(Value::from("hello"), Value::String(s) if s == "hello"));
        assert!(matches!(Value::from(true), Value::Bool(true)));
        assert!(matches!(Value::from(()), Value::Unit));
        assert!(Value::default().is_unit());
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Int(42).as_int(), Some(42));
        assert_eq!(Value::Int(2).as_float(), Some(2.0));
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Unit.as_int(), None);

        let list = Value::from(vec![Value::from(1i64), Value::from("two")]);
        let items = list.as_list().expect("list");
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_str(), Some("two"));
    }

    #[test]
    fn test_opaque_roundtrip() {
        #[derive(Debug, PartialEq)]
        struct Row {
            id: u32,
        }

        let value = Value::opaque(Row { id: 9 });
        assert_eq!(value.downcast_ref::<Row>(), Some(&Row { id: 9 }));
        assert!(value.downcast_ref::<String>().is_none());
        assert!(format!("{value:?}").contains("Row"));
    }

    #[test]
    fn test_failure_is_plain_data() {
        let value = Value::from(ErrorInfo::msg("kept"));
        assert_eq!(value.as_failure().map(|e| e.to_string()), Some("kept".into()));
        assert!(!value.is_effect());
    }
}
