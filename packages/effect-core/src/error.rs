//! Error types for effect evaluation.
//!
//! Application failures travel through callback chains as [`ErrorInfo`] values.
//! Conditions raised by the engine itself are [`PerformError`] variants and are
//! never routed through a chain.

use std::any::{type_name, Any};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// A captured failure: the kind (the concrete error type), the payload, and
/// the context (a backtrace taken where the failure was captured).
///
/// Cloning is cheap; clones share the payload, so an error handed to an error
/// handler and later re-raised by `sync_perform` is the same error.
#[derive(Clone)]
pub struct ErrorInfo {
    kind: &'static str,
    payload: Arc<dyn Error + Send + Sync + 'static>,
    context: Option<Arc<Backtrace>>,
}

impl ErrorInfo {
    /// Capture `error`, recording a backtrace as context.
    ///
    /// The backtrace honours `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE`; when those
    /// are unset the captured trace is disabled and costs nothing.
    pub fn new<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        ErrorInfo {
            kind: type_name::<E>(),
            payload: Arc::new(error),
            context: Some(Arc::new(Backtrace::capture())),
        }
    }

    /// Capture `error` with no context attached.
    pub fn without_context<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        ErrorInfo {
            kind: type_name::<E>(),
            payload: Arc::new(error),
            context: None,
        }
    }

    /// Capture an ad-hoc message as a [`MessageError`].
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(MessageError(message.into()))
    }

    /// Capture a caught panic payload as a [`PanicError`].
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(PanicError { message })
    }

    /// Fully qualified type name of the captured error.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn payload(&self) -> &(dyn Error + Send + Sync + 'static) {
        &*self.payload
    }

    /// Backtrace captured alongside the error, if any.
    pub fn context(&self) -> Option<&Backtrace> {
        self.context.as_deref()
    }

    /// True when a backtrace was actually recorded (not merely requested).
    pub fn has_backtrace(&self) -> bool {
        matches!(
            self.context.as_deref().map(Backtrace::status),
            Some(BacktraceStatus::Captured)
        )
    }

    pub fn is<E: Error + 'static>(&self) -> bool {
        self.payload.is::<E>()
    }

    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.payload.downcast_ref::<E>()
    }

    /// True when both values carry the very same captured payload.
    pub fn same_error(&self, other: &ErrorInfo) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

impl fmt::Debug for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorInfo")
            .field("kind", &self.kind)
            .field("payload", &self.payload)
            .field("has_backtrace", &self.has_backtrace())
            .finish()
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.payload, f)
    }
}

impl Error for ErrorInfo {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.payload.source()
    }
}

/// Ad-hoc failure described only by a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct MessageError(pub String);

/// A panic caught by guarded invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("panicked: {message}")]
pub struct PanicError {
    pub message: String,
}

/// A typed performer was handed an intent of some other type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("performer for {expected} received intent {found}")]
pub struct IntentMismatch {
    pub expected: &'static str,
    pub found: &'static str,
}

/// Conditions raised by the engine rather than by application code.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PerformError {
    /// No dispatcher layer has a performer for the intent's type. This is a
    /// wiring mistake; no handler of the chain is invoked.
    #[error("no performer for intent {intent}")]
    NoPerformer { intent: String },

    /// `sync_perform` found no result once the trampoline went idle.
    #[error("performing {effect} was not synchronous")]
    NotSynchronous { effect: String },

    /// The box of an awaited effect was dropped without being settled.
    #[error("effect for intent {intent} was abandoned before completing")]
    Abandoned { intent: String },

    /// The effect failed; carries the original captured error.
    #[error(transparent)]
    Failed(ErrorInfo),
}

impl PerformError {
    pub fn no_performer(intent: impl Into<String>) -> Self {
        PerformError::NoPerformer {
            intent: intent.into(),
        }
    }

    pub fn not_synchronous(effect: impl Into<String>) -> Self {
        PerformError::NotSynchronous {
            effect: effect.into(),
        }
    }

    pub fn abandoned(intent: impl Into<String>) -> Self {
        PerformError::Abandoned {
            intent: intent.into(),
        }
    }

    pub fn is_no_performer(&self) -> bool {
        matches!(self, PerformError::NoPerformer { .. })
    }

    pub fn is_not_synchronous(&self) -> bool {
        matches!(self, PerformError::NotSynchronous { .. })
    }

    /// The captured application error, when this is a `Failed`.
    pub fn as_failure(&self) -> Option<&ErrorInfo> {
        match self {
            PerformError::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Convert into error data that can travel through a callback chain.
    ///
    /// `Failed` unwraps to its original error so identity is preserved.
    pub fn into_error_info(self) -> ErrorInfo {
        match self {
            PerformError::Failed(error) => error,
            other => ErrorInfo::new(other),
        }
    }
}
