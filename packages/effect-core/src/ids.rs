//! Identifier types for boxes and runs.
//!
//! All IDs are lightweight Copy newtypes backed by process-wide counters.
//! They exist for log correlation only; nothing keys behaviour off them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a [`ResultBox`](crate::ResultBox).
///
/// Each pending resolution point gets a fresh BoxId so that a double settle
/// can be reported against the box it happened on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BoxId(pub u64);

/// Unique identifier for one `perform` invocation (one trampoline).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RunId(pub u64);

static BOX_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
static RUN_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

impl BoxId {
    /// Create a fresh unique BoxId.
    pub fn fresh() -> Self {
        BoxId(BOX_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl RunId {
    /// Create a fresh unique RunId.
    pub fn fresh() -> Self {
        RunId(RUN_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "box#{}", self.0)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run#{}", self.0)
    }
}
