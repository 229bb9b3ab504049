//! Guarded invocation: the single point where failures become data.

use std::panic::{self, AssertUnwindSafe};

use crate::effect::Outcome;
use crate::error::ErrorInfo;

/// Run `f`, turning a panic into captured error data.
///
/// An `Err` returned by `f` passes through unchanged; a panic becomes an
/// [`ErrorInfo`] carrying a [`PanicError`](crate::PanicError). Nothing unwinds
/// out of this call.
pub fn guard<T, F>(f: F) -> Result<T, ErrorInfo>
where
    F: FnOnce() -> Result<T, ErrorInfo>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(ErrorInfo::from_panic(payload)),
    }
}

/// Call a one-argument handler under [`guard`].
pub fn invoke_guarded<A, F>(f: F, arg: A) -> Outcome
where
    F: FnOnce(A) -> Outcome,
{
    guard(move || f(arg))
}
