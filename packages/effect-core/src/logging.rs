//! Compile-time gated trace logging for the trampoline.

/// Emit trampoline trace logs only when the `trampoline_debug_logs` Cargo
/// feature is enabled.
///
/// With the feature disabled (default), this macro compiles to a no-op while
/// still type-checking format arguments. When enabled it forwards to
/// `log::trace!`, so the usual logger filtering still applies.
#[macro_export]
macro_rules! effect_debug_log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "trampoline_debug_logs")]
        {
            $crate::__log::trace!($($arg)*);
        }
        #[cfg(not(feature = "trampoline_debug_logs"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}
