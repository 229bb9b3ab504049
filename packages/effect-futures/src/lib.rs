//! Bridge between `effect-core` and the `futures` 0.3 ecosystem.
//!
//! - [`perform`] starts an effect and hands back an [`EffectFuture`] for its
//!   final result.
//! - [`future_to_box`] and [`future_performer`] let performers be written as
//!   futures running on any [`Spawn`](futures::task::Spawn) executor.
//! - [`futures_dispatcher`] performs `ParallelEffects` and `Delay` without
//!   blocking, using a [`Clock`] for timers.
//! - [`FuturesRuntime`] bundles a thread pool, a real clock and a dispatcher
//!   built from [`FuturesConfig`].

pub mod bridge;
pub mod clock;
pub mod dispatcher;
pub mod runtime;

pub use bridge::{future_performer, future_to_box, perform, perform_with, EffectFuture, SpawnerRef};
pub use clock::{Clock, ClockRef, ManualClock, Task, ThreadClock};
pub use dispatcher::{delay_performer, futures_dispatcher, joined_parallel_performer};
pub use runtime::{FuturesConfig, FuturesRuntime, RuntimeError};
