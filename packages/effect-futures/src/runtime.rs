//! Ready-made runtime: thread pool, real clock and dispatcher from config.

use std::io;
use std::sync::Arc;

use effect_core::{
    base_dispatcher, ComposedDispatcher, ConfigError, DispatcherRef, Effect, ParallelConfig,
    PerformError, PerformOptions, Value,
};
use futures::executor::{block_on, ThreadPool};
use serde::{Deserialize, Serialize};

use crate::bridge::{perform_with, EffectFuture, SpawnerRef};
use crate::clock::{ClockRef, ThreadClock};
use crate::dispatcher::futures_dispatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct FuturesConfig {
    /// Worker threads; the executor's default (one per CPU) when unset.
    #[serde(default)]
    pub pool_size: Option<usize>,

    #[serde(default)]
    pub perform: PerformOptions,

    #[serde(default)]
    pub parallel: ParallelConfig,
}

impl FuturesConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("pool_size must be at least 1")]
    EmptyPool,

    #[error("failed to start thread pool: {0}")]
    ThreadPool(#[source] io::Error),

    #[error("failed to start timer thread: {0}")]
    Clock(#[source] io::Error),
}

/// Thread pool plus timer thread, with a dispatcher that performs the stock
/// intents, `ParallelEffects` and `Delay` on them.
pub struct FuturesRuntime {
    pool: ThreadPool,
    clock: ClockRef,
    dispatcher: DispatcherRef,
    options: PerformOptions,
}

impl FuturesRuntime {
    pub fn from_config(config: &FuturesConfig) -> Result<Self, RuntimeError> {
        let mut builder = ThreadPool::builder();
        builder.name_prefix("effect-pool-");
        if let Some(size) = config.pool_size {
            if size == 0 {
                return Err(RuntimeError::EmptyPool);
            }
            builder.pool_size(size);
        }
        let pool = builder.create().map_err(RuntimeError::ThreadPool)?;
        let clock: ClockRef = Arc::new(ThreadClock::new().map_err(RuntimeError::Clock)?);
        let spawner: SpawnerRef = Arc::new(pool.clone());
        let dispatcher = ComposedDispatcher::new(vec![
            futures_dispatcher(spawner, Arc::clone(&clock), config.parallel).into_ref(),
            base_dispatcher().into_ref(),
        ])
        .into_ref();
        log::debug!(
            "effect runtime started (pool_size: {:?}, failure_policy: {:?})",
            config.pool_size,
            config.parallel.failure_policy
        );
        Ok(FuturesRuntime {
            pool,
            clock,
            dispatcher,
            options: config.perform,
        })
    }

    /// Runtime whose dispatcher also tries `extra` first, e.g. the
    /// application's own performers.
    pub fn with_dispatcher(mut self, extra: DispatcherRef) -> Self {
        self.dispatcher =
            ComposedDispatcher::new(vec![extra, Arc::clone(&self.dispatcher)]).into_ref();
        self
    }

    pub fn dispatcher(&self) -> &DispatcherRef {
        &self.dispatcher
    }

    pub fn spawner(&self) -> SpawnerRef {
        Arc::new(self.pool.clone())
    }

    pub fn clock(&self) -> &ClockRef {
        &self.clock
    }

    pub fn perform(&self, effect: Effect) -> EffectFuture {
        perform_with(&self.dispatcher, effect, self.options)
    }

    /// Perform `effect` and block the current thread until it finishes.
    pub fn block_on(&self, effect: Effect) -> Result<Value, PerformError> {
        block_on(self.perform(effect))
    }
}
