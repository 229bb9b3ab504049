//! Configuration for performing effects.
//!
//! All structs deserialize with defaults for missing fields, so a partial
//! `[perform]` / `[parallel]` TOML table is enough.

use serde::{Deserialize, Serialize};

/// Options for one `perform` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PerformOptions {
    /// When a handler or performer resolves to an [`Effect`](crate::Effect),
    /// perform it and splice the remaining chain after its own handlers.
    /// When false, the effect is passed along as an ordinary value.
    #[serde(default = "default_recurse_effects")]
    pub recurse_effects: bool,
}

impl Default for PerformOptions {
    fn default() -> Self {
        Self {
            recurse_effects: true,
        }
    }
}

fn default_recurse_effects() -> bool {
    true
}

impl PerformOptions {
    /// Options that treat effect results as plain values.
    pub fn without_recursion() -> Self {
        Self {
            recurse_effects: false,
        }
    }
}

/// What a parallel performer does when a sub-effect fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the aggregate as soon as any sub-effect fails.
    #[default]
    FailFast,
    /// Wait for every sub-effect, then fail with the lowest-index failure.
    WaitAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct ParallelConfig {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

/// Top-level configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct EffectConfig {
    #[serde(default)]
    pub perform: PerformOptions,

    #[serde(default)]
    pub parallel: ParallelConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid effect configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

impl EffectConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }
}
