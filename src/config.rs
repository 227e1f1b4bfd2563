// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Engine configuration.
//!
//! Everything has a working default; an embedding operator can override the
//! retry schedule, update policy and third-party prefixes through environment
//! variables:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `KUBE_ENSURE_RETRY_MAX_ATTEMPTS` | `5` |
//! | `KUBE_ENSURE_RETRY_INITIAL_MS` | `10` |
//! | `KUBE_ENSURE_RETRY_MULTIPLIER` | `1.0` |
//! | `KUBE_ENSURE_RETRY_JITTER` | `0.1` |
//! | `KUBE_ENSURE_LOG_CHANGES` | `true` |
//! | `KUBE_ENSURE_RETRY_ON_CONFLICT` | `true` |
//! | `KUBE_ENSURE_THIRD_PARTY_PREFIXES` | `gatekeeper-` |

use crate::constants::{
    DEFAULT_THIRD_PARTY_PREFIXES, ENV_LOG_CHANGES, ENV_RETRY_INITIAL_MS, ENV_RETRY_JITTER,
    ENV_RETRY_MAX_ATTEMPTS, ENV_RETRY_MULTIPLIER, ENV_RETRY_ON_CONFLICT, ENV_THIRD_PARTY_PREFIXES,
};
use crate::merge::StrategyRegistry;
use crate::reconcilers::retry::RetryPolicy;
use anyhow::{bail, Context as _, Result};
use std::str::FromStr;
use std::time::Duration;

/// How writes are performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdatePolicy {
    /// Log the rendered diff of every update
    pub log_changes: bool,
    /// Retry read-merge-write on optimistic-concurrency conflicts
    pub retry_on_conflict: bool,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        Self {
            log_changes: true,
            retry_on_conflict: true,
        }
    }
}

/// Complete engine configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub retry: RetryPolicy,
    pub update_policy: UpdatePolicy,
    /// Name prefixes of objects owned by a third-party controller
    pub third_party_prefixes: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            update_policy: UpdatePolicy::default(),
            third_party_prefixes: DEFAULT_THIRD_PARTY_PREFIXES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error naming the variable when a value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error naming the variable when a value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(attempts) = parse_var::<u32, _>(&lookup, ENV_RETRY_MAX_ATTEMPTS)? {
            if attempts == 0 {
                bail!("{ENV_RETRY_MAX_ATTEMPTS} must be at least 1");
            }
            config.retry.max_attempts = attempts;
        }
        if let Some(millis) = parse_var::<u64, _>(&lookup, ENV_RETRY_INITIAL_MS)? {
            config.retry.initial_interval = Duration::from_millis(millis);
        }
        if let Some(multiplier) = parse_var::<f64, _>(&lookup, ENV_RETRY_MULTIPLIER)? {
            if !multiplier.is_finite() || multiplier < 1.0 {
                bail!("{ENV_RETRY_MULTIPLIER} must be a finite number >= 1.0, got {multiplier}");
            }
            config.retry.multiplier = multiplier;
        }
        if let Some(jitter) = parse_var::<f64, _>(&lookup, ENV_RETRY_JITTER)? {
            if !(0.0..1.0).contains(&jitter) {
                bail!("{ENV_RETRY_JITTER} must be in [0.0, 1.0), got {jitter}");
            }
            config.retry.randomization_factor = jitter;
        }
        if let Some(log_changes) = parse_var::<bool, _>(&lookup, ENV_LOG_CHANGES)? {
            config.update_policy.log_changes = log_changes;
        }
        if let Some(retry) = parse_var::<bool, _>(&lookup, ENV_RETRY_ON_CONFLICT)? {
            config.update_policy.retry_on_conflict = retry;
        }
        if let Some(prefixes) = lookup(ENV_THIRD_PARTY_PREFIXES) {
            config.third_party_prefixes = prefixes
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(ToString::to_string)
                .collect();
        }

        Ok(config)
    }

    /// Retry policy honouring [`UpdatePolicy::retry_on_conflict`].
    #[must_use]
    pub fn effective_retry(&self) -> RetryPolicy {
        if self.update_policy.retry_on_conflict {
            self.retry.clone()
        } else {
            RetryPolicy::single_attempt()
        }
    }

    /// Built-in merge strategies using the configured third-party prefixes.
    #[must_use]
    pub fn strategies(&self) -> StrategyRegistry {
        StrategyRegistry::builtin().with_third_party_prefixes(self.third_party_prefixes.clone())
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("invalid value {raw:?} for {name}")),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
