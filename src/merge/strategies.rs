// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Built-in merge strategies.

use super::overlay::{copy_system_metadata, overlay, restore_pointer};
use super::MergeStrategy;
use crate::constants::{DATA_KEY_CA_BUNDLE, LABEL_INJECT_TRUSTED_CABUNDLE};
use serde_json::Value;

/// Structural overlay of the desired object onto the live one.
///
/// `preserved` lists JSON pointers owned by other controllers; the live value
/// at each pointer survives even when the desired object sets it.
#[derive(Clone, Debug, Default)]
pub struct OverlayStrategy {
    preserved: Vec<String>,
}

impl OverlayStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay that keeps the live value at each of `pointers`.
    #[must_use]
    pub fn preserving(pointers: &[&str]) -> Self {
        Self {
            preserved: pointers.iter().map(ToString::to_string).collect(),
        }
    }

    pub(crate) fn apply(&self, old: &Value, new: &Value) -> Value {
        let mut desired = new.clone();
        copy_system_metadata(old, &mut desired);

        let mut result = old.clone();
        overlay(&mut result, &desired);
        for pointer in &self.preserved {
            restore_pointer(&mut result, old, pointer);
        }
        result
    }
}

impl MergeStrategy for OverlayStrategy {
    fn merge(&self, old: &Value, new: &Value) -> (Value, bool) {
        let result = self.apply(old, new);
        let changed = result != *old;
        (result, changed)
    }
}

/// Overlay for `ConfigMap`s that keeps an injected trust bundle.
///
/// When the desired object asks for trust bundle injection, the injector owns
/// `data["ca-bundle.crt"]` and the live value wins.
#[derive(Clone, Debug, Default)]
pub struct ConfigMapStrategy {
    inner: OverlayStrategy,
}

impl ConfigMapStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MergeStrategy for ConfigMapStrategy {
    fn merge(&self, old: &Value, new: &Value) -> (Value, bool) {
        let mut result = self.inner.apply(old, new);

        let injected = new
            .pointer("/metadata/labels")
            .and_then(Value::as_object)
            .is_some_and(|labels| labels.contains_key(LABEL_INJECT_TRUSTED_CABUNDLE));
        if injected {
            restore_pointer(&mut result, old, &format!("/data/{DATA_KEY_CA_BUNDLE}"));
        }

        let changed = result != *old;
        (result, changed)
    }
}

/// Admission webhook configurations (validating and mutating).
///
/// These are typically owned by the policy engine, which rewrites most of the
/// object itself. Only `failurePolicy` and `timeoutSeconds` are reconciled:
/// for each webhook index present on both sides, and only where both sides set
/// the field, the desired value is copied onto a copy of the live object.
#[derive(Clone, Debug, Default)]
pub struct WebhookStrategy;

const WEBHOOK_FIELDS: [&str; 2] = ["failurePolicy", "timeoutSeconds"];

impl MergeStrategy for WebhookStrategy {
    fn merge(&self, old: &Value, new: &Value) -> (Value, bool) {
        let mut result = old.clone();
        let mut changed = false;

        let desired_hooks = new.get("webhooks").and_then(Value::as_array);
        let live_hooks = result.get_mut("webhooks").and_then(Value::as_array_mut);
        if let (Some(desired_hooks), Some(live_hooks)) = (desired_hooks, live_hooks) {
            for (live, desired) in live_hooks.iter_mut().zip(desired_hooks) {
                for field in WEBHOOK_FIELDS {
                    let Some(want) = desired.get(field).filter(|v| !v.is_null()) else {
                        continue;
                    };
                    match live.get_mut(field) {
                        Some(have) if !have.is_null() && have != want => {
                            *have = want.clone();
                            changed = true;
                        }
                        _ => {}
                    }
                }
            }
        }

        (result, changed)
    }

    fn handles_third_party(&self) -> bool {
        true
    }
}

/// Never updates; the live object is returned as is.
#[derive(Clone, Debug, Default)]
pub struct SkipStrategy;

impl MergeStrategy for SkipStrategy {
    fn merge(&self, old: &Value, _new: &Value) -> (Value, bool) {
        (old.clone(), false)
    }
}

#[cfg(test)]
#[path = "strategies_tests.rs"]
mod strategies_tests;
