// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Merge engine: decides whether a live object needs an update and builds it.
//!
//! Given a live object and a desired object of the same kind, [`StrategyRegistry::merge`]
//! returns a [`MergeDecision`]. The result is always the live object with the
//! desired object's populated fields overlaid, so fields set by other actors
//! (defaulted spec fields, controller annotations, `status`) survive.
//!
//! Strategies are registered per [`GroupKind`]; kinds without a registration
//! use [`OverlayStrategy`]. The built-in table carries the per-kind fields that
//! other controllers own:
//!
//! | Kind | Kept from the live object |
//! |------|---------------------------|
//! | `Namespace` | `spec.finalizers`, `status` |
//! | `ServiceAccount` | `secrets`, `imagePullSecrets` |
//! | `Service` | `spec.clusterIP`, `spec.clusterIPs` |
//! | `DaemonSet` | template generation annotation, `status` |
//! | `Deployment` | revision annotation, `status` |
//! | `CustomResourceDefinition` | `status` |
//! | `ConfigMap` | injected `ca-bundle.crt` |
//! | webhook configurations | everything but `failurePolicy`/`timeoutSeconds` |
//!
//! Objects whose name starts with a third-party prefix are never updated unless
//! their kind's strategy is written for third-party objects.

pub mod overlay;
pub mod strategies;

use crate::constants::{
    DEFAULT_THIRD_PARTY_PREFIXES, GROUP_ADMISSIONREGISTRATION, GROUP_APIEXTENSIONS, KIND_SECRET,
};
use crate::errors::{EnsureError, Result};
use crate::gvr::GroupKind;
use crate::object::KubeObject;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

pub use strategies::{ConfigMapStrategy, OverlayStrategy, SkipStrategy, WebhookStrategy};

/// Outcome of merging a live object with its desired state.
#[derive(Clone, Debug)]
pub struct MergeDecision {
    /// Object to write (the live object when nothing changed)
    pub result: KubeObject,
    /// Whether `result` differs from the live object
    pub changed: bool,
    /// Human-readable change list, empty when unchanged or sensitive
    pub diff: String,
}

/// Per-kind merge behaviour over JSON documents.
pub trait MergeStrategy: Send + Sync {
    /// Build the document to write from `old` (live) and `new` (desired), and
    /// report whether it differs from `old`.
    fn merge(&self, old: &Value, new: &Value) -> (Value, bool);

    /// Whether this strategy reconciles objects carrying a third-party prefix.
    fn handles_third_party(&self) -> bool {
        false
    }
}

/// Table of merge strategies keyed by kind.
#[derive(Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<GroupKind, Arc<dyn MergeStrategy>>,
    default_strategy: Arc<dyn MergeStrategy>,
    third_party_prefixes: Vec<String>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl StrategyRegistry {
    /// Registry with no per-kind strategies and no third-party prefixes.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
            default_strategy: Arc::new(OverlayStrategy::new()),
            third_party_prefixes: Vec::new(),
        }
    }

    /// Registry with the built-in per-kind table and default prefixes.
    #[must_use]
    pub fn builtin() -> Self {
        let webhook: Arc<dyn MergeStrategy> = Arc::new(WebhookStrategy);

        Self::empty()
            .with_third_party_prefixes(DEFAULT_THIRD_PARTY_PREFIXES.iter().copied())
            .register(
                GroupKind::new("", "Namespace"),
                OverlayStrategy::preserving(&["/spec/finalizers", "/status"]),
            )
            .register(
                GroupKind::new("", "ServiceAccount"),
                OverlayStrategy::preserving(&["/secrets", "/imagePullSecrets"]),
            )
            .register(
                GroupKind::new("", "Service"),
                OverlayStrategy::preserving(&["/spec/clusterIP", "/spec/clusterIPs"]),
            )
            .register(
                GroupKind::new("apps", "DaemonSet"),
                OverlayStrategy::preserving(&[
                    "/metadata/annotations/deprecated.daemonset.template.generation",
                    "/status",
                ]),
            )
            .register(
                GroupKind::new("apps", "Deployment"),
                OverlayStrategy::preserving(&[
                    "/metadata/annotations/deployment.kubernetes.io~1revision",
                    "/status",
                ]),
            )
            .register(
                GroupKind::new(GROUP_APIEXTENSIONS, "CustomResourceDefinition"),
                OverlayStrategy::preserving(&["/status"]),
            )
            .register(GroupKind::new("", "ConfigMap"), ConfigMapStrategy::new())
            .register_shared(
                GroupKind::new(GROUP_ADMISSIONREGISTRATION, "ValidatingWebhookConfiguration"),
                webhook.clone(),
            )
            .register_shared(
                GroupKind::new(GROUP_ADMISSIONREGISTRATION, "MutatingWebhookConfiguration"),
                webhook,
            )
    }

    /// Register `strategy` for `group_kind`, replacing any previous one.
    #[must_use]
    pub fn register(self, group_kind: GroupKind, strategy: impl MergeStrategy + 'static) -> Self {
        self.register_shared(group_kind, Arc::new(strategy))
    }

    #[must_use]
    pub fn register_shared(
        mut self,
        group_kind: GroupKind,
        strategy: Arc<dyn MergeStrategy>,
    ) -> Self {
        self.strategies.insert(group_kind, strategy);
        self
    }

    /// Replace the third-party name prefixes.
    #[must_use]
    pub fn with_third_party_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.third_party_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    fn strategy_for(&self, group_kind: &GroupKind) -> &Arc<dyn MergeStrategy> {
        self.strategies
            .get(group_kind)
            .unwrap_or(&self.default_strategy)
    }

    fn is_third_party(&self, name: &str) -> bool {
        self.third_party_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }

    /// Merge `new` (desired) into `old` (live).
    ///
    /// # Errors
    ///
    /// - [`EnsureError::TypeMismatch`] when `old` and `new` are different kinds
    /// - [`EnsureError::Serialization`] when either object cannot be converted
    pub fn merge(&self, old: &KubeObject, new: &KubeObject) -> Result<MergeDecision> {
        if !old.same_type(new) {
            return Err(EnsureError::TypeMismatch {
                old: old.group_kind().to_string(),
                new: new.group_kind().to_string(),
            });
        }

        let group_kind = new.group_kind();
        let strategy = self.strategy_for(&group_kind);

        if !strategy.handles_third_party() && self.is_third_party(new.name()) {
            debug!(
                kind = %group_kind,
                name = %new.name(),
                "Skipping update of third-party object"
            );
            return Ok(MergeDecision {
                result: old.clone(),
                changed: false,
                diff: String::new(),
            });
        }

        let old_value = old.to_value()?;
        let new_value = new.to_value()?;
        let (result_value, changed) = strategy.merge(&old_value, &new_value);

        let diff = if changed && !is_sensitive(&group_kind) {
            render_diff(&old_value, &result_value)
        } else {
            String::new()
        };

        Ok(MergeDecision {
            result: old.with_value(result_value)?,
            changed,
            diff,
        })
    }
}

fn is_sensitive(group_kind: &GroupKind) -> bool {
    group_kind.group.is_empty() && group_kind.kind == KIND_SECRET
}

/// Render the RFC 6902 operations turning `old` into `new`, one per line.
#[must_use]
pub fn render_diff(old: &Value, new: &Value) -> String {
    let patch = json_patch::diff(old, new);
    let mut out = String::new();
    for op in &patch.0 {
        match serde_json::to_string(op) {
            Ok(line) => {
                let _ = writeln!(out, "{line}");
            }
            Err(e) => {
                let _ = writeln!(out, "<unrenderable operation: {e}>");
            }
        }
    }
    out.trim_end().to_string()
}
