// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation orchestrator.
//!
//! [`Ensurer`] drives the API server towards a batch of desired objects. For
//! each object, in create order:
//!
//! ```text
//! resolve GVR -> get -> NotFound -> create
//!                    -> found    -> merge -> changed   -> update
//!                                         -> unchanged -> noop
//! ```
//!
//! The get-merge-write sequence runs under [`retry_on_conflict`], so a
//! concurrent writer causes a fresh read instead of a failure. Nothing is
//! cached between calls except the discovery index, which changes only
//! through [`DynamicHelper::refresh`].

use crate::client::{ApiClient, KubeApiClient};
use crate::config::{EngineConfig, UpdatePolicy};
use crate::create_order::create_order_cmp;
use crate::discovery::{Discovery, KubeDiscovery};
use crate::errors::{is_not_found, EnsureError, Result};
use crate::gvr::{key_func, GroupVersionResource};
use crate::merge::StrategyRegistry;
use crate::metrics;
use crate::object::KubeObject;
use crate::reconcilers::retry::{retry_on_conflict, RetryPolicy};
use crate::reconcilers::unstructured::{delete_object, ensure_unstructured};
use crate::resolver::GvrResolver;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info};

/// Operations exposed to controllers.
#[async_trait]
pub trait DynamicHelper: Send + Sync {
    /// Rebuild the discovery index.
    async fn refresh(&mut self) -> Result<()>;

    /// Create or update every object in `objects`.
    ///
    /// Objects are applied in create order, one at a time; the first failure
    /// stops the batch.
    async fn ensure(&self, objects: &[KubeObject]) -> Result<()>;

    /// Delete an object; absence counts as success.
    async fn ensure_deleted(&self, group_kind: &str, namespace: &str, name: &str) -> Result<()>;

    /// Like [`DynamicHelper::ensure_deleted`] but pinned to one served version.
    async fn ensure_deleted_gvr(
        &self,
        group_kind: &str,
        namespace: &str,
        name: &str,
        version: &str,
    ) -> Result<()>;

    /// Whether the policy engine has compiled the named `ConstraintTemplate`.
    async fn is_constraint_template_ready(&self, name: &str) -> Result<bool>;

    /// Fetch one object as JSON.
    async fn get(&self, group_kind: &str, namespace: &str, name: &str) -> Result<Value>;

    /// List objects of a kind as JSON (all namespaces when `namespace` is empty).
    async fn list(&self, group_kind: &str, namespace: &str) -> Result<Value>;
}

/// [`DynamicHelper`] over an [`ApiClient`] and a [`Discovery`] source.
pub struct Ensurer<C, D> {
    client: C,
    discovery: D,
    resolver: GvrResolver,
    strategies: StrategyRegistry,
    retry: RetryPolicy,
    update_policy: UpdatePolicy,
}

impl Ensurer<KubeApiClient, KubeDiscovery> {
    /// Build an ensurer talking to the cluster behind `client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial discovery fails.
    pub async fn from_client(client: kube::Client, config: &EngineConfig) -> Result<Self> {
        Self::with_config(
            KubeApiClient::new(client.clone()),
            KubeDiscovery::new(client),
            config,
        )
        .await
    }
}

impl<C, D> Ensurer<C, D>
where
    C: ApiClient,
    D: Discovery,
{
    /// Build an ensurer with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial discovery fails.
    pub async fn new(client: C, discovery: D) -> Result<Self> {
        Self::with_config(client, discovery, &EngineConfig::default()).await
    }

    /// Build an ensurer, running the first discovery pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial discovery fails.
    pub async fn with_config(client: C, discovery: D, config: &EngineConfig) -> Result<Self> {
        let resolver = GvrResolver::discover(&discovery).await?;
        Ok(Self {
            client,
            discovery,
            resolver,
            strategies: config.strategies(),
            retry: config.effective_retry(),
            update_policy: config.update_policy,
        })
    }

    /// Replace the merge strategy table.
    #[must_use]
    pub fn with_strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = strategies;
        self
    }

    #[must_use]
    pub fn resolver(&self) -> &GvrResolver {
        &self.resolver
    }

    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    async fn ensure_one(&self, object: &KubeObject) -> Result<()> {
        let group_kind = object.group_kind();
        let kind = group_kind.to_string();
        let started = Instant::now();

        let entry = self.resolver.resolve_entry(&kind, &object.version())?;
        let namespace = Self::scoped(entry.namespaced, object.namespace());

        let result = if object.is_unstructured() {
            ensure_unstructured(
                &self.client,
                &entry.gvr,
                &group_kind,
                namespace,
                &object.to_value()?,
                &self.retry,
                self.update_policy,
            )
            .await
        } else {
            if object.name().is_empty() {
                return Err(EnsureError::MissingName(kind));
            }
            let key = key_func(&group_kind, namespace, object.name());
            retry_on_conflict(&self.retry, &kind, &format!("ensure {key}"), || {
                self.ensure_typed_once(&entry.gvr, namespace, object, &key, &kind)
            })
            .await
        };

        metrics::record_ensure_duration(&kind, started.elapsed());
        result
    }

    /// One read-merge-write pass for a compiled kind.
    async fn ensure_typed_once(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        desired: &KubeObject,
        key: &str,
        kind: &str,
    ) -> Result<()> {
        let name = desired.name();
        let live = match self.client.get(gvr, namespace, name).await {
            Ok(live) => desired.with_value(live)?,
            Err(e) if is_not_found(&e) => {
                info!(object = %key, "Create");
                self.client
                    .create(gvr, namespace, &desired.to_value()?)
                    .await?;
                metrics::record_resource_created(kind);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let decision = self.strategies.merge(&live, desired)?;
        if !decision.changed {
            debug!(object = %key, "Unchanged");
            metrics::record_resource_unchanged(kind);
            return Ok(());
        }

        if self.update_policy.log_changes && !decision.diff.is_empty() {
            info!(object = %key, diff = %decision.diff, "Update");
        } else {
            info!(object = %key, "Update");
        }
        self.client
            .update(gvr, namespace, name, &decision.result.to_value()?)
            .await?;
        metrics::record_resource_updated(kind);
        Ok(())
    }

    /// Namespace to address `name` with, dropped for cluster-scoped kinds.
    fn scoped<'a>(namespaced: bool, namespace: &'a str) -> &'a str {
        if namespaced {
            namespace
        } else {
            ""
        }
    }
}

#[async_trait]
impl<C, D> DynamicHelper for Ensurer<C, D>
where
    C: ApiClient,
    D: Discovery,
{
    async fn refresh(&mut self) -> Result<()> {
        self.resolver.refresh(&self.discovery).await
    }

    async fn ensure(&self, objects: &[KubeObject]) -> Result<()> {
        let mut ordered: Vec<&KubeObject> = objects.iter().collect();
        ordered.sort_by(|a, b| create_order_cmp(a, b));

        for object in ordered {
            self.ensure_one(object).await?;
        }
        Ok(())
    }

    async fn ensure_deleted(&self, group_kind: &str, namespace: &str, name: &str) -> Result<()> {
        let entry = self.resolver.resolve_entry(group_kind, "")?;
        let namespace = Self::scoped(entry.namespaced, namespace);
        delete_object(
            &self.client,
            &entry.gvr,
            &entry.group_kind(),
            namespace,
            name,
        )
        .await
    }

    async fn ensure_deleted_gvr(
        &self,
        group_kind: &str,
        namespace: &str,
        name: &str,
        version: &str,
    ) -> Result<()> {
        let entry = self.resolver.resolve_entry(group_kind, version)?;
        let namespace = Self::scoped(entry.namespaced, namespace);

        match self.client.get(&entry.gvr, namespace, name).await {
            Ok(_) => {}
            Err(e) if is_not_found(&e) => {
                debug!(
                    object = %key_func(&entry.group_kind(), namespace, name),
                    "Already absent"
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        delete_object(
            &self.client,
            &entry.gvr,
            &entry.group_kind(),
            namespace,
            name,
        )
        .await
    }

    async fn is_constraint_template_ready(&self, name: &str) -> Result<bool> {
        crate::reconcilers::unstructured::is_constraint_template_ready(&self.client, name).await
    }

    async fn get(&self, group_kind: &str, namespace: &str, name: &str) -> Result<Value> {
        let entry = self.resolver.resolve_entry(group_kind, "")?;
        let namespace = Self::scoped(entry.namespaced, namespace);
        Ok(self.client.get(&entry.gvr, namespace, name).await?)
    }

    async fn list(&self, group_kind: &str, namespace: &str) -> Result<Value> {
        let entry = self.resolver.resolve_entry(group_kind, "")?;
        let namespace = Self::scoped(entry.namespaced, namespace);
        Ok(self.client.list(&entry.gvr, namespace).await?)
    }
}

#[cfg(test)]
#[path = "ensure_tests.rs"]
mod ensure_tests;
