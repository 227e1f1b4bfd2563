// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of kinds without a compiled type.
//!
//! These are mostly policy-engine constraints, whose schema is owned by the
//! policy engine. Only `spec.enforcementAction` is reconciled; every other
//! field of a live object, `status` included, is written back unchanged.

use crate::client::ApiClient;
use crate::config::UpdatePolicy;
use crate::constants::{
    FIELD_ENFORCEMENT_ACTION, GROUP_GATEKEEPER_TEMPLATES, RESOURCE_CONSTRAINT_TEMPLATES,
    VERSION_GATEKEEPER_TEMPLATES,
};
use crate::errors::{is_not_found, EnsureError, Result};
use crate::gvr::{key_func, GroupKind, GroupVersionResource};
use crate::metrics;
use crate::reconcilers::retry::{retry_on_conflict, RetryPolicy};
use serde_json::Value;
use tracing::{debug, info};

/// `spec.enforcementAction` of an object, if set to a string.
#[must_use]
pub fn enforcement_action(object: &Value) -> Option<&str> {
    object
        .get("spec")
        .and_then(|spec| spec.get(FIELD_ENFORCEMENT_ACTION))
        .and_then(Value::as_str)
}

/// Build the object to write, or `None` when the live object is current.
///
/// The comparison is case-insensitive and is skipped when either side lacks
/// the field.
#[must_use]
pub fn enforcement_update(live: &Value, desired: &Value) -> Option<Value> {
    let want = enforcement_action(desired)?;
    let have = enforcement_action(live)?;
    if have.eq_ignore_ascii_case(want) {
        return None;
    }

    let mut updated = live.clone();
    updated["spec"][FIELD_ENFORCEMENT_ACTION] = Value::String(want.to_string());
    Some(updated)
}

/// Create `desired` if absent, otherwise reconcile its enforcement action.
///
/// `namespace` addresses the object and is `""` for cluster-scoped kinds,
/// whatever `desired` carries in `metadata.namespace`.
///
/// # Errors
///
/// Returns API errors other than `NotFound` on read, and write errors once
/// conflict retries are exhausted.
pub async fn ensure_unstructured<C>(
    client: &C,
    gvr: &GroupVersionResource,
    group_kind: &GroupKind,
    namespace: &str,
    desired: &Value,
    retry: &RetryPolicy,
    policy: UpdatePolicy,
) -> Result<()>
where
    C: ApiClient + ?Sized,
{
    let name = desired
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| EnsureError::MissingName(group_kind.to_string()))?;
    let key = key_func(group_kind, namespace, name);
    let kind = group_kind.to_string();

    retry_on_conflict(retry, &kind, &format!("ensure {key}"), || {
        ensure_once(client, gvr, &kind, &key, namespace, name, desired, policy)
    })
    .await
}

/// One read-compare-write pass of [`ensure_unstructured`].
#[allow(clippy::too_many_arguments)]
async fn ensure_once<C>(
    client: &C,
    gvr: &GroupVersionResource,
    kind: &str,
    key: &str,
    namespace: &str,
    name: &str,
    desired: &Value,
    policy: UpdatePolicy,
) -> Result<()>
where
    C: ApiClient + ?Sized,
{
    let live = match client.get(gvr, namespace, name).await {
        Ok(live) => live,
        Err(e) if is_not_found(&e) => {
            info!(object = %key, "Create");
            client.create(gvr, namespace, desired).await?;
            metrics::record_resource_created(kind);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let Some(updated) = enforcement_update(&live, desired) else {
        debug!(object = %key, "Enforcement action up to date");
        metrics::record_resource_unchanged(kind);
        return Ok(());
    };

    if policy.log_changes {
        info!(
            object = %key,
            from = enforcement_action(&live).unwrap_or_default(),
            to = enforcement_action(&updated).unwrap_or_default(),
            "Update enforcementAction"
        );
    } else {
        info!(object = %key, "Update");
    }
    client.update(gvr, namespace, name, &updated).await?;
    metrics::record_resource_updated(kind);
    Ok(())
}

/// Delete an object addressed by GVR; absence counts as success.
///
/// # Errors
///
/// Returns API errors other than `NotFound`.
pub async fn delete_object<C>(
    client: &C,
    gvr: &GroupVersionResource,
    group_kind: &GroupKind,
    namespace: &str,
    name: &str,
) -> Result<()>
where
    C: ApiClient + ?Sized,
{
    let key = key_func(group_kind, namespace, name);
    match client.delete(gvr, namespace, name).await {
        Ok(()) => {
            info!(object = %key, "Delete");
            metrics::record_resource_deleted(&group_kind.to_string());
            Ok(())
        }
        Err(e) if is_not_found(&e) => {
            debug!(object = %key, "Already absent");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Whether the policy engine has compiled the named `ConstraintTemplate`.
///
/// Reads `status.created`; a missing template or status is "not ready".
///
/// # Errors
///
/// Returns API errors other than `NotFound`.
pub async fn is_constraint_template_ready<C>(client: &C, name: &str) -> Result<bool>
where
    C: ApiClient + ?Sized,
{
    let gvr = GroupVersionResource::new(
        GROUP_GATEKEEPER_TEMPLATES,
        VERSION_GATEKEEPER_TEMPLATES,
        RESOURCE_CONSTRAINT_TEMPLATES,
    );
    let template = match client.get(&gvr, "", name).await {
        Ok(template) => template,
        Err(e) if is_not_found(&e) => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    Ok(template
        .pointer("/status/created")
        .and_then(Value::as_bool)
        .unwrap_or(false))
}

#[cfg(test)]
#[path = "unstructured_tests.rs"]
mod unstructured_tests;
