// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared fixtures for unit tests: discovery snapshots and an in-memory API server.

use crate::client::ApiClient;
use crate::discovery::DiscoverySnapshot;
use crate::errors::ApiError;
use crate::gvr::{make_path, GroupVersionResource};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIResource, APIResourceList};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Build an `APIResourceList` from `(plural, kind, namespaced)` triples.
pub fn api_resource_list(group_version: &str, resources: &[(&str, &str, bool)]) -> APIResourceList {
    APIResourceList {
        group_version: group_version.to_string(),
        resources: resources
            .iter()
            .map(|(name, kind, namespaced)| APIResource {
                name: (*name).to_string(),
                kind: (*kind).to_string(),
                namespaced: *namespaced,
                verbs: vec!["get".to_string(), "list".to_string(), "create".to_string()],
                ..Default::default()
            })
            .collect(),
    }
}

/// Discovery output of a small OpenShift-like cluster running the policy engine.
pub fn standard_snapshot() -> DiscoverySnapshot {
    DiscoverySnapshot::new(vec![
        api_resource_list(
            "v1",
            &[
                ("namespaces", "Namespace", false),
                ("configmaps", "ConfigMap", true),
                ("secrets", "Secret", true),
                ("serviceaccounts", "ServiceAccount", true),
                ("services", "Service", true),
                ("namespaces/status", "Namespace", false),
            ],
        ),
        api_resource_list(
            "apps/v1",
            &[
                ("deployments", "Deployment", true),
                ("daemonsets", "DaemonSet", true),
            ],
        ),
        api_resource_list(
            "rbac.authorization.k8s.io/v1",
            &[
                ("clusterroles", "ClusterRole", false),
                ("clusterrolebindings", "ClusterRoleBinding", false),
                ("roles", "Role", true),
                ("rolebindings", "RoleBinding", true),
            ],
        ),
        api_resource_list(
            "apiextensions.k8s.io/v1",
            &[("customresourcedefinitions", "CustomResourceDefinition", false)],
        ),
        api_resource_list(
            "admissionregistration.k8s.io/v1",
            &[
                (
                    "validatingwebhookconfigurations",
                    "ValidatingWebhookConfiguration",
                    false,
                ),
                (
                    "mutatingwebhookconfigurations",
                    "MutatingWebhookConfiguration",
                    false,
                ),
            ],
        ),
        api_resource_list(
            "security.openshift.io/v1",
            &[(
                "securitycontextconstraints",
                "SecurityContextConstraints",
                false,
            )],
        ),
        api_resource_list(
            "constraints.gatekeeper.sh/v1beta1",
            &[("k8srequiredlabels", "K8sRequiredLabels", false)],
        ),
        api_resource_list(
            "templates.gatekeeper.sh/v1beta1",
            &[("constrainttemplates", "ConstraintTemplate", false)],
        ),
    ])
}

/// Mutable state behind [`FakeApiClient`].
#[derive(Default)]
pub struct FakeState {
    objects: BTreeMap<(String, String, String), Value>,
    next_resource_version: u64,
    pub gets: usize,
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    /// Successful writes in order, as `"<verb> <path>"`
    pub writes: Vec<String>,
    /// Number of upcoming updates to reject with a conflict
    pub conflicts_remaining: u32,
    /// Error returned by every `get` while set
    pub get_error: Option<ApiError>,
    /// Error returned by every `delete` while set
    pub delete_error: Option<ApiError>,
    /// Error returned by every `update` while set
    pub update_error: Option<ApiError>,
}

/// In-memory API server with optimistic concurrency.
///
/// Objects are keyed by `(gvr, namespace, name)`. Creates fail if the name is
/// taken, updates fail unless they carry the stored `resourceVersion`.
#[derive(Default)]
pub struct FakeApiClient {
    state: Mutex<FakeState>,
}

fn key(gvr: &GroupVersionResource, namespace: &str, name: &str) -> (String, String, String) {
    (gvr.to_string(), namespace.to_string(), name.to_string())
}

fn body_name(body: &Value) -> String {
    body.pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl FakeState {
    fn bump(&mut self) -> String {
        self.next_resource_version += 1;
        self.next_resource_version.to_string()
    }

    fn store_new(&mut self, gvr: &GroupVersionResource, namespace: &str, body: &Value) -> Value {
        let name = body_name(body);
        let resource_version = self.bump();
        let mut stored = body.clone();
        let metadata = &mut stored["metadata"];
        metadata["resourceVersion"] = json!(resource_version);
        metadata["uid"] = json!(format!("uid-{resource_version}"));
        metadata["creationTimestamp"] = json!("2025-01-01T00:00:00Z");
        if !namespace.is_empty() {
            metadata["namespace"] = json!(namespace);
        }
        self.objects.insert(key(gvr, namespace, &name), stored.clone());
        stored
    }
}

impl FakeApiClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a live object without counting it as a create.
    pub fn seed(&self, gvr: &GroupVersionResource, namespace: &str, body: Value) -> Value {
        self.state.lock().unwrap().store_new(gvr, namespace, &body)
    }

    pub fn object(&self, gvr: &GroupVersionResource, namespace: &str, name: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&key(gvr, namespace, name))
            .cloned()
    }

    /// Run `f` with exclusive access to the fake's state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn creates(&self) -> usize {
        self.state.lock().unwrap().creates
    }

    pub fn updates(&self) -> usize {
        self.state.lock().unwrap().updates
    }

    pub fn deletes(&self) -> usize {
        self.state.lock().unwrap().deletes
    }

    pub fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }
}

#[async_trait]
impl ApiClient for FakeApiClient {
    async fn get(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
    ) -> Result<Value, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.gets += 1;
        if let Some(err) = &state.get_error {
            return Err(err.clone());
        }
        state
            .objects
            .get(&key(gvr, namespace, name))
            .cloned()
            .ok_or_else(|| ApiError::not_found(&make_path(gvr, namespace, name)))
    }

    async fn list(&self, gvr: &GroupVersionResource, namespace: &str) -> Result<Value, ApiError> {
        let state = self.state.lock().unwrap();
        let gvr_key = gvr.to_string();
        let items: Vec<Value> = state
            .objects
            .iter()
            .filter(|((g, ns, _), _)| *g == gvr_key && (namespace.is_empty() || ns == namespace))
            .map(|(_, v)| v.clone())
            .collect();
        Ok(json!({
            "apiVersion": gvr.api_version(),
            "kind": "List",
            "metadata": {"resourceVersion": state.next_resource_version.to_string()},
            "items": items,
        }))
    }

    async fn create(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        let mut state = self.state.lock().unwrap();
        let name = body_name(body);
        if state.objects.contains_key(&key(gvr, namespace, &name)) {
            return Err(ApiError::already_exists(&make_path(gvr, namespace, &name)));
        }
        state.creates += 1;
        state
            .writes
            .push(format!("create {}", make_path(gvr, namespace, &name)));
        Ok(state.store_new(gvr, namespace, body))
    }

    async fn update(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        let mut state = self.state.lock().unwrap();
        let path = make_path(gvr, namespace, name);
        if let Some(err) = &state.update_error {
            return Err(err.clone());
        }
        if state.conflicts_remaining > 0 {
            state.conflicts_remaining -= 1;
            return Err(ApiError::conflict(&path));
        }

        let stored_version = state
            .objects
            .get(&key(gvr, namespace, name))
            .ok_or_else(|| ApiError::not_found(&path))?
            .pointer("/metadata/resourceVersion")
            .cloned();
        if body.pointer("/metadata/resourceVersion").cloned() != stored_version {
            return Err(ApiError::conflict(&path));
        }

        state.updates += 1;
        state.writes.push(format!("update {path}"));
        let resource_version = state.bump();
        let mut stored = body.clone();
        stored["metadata"]["resourceVersion"] = json!(resource_version);
        state
            .objects
            .insert(key(gvr, namespace, name), stored.clone());
        Ok(stored)
    }

    async fn delete(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
    ) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = &state.delete_error {
            return Err(err.clone());
        }
        match state.objects.remove(&key(gvr, namespace, name)) {
            Some(_) => {
                state.deletes += 1;
                state
                    .writes
                    .push(format!("delete {}", make_path(gvr, namespace, name)));
                Ok(())
            }
            None => Err(ApiError::not_found(&make_path(gvr, namespace, name))),
        }
    }
}
