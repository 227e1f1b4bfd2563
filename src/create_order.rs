// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Dependency-respecting create order.
//!
//! Kinds that other objects depend on must exist first: CRDs before their
//! custom resources, RBAC and SCCs before the workloads that use them,
//! namespaces before anything namespaced. Each kind gets a weight and a batch
//! is sorted ascending by weight; equal weights keep their input order.
//!
//! | Weight | Kinds |
//! |--------|-------|
//! | -5 | `CustomResourceDefinition` |
//! | -4 | `ClusterRole`, `ClusterRoleBinding`, `SecurityContextConstraints` |
//! | -3 | `Namespace` |
//! | -2 | `ConfigMap`, `Secret`, `ServiceAccount` |
//! | 0 | everything else |

use crate::constants::{
    GROUP_APIEXTENSIONS, GROUP_RBAC, GROUP_SECURITY_OPENSHIFT, KIND_CLUSTER_ROLE,
    KIND_CLUSTER_ROLE_BINDING, KIND_CONFIG_MAP, KIND_CUSTOM_RESOURCE_DEFINITION, KIND_NAMESPACE,
    KIND_SECRET, KIND_SECURITY_CONTEXT_CONSTRAINTS, KIND_SERVICE_ACCOUNT,
};
use crate::gvr::GroupKind;
use crate::object::KubeObject;
use std::cmp::Ordering;

/// Creation weight of a kind; lower is created earlier.
#[must_use]
pub fn create_weight(group_kind: &GroupKind) -> i32 {
    match (group_kind.group.as_str(), group_kind.kind.as_str()) {
        (GROUP_APIEXTENSIONS, KIND_CUSTOM_RESOURCE_DEFINITION) => -5,
        (GROUP_RBAC, KIND_CLUSTER_ROLE | KIND_CLUSTER_ROLE_BINDING)
        | (GROUP_SECURITY_OPENSHIFT, KIND_SECURITY_CONTEXT_CONSTRAINTS) => -4,
        ("", KIND_NAMESPACE) => -3,
        ("", KIND_CONFIG_MAP | KIND_SECRET | KIND_SERVICE_ACCOUNT) => -2,
        _ => 0,
    }
}

/// Strict weak ordering of objects by [`create_weight`].
#[must_use]
pub fn create_order_cmp(a: &KubeObject, b: &KubeObject) -> Ordering {
    create_weight(&a.group_kind()).cmp(&create_weight(&b.group_kind()))
}

/// Stable-sort a batch into create order.
pub fn sort_for_create(objects: &mut [KubeObject]) {
    objects.sort_by(create_order_cmp);
}

#[cfg(test)]
#[path = "create_order_tests.rs"]
mod create_order_tests;
