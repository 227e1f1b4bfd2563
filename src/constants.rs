// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the reconciliation engine.
//!
//! This module contains the numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Group Constants
// ============================================================================

/// API group of `CustomResourceDefinition`
pub const GROUP_APIEXTENSIONS: &str = "apiextensions.k8s.io";

/// API group of RBAC resources
pub const GROUP_RBAC: &str = "rbac.authorization.k8s.io";

/// API group of OpenShift `SecurityContextConstraints`
pub const GROUP_SECURITY_OPENSHIFT: &str = "security.openshift.io";

/// API group of admission webhook configurations
pub const GROUP_ADMISSIONREGISTRATION: &str = "admissionregistration.k8s.io";

/// API group of the policy engine's `ConstraintTemplate`
pub const GROUP_GATEKEEPER_TEMPLATES: &str = "templates.gatekeeper.sh";

/// Served version of `ConstraintTemplate` queried for readiness
pub const VERSION_GATEKEEPER_TEMPLATES: &str = "v1beta1";

/// Plural resource name of `ConstraintTemplate`
pub const RESOURCE_CONSTRAINT_TEMPLATES: &str = "constrainttemplates";

// ============================================================================
// Kind Constants
// ============================================================================

pub const KIND_CUSTOM_RESOURCE_DEFINITION: &str = "CustomResourceDefinition";
pub const KIND_CLUSTER_ROLE: &str = "ClusterRole";
pub const KIND_CLUSTER_ROLE_BINDING: &str = "ClusterRoleBinding";
pub const KIND_SECURITY_CONTEXT_CONSTRAINTS: &str = "SecurityContextConstraints";
pub const KIND_NAMESPACE: &str = "Namespace";
pub const KIND_CONFIG_MAP: &str = "ConfigMap";
pub const KIND_SECRET: &str = "Secret";
pub const KIND_SERVICE_ACCOUNT: &str = "ServiceAccount";

// ============================================================================
// Merge Constants
// ============================================================================

/// Name prefixes of objects owned by the third-party policy engine.
///
/// Objects carrying one of these prefixes are never updated by the default
/// merge strategy.
pub const DEFAULT_THIRD_PARTY_PREFIXES: &[&str] = &["gatekeeper-"];

/// Metadata fields that only the API server populates.
///
/// These are copied from the live object onto the desired object before the
/// overlay so that they never show up as drift.
pub const SYSTEM_METADATA_FIELDS: &[&str] = &[
    "resourceVersion",
    "uid",
    "creationTimestamp",
    "selfLink",
    "generation",
    "managedFields",
];

/// Label requesting injection of the cluster trust bundle into a `ConfigMap`
pub const LABEL_INJECT_TRUSTED_CABUNDLE: &str = "config.openshift.io/inject-trusted-cabundle";

/// Data key populated by the trust bundle injector
pub const DATA_KEY_CA_BUNDLE: &str = "ca-bundle.crt";

/// Spec field of policy-engine constraints that the engine reconciles
pub const FIELD_ENFORCEMENT_ACTION: &str = "enforcementAction";

// ============================================================================
// Retry Constants
// ============================================================================

/// Default maximum number of attempts for a conflicting write
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 5;

/// Default delay before the first conflict retry (10ms)
pub const DEFAULT_RETRY_INITIAL_INTERVAL_MILLIS: u64 = 10;

/// Default backoff multiplier (1.0 keeps the delay flat)
pub const DEFAULT_RETRY_MULTIPLIER: f64 = 1.0;

/// Upper bound on any single retry delay (1 second)
pub const DEFAULT_RETRY_MAX_INTERVAL_MILLIS: u64 = 1000;

/// Randomization factor to prevent thundering herd (±10%)
pub const DEFAULT_RETRY_RANDOMIZATION_FACTOR: f64 = 0.1;

// ============================================================================
// Configuration Environment Variables
// ============================================================================

pub const ENV_RETRY_MAX_ATTEMPTS: &str = "KUBE_ENSURE_RETRY_MAX_ATTEMPTS";
pub const ENV_RETRY_INITIAL_MS: &str = "KUBE_ENSURE_RETRY_INITIAL_MS";
pub const ENV_RETRY_MULTIPLIER: &str = "KUBE_ENSURE_RETRY_MULTIPLIER";
pub const ENV_RETRY_JITTER: &str = "KUBE_ENSURE_RETRY_JITTER";
pub const ENV_LOG_CHANGES: &str = "KUBE_ENSURE_LOG_CHANGES";
pub const ENV_RETRY_ON_CONFLICT: &str = "KUBE_ENSURE_RETRY_ON_CONFLICT";
pub const ENV_THIRD_PARTY_PREFIXES: &str = "KUBE_ENSURE_THIRD_PARTY_PREFIXES";

/// Selects the log output format (`json` or `text`)
pub const ENV_LOG_FORMAT: &str = "RUST_LOG_FORMAT";
