// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired and live API objects.
//!
//! [`KubeObject`] is a closed tagged union over the compiled kinds the engine
//! knows how to merge, plus an [`KubeObject::Unstructured`] variant for kinds
//! with no compiled type (policy-engine constraints, OpenShift-only kinds...).
//!
//! Identity is `(GroupKind, namespace, name)`. Objects are built fresh for every
//! reconcile call and never persisted by the engine.

use crate::errors::{EnsureError, Result};
use crate::gvr::{split_api_version, GroupKind};
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhookConfiguration, ValidatingWebhookConfiguration,
};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DynamicObject;
use serde::Deserialize;
use serde_json::Value;

/// Generates [`KubeObject`] and its per-variant plumbing for every compiled kind.
macro_rules! kube_objects {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        /// A Kubernetes object the engine can reconcile.
        #[derive(Clone, Debug)]
        pub enum KubeObject {
            $($variant($ty),)*
            /// Generic key/value tree for kinds without a compiled type.
            Unstructured(DynamicObject),
        }

        impl KubeObject {
            /// Object metadata.
            #[must_use]
            pub fn meta(&self) -> &ObjectMeta {
                match self {
                    $(Self::$variant(o) => &o.metadata,)*
                    Self::Unstructured(o) => &o.metadata,
                }
            }

            /// Mutable object metadata.
            pub fn meta_mut(&mut self) -> &mut ObjectMeta {
                match self {
                    $(Self::$variant(o) => &mut o.metadata,)*
                    Self::Unstructured(o) => &mut o.metadata,
                }
            }

            /// `(group, version, kind)` of the object.
            ///
            /// Unstructured objects report whatever their `apiVersion`/`kind`
            /// say, which is empty when the type metadata is missing.
            #[must_use]
            pub fn gvk(&self) -> (String, String, String) {
                match self {
                    $(Self::$variant(_) => (
                        <$ty as k8s_openapi::Resource>::GROUP.to_string(),
                        <$ty as k8s_openapi::Resource>::VERSION.to_string(),
                        <$ty as k8s_openapi::Resource>::KIND.to_string(),
                    ),)*
                    Self::Unstructured(o) => match &o.types {
                        Some(types) => {
                            let (group, version) = split_api_version(&types.api_version);
                            (group.to_string(), version.to_string(), types.kind.clone())
                        }
                        None => (String::new(), String::new(), String::new()),
                    },
                }
            }

            /// Serialize to the JSON document sent to the API server.
            ///
            /// # Errors
            ///
            /// Returns [`EnsureError::Serialization`] if the object cannot be encoded.
            pub fn to_value(&self) -> Result<Value> {
                let encoded = match self {
                    $(Self::$variant(o) => serde_json::to_value(o),)*
                    Self::Unstructured(o) => serde_json::to_value(o),
                };
                encoded.map_err(|source| EnsureError::Serialization {
                    kind: self.group_kind().to_string(),
                    source,
                })
            }

            /// Decode `value` into the same variant as `self`.
            ///
            /// Used to type a live object fetched as JSON like its desired counterpart.
            ///
            /// # Errors
            ///
            /// Returns [`EnsureError::Serialization`] if `value` does not fit the variant.
            pub fn with_value(&self, value: Value) -> Result<Self> {
                let decoded = match self {
                    $(Self::$variant(_) => serde_json::from_value::<$ty>(value).map(Self::$variant),)*
                    Self::Unstructured(_) => {
                        serde_json::from_value::<DynamicObject>(value).map(Self::Unstructured)
                    }
                };
                decoded.map_err(|source| EnsureError::Serialization {
                    kind: self.group_kind().to_string(),
                    source,
                })
            }

            /// Decode a JSON document into the matching compiled variant, falling
            /// back to [`KubeObject::Unstructured`] for unknown kinds.
            ///
            /// # Errors
            ///
            /// Returns [`EnsureError::InvalidManifest`] when `apiVersion` or `kind`
            /// is missing, or [`EnsureError::Serialization`] when the document does
            /// not fit its compiled type.
            pub fn from_value(value: Value) -> Result<Self> {
                let api_version = value
                    .get("apiVersion")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let kind = value
                    .get("kind")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if api_version.is_empty() || kind.is_empty() {
                    return Err(EnsureError::InvalidManifest(
                        "document has no apiVersion or kind".to_string(),
                    ));
                }

                let (group, _) = split_api_version(&api_version);
                let group_kind = GroupKind::new(group, kind.as_str());
                let decoded = $(
                    if api_version == <$ty as k8s_openapi::Resource>::API_VERSION
                        && kind == <$ty as k8s_openapi::Resource>::KIND
                    {
                        serde_json::from_value::<$ty>(value).map(Self::$variant)
                    } else
                )* {
                    serde_json::from_value::<DynamicObject>(value).map(Self::Unstructured)
                };
                decoded.map_err(|source| EnsureError::Serialization {
                    kind: group_kind.to_string(),
                    source,
                })
            }

            /// Whether `self` and `other` are the same variant.
            #[must_use]
            pub fn same_type(&self, other: &Self) -> bool {
                match (self, other) {
                    $((Self::$variant(_), Self::$variant(_)) => true,)*
                    (Self::Unstructured(_), Self::Unstructured(_)) => {
                        self.group_kind() == other.group_kind()
                    }
                    _ => false,
                }
            }
        }

        $(
            impl From<$ty> for KubeObject {
                fn from(o: $ty) -> Self {
                    Self::$variant(o)
                }
            }
        )*
    };
}

kube_objects! {
    Namespace => Namespace,
    ServiceAccount => ServiceAccount,
    Service => Service,
    ConfigMap => ConfigMap,
    Secret => Secret,
    DaemonSet => DaemonSet,
    Deployment => Deployment,
    ClusterRole => ClusterRole,
    ClusterRoleBinding => ClusterRoleBinding,
    Role => Role,
    RoleBinding => RoleBinding,
    CustomResourceDefinition => CustomResourceDefinition,
    ValidatingWebhookConfiguration => ValidatingWebhookConfiguration,
    MutatingWebhookConfiguration => MutatingWebhookConfiguration,
}

impl From<DynamicObject> for KubeObject {
    fn from(o: DynamicObject) -> Self {
        Self::Unstructured(o)
    }
}

impl KubeObject {
    #[must_use]
    pub fn group_kind(&self) -> GroupKind {
        let (group, _, kind) = self.gvk();
        GroupKind::new(group, kind)
    }

    #[must_use]
    pub fn version(&self) -> String {
        self.gvk().1
    }

    /// `metadata.name`, empty when unset.
    #[must_use]
    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    /// `metadata.namespace`, empty for cluster-scoped objects.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn resource_version(&self) -> Option<&str> {
        self.meta().resource_version.as_deref()
    }

    #[must_use]
    pub fn is_unstructured(&self) -> bool {
        matches!(self, Self::Unstructured(_))
    }
}

/// Decode a multi-document YAML manifest stream.
///
/// Empty documents (e.g. a trailing `---`) are skipped.
///
/// # Errors
///
/// Returns an error if the YAML is malformed or a document is not a usable object.
pub fn decode_manifests(yaml: &str) -> Result<Vec<KubeObject>> {
    let mut objects = Vec::new();
    for document in serde_yaml::Deserializer::from_str(yaml) {
        let value = Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        objects.push(KubeObject::from_value(value)?);
    }
    Ok(objects)
}

#[cfg(test)]
#[path = "object_tests.rs"]
mod object_tests;
