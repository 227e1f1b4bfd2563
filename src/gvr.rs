// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Group/Kind and Group/Version/Resource identifiers plus REST path helpers.

use std::fmt;

/// An (API group, Kind) pair, independent of version.
///
/// The core group is the empty string. Parsed from and displayed as
/// `"Kind"` (core) or `"Kind.group"`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    #[must_use]
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }

    /// Parse `"Kind"` or `"Kind.group"`; the group is everything after the first dot.
    #[must_use]
    pub fn parse(group_kind: &str) -> Self {
        match group_kind.split_once('.') {
            Some((kind, group)) => Self::new(group, kind),
            None => Self::new("", group_kind),
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// The addressable tuple identifying an API resource type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    #[must_use]
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// `group/version`, or just `version` for the core group.
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.resource)
        }
    }
}

/// Split an `apiVersion` string into `(group, version)`.
#[must_use]
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// Build the REST path segments for a resource.
///
/// Produces `["api" | "apis", group, version, "namespaces", ns, resource, name]`,
/// omitting the group for the core API, the namespace pair for cluster-scoped
/// (or collection-wide) requests, and the name for collection requests.
#[must_use]
pub fn make_url_segments(gvr: &GroupVersionResource, namespace: &str, name: &str) -> Vec<String> {
    let mut url = Vec::with_capacity(7);
    if gvr.group.is_empty() {
        url.push("api".to_string());
    } else {
        url.push("apis".to_string());
        url.push(gvr.group.clone());
    }

    url.push(gvr.version.clone());

    if !namespace.is_empty() {
        url.push("namespaces".to_string());
        url.push(namespace.to_string());
    }

    url.push(gvr.resource.clone());

    if !name.is_empty() {
        url.push(name.to_string());
    }

    url
}

/// Absolute request path for a resource collection or object.
#[must_use]
pub fn make_path(gvr: &GroupVersionResource, namespace: &str, name: &str) -> String {
    format!("/{}", make_url_segments(gvr, namespace, name).join("/"))
}

/// Log key for an object: `Kind.group/namespace/name` (namespace omitted when empty).
#[must_use]
pub fn key_func(group_kind: &GroupKind, namespace: &str, name: &str) -> String {
    let mut key = group_kind.to_string();
    if !namespace.is_empty() {
        key.push('/');
        key.push_str(namespace);
    }
    key.push('/');
    key.push_str(name);
    key
}

#[cfg(test)]
#[path = "gvr_tests.rs"]
mod gvr_tests;
