// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kind to GVR resolution over cached API discovery.
//!
//! The [`GvrResolver`] owns an index built from one [`DiscoverySnapshot`],
//! keyed case-insensitively by `"<kind>.<group>"` and by the bare `"<kind>"`.
//! The index only changes through [`GvrResolver::refresh`].
//!
//! # Resolution rules
//!
//! 1. An exact `Kind.group` match (or `Kind` for the core group) wins.
//! 2. Otherwise a bare `Kind` must match resources in exactly one group; a
//!    match in several groups is an [`EnsureError::AmbiguousKind`] naming every
//!    candidate, because two unrelated CRDs can legally define the same kind.
//! 3. Among the versions of the winning group the most stable, newest version
//!    is returned (`v1` > `v1beta2` > `v1beta1` > `v1alpha1`), unless the
//!    caller asked for a specific version.

use crate::discovery::{Discovery, DiscoverySnapshot};
use crate::errors::{EnsureError, Result};
use crate::gvr::{split_api_version, GroupKind, GroupVersionResource};
use crate::metrics;
use std::collections::HashMap;
use tracing::{debug, warn};

/// A resolvable resource and the discovery metadata it was derived from.
#[derive(Clone, Debug, PartialEq)]
pub struct GvrEntry {
    pub gvr: GroupVersionResource,
    pub kind: String,
    pub namespaced: bool,
}

impl GvrEntry {
    #[must_use]
    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(self.gvr.group.clone(), self.kind.clone())
    }
}

/// Discovery-backed index from kinds to resources.
#[derive(Clone, Debug, Default)]
pub struct GvrResolver {
    entries: Vec<GvrEntry>,
    index: HashMap<String, Vec<usize>>,
}

impl GvrResolver {
    /// Run discovery and build a resolver from the result.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery cannot be performed at all.
    pub async fn discover(discovery: &dyn Discovery) -> Result<Self> {
        let snapshot = discovery.server_resources().await?;
        Ok(Self::from_snapshot(&snapshot))
    }

    /// Build a resolver from a fixed discovery snapshot.
    ///
    /// Failed group versions in the snapshot are logged and otherwise ignored.
    #[must_use]
    pub fn from_snapshot(snapshot: &DiscoverySnapshot) -> Self {
        for failure in &snapshot.failures {
            warn!(
                group_version = %failure.group_version,
                reason = %failure.reason,
                "Partial API discovery failure, continuing without this group version"
            );
            metrics::record_discovery_failure();
        }

        let mut resolver = Self::default();
        for list in &snapshot.resource_lists {
            let (group, version) = split_api_version(&list.group_version);
            if version.is_empty() || version.contains('/') {
                warn!(group_version = %list.group_version, "Skipping malformed group version");
                continue;
            }

            for resource in &list.resources {
                // subresources such as deployments/scale are not addressable objects
                if resource.name.contains('/') {
                    continue;
                }
                resolver.insert(GvrEntry {
                    gvr: GroupVersionResource::new(group, version, resource.name.clone()),
                    kind: resource.kind.clone(),
                    namespaced: resource.namespaced,
                });
            }
        }

        debug!(resources = resolver.entries.len(), "Built GVR index");
        resolver
    }

    /// Discard the cached index and rebuild it from a fresh discovery pass.
    ///
    /// The old index is kept if discovery fails outright.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery cannot be performed at all.
    pub async fn refresh(&mut self, discovery: &dyn Discovery) -> Result<()> {
        *self = Self::discover(discovery).await?;
        Ok(())
    }

    fn insert(&mut self, entry: GvrEntry) {
        let id = self.entries.len();
        let bare = entry.kind.to_lowercase();
        let qualified = entry.group_kind().to_string().to_lowercase();

        if qualified != bare {
            self.index.entry(qualified).or_default().push(id);
        }
        self.index.entry(bare).or_default().push(id);
        self.entries.push(entry);
    }

    /// Number of indexed resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve `group_kind` (`"Kind"` or `"Kind.group"`) to a GVR.
    ///
    /// `version` restricts the match to one served version; pass `""` for any.
    ///
    /// # Errors
    ///
    /// - [`EnsureError::KindNotFound`] when nothing matches
    /// - [`EnsureError::AmbiguousKind`] when a bare kind matches several groups
    pub fn resolve(&self, group_kind: &str, version: &str) -> Result<GroupVersionResource> {
        self.resolve_entry(group_kind, version)
            .map(|entry| entry.gvr.clone())
    }

    /// Like [`GvrResolver::resolve`] but returns the full discovery entry.
    ///
    /// # Errors
    ///
    /// See [`GvrResolver::resolve`].
    pub fn resolve_entry(&self, group_kind: &str, version: &str) -> Result<&GvrEntry> {
        let candidates: Vec<&GvrEntry> = self
            .index
            .get(&group_kind.to_lowercase())
            .into_iter()
            .flatten()
            .map(|&id| &self.entries[id])
            .filter(|entry| version.is_empty() || entry.gvr.version == version)
            .collect();

        let exact: Vec<&GvrEntry> = candidates
            .iter()
            .copied()
            .filter(|entry| entry.group_kind().to_string().eq_ignore_ascii_case(group_kind))
            .collect();
        if let Some(entry) = preferred_version(&exact) {
            return Ok(entry);
        }

        let mut groups: Vec<&str> = Vec::new();
        for entry in &candidates {
            if !groups.contains(&entry.gvr.group.as_str()) {
                groups.push(&entry.gvr.group);
            }
        }

        if groups.len() > 1 {
            return Err(EnsureError::AmbiguousKind {
                group_kind: group_kind.to_string(),
                candidates: groups
                    .iter()
                    .map(|group| format!("{group_kind}.{group}"))
                    .collect(),
            });
        }

        preferred_version(&candidates).ok_or_else(|| EnsureError::KindNotFound(group_kind.to_string()))
    }
}

/// Pick the most preferred version; ties keep discovery order.
fn preferred_version<'a>(entries: &[&'a GvrEntry]) -> Option<&'a GvrEntry> {
    entries
        .iter()
        .copied()
        .min_by(|a, b| version_priority(&b.gvr.version).cmp(&version_priority(&a.gvr.version)))
}

/// Sort key for Kubernetes API versions, larger is preferred.
///
/// GA versions beat beta versions, which beat alpha versions; within a tier the
/// higher major then minor number wins. Versions not following the
/// `v<major>[alpha|beta<minor>]` convention rank below everything else.
pub(crate) fn version_priority(version: &str) -> (u8, u32, u32) {
    let Some(rest) = version.strip_prefix('v') else {
        return (0, 0, 0);
    };

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let Ok(major) = rest[..digits_end].parse::<u32>() else {
        return (0, 0, 0);
    };

    let (tier, minor) = match &rest[digits_end..] {
        "" => return (3, major, 0),
        suffix if suffix.starts_with("beta") => (2, &suffix[4..]),
        suffix if suffix.starts_with("alpha") => (1, &suffix[5..]),
        _ => return (0, 0, 0),
    };

    match minor.parse::<u32>() {
        Ok(minor) => (tier, major, minor),
        Err(_) if minor.is_empty() => (tier, major, 0),
        Err(_) => (0, 0, 0),
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod resolver_tests;
