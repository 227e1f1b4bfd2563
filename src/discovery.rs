// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! API discovery sources.
//!
//! A [`Discovery`] produces a [`DiscoverySnapshot`]: every `APIResourceList`
//! the server advertised, plus the group versions that could not be listed.
//! A single broken aggregated API must not block reconciliation of unrelated
//! resources, so per-group-version failures are recorded instead of returned.
//!
//! - [`KubeDiscovery`] walks a live API server through [`kube::Client`].
//! - [`StaticDiscovery`] serves a fixed snapshot (tests, embedding).

use crate::errors::{ApiError, EnsureError, Result};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::Client;
use tracing::{debug, warn};

/// A group version whose resources could not be listed.
#[derive(Clone, Debug, PartialEq)]
pub struct DiscoveryFailure {
    /// `group/version` (or `v1` for core) that failed
    pub group_version: String,
    /// Error text reported while listing it
    pub reason: String,
}

/// Everything a discovery pass produced.
#[derive(Clone, Debug, Default)]
pub struct DiscoverySnapshot {
    pub resource_lists: Vec<APIResourceList>,
    pub failures: Vec<DiscoveryFailure>,
}

impl DiscoverySnapshot {
    #[must_use]
    pub fn new(resource_lists: Vec<APIResourceList>) -> Self {
        Self {
            resource_lists,
            failures: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_failure(mut self, group_version: &str, reason: &str) -> Self {
        self.failures.push(DiscoveryFailure {
            group_version: group_version.to_string(),
            reason: reason.to_string(),
        });
        self
    }
}

/// Source of API discovery information.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// List every served group version and its resources.
    ///
    /// # Errors
    ///
    /// Returns an error only when discovery cannot be performed at all; failures
    /// of individual group versions are reported inside the snapshot.
    async fn server_resources(&self) -> Result<DiscoverySnapshot>;
}

/// Discovery against a live API server.
#[derive(Clone)]
pub struct KubeDiscovery {
    client: Client,
}

impl KubeDiscovery {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Discovery for KubeDiscovery {
    async fn server_resources(&self) -> Result<DiscoverySnapshot> {
        let mut snapshot = DiscoverySnapshot::default();

        let core = self
            .client
            .list_core_api_versions()
            .await
            .map_err(|e| EnsureError::Discovery(format!("listing core API versions: {e}")))?;
        let groups = self
            .client
            .list_api_groups()
            .await
            .map_err(|e| EnsureError::Discovery(format!("listing API groups: {e}")))?;

        let mut group_versions = core.versions;
        for group in groups.groups {
            group_versions.extend(group.versions.into_iter().map(|v| v.group_version));
        }

        for group_version in group_versions {
            let listed = if group_version.contains('/') {
                self.client.list_api_group_resources(&group_version).await
            } else {
                self.client.list_core_api_resources(&group_version).await
            };

            match listed {
                Ok(list) => {
                    debug!(
                        group_version = %group_version,
                        resources = list.resources.len(),
                        "Discovered API resources"
                    );
                    snapshot.resource_lists.push(list);
                }
                Err(e) => {
                    let e = ApiError::from(e);
                    warn!(
                        group_version = %group_version,
                        error = %e,
                        "API discovery failed for group version, ignoring"
                    );
                    snapshot.failures.push(DiscoveryFailure {
                        group_version,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(snapshot)
    }
}

/// Discovery that always returns the same snapshot.
#[derive(Clone, Debug, Default)]
pub struct StaticDiscovery {
    snapshot: DiscoverySnapshot,
}

impl StaticDiscovery {
    #[must_use]
    pub fn new(snapshot: DiscoverySnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn server_resources(&self) -> Result<DiscoverySnapshot> {
        Ok(self.snapshot.clone())
    }
}
