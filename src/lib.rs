// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # kube-ensure - declarative object reconciliation for Kubernetes operators
//!
//! Operators that ship a fixed set of manifests (namespaces, RBAC, deployments,
//! webhooks, policy constraints) need the same loop over and over: find out
//! where the API server serves each kind, create what is missing, update what
//! drifted without clobbering fields the cluster owns, and retry when another
//! writer got there first. This crate is that loop.
//!
//! ## Modules
//!
//! - [`resolver`] - maps `Kind[.group]` to a served group/version/resource
//! - [`create_order`] - orders a batch so dependencies are created first
//! - [`merge`] - per-kind merge strategies deciding whether an update is needed
//! - [`reconcilers`] - the [`Ensurer`] orchestrator and unstructured handling
//! - [`object`] - [`KubeObject`], the typed/unstructured object model
//! - [`client`] and [`discovery`] - the API server seams
//! - [`config`], [`logging`], [`metrics`] - runtime plumbing
//!
//! ## Example
//!
//! ```rust,no_run
//! use kube_ensure::{decode_manifests, DynamicHelper, EngineConfig, Ensurer};
//!
//! # async fn run() -> anyhow::Result<()> {
//! kube_ensure::logging::init_tracing();
//!
//! let client = kube::Client::try_default().await?;
//! let ensurer = Ensurer::from_client(client, &EngineConfig::from_env()?).await?;
//!
//! let objects = decode_manifests(
//!     "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: openshift-azure-operator\n",
//! )?;
//! ensurer.ensure(&objects).await?;
//!
//! if ensurer.is_constraint_template_ready("k8srequiredlabels").await? {
//!     // safe to create constraints of that kind now
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod create_order;
pub mod discovery;
pub mod errors;
pub mod gvr;
pub mod logging;
pub mod merge;
pub mod metrics;
pub mod object;
pub mod reconcilers;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use client::{ApiClient, KubeApiClient};
pub use config::{EngineConfig, UpdatePolicy};
pub use create_order::{create_order_cmp, sort_for_create};
pub use discovery::{Discovery, DiscoverySnapshot, KubeDiscovery, StaticDiscovery};
pub use errors::{ApiError, EnsureError, Result};
pub use gvr::{GroupKind, GroupVersionResource};
pub use merge::{MergeDecision, MergeStrategy, StrategyRegistry};
pub use object::{decode_manifests, KubeObject};
pub use reconcilers::{DynamicHelper, Ensurer, RetryPolicy};
pub use resolver::GvrResolver;
