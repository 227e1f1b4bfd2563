// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of desired objects against the API server.
//!
//! # Components
//!
//! - [`ensure`] - [`Ensurer`], the orchestrator behind [`DynamicHelper`]
//! - [`unstructured`] - enforcement-action reconciliation for kinds without a
//!   compiled type, plus deletion and `ConstraintTemplate` readiness
//! - [`retry`] - optimistic-concurrency retry with exponential backoff
//!
//! # Example
//!
//! ```rust,no_run
//! use kube_ensure::reconcilers::{DynamicHelper, Ensurer};
//! use kube_ensure::{decode_manifests, EngineConfig};
//!
//! async fn apply(manifests: &str) -> anyhow::Result<()> {
//!     let client = kube::Client::try_default().await?;
//!     let ensurer = Ensurer::from_client(client, &EngineConfig::from_env()?).await?;
//!
//!     ensurer.ensure(&decode_manifests(manifests)?).await?;
//!     ensurer
//!         .ensure_deleted("ConfigMap", "openshift-azure-operator", "stale")
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod ensure;
pub mod retry;
pub mod unstructured;

pub use ensure::{DynamicHelper, Ensurer};
pub use retry::{retry_on_conflict, ExponentialBackoff, RetryPolicy};
pub use unstructured::{delete_object, enforcement_action, ensure_unstructured};
