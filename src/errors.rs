// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the reconciliation engine.
//!
//! Two layers of errors exist:
//! - [`ApiError`] - a failure reported by (or while talking to) the API server
//! - [`EnsureError`] - everything `ensure`/`ensure_deleted` can surface to a caller
//!
//! "Not found" is a normal outcome on reads and deletes, so it is detected
//! through the single [`is_not_found`] predicate rather than matched at call sites.

use thiserror::Error;

/// HTTP status code for missing or rejected credentials
pub const STATUS_UNAUTHORIZED: u16 = 401;

/// HTTP status code for an RBAC denial
pub const STATUS_FORBIDDEN: u16 = 403;

/// HTTP status code for a missing object
pub const STATUS_NOT_FOUND: u16 = 404;

/// HTTP status code for a stale `resourceVersion` (or an existing name on create)
pub const STATUS_CONFLICT: u16 = 409;

/// Errors returned by an [`crate::client::ApiClient`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The API server answered with a non-success `Status`.
    #[error("API request failed with status {code} ({reason}): {message}")]
    Status {
        /// HTTP status code (e.g. 404, 409)
        code: u16,
        /// Machine-readable reason (e.g. `NotFound`, `Conflict`)
        reason: String,
        /// Human-readable message
        message: String,
    },

    /// The request never produced an API status (connection, TLS, timeout...).
    #[error("API transport error: {0}")]
    Transport(String),

    /// A request or response body could not be encoded or decoded.
    #[error("API payload error: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Build a `NotFound` status error for `what`.
    #[must_use]
    pub fn not_found(what: &str) -> Self {
        Self::Status {
            code: STATUS_NOT_FOUND,
            reason: "NotFound".to_string(),
            message: format!("{what} not found"),
        }
    }

    /// Build an `AlreadyExists` status error for `what`.
    #[must_use]
    pub fn already_exists(what: &str) -> Self {
        Self::Status {
            code: STATUS_CONFLICT,
            reason: "AlreadyExists".to_string(),
            message: format!("{what} already exists"),
        }
    }

    /// Build a `Conflict` status error for `what`.
    #[must_use]
    pub fn conflict(what: &str) -> Self {
        Self::Status {
            code: STATUS_CONFLICT,
            reason: "Conflict".to_string(),
            message: format!(
                "Operation cannot be fulfilled on {what}: the object has been modified; \
                 please apply your changes to the latest version and try again"
            ),
        }
    }
}

impl From<kube::Error> for ApiError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) => Self::Status {
                code: ae.code,
                reason: ae.reason.clone(),
                message: ae.message.clone(),
            },
            kube::Error::SerdeError(e) => Self::Serialization(e.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Returns `true` when `err` means the addressed object does not exist.
///
/// Some aggregated APIs do not return a typed `NotFound` status, so the error
/// text is matched loosely as well.
#[must_use]
pub fn is_not_found(err: &ApiError) -> bool {
    match err {
        ApiError::Status {
            code,
            reason,
            message,
        } => {
            if *code == STATUS_NOT_FOUND || reason == "NotFound" {
                return true;
            }
            // the message may echo an object name; never trust it on auth failures
            if *code == STATUS_UNAUTHORIZED || *code == STATUS_FORBIDDEN {
                return false;
            }
            mentions_not_found(reason) || mentions_not_found(message)
        }
        ApiError::Transport(text) => mentions_not_found(text),
        ApiError::Serialization(_) => false,
    }
}

fn mentions_not_found(text: &str) -> bool {
    text.to_lowercase().contains("notfound")
}

/// Returns `true` when `err` is an optimistic-concurrency conflict.
///
/// `AlreadyExists` shares status 409 but is not a stale write.
#[must_use]
pub fn is_conflict(err: &ApiError) -> bool {
    match err {
        ApiError::Status { code, reason, .. } => {
            reason == "Conflict" || (*code == STATUS_CONFLICT && reason != "AlreadyExists")
        }
        _ => false,
    }
}

/// Errors surfaced by the reconciliation engine.
#[derive(Error, Debug)]
pub enum EnsureError {
    /// Discovery knows no resource for the requested kind.
    #[error("The groupKind '{0}' was not found.")]
    KindNotFound(String),

    /// A bare kind matched resources in more than one API group.
    #[error("The groupKind '{group_kind}' matched multiple groupKinds ({}).", candidates.join(", "))]
    AmbiguousKind {
        /// The kind as requested by the caller
        group_kind: String,
        /// Every `Kind.group` that matched, in discovery order
        candidates: Vec<String>,
    },

    /// Discovery could not be performed at all.
    #[error("API discovery failed: {0}")]
    Discovery(String),

    /// `merge` was handed a live and desired object of different kinds.
    #[error("types differ: {old} {new}")]
    TypeMismatch {
        /// Kind of the live object
        old: String,
        /// Kind of the desired object
        new: String,
    },

    /// A desired object carries no `metadata.name`.
    #[error("{0} has no metadata.name")]
    MissingName(String),

    /// A manifest document is not a usable Kubernetes object.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// The API server rejected a request.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A typed object could not be converted to or from JSON.
    #[error("failed to convert {kind}: {source}")]
    Serialization {
        /// Kind being converted
        kind: String,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },

    /// A YAML manifest stream could not be parsed.
    #[error("failed to parse manifest YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl EnsureError {
    /// Returns `true` when this error wraps an API `NotFound`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(e) if is_not_found(e))
    }

    /// Returns `true` when this error wraps an API conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Api(e) if is_conflict(e))
    }
}

/// Result alias used across the crate.
pub type Result<T, E = EnsureError> = std::result::Result<T, E>;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
