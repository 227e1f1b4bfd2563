// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Raw JSON access to API resources addressed by GVR.
//!
//! The engine resolves kinds itself and builds request paths from the resolved
//! [`GroupVersionResource`] (see [`make_path`]), so it needs nothing more than
//! a small REST surface. [`KubeApiClient`] provides it over [`kube::Client`].

use crate::errors::ApiError;
use crate::gvr::{make_path, GroupVersionResource};
use async_trait::async_trait;
use kube::core::params::{DeleteParams, GetParams, ListParams, PostParams};
use kube::core::Request;
use kube::Client;
use serde_json::Value;
use tracing::debug;

/// Minimal REST operations used by the engine.
///
/// `namespace` is `""` for cluster-scoped resources.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Fetch a single object.
    async fn get(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
    ) -> Result<Value, ApiError>;

    /// List a collection (all namespaces when `namespace` is empty).
    async fn list(&self, gvr: &GroupVersionResource, namespace: &str) -> Result<Value, ApiError>;

    /// Create an object, returning what the server stored.
    async fn create(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        body: &Value,
    ) -> Result<Value, ApiError>;

    /// Replace an object; `body` must carry the `resourceVersion` it was read at.
    async fn update(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
        body: &Value,
    ) -> Result<Value, ApiError>;

    /// Delete an object.
    async fn delete(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
    ) -> Result<(), ApiError>;
}

/// [`ApiClient`] backed by a [`kube::Client`].
#[derive(Clone)]
pub struct KubeApiClient {
    client: Client,
}

impl KubeApiClient {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn request(gvr: &GroupVersionResource, namespace: &str) -> Request {
        Request::new(make_path(gvr, namespace, ""))
    }

    async fn send(
        &self,
        request: Result<http::Request<Vec<u8>>, kube::core::request::Error>,
    ) -> Result<Value, ApiError> {
        let request = request.map_err(|e| ApiError::Transport(e.to_string()))?;
        debug!(method = %request.method(), uri = %request.uri(), "Sending API request");
        Ok(self.client.request::<Value>(request).await?)
    }
}

#[async_trait]
impl ApiClient for KubeApiClient {
    async fn get(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
    ) -> Result<Value, ApiError> {
        self.send(Self::request(gvr, namespace).get(name, &GetParams::default()))
            .await
    }

    async fn list(&self, gvr: &GroupVersionResource, namespace: &str) -> Result<Value, ApiError> {
        self.send(Self::request(gvr, namespace).list(&ListParams::default()))
            .await
    }

    async fn create(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        let data = serde_json::to_vec(body)?;
        self.send(Self::request(gvr, namespace).create(&PostParams::default(), data))
            .await
    }

    async fn update(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        let data = serde_json::to_vec(body)?;
        self.send(Self::request(gvr, namespace).replace(name, &PostParams::default(), data))
            .await
    }

    async fn delete(
        &self,
        gvr: &GroupVersionResource,
        namespace: &str,
        name: &str,
    ) -> Result<(), ApiError> {
        self.send(Self::request(gvr, namespace).delete(name, &DeleteParams::default()))
            .await
            .map(|_| ())
    }
}
