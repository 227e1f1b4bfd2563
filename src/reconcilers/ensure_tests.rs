// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `ensure.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::discovery::{DiscoverySnapshot, StaticDiscovery};
    use crate::errors::ApiError;
    use crate::testing::{api_resource_list, standard_snapshot, FakeApiClient};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    type TestEnsurer = Ensurer<FakeApiClient, StaticDiscovery>;

    async fn ensurer() -> TestEnsurer {
        let config = EngineConfig {
            retry: RetryPolicy::immediate(5),
            ..EngineConfig::default()
        };
        ensurer_with(config).await
    }

    async fn ensurer_with(config: EngineConfig) -> TestEnsurer {
        Ensurer::with_config(
            FakeApiClient::new(),
            StaticDiscovery::new(standard_snapshot()),
            &config,
        )
        .await
        .unwrap()
    }

    fn obj(value: Value) -> KubeObject {
        KubeObject::from_value(value).unwrap()
    }

    fn config_map(data: Value) -> KubeObject {
        obj(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "aro-settings", "namespace": "openshift-azure-operator"},
            "data": data
        }))
    }

    fn configmaps() -> GroupVersionResource {
        GroupVersionResource::new("", "v1", "configmaps")
    }

    fn constraints() -> GroupVersionResource {
        GroupVersionResource::new("constraints.gatekeeper.sh", "v1beta1", "k8srequiredlabels")
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let ensurer = ensurer().await;
        let desired = vec![config_map(json!({"mode": "managed"}))];

        ensurer.ensure(&desired).await.unwrap();
        ensurer.ensure(&desired).await.unwrap();

        assert_eq!(ensurer.client().creates(), 1);
        assert_eq!(ensurer.client().updates(), 0);
    }

    #[tokio::test]
    async fn test_ensure_updates_drift_and_keeps_foreign_fields() {
        let ensurer = ensurer().await;
        let mut live = config_map(json!({"mode": "managed"})).to_value().unwrap();
        live["metadata"]["labels"] = json!({"added-by": "someone-else"});
        ensurer
            .client()
            .seed(&configmaps(), "openshift-azure-operator", live);

        ensurer
            .ensure(&[config_map(json!({"mode": "unmanaged"}))])
            .await
            .unwrap();

        assert_eq!(ensurer.client().updates(), 1);
        let stored = ensurer
            .client()
            .object(&configmaps(), "openshift-azure-operator", "aro-settings")
            .unwrap();
        assert_eq!(stored["data"]["mode"], "unmanaged");
        assert_eq!(stored["metadata"]["labels"]["added-by"], "someone-else");
    }

    #[tokio::test]
    async fn test_ensure_applies_in_create_order() {
        let ensurer = ensurer().await;
        let batch = vec![
            obj(json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": {"name": "aro-operator-master", "namespace": "openshift-azure-operator"},
                "spec": {"selector": {}, "template": {}}
            })),
            config_map(json!({})),
            obj(json!({
                "apiVersion": "v1",
                "kind": "Namespace",
                "metadata": {"name": "openshift-azure-operator"}
            })),
        ];

        ensurer.ensure(&batch).await.unwrap();

        assert_eq!(
            ensurer.client().writes(),
            vec![
                "create /api/v1/namespaces/openshift-azure-operator".to_string(),
                "create /api/v1/namespaces/openshift-azure-operator/configmaps/aro-settings"
                    .to_string(),
                "create /apis/apps/v1/namespaces/openshift-azure-operator/deployments/aro-operator-master"
                    .to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_ensure_stops_at_first_error() {
        let ensurer = ensurer().await;
        let batch = vec![
            obj(json!({
                "apiVersion": "example.com/v1",
                "kind": "Widget",
                "metadata": {"name": "w"}
            })),
            obj(json!({
                "apiVersion": "rbac.authorization.k8s.io/v1",
                "kind": "Role",
                "metadata": {"name": "r", "namespace": "default"}
            })),
        ];

        let err = ensurer.ensure(&batch).await.unwrap_err();
        assert!(matches!(err, EnsureError::KindNotFound(ref gk) if gk == "Widget.example.com"));
        assert_eq!(ensurer.client().creates(), 0);
    }

    #[tokio::test]
    async fn test_conflicts_are_retried_with_a_fresh_read() {
        let ensurer = ensurer().await;
        ensurer.client().seed(
            &configmaps(),
            "openshift-azure-operator",
            config_map(json!({"mode": "managed"})).to_value().unwrap(),
        );
        ensurer.client().with_state(|s| s.conflicts_remaining = 2);

        ensurer
            .ensure(&[config_map(json!({"mode": "unmanaged"}))])
            .await
            .unwrap();

        assert_eq!(ensurer.client().updates(), 1);
        // one read per attempt
        assert_eq!(ensurer.client().with_state(|s| s.gets), 3);
    }

    #[tokio::test]
    async fn test_conflict_surfaces_once_retries_exhausted() {
        let config = EngineConfig {
            retry: RetryPolicy::immediate(3),
            ..EngineConfig::default()
        };
        let ensurer = ensurer_with(config).await;
        ensurer.client().seed(
            &configmaps(),
            "openshift-azure-operator",
            config_map(json!({"mode": "managed"})).to_value().unwrap(),
        );
        ensurer.client().with_state(|s| s.conflicts_remaining = 10);

        let err = ensurer
            .ensure(&[config_map(json!({"mode": "unmanaged"}))])
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(ensurer.client().with_state(|s| s.gets), 3);
    }

    #[tokio::test]
    async fn test_disabled_conflict_retry_is_single_attempt() {
        let mut config = EngineConfig::default();
        config.update_policy.retry_on_conflict = false;
        let ensurer = ensurer_with(config).await;
        ensurer.client().seed(
            &configmaps(),
            "openshift-azure-operator",
            config_map(json!({"mode": "managed"})).to_value().unwrap(),
        );
        ensurer.client().with_state(|s| s.conflicts_remaining = 1);

        let err = ensurer
            .ensure(&[config_map(json!({"mode": "unmanaged"}))])
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_unstructured_enforcement_action_update() {
        let ensurer = ensurer().await;
        let live = ensurer.client().seed(
            &constraints(),
            "",
            json!({
                "apiVersion": "constraints.gatekeeper.sh/v1beta1",
                "kind": "K8sRequiredLabels",
                "metadata": {"name": "aro-privileged-namespace", "labels": {"managed": "gatekeeper"}},
                "spec": {"enforcementAction": "dryrun", "parameters": {"labels": ["owner"]}},
                "status": {"auditTimestamp": "2025-01-01T00:00:00Z", "totalViolations": 2}
            }),
        );

        let desired = obj(json!({
            "apiVersion": "constraints.gatekeeper.sh/v1beta1",
            "kind": "K8sRequiredLabels",
            "metadata": {"name": "aro-privileged-namespace"},
            "spec": {"enforcementAction": "deny"}
        }));
        ensurer.ensure(&[desired]).await.unwrap();

        assert_eq!(ensurer.client().updates(), 1);
        let stored = ensurer
            .client()
            .object(&constraints(), "", "aro-privileged-namespace")
            .unwrap();
        assert_eq!(stored["spec"]["enforcementAction"], "deny");
        assert_eq!(stored["spec"]["parameters"], live["spec"]["parameters"]);
        assert_eq!(stored["status"], live["status"]);
        assert_eq!(stored["metadata"]["labels"], live["metadata"]["labels"]);
    }

    #[tokio::test]
    async fn test_third_party_objects_are_not_updated() {
        let ensurer = ensurer().await;
        let gvr = GroupVersionResource::new("rbac.authorization.k8s.io", "v1", "clusterroles");
        ensurer.client().seed(
            &gvr,
            "",
            json!({
                "apiVersion": "rbac.authorization.k8s.io/v1",
                "kind": "ClusterRole",
                "metadata": {"name": "gatekeeper-manager-role"},
                "rules": [{"apiGroups": [""], "resources": ["events"], "verbs": ["create", "patch"]}]
            }),
        );

        let desired = obj(json!({
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "ClusterRole",
            "metadata": {"name": "gatekeeper-manager-role"},
            "rules": []
        }));
        ensurer.ensure(&[desired]).await.unwrap();

        assert_eq!(ensurer.client().updates(), 0);
    }

    #[tokio::test]
    async fn test_cluster_scoped_objects_ignore_namespace() {
        let ensurer = ensurer().await;
        let desired = obj(json!({
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "ClusterRoleBinding",
            "metadata": {"name": "aro-operator", "namespace": "stray"},
            "roleRef": {"apiGroup": "rbac.authorization.k8s.io", "kind": "ClusterRole", "name": "cluster-admin"}
        }));

        ensurer.ensure(&[desired]).await.unwrap();
        assert_eq!(
            ensurer.client().writes(),
            vec!["create /apis/rbac.authorization.k8s.io/v1/clusterrolebindings/aro-operator".to_string()]
        );
    }

    #[tokio::test]
    async fn test_cluster_scoped_constraint_ignores_namespace() {
        let ensurer = ensurer().await;
        let constraint = |action: &str| {
            obj(json!({
                "apiVersion": "constraints.gatekeeper.sh/v1beta1",
                "kind": "K8sRequiredLabels",
                "metadata": {"name": "aro-labels", "namespace": "stray"},
                "spec": {"enforcementAction": action}
            }))
        };

        ensurer.ensure(&[constraint("dryrun")]).await.unwrap();
        ensurer.ensure(&[constraint("deny")]).await.unwrap();

        assert_eq!(
            ensurer.client().writes(),
            vec![
                "create /apis/constraints.gatekeeper.sh/v1beta1/k8srequiredlabels/aro-labels"
                    .to_string(),
                "update /apis/constraints.gatekeeper.sh/v1beta1/k8srequiredlabels/aro-labels"
                    .to_string(),
            ]
        );
        let stored = ensurer
            .client()
            .object(&constraints(), "", "aro-labels")
            .unwrap();
        assert_eq!(stored["spec"]["enforcementAction"], "deny");
    }

    #[tokio::test]
    async fn test_missing_name_is_rejected() {
        let ensurer = ensurer().await;
        let nameless = obj(json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {}}));
        let err = ensurer.ensure(&[nameless]).await.unwrap_err();
        assert!(matches!(err, EnsureError::MissingName(_)));
    }

    #[tokio::test]
    async fn test_ensure_deleted_absent_object_is_ok() {
        let ensurer = ensurer().await;
        ensurer
            .ensure_deleted("ConfigMap", "openshift-azure-operator", "nope")
            .await
            .unwrap();
        ensurer
            .ensure_deleted_gvr("ConfigMap", "openshift-azure-operator", "nope", "v1")
            .await
            .unwrap();
        ensurer
            .ensure_deleted_gvr("K8sRequiredLabels.constraints.gatekeeper.sh", "", "nope", "v1beta1")
            .await
            .unwrap();
        assert_eq!(ensurer.client().deletes(), 0);
    }

    #[tokio::test]
    async fn test_ensure_deleted_removes_existing_object() {
        let ensurer = ensurer().await;
        ensurer.client().seed(
            &configmaps(),
            "openshift-azure-operator",
            config_map(json!({})).to_value().unwrap(),
        );

        ensurer
            .ensure_deleted("ConfigMap", "openshift-azure-operator", "aro-settings")
            .await
            .unwrap();

        assert_eq!(ensurer.client().deletes(), 1);
        assert!(ensurer
            .client()
            .object(&configmaps(), "openshift-azure-operator", "aro-settings")
            .is_none());
    }

    #[tokio::test]
    async fn test_ensure_deleted_gvr_tolerates_loose_not_found() {
        let ensurer = ensurer().await;
        ensurer.client().with_state(|s| {
            s.get_error = Some(ApiError::Transport(
                "the server could not find the requested resource (get k8srequiredlabels.constraints.gatekeeper.sh NotFound)"
                    .to_string(),
            ));
        });

        ensurer
            .ensure_deleted_gvr("K8sRequiredLabels.constraints.gatekeeper.sh", "", "x", "v1beta1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ensure_deleted_surfaces_forbidden_on_look_alike_name() {
        let ensurer = ensurer().await;
        ensurer.client().with_state(|s| {
            s.delete_error = Some(ApiError::Status {
                code: 403,
                reason: "Forbidden".to_string(),
                message: "configmaps \"notfound-cache\" is forbidden".to_string(),
            });
        });

        let err = ensurer
            .ensure_deleted("ConfigMap", "openshift-azure-operator", "notfound-cache")
            .await
            .unwrap_err();
        assert!(matches!(err, EnsureError::Api(ApiError::Status { code: 403, .. })));
    }

    #[tokio::test]
    async fn test_ensure_deleted_unknown_kind() {
        let ensurer = ensurer().await;
        let err = ensurer
            .ensure_deleted("Widget.example.com", "", "w")
            .await
            .unwrap_err();
        assert!(matches!(err, EnsureError::KindNotFound(_)));

        let err = ensurer
            .ensure_deleted_gvr("ConfigMap", "default", "c", "v2")
            .await
            .unwrap_err();
        assert!(matches!(err, EnsureError::KindNotFound(_)));
    }

    #[tokio::test]
    async fn test_get_and_list() {
        let ensurer = ensurer().await;
        ensurer.client().seed(
            &configmaps(),
            "openshift-azure-operator",
            config_map(json!({"mode": "managed"})).to_value().unwrap(),
        );

        let cm = ensurer
            .get("ConfigMap", "openshift-azure-operator", "aro-settings")
            .await
            .unwrap();
        assert_eq!(cm["data"]["mode"], "managed");

        let list = ensurer.list("ConfigMap", "").await.unwrap();
        assert_eq!(list["items"].as_array().unwrap().len(), 1);

        let err = ensurer
            .get("ConfigMap", "openshift-azure-operator", "missing")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_constraint_template_readiness() {
        let ensurer = ensurer().await;
        ensurer.client().seed(
            &GroupVersionResource::new("templates.gatekeeper.sh", "v1beta1", "constrainttemplates"),
            "",
            json!({"metadata": {"name": "k8srequiredlabels"}, "status": {"created": true}}),
        );

        assert!(ensurer
            .is_constraint_template_ready("k8srequiredlabels")
            .await
            .unwrap());
    }

    /// Discovery whose snapshot can be swapped while an ensurer owns it.
    #[derive(Clone, Default)]
    struct SharedDiscovery(Arc<Mutex<DiscoverySnapshot>>);

    #[async_trait]
    impl Discovery for SharedDiscovery {
        async fn server_resources(&self) -> Result<DiscoverySnapshot> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    #[tokio::test]
    async fn test_refresh_picks_up_new_kinds() {
        let discovery = SharedDiscovery::default();
        let mut ensurer = Ensurer::new(FakeApiClient::new(), discovery.clone())
            .await
            .unwrap();
        assert!(ensurer.resolver().is_empty());

        *discovery.0.lock().unwrap() = DiscoverySnapshot::new(vec![api_resource_list(
            "machine.openshift.io/v1beta1",
            &[("machinesets", "MachineSet", true)],
        )]);

        // the index only changes on refresh
        assert!(ensurer.get("MachineSet", "", "x").await.is_err());
        ensurer.refresh().await.unwrap();
        assert_eq!(ensurer.resolver().len(), 1);
        assert!(ensurer
            .resolver()
            .resolve("MachineSet.machine.openshift.io", "")
            .is_ok());
    }
}
