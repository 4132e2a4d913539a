//! Test utilities for unit testing the reconciliation engine.
//!
//! Fixture builders for the NodeFeatureDiscovery CRD and a representative
//! manifest set covering every evaluated kind.

use crate::manifests::{Component, RenderParams, materialize};
use crds::{NodeFeatureDiscovery, NodeFeatureDiscoverySpec, OperandSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Operand namespace every test fixture deploys into.
pub const TEST_OPERAND_NAMESPACE: &str = "node-feature-discovery";

/// A full template set: namespace, RBAC, service, worker config, and the
/// worker and master daemon sets, as one multi-document manifest.
pub const TEST_MANIFESTS: &str = r#"
apiVersion: v1
kind: Namespace
metadata:
  name: placeholder
---
apiVersion: v1
kind: ServiceAccount
metadata:
  name: nfd-master
---
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRole
metadata:
  name: nfd-master
rules:
  - apiGroups: [""]
    resources: ["nodes"]
    verbs: ["get", "patch", "update"]
---
apiVersion: rbac.authorization.k8s.io/v1
kind: ClusterRoleBinding
metadata:
  name: nfd-master
roleRef:
  apiGroup: rbac.authorization.k8s.io
  kind: ClusterRole
  name: nfd-master
subjects:
  - kind: ServiceAccount
    name: nfd-master
    namespace: placeholder
---
apiVersion: rbac.authorization.k8s.io/v1
kind: Role
metadata:
  name: nfd-worker
rules:
  - apiGroups: [""]
    resources: ["pods"]
    verbs: ["get"]
---
apiVersion: rbac.authorization.k8s.io/v1
kind: RoleBinding
metadata:
  name: nfd-worker
roleRef:
  apiGroup: rbac.authorization.k8s.io
  kind: Role
  name: nfd-worker
subjects:
  - kind: ServiceAccount
    name: nfd-master
    namespace: placeholder
---
apiVersion: v1
kind: Service
metadata:
  name: nfd-master
spec:
  ports:
    - port: 12000
      protocol: TCP
  selector:
    app: nfd-master
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: nfd-worker-conf
data:
  nfd-worker.conf: |
    core:
      sleepInterval: 60s
---
apiVersion: apps/v1
kind: DaemonSet
metadata:
  name: nfd-worker
  labels:
    app: nfd-worker
spec:
  selector:
    matchLabels:
      app: nfd-worker
  template:
    metadata:
      labels:
        app: nfd-worker
    spec:
      serviceAccountName: nfd-master
      containers:
        - name: nfd-worker
          image: registry.example.com/nfd/node-feature-discovery:v0.8.2
          command: ["nfd-worker"]
---
apiVersion: apps/v1
kind: DaemonSet
metadata:
  name: nfd-master
  labels:
    app: nfd-master
spec:
  selector:
    matchLabels:
      app: nfd-master
  template:
    metadata:
      labels:
        app: nfd-master
    spec:
      serviceAccountName: nfd-master
      containers:
        - name: nfd-master
          image: registry.example.com/nfd/node-feature-discovery:v0.8.2
          command: ["nfd-master"]
"#;

/// Render parameters matching [`create_test_nfd`].
pub fn test_render_params() -> RenderParams {
    RenderParams {
        operand_namespace: TEST_OPERAND_NAMESPACE.to_string(),
        instance: Some("primary".to_string()),
        image: None,
        image_pull_policy: None,
        worker_config: None,
    }
}

/// Materializes [`TEST_MANIFESTS`] with the test render parameters.
pub fn materialize_test_manifests() -> Vec<Component> {
    materialize(&[TEST_MANIFESTS.to_string()], &test_render_params()).unwrap()
}

/// Builds a test NodeFeatureDiscovery CRD.
pub fn create_test_nfd(name: &str, namespace: &str) -> NodeFeatureDiscovery {
    NodeFeatureDiscovery {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: NodeFeatureDiscoverySpec {
            operand: OperandSpec {
                namespace: Some(TEST_OPERAND_NAMESPACE.to_string()),
                image: None,
                image_pull_policy: None,
            },
            instance: Some("primary".to_string()),
            worker_config: None,
        },
        status: None,
    }
}

/// A healthy daemon set status: everything scheduled, updated, available.
pub fn daemon_set_status(desired: i32, updated: i32, available: i32) -> serde_json::Value {
    serde_json::json!({
        "currentNumberScheduled": desired,
        "desiredNumberScheduled": desired,
        "numberMisscheduled": 0,
        "numberReady": available,
        "updatedNumberScheduled": updated,
        "numberAvailable": available,
    })
}
