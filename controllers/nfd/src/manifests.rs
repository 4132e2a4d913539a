//! Manifest materialization.
//!
//! Reads the operand manifest templates from disk, decodes every document
//! into its typed cluster object, and seeds the result with the parameters
//! of the NodeFeatureDiscovery instance being reconciled. The output is the
//! ordered component list the apply state machine walks.
//!
//! Document order is the lexical order of the manifest file paths, so the
//! apply sequence is stable across passes for an unchanged template set.

use crate::error::ControllerError;
use crate::store::{ResourceStore, StoreError};
use crds::{NodeFeatureDiscovery, SecurityContextConstraints};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, PodSpec, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Label applied to every owned object, carrying the instance name of the
/// NodeFeatureDiscovery that produced it.
pub const INSTANCE_LABEL: &str = "nfd.kubernetes.io/instance";

/// Config map key the worker daemon set mounts its configuration from.
pub const WORKER_CONFIG_KEY: &str = "nfd-worker.conf";

/// One owned cluster object, typed by kind.
///
/// The closed variant set doubles as the kind dispatch: applying, deleting
/// and health-checking a component all match on the variant instead of a
/// kind string.
#[derive(Debug, Clone)]
pub enum Component {
    /// Operand namespace
    Namespace(Namespace),
    /// Operand service account
    ServiceAccount(ServiceAccount),
    /// Cluster-wide RBAC role
    ClusterRole(ClusterRole),
    /// Binding of the cluster role to the operand service account
    ClusterRoleBinding(ClusterRoleBinding),
    /// Namespaced RBAC role
    Role(Role),
    /// Binding of the role to the operand service account
    RoleBinding(RoleBinding),
    /// Worker configuration
    ConfigMap(ConfigMap),
    /// Worker or master daemon set
    DaemonSet(DaemonSet),
    /// Master deployment
    Deployment(Deployment),
    /// Master service
    Service(Service),
    /// Security policy for the operand pods
    SecurityContextConstraints(SecurityContextConstraints),
}

impl Component {
    /// Kind discriminator, matching the manifest `kind` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Component::Namespace(_) => "Namespace",
            Component::ServiceAccount(_) => "ServiceAccount",
            Component::ClusterRole(_) => "ClusterRole",
            Component::ClusterRoleBinding(_) => "ClusterRoleBinding",
            Component::Role(_) => "Role",
            Component::RoleBinding(_) => "RoleBinding",
            Component::ConfigMap(_) => "ConfigMap",
            Component::DaemonSet(_) => "DaemonSet",
            Component::Deployment(_) => "Deployment",
            Component::Service(_) => "Service",
            Component::SecurityContextConstraints(_) => "SecurityContextConstraints",
        }
    }

    fn meta(&self) -> &ObjectMeta {
        match self {
            Component::Namespace(obj) => &obj.metadata,
            Component::ServiceAccount(obj) => &obj.metadata,
            Component::ClusterRole(obj) => &obj.metadata,
            Component::ClusterRoleBinding(obj) => &obj.metadata,
            Component::Role(obj) => &obj.metadata,
            Component::RoleBinding(obj) => &obj.metadata,
            Component::ConfigMap(obj) => &obj.metadata,
            Component::DaemonSet(obj) => &obj.metadata,
            Component::Deployment(obj) => &obj.metadata,
            Component::Service(obj) => &obj.metadata,
            Component::SecurityContextConstraints(obj) => &obj.metadata,
        }
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Component::Namespace(obj) => &mut obj.metadata,
            Component::ServiceAccount(obj) => &mut obj.metadata,
            Component::ClusterRole(obj) => &mut obj.metadata,
            Component::ClusterRoleBinding(obj) => &mut obj.metadata,
            Component::Role(obj) => &mut obj.metadata,
            Component::RoleBinding(obj) => &mut obj.metadata,
            Component::ConfigMap(obj) => &mut obj.metadata,
            Component::DaemonSet(obj) => &mut obj.metadata,
            Component::Deployment(obj) => &mut obj.metadata,
            Component::Service(obj) => &mut obj.metadata,
            Component::SecurityContextConstraints(obj) => &mut obj.metadata,
        }
    }

    /// Object name.
    pub fn name(&self) -> String {
        self.meta().name.clone().unwrap_or_default()
    }

    /// Object namespace, if the kind is namespaced.
    pub fn namespace(&self) -> Option<String> {
        self.meta().namespace.clone()
    }

    fn is_namespaced(&self) -> bool {
        !matches!(
            self,
            Component::Namespace(_)
                | Component::ClusterRole(_)
                | Component::ClusterRoleBinding(_)
                | Component::SecurityContextConstraints(_)
        )
    }

    /// Pushes the desired object into the cluster (create or update).
    pub async fn apply<S: ResourceStore>(&self, store: &S) -> Result<(), StoreError> {
        match self {
            Component::Namespace(obj) => store.apply_cluster(obj).await,
            Component::ServiceAccount(obj) => store.apply_namespaced(obj).await,
            Component::ClusterRole(obj) => store.apply_cluster(obj).await,
            Component::ClusterRoleBinding(obj) => store.apply_cluster(obj).await,
            Component::Role(obj) => store.apply_namespaced(obj).await,
            Component::RoleBinding(obj) => store.apply_namespaced(obj).await,
            Component::ConfigMap(obj) => store.apply_namespaced(obj).await,
            Component::DaemonSet(obj) => store.apply_namespaced(obj).await,
            Component::Deployment(obj) => store.apply_namespaced(obj).await,
            Component::Service(obj) => store.apply_namespaced(obj).await,
            Component::SecurityContextConstraints(obj) => store.apply_cluster(obj).await,
        }
    }

    /// Removes the owned object from the cluster; absent objects are a
    /// success.
    #[allow(dead_code)] // Reserved for operand teardown
    pub async fn delete<S: ResourceStore>(&self, store: &S) -> Result<(), StoreError> {
        let name = self.name();
        let namespace = self.namespace().unwrap_or_default();
        match self {
            Component::Namespace(_) => store.delete_cluster::<Namespace>(&name).await,
            Component::ServiceAccount(_) => {
                store.delete_namespaced::<ServiceAccount>(&namespace, &name).await
            }
            Component::ClusterRole(_) => store.delete_cluster::<ClusterRole>(&name).await,
            Component::ClusterRoleBinding(_) => {
                store.delete_cluster::<ClusterRoleBinding>(&name).await
            }
            Component::Role(_) => store.delete_namespaced::<Role>(&namespace, &name).await,
            Component::RoleBinding(_) => {
                store.delete_namespaced::<RoleBinding>(&namespace, &name).await
            }
            Component::ConfigMap(_) => {
                store.delete_namespaced::<ConfigMap>(&namespace, &name).await
            }
            Component::DaemonSet(_) => {
                store.delete_namespaced::<DaemonSet>(&namespace, &name).await
            }
            Component::Deployment(_) => {
                store.delete_namespaced::<Deployment>(&namespace, &name).await
            }
            Component::Service(_) => store.delete_namespaced::<Service>(&namespace, &name).await,
            Component::SecurityContextConstraints(_) => {
                store.delete_cluster::<SecurityContextConstraints>(&name).await
            }
        }
    }
}

/// Instance parameters the manifest templates are seeded with.
#[derive(Debug, Clone)]
pub struct RenderParams {
    /// Namespace the operand workloads are created in
    pub operand_namespace: String,
    /// Instance label value, if set on the specification
    pub instance: Option<String>,
    /// Operand image override
    pub image: Option<String>,
    /// Operand image pull policy override
    pub image_pull_policy: Option<String>,
    /// Inline worker configuration override
    pub worker_config: Option<String>,
}

impl RenderParams {
    /// Derives render parameters from a NodeFeatureDiscovery instance.
    ///
    /// The operand namespace falls back to the namespace of the
    /// specification itself.
    pub fn from_spec(nfd: &NodeFeatureDiscovery) -> Self {
        Self {
            operand_namespace: nfd
                .spec
                .operand
                .namespace
                .clone()
                .or_else(|| nfd.metadata.namespace.clone())
                .unwrap_or_else(|| "default".to_string()),
            instance: nfd.spec.instance.clone(),
            image: nfd.spec.operand.image.clone(),
            image_pull_policy: nfd.spec.operand.image_pull_policy.clone(),
            worker_config: nfd
                .spec
                .worker_config
                .as_ref()
                .map(|cfg| cfg.config_data.clone()),
        }
    }
}

/// Reads every manifest file under `root` recursively, in lexical path
/// order. Each returned string is one file; files may hold several YAML
/// documents.
pub fn read_manifest_dir(root: &Path) -> Result<Vec<String>, ControllerError> {
    let mut files = Vec::new();
    collect_files(root, &mut files)?;
    files.sort();

    let mut contents = Vec::with_capacity(files.len());
    for path in files {
        contents.push(fs::read_to_string(&path)?);
    }
    Ok(contents)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), ControllerError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

/// Decodes raw manifest documents into the ordered component list.
///
/// The `kind` field is read structurally from the parsed document.
/// Documents of an unrecognized kind are logged and skipped; a document
/// with a missing or non-string `kind`, or one that fails to decode into
/// its typed object, fails the whole materialization.
pub fn materialize(
    docs: &[String],
    params: &RenderParams,
) -> Result<Vec<Component>, ControllerError> {
    let mut components = Vec::new();

    for raw in docs {
        for document in serde_yaml::Deserializer::from_str(raw) {
            let value = serde_yaml::Value::deserialize(document).map_err(|err| {
                ControllerError::ManifestParse(format!("invalid yaml document: {err}"))
            })?;
            if value.is_null() {
                continue;
            }

            let kind = match value.get("kind") {
                Some(kind) => kind
                    .as_str()
                    .map(ToString::to_string)
                    .ok_or_else(|| {
                        ControllerError::ManifestParse(
                            "document kind field is not a string".to_string(),
                        )
                    })?,
                None => {
                    return Err(ControllerError::ManifestParse(
                        "document has no kind field".to_string(),
                    ));
                }
            };

            let mut component = match kind.as_str() {
                "Namespace" => Component::Namespace(decode(value, &kind)?),
                "ServiceAccount" => Component::ServiceAccount(decode(value, &kind)?),
                "ClusterRole" => Component::ClusterRole(decode(value, &kind)?),
                "ClusterRoleBinding" => Component::ClusterRoleBinding(decode(value, &kind)?),
                "Role" => Component::Role(decode(value, &kind)?),
                "RoleBinding" => Component::RoleBinding(decode(value, &kind)?),
                "ConfigMap" => Component::ConfigMap(decode(value, &kind)?),
                "DaemonSet" => Component::DaemonSet(decode(value, &kind)?),
                "Deployment" => Component::Deployment(decode(value, &kind)?),
                "Service" => Component::Service(decode(value, &kind)?),
                "SecurityContextConstraints" => {
                    Component::SecurityContextConstraints(decode(value, &kind)?)
                }
                _ => {
                    warn!("Unrecognized kind in manifests: {}, skipping", kind);
                    continue;
                }
            };

            seed(&mut component, params);
            components.push(component);
        }
    }

    Ok(components)
}

fn decode<T: DeserializeOwned>(value: serde_yaml::Value, kind: &str) -> Result<T, ControllerError> {
    serde_yaml::from_value(value).map_err(|err| {
        ControllerError::ManifestParse(format!("failed to decode {kind} document: {err}"))
    })
}

/// Rewrites one decoded template with the instance parameters: the operand
/// namespace, the instance label, the worker configuration, and the operand
/// image for workload pods.
fn seed(component: &mut Component, params: &RenderParams) {
    if let Component::Namespace(ns) = component {
        ns.metadata.name = Some(params.operand_namespace.clone());
    }
    if component.is_namespaced() {
        component.meta_mut().namespace = Some(params.operand_namespace.clone());
    }
    if let Some(instance) = &params.instance {
        component
            .meta_mut()
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(INSTANCE_LABEL.to_string(), instance.clone());
    }

    match component {
        Component::ConfigMap(cm) => {
            if let Some(config) = &params.worker_config {
                cm.data
                    .get_or_insert_with(BTreeMap::new)
                    .insert(WORKER_CONFIG_KEY.to_string(), config.clone());
            }
        }
        Component::DaemonSet(ds) => {
            if let Some(spec) = &mut ds.spec {
                seed_pod_spec(spec.template.spec.as_mut(), params);
            }
        }
        Component::Deployment(dep) => {
            if let Some(spec) = &mut dep.spec {
                seed_pod_spec(spec.template.spec.as_mut(), params);
            }
        }
        Component::RoleBinding(rb) => {
            if let Some(subjects) = &mut rb.subjects {
                for subject in subjects {
                    subject.namespace = Some(params.operand_namespace.clone());
                }
            }
        }
        Component::ClusterRoleBinding(crb) => {
            if let Some(subjects) = &mut crb.subjects {
                for subject in subjects {
                    subject.namespace = Some(params.operand_namespace.clone());
                }
            }
        }
        _ => {}
    }
}

fn seed_pod_spec(pod_spec: Option<&mut PodSpec>, params: &RenderParams) {
    let Some(pod_spec) = pod_spec else {
        return;
    };
    for container in &mut pod_spec.containers {
        if let Some(image) = &params.image {
            container.image = Some(image.clone());
        }
        if let Some(policy) = &params.image_pull_policy {
            container.image_pull_policy = Some(policy.clone());
        }
    }
}
