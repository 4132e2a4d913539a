//! SecurityContextConstraints
//!
//! OpenShift API extension governing what security contexts the operand
//! pods may request. The kind is not part of k8s-openapi, so it is declared
//! here with a hand-written `kube::Resource` impl (cluster scoped).

use k8s_openapi::ClusterResourceScope;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Cluster-scoped security policy granted to the operand service accounts.
///
/// Only the fields the operator's policy manifests set are modeled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityContextConstraints {
    /// API group/version, fixed for this kind
    pub api_version: String,
    /// Kind discriminator, fixed for this kind
    pub kind: String,
    /// Standard object metadata
    pub metadata: ObjectMeta,
    /// Whether host directory volume plugins may be used
    pub allow_host_dir_volume_plugin: bool,
    /// Whether host IPC namespaces may be requested
    #[serde(rename = "allowHostIPC")]
    pub allow_host_ipc: bool,
    /// Whether host networking may be requested
    pub allow_host_network: bool,
    /// Whether the host PID namespace may be requested
    #[serde(rename = "allowHostPID")]
    pub allow_host_pid: bool,
    /// Whether host ports may be requested
    pub allow_host_ports: bool,
    /// Whether privileged containers may run
    pub allow_privileged_container: bool,
    /// Whether containers must run with a read-only root filesystem
    pub read_only_root_filesystem: bool,
    /// Capabilities dropped from every container
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_drop_capabilities: Vec<String>,
    /// UID strategy for containers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_as_user: Option<SccStrategyOptions>,
    /// SELinux context strategy for containers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub se_linux_context: Option<SccStrategyOptions>,
    /// Filesystem group strategy for containers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fs_group: Option<SccStrategyOptions>,
    /// Supplemental group strategy for containers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplemental_groups: Option<SccStrategyOptions>,
    /// Service accounts the policy is granted to
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
    /// Groups the policy is granted to
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    /// Volume types pods may mount
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
}

impl Default for SecurityContextConstraints {
    fn default() -> Self {
        Self {
            api_version: "security.openshift.io/v1".to_string(),
            kind: "SecurityContextConstraints".to_string(),
            metadata: ObjectMeta::default(),
            allow_host_dir_volume_plugin: false,
            allow_host_ipc: false,
            allow_host_network: false,
            allow_host_pid: false,
            allow_host_ports: false,
            allow_privileged_container: false,
            read_only_root_filesystem: false,
            required_drop_capabilities: Vec::new(),
            run_as_user: None,
            se_linux_context: None,
            fs_group: None,
            supplemental_groups: None,
            users: Vec::new(),
            groups: Vec::new(),
            volumes: Vec::new(),
        }
    }
}

/// Strategy selector shared by the user/group/SELinux policy fields.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SccStrategyOptions {
    /// Strategy name (e.g. "RunAsAny", "MustRunAs")
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub strategy_type: Option<String>,
}

impl Resource for SecurityContextConstraints {
    type DynamicType = ();
    type Scope = ClusterResourceScope;

    fn kind(_: &()) -> Cow<'_, str> {
        Cow::Borrowed("SecurityContextConstraints")
    }

    fn group(_: &()) -> Cow<'_, str> {
        Cow::Borrowed("security.openshift.io")
    }

    fn version(_: &()) -> Cow<'_, str> {
        Cow::Borrowed("v1")
    }

    fn plural(_: &()) -> Cow<'_, str> {
        Cow::Borrowed("securitycontextconstraints")
    }

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
