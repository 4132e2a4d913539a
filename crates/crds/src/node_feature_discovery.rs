//! NodeFeatureDiscovery CRD
//!
//! Desired state of one feature-discovery deployment: where the operand
//! workloads run, which image they use, and the worker configuration.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::conditions::StatusCondition;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "nfd.kubernetes.io",
    version = "v1",
    kind = "NodeFeatureDiscovery",
    namespaced,
    status = "NodeFeatureDiscoveryStatus",
    shortname = "nfd"
)]
#[serde(rename_all = "camelCase")]
pub struct NodeFeatureDiscoverySpec {
    /// Operand deployment parameters
    #[serde(default)]
    pub operand: OperandSpec,

    /// Instance label applied to every owned object, used to tell
    /// multiple deployments apart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,

    /// Inline configuration for the worker daemon set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_config: Option<WorkerConfig>,
}

/// Where and how the operand workloads run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct OperandSpec {
    /// Namespace the operand workloads are created in
    ///
    /// Defaults to the namespace of the NodeFeatureDiscovery object itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Operand container image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Image pull policy for the operand containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,
}

/// Worker configuration mounted into the worker pods.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    /// Raw configuration file contents for the worker config map
    pub config_data: String,
}

/// Observed state, written only by the operator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct NodeFeatureDiscoveryStatus {
    /// Aggregated health conditions (Available, Progressing, Degraded)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<StatusCondition>,
}
