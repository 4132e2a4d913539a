//! Status condition types
//!
//! The operator folds per-resource readiness into three mutually exclusive
//! top-level conditions written to the NodeFeatureDiscovery status.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Top-level health state of a deployment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionType {
    /// All owned objects are present and rolled out
    Available,

    /// A workload rollout is still converging
    Progressing,

    /// An owned object is missing, failed to apply, or failed to parse
    Degraded,
}

/// Condition truth value, serialized the Kubernetes way ("True"/"False")
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// The condition holds
    True,

    /// The condition does not hold
    False,
}

/// One entry in the status condition list.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusCondition {
    /// Condition type
    #[serde(rename = "type")]
    pub condition_type: ConditionType,

    /// Whether the condition currently holds
    pub status: ConditionStatus,

    /// Machine-readable reason for the last transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// When the condition last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}
