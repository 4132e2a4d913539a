//! Condition evaluation.
//!
//! Inspects the live state of every owned object and folds the per-resource
//! snapshots into one of the three mutually exclusive top-level conditions
//! (Available, Progressing, Degraded) written back to the
//! NodeFeatureDiscovery status.

use crate::manifests::Component;
use crate::store::{ResourceStore, StoreError};
use chrono::Utc;
use crds::{ConditionStatus, ConditionType, SecurityContextConstraints, StatusCondition};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::Resource;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// Condition reason reported when every owned object is healthy.
pub const REASON_AVAILABLE: &str = "AllComponentsAvailable";

/// Per-resource readiness snapshot, never persisted.
#[derive(Debug, Clone)]
pub struct ResourceStatus {
    /// Object present and, for workloads, fully rolled out
    pub is_available: bool,
    /// Workload rollout still converging
    pub is_progressing: bool,
    /// Object missing or unreadable
    pub is_degraded: bool,
    /// Explanatory detail for a non-available snapshot
    pub message: Option<String>,
}

impl ResourceStatus {
    fn available() -> Self {
        Self {
            is_available: true,
            is_progressing: false,
            is_degraded: false,
            message: None,
        }
    }

    fn progressing(message: String) -> Self {
        Self {
            is_available: false,
            is_progressing: true,
            is_degraded: false,
            message: Some(message),
        }
    }

    fn degraded(message: String) -> Self {
        Self {
            is_available: false,
            is_progressing: false,
            is_degraded: true,
            message: Some(message),
        }
    }
}

/// Aggregated top-level health of one specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    /// Every evaluated component is healthy
    Available,
    /// The first unhealthy component is still rolling out
    Progressing {
        /// Machine-readable reason naming the component kind
        reason: String,
        /// Rollout detail
        message: String,
    },
    /// The first unhealthy component is missing or unreadable
    Degraded {
        /// Machine-readable reason naming the component kind
        reason: String,
        /// Failure detail
        message: String,
    },
}

/// Position of a component in the fixed evaluation order, or `None` for
/// kinds that are applied but not health-checked (namespace, security
/// policy). Components of equal rank keep their materialization order, so
/// the worker daemon set is checked before the master one.
fn evaluation_rank(component: &Component) -> Option<u8> {
    match component {
        Component::ServiceAccount(_) => Some(0),
        Component::Role(_) => Some(1),
        Component::ClusterRole(_) => Some(2),
        Component::ClusterRoleBinding(_) => Some(3),
        Component::RoleBinding(_) => Some(4),
        Component::Service(_) => Some(5),
        Component::ConfigMap(_) => Some(6),
        Component::DaemonSet(_) => Some(7),
        Component::Deployment(_) => Some(8),
        Component::Namespace(_) | Component::SecurityContextConstraints(_) => None,
    }
}

/// Evaluates components in the fixed priority order and short-circuits on
/// the first degraded or progressing snapshot; that snapshot's state
/// becomes the top-level condition. All healthy means Available.
pub async fn aggregate<S: ResourceStore>(store: &S, components: &[Component]) -> Health {
    let mut ranked: Vec<(u8, &Component)> = components
        .iter()
        .filter_map(|component| evaluation_rank(component).map(|rank| (rank, component)))
        .collect();
    ranked.sort_by_key(|(rank, _)| *rank);

    for (_, component) in ranked {
        let status = evaluate_component(store, component).await;
        if status.is_available {
            tracing::debug!("{} {} is healthy", component.kind(), component.name());
            continue;
        }
        if status.is_degraded {
            return Health::Degraded {
                reason: format!("{}Degraded", component.kind()),
                message: status.message.unwrap_or_default(),
            };
        }
        if status.is_progressing {
            return Health::Progressing {
                reason: format!("{}Progressing", component.kind()),
                message: status.message.unwrap_or_default(),
            };
        }
    }

    Health::Available
}

/// Computes the readiness snapshot for one owned object from its live
/// state. Simple kinds are existence checks; workloads get rollout
/// arithmetic.
pub async fn evaluate_component<S: ResourceStore>(store: &S, component: &Component) -> ResourceStatus {
    let name = component.name();
    let namespace = component.namespace().unwrap_or_default();
    match component {
        Component::Namespace(_) => exists_cluster::<Namespace, S>(store, "Namespace", &name).await,
        Component::ServiceAccount(_) => {
            exists_namespaced::<ServiceAccount, S>(store, "ServiceAccount", &namespace, &name).await
        }
        Component::ClusterRole(_) => {
            exists_cluster::<ClusterRole, S>(store, "ClusterRole", &name).await
        }
        Component::ClusterRoleBinding(_) => {
            exists_cluster::<ClusterRoleBinding, S>(store, "ClusterRoleBinding", &name).await
        }
        Component::Role(_) => exists_namespaced::<Role, S>(store, "Role", &namespace, &name).await,
        Component::RoleBinding(_) => {
            exists_namespaced::<RoleBinding, S>(store, "RoleBinding", &namespace, &name).await
        }
        Component::ConfigMap(_) => {
            exists_namespaced::<ConfigMap, S>(store, "ConfigMap", &namespace, &name).await
        }
        Component::Service(_) => {
            exists_namespaced::<Service, S>(store, "Service", &namespace, &name).await
        }
        Component::SecurityContextConstraints(_) => {
            exists_cluster::<SecurityContextConstraints, S>(
                store,
                "SecurityContextConstraints",
                &name,
            )
            .await
        }
        Component::DaemonSet(_) => evaluate_daemon_set(store, &namespace, &name).await,
        Component::Deployment(_) => evaluate_deployment(store, &namespace, &name).await,
    }
}

async fn exists_namespaced<K, S>(
    store: &S,
    kind: &str,
    namespace: &str,
    name: &str,
) -> ResourceStatus
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + DeserializeOwned
        + Clone
        + Debug
        + Send
        + 'static,
    S: ResourceStore,
{
    match store.get_namespaced::<K>(namespace, name).await {
        Ok(Some(_)) => ResourceStatus::available(),
        Ok(None) => ResourceStatus::degraded(format!("{kind} {namespace}/{name} not found")),
        Err(err) => ResourceStatus::degraded(failed_get(kind, namespace, name, &err)),
    }
}

async fn exists_cluster<K, S>(store: &S, kind: &str, name: &str) -> ResourceStatus
where
    K: Resource<Scope = ClusterResourceScope, DynamicType = ()>
        + DeserializeOwned
        + Clone
        + Debug
        + Send
        + 'static,
    S: ResourceStore,
{
    match store.get_cluster::<K>(name).await {
        Ok(Some(_)) => ResourceStatus::available(),
        Ok(None) => ResourceStatus::degraded(format!("{kind} {name} not found")),
        Err(err) => ResourceStatus::degraded(format!("failed to get {kind} {name}: {err}")),
    }
}

fn failed_get(kind: &str, namespace: &str, name: &str, err: &StoreError) -> String {
    format!("failed to get {kind} {namespace}/{name}: {err}")
}

async fn evaluate_daemon_set<S: ResourceStore>(
    store: &S,
    namespace: &str,
    name: &str,
) -> ResourceStatus {
    let live: Option<DaemonSet> = match store.get_namespaced(namespace, name).await {
        Ok(live) => live,
        Err(err) => {
            return ResourceStatus::degraded(failed_get("DaemonSet", namespace, name, &err));
        }
    };
    let Some(live) = live else {
        return ResourceStatus::degraded(format!("DaemonSet {namespace}/{name} not found"));
    };
    let Some(status) = &live.status else {
        return ResourceStatus::progressing(format!(
            "DaemonSet {namespace}/{name} has not reported rollout status"
        ));
    };

    let desired = status.desired_number_scheduled;
    let updated = status.updated_number_scheduled.unwrap_or(0);
    let available = status.number_available.unwrap_or(0);
    if updated < desired || available < desired {
        return ResourceStatus::progressing(format!(
            "DaemonSet {namespace}/{name} rollout in progress: {updated}/{desired} updated, {available}/{desired} available"
        ));
    }
    ResourceStatus::available()
}

async fn evaluate_deployment<S: ResourceStore>(
    store: &S,
    namespace: &str,
    name: &str,
) -> ResourceStatus {
    let live: Option<Deployment> = match store.get_namespaced(namespace, name).await {
        Ok(live) => live,
        Err(err) => {
            return ResourceStatus::degraded(failed_get("Deployment", namespace, name, &err));
        }
    };
    let Some(live) = live else {
        return ResourceStatus::degraded(format!("Deployment {namespace}/{name} not found"));
    };
    let desired = live.spec.as_ref().and_then(|spec| spec.replicas).unwrap_or(1);
    let Some(status) = &live.status else {
        return ResourceStatus::progressing(format!(
            "Deployment {namespace}/{name} has not reported rollout status"
        ));
    };

    let updated = status.updated_replicas.unwrap_or(0);
    let available = status.available_replicas.unwrap_or(0);
    if updated < desired || available < desired {
        return ResourceStatus::progressing(format!(
            "Deployment {namespace}/{name} rollout in progress: {updated}/{desired} updated, {available}/{desired} available"
        ));
    }
    ResourceStatus::available()
}

/// Builds the full condition list with exactly one active condition.
fn condition_set(
    active: ConditionType,
    reason: &str,
    message: Option<&str>,
) -> Vec<StatusCondition> {
    let now = Utc::now();
    [
        ConditionType::Available,
        ConditionType::Progressing,
        ConditionType::Degraded,
    ]
    .into_iter()
    .map(|condition_type| {
        let is_active = condition_type == active;
        StatusCondition {
            condition_type,
            status: if is_active {
                ConditionStatus::True
            } else {
                ConditionStatus::False
            },
            reason: is_active.then(|| reason.to_string()),
            message: if is_active {
                message.map(ToString::to_string)
            } else {
                None
            },
            last_transition_time: Some(now),
        }
    })
    .collect()
}

/// Conditions for a fully healthy deployment.
pub fn available_conditions() -> Vec<StatusCondition> {
    condition_set(ConditionType::Available, REASON_AVAILABLE, None)
}

/// Conditions for a deployment whose workload rollout is converging.
pub fn progressing_conditions(reason: &str, message: &str) -> Vec<StatusCondition> {
    condition_set(ConditionType::Progressing, reason, Some(message))
}

/// Conditions for a deployment with a missing or failed component.
pub fn degraded_conditions(reason: &str, message: &str) -> Vec<StatusCondition> {
    condition_set(ConditionType::Degraded, reason, Some(message))
}

/// Compares condition lists ignoring transition timestamps, so an unchanged
/// outcome does not churn the status subresource every pass.
pub fn conditions_equal_ignoring_time(
    current: &[StatusCondition],
    desired: &[StatusCondition],
) -> bool {
    current.len() == desired.len()
        && current.iter().zip(desired).all(|(current, desired)| {
            current.condition_type == desired.condition_type
                && current.status == desired.status
                && current.reason == desired.reason
                && current.message == desired.message
        })
}
