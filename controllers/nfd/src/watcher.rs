//! Kubernetes resource watcher.
//!
//! Runs the reconcile loop with `kube_runtime::Controller`: one watch on
//! the NodeFeatureDiscovery CRD plus child watches on the namespaced owned
//! kinds, with automatic reconnection and retry handling. The controller
//! debounces bursts of owned-object events so one rollout does not trigger
//! a pass per pod.

use crate::backoff::FibonacciBackoff;
use crate::error::ControllerError;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::store::KubeStore;
use crds::NodeFeatureDiscovery;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use kube::{Api, Client};
use kube_runtime::{
    Controller,
    controller::{Action, Config as ControllerConfig},
    watcher,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Shared state for the reconcile closures.
pub struct Context {
    reconciler: Reconciler<KubeStore>,
    /// Requeue pacing per specification identity
    backoffs: Mutex<HashMap<String, FibonacciBackoff>>,
}

/// Update-event gate for owned objects: an event that does not carry both
/// the previous and the current object state has no delta to act on and
/// must not trigger a pass.
#[allow(dead_code)] // Consumed by hosts that surface raw update event pairs
pub fn update_event_has_delta<K>(old: Option<&K>, new: Option<&K>) -> bool {
    if old.is_none() {
        warn!("Update event has no old object state, suppressing");
        return false;
    }
    if new.is_none() {
        warn!("Update event has no new object state, suppressing");
        return false;
    }
    true
}

async fn reconcile(
    nfd: Arc<NodeFeatureDiscovery>,
    ctx: Arc<Context>,
) -> Result<Action, ControllerError> {
    let name = nfd.metadata.name.as_ref().ok_or_else(|| {
        ControllerError::InvalidConfig("NodeFeatureDiscovery missing name".to_string())
    })?;
    let namespace = nfd.metadata.namespace.as_deref().unwrap_or("default");
    let key = format!("{namespace}/{name}");

    match ctx.reconciler.reconcile(namespace, name).await? {
        ReconcileOutcome::Steady => {
            if let Ok(mut backoffs) = ctx.backoffs.lock() {
                if let Some(backoff) = backoffs.get_mut(&key) {
                    backoff.reset();
                }
            }
            Ok(Action::await_change())
        }
        ReconcileOutcome::Retry => {
            let delay = match ctx.backoffs.lock() {
                Ok(mut backoffs) => backoffs
                    .entry(key.clone())
                    .or_insert_with(|| FibonacciBackoff::new(5, 300))
                    .next_backoff(),
                Err(err) => {
                    warn!("Failed to lock backoff table: {}, using default delay", err);
                    Duration::from_secs(60)
                }
            };
            debug!("Requeueing NodeFeatureDiscovery {} in {:?}", key, delay);
            Ok(Action::requeue(delay))
        }
    }
}

fn error_policy(
    nfd: Arc<NodeFeatureDiscovery>,
    error: &ControllerError,
    _ctx: Arc<Context>,
) -> Action {
    error!(
        "Reconciliation error for NodeFeatureDiscovery {:?}: {}",
        nfd.metadata.name, error
    );
    Action::requeue(Duration::from_secs(60))
}

/// Watches NodeFeatureDiscovery objects (and the owned kinds) until the
/// stream ends.
pub async fn watch_node_feature_discoveries(
    client: Client,
    reconciler: Reconciler<KubeStore>,
    namespace: Option<&str>,
) -> Result<(), ControllerError> {
    info!("Starting NodeFeatureDiscovery watcher");

    let nfd_api: Api<NodeFeatureDiscovery> = match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };
    let ctx = Arc::new(Context {
        reconciler,
        backoffs: Mutex::new(HashMap::new()),
    });

    // Debounce batches owned-object events; concurrency bounds parallel
    // passes across specification identities (passes for one identity are
    // always serialized by the controller).
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(3);

    Controller::new(nfd_api, watcher::Config::default())
        .owns(
            Api::<ServiceAccount>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(Api::<Role>::all(client.clone()), watcher::Config::default())
        .owns(
            Api::<RoleBinding>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(
            Api::<Service>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(
            Api::<ConfigMap>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(
            Api::<DaemonSet>::all(client.clone()),
            watcher::Config::default(),
        )
        .with_config(controller_config)
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            if let Err(err) = result {
                error!("Controller error for NodeFeatureDiscovery: {}", err);
            }
        })
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::update_event_has_delta;

    #[test]
    fn update_with_both_states_triggers() {
        assert!(update_event_has_delta(Some(&1), Some(&2)));
    }

    #[test]
    fn update_missing_old_state_is_suppressed() {
        assert!(!update_event_has_delta::<i32>(None, Some(&2)));
    }

    #[test]
    fn update_missing_new_state_is_suppressed() {
        assert!(!update_event_has_delta::<i32>(Some(&1), None));
    }
}
