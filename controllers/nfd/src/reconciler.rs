//! Reconciliation logic for NodeFeatureDiscovery objects.
//!
//! One pass: fetch the specification, materialize the component list from
//! the manifest templates, drive the apply state machine to completion,
//! evaluate the live state of every owned object, and write the aggregated
//! condition back to the specification's status.
//!
//! Passes are re-entrant from scratch; the only state carried between
//! invocations is what is reconstructed from live cluster state.

use crate::apply::ApplyStateMachine;
use crate::conditions::{
    Health, aggregate, available_conditions, conditions_equal_ignoring_time, degraded_conditions,
    progressing_conditions,
};
use crate::error::ControllerError;
use crate::manifests::{Component, RenderParams, materialize, read_manifest_dir};
use crate::store::ResourceStore;
use crds::NodeFeatureDiscovery;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// What the host scheduler should do after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Converged (or the specification is gone); wait for the next change
    Steady,
    /// Not converged yet; run another pass after a delay
    Retry,
}

/// Reconciles NodeFeatureDiscovery objects against the manifest templates.
pub struct Reconciler<S> {
    store: S,
    manifests_dir: PathBuf,
}

impl<S: ResourceStore> Reconciler<S> {
    /// Creates a reconciler reading templates from `manifests_dir`.
    pub fn new(store: S, manifests_dir: PathBuf) -> Self {
        Self {
            store,
            manifests_dir,
        }
    }

    /// Runs one reconciliation pass for the given specification identity.
    pub async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileOutcome, ControllerError> {
        info!("Reconciling NodeFeatureDiscovery {}/{}", namespace, name);

        let Some(instance) = self
            .store
            .get_namespaced::<NodeFeatureDiscovery>(namespace, name)
            .await?
        else {
            // Owned objects are garbage collected by the platform; nothing
            // left for this pass to do.
            info!(
                "NodeFeatureDiscovery {}/{} has been deleted, not requeueing",
                namespace, name
            );
            return Ok(ReconcileOutcome::Steady);
        };

        let params = RenderParams::from_spec(&instance);
        let components = match self.load_components(&params) {
            Ok(components) => components,
            Err(err) => {
                warn!(
                    "Manifest materialization failed for {}/{}: {}",
                    namespace, name, err
                );
                return self
                    .write_conditions(
                        &instance,
                        degraded_conditions("FailedLoadingManifests", &err.to_string()),
                        ReconcileOutcome::Retry,
                    )
                    .await;
            }
        };

        info!("Ready to apply {} components", components.len());
        let mut machine = ApplyStateMachine::new(components);
        while !machine.last() {
            if let Err(err) = machine.step(&self.store).await {
                warn!(
                    "Component apply halted for {}/{} at cursor {}: {}",
                    namespace,
                    name,
                    machine.cursor(),
                    err
                );
                return self
                    .write_conditions(
                        &instance,
                        degraded_conditions("ComponentApplyFailed", &err.to_string()),
                        ReconcileOutcome::Retry,
                    )
                    .await;
            }
        }

        let (conditions, outcome) = match aggregate(&self.store, machine.components()).await {
            Health::Available => (available_conditions(), ReconcileOutcome::Steady),
            Health::Progressing { reason, message } => {
                info!(
                    "NodeFeatureDiscovery {}/{} progressing: {}",
                    namespace, name, message
                );
                (
                    progressing_conditions(&reason, &message),
                    ReconcileOutcome::Retry,
                )
            }
            Health::Degraded { reason, message } => {
                warn!(
                    "NodeFeatureDiscovery {}/{} degraded: {}",
                    namespace, name, message
                );
                (
                    degraded_conditions(&reason, &message),
                    ReconcileOutcome::Retry,
                )
            }
        };

        self.write_conditions(&instance, conditions, outcome).await
    }

    fn load_components(&self, params: &RenderParams) -> Result<Vec<Component>, ControllerError> {
        let docs = read_manifest_dir(&self.manifests_dir)?;
        materialize(&docs, params)
    }

    /// Persists the condition list unless the instance already carries an
    /// equivalent one, then returns the pass outcome. A failed write is a
    /// retry-requested failure; already-applied objects stay applied.
    async fn write_conditions(
        &self,
        instance: &NodeFeatureDiscovery,
        conditions: Vec<crds::StatusCondition>,
        outcome: ReconcileOutcome,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let namespace = instance.metadata.namespace.as_deref().unwrap_or("default");
        let name = instance.metadata.name.as_deref().unwrap_or_default();

        let current = instance
            .status
            .as_ref()
            .map(|status| status.conditions.as_slice())
            .unwrap_or_default();
        if conditions_equal_ignoring_time(current, &conditions) {
            debug!(
                "NodeFeatureDiscovery {}/{} already has these conditions, skipping status update",
                namespace, name
            );
            return Ok(outcome);
        }

        self.store
            .update_status(namespace, name, &conditions)
            .await
            .map_err(ControllerError::StatusUpdate)?;
        Ok(outcome)
    }
}
