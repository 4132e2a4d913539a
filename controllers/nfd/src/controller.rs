//! Main controller implementation.
//!
//! Wires the Kubernetes client, the resource store, and the reconciler
//! together, then hands off to the watcher for the lifetime of the process.

use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::store::KubeStore;
use crate::watcher;
use kube::Client;
use std::path::PathBuf;
use tracing::info;

/// Main controller for NodeFeatureDiscovery management.
pub struct Controller {
    client: Client,
    reconciler: Reconciler<KubeStore>,
    namespace: Option<String>,
}

impl Controller {
    /// Creates a new controller instance.
    pub async fn new(
        manifests_dir: PathBuf,
        namespace: Option<String>,
    ) -> Result<Self, ControllerError> {
        info!("Initializing NFD controller");

        let client = Client::try_default().await?;
        let store = KubeStore::new(client.clone());
        let reconciler = Reconciler::new(store, manifests_dir);

        Ok(Self {
            client,
            reconciler,
            namespace,
        })
    }

    /// Runs the controller until the watch stream ends.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("NFD controller running");
        watcher::watch_node_feature_discoveries(
            self.client,
            self.reconciler,
            self.namespace.as_deref(),
        )
        .await
    }
}
