//! NFD Operator
//!
//! Reconciles `NodeFeatureDiscovery` custom resources: materializes the
//! operand's owned objects (namespace, RBAC, config, workloads) from
//! manifest templates, pushes them into the cluster, and reports aggregated
//! health (Available / Progressing / Degraded) back onto the resource
//! status.

mod apply;
mod backoff;
mod conditions;
mod controller;
mod error;
mod manifests;
mod reconciler;
mod store;
mod watcher;

#[cfg(test)]
mod mock_store;
#[cfg(test)]
mod test_utils;

use crate::controller::Controller;
use crate::error::ControllerError;
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt::init();

    info!("Starting NFD Operator");

    // Load configuration from environment variables
    let manifests_dir = env::var("MANIFESTS_DIR").unwrap_or_else(|_| "/opt/nfd/manifests".to_string());
    let namespace = env::var("WATCH_NAMESPACE").ok();

    info!("Configuration:");
    info!("  Manifests directory: {}", manifests_dir);
    info!("  Namespace: {}", namespace.as_deref().unwrap_or("all namespaces"));

    // Initialize and run controller
    let controller = Controller::new(manifests_dir.into(), namespace).await?;
    controller.run().await?;

    Ok(())
}
