//! Controller-specific error types.
//!
//! This module defines the error taxonomy of the reconciliation engine.
//! Store-boundary failures live in [`crate::store::StoreError`]; everything
//! the orchestrator can surface to the host lives here.

use crate::store::StoreError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the NFD controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Resource store error outside a specific component apply
    #[error("resource store error: {0}")]
    Store(#[from] StoreError),

    /// Manifest directory could not be read
    #[error("failed to read manifests: {0}")]
    ManifestRead(#[from] std::io::Error),

    /// A manifest document is malformed or failed to decode
    #[error("manifest parse error: {0}")]
    ManifestParse(String),

    /// Applying one owned component failed; the apply cursor does not
    /// advance past the failing component
    #[error("failed to apply {kind} {name}: {source}")]
    Apply {
        /// Kind of the component that failed to apply
        kind: &'static str,
        /// Name of the component that failed to apply
        name: String,
        /// Underlying store failure
        #[source]
        source: StoreError,
    },

    /// Writing aggregated conditions back to the specification failed
    #[error("failed to update status: {0}")]
    StatusUpdate(#[source] StoreError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    #[allow(dead_code)] // Reserved for future use
    Watch(String),
}
