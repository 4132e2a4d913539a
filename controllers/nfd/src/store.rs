//! Resource store abstraction.
//!
//! Typed get/apply/delete operations against the cluster, split by resource
//! scope, plus the status write-back for the NodeFeatureDiscovery object.
//! The trait exists so reconciliation logic can run against an in-memory
//! mock in unit tests; `KubeStore` is the production implementation over a
//! `kube::Client`.
//!
//! All operations read or write live state; there is no local cache.

use async_trait::async_trait;
use crds::{NodeFeatureDiscovery, StatusCondition};
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::api::{DeleteParams, Patch, PatchParams};
use kube::{Api, Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use thiserror::Error;
use tracing::debug;

/// Field manager name used for server-side apply.
pub const FIELD_MANAGER: &str = "nfd-operator";

/// Errors at the resource store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Kubernetes API error
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),

    /// Serialization error while diffing or encoding an object
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A desired object is missing a piece of identifying metadata
    #[error("object has no {0} in metadata")]
    MissingMetadata(&'static str),

    /// Backend failure that is not a Kubernetes API error
    #[error("store backend error: {0}")]
    #[allow(dead_code)] // Constructed by the mock store's fault injection
    Backend(String),
}

/// Typed access to owned cluster objects and the specification status.
///
/// "Not found" is a distinguished `Ok(None)` value on reads and a success
/// on deletes, never an error.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetches a namespaced object by name.
    async fn get_namespaced<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + DeserializeOwned
            + Clone
            + Debug
            + Send
            + 'static;

    /// Fetches a cluster-scoped object by name.
    async fn get_cluster<K>(&self, name: &str) -> Result<Option<K>, StoreError>
    where
        K: Resource<Scope = ClusterResourceScope, DynamicType = ()>
            + DeserializeOwned
            + Clone
            + Debug
            + Send
            + 'static;

    /// Creates or updates a namespaced object to match `desired`.
    ///
    /// Issues no mutating call when the desired document is already a
    /// subset of the live object.
    async fn apply_namespaced<K>(&self, desired: &K) -> Result<(), StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Serialize
            + DeserializeOwned
            + Clone
            + Debug
            + Send
            + Sync
            + 'static;

    /// Creates or updates a cluster-scoped object to match `desired`.
    async fn apply_cluster<K>(&self, desired: &K) -> Result<(), StoreError>
    where
        K: Resource<Scope = ClusterResourceScope, DynamicType = ()>
            + Serialize
            + DeserializeOwned
            + Clone
            + Debug
            + Send
            + Sync
            + 'static;

    /// Deletes a namespaced object; deleting an absent object is a success.
    #[allow(dead_code)] // Reserved for operand teardown
    async fn delete_namespaced<K>(&self, namespace: &str, name: &str) -> Result<(), StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + DeserializeOwned
            + Clone
            + Debug
            + Send
            + 'static;

    /// Deletes a cluster-scoped object; deleting an absent object is a success.
    #[allow(dead_code)] // Reserved for operand teardown
    async fn delete_cluster<K>(&self, name: &str) -> Result<(), StoreError>
    where
        K: Resource<Scope = ClusterResourceScope, DynamicType = ()>
            + DeserializeOwned
            + Clone
            + Debug
            + Send
            + 'static;

    /// Writes aggregated conditions onto the specification's status
    /// subresource.
    async fn update_status(
        &self,
        namespace: &str,
        name: &str,
        conditions: &[StatusCondition],
    ) -> Result<(), StoreError>;
}

/// Production resource store over a Kubernetes client.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Creates a store over the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

/// True when every field `desired` sets is present with the same value in
/// `live`. Server-populated fields (defaults, status, resourceVersion) on
/// the live object do not count as divergence.
pub(crate) fn value_is_subset(desired: &serde_json::Value, live: &serde_json::Value) -> bool {
    match (desired, live) {
        (serde_json::Value::Object(desired), serde_json::Value::Object(live)) => {
            desired.iter().all(|(key, desired_value)| {
                live.get(key)
                    .is_some_and(|live_value| value_is_subset(desired_value, live_value))
            })
        }
        (desired, live) => desired == live,
    }
}

fn desired_matches_live<K: Serialize>(desired: &K, live: &K) -> Result<bool, StoreError> {
    let desired = serde_json::to_value(desired)?;
    let live = serde_json::to_value(live)?;
    Ok(value_is_subset(&desired, &live))
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get_namespaced<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + DeserializeOwned
            + Clone
            + Debug
            + Send
            + 'static,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(StoreError::Kube(err)),
        }
    }

    async fn get_cluster<K>(&self, name: &str) -> Result<Option<K>, StoreError>
    where
        K: Resource<Scope = ClusterResourceScope, DynamicType = ()>
            + DeserializeOwned
            + Clone
            + Debug
            + Send
            + 'static,
    {
        let api: Api<K> = Api::all(self.client.clone());
        match api.get(name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(StoreError::Kube(err)),
        }
    }

    async fn apply_namespaced<K>(&self, desired: &K) -> Result<(), StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Serialize
            + DeserializeOwned
            + Clone
            + Debug
            + Send
            + Sync
            + 'static,
    {
        let namespace = desired
            .meta()
            .namespace
            .clone()
            .ok_or(StoreError::MissingMetadata("namespace"))?;
        let name = desired
            .meta()
            .name
            .clone()
            .ok_or(StoreError::MissingMetadata("name"))?;
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);

        let live = match api.get(&name).await {
            Ok(obj) => Some(obj),
            Err(err) if is_not_found(&err) => None,
            Err(err) => return Err(StoreError::Kube(err)),
        };
        if let Some(live) = &live {
            if desired_matches_live(desired, live)? {
                debug!(
                    "{} {}/{} already up-to-date, skipping apply",
                    K::kind(&()),
                    namespace,
                    name
                );
                return Ok(());
            }
        }

        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(&name, &params, &Patch::Apply(desired)).await?;
        Ok(())
    }

    async fn apply_cluster<K>(&self, desired: &K) -> Result<(), StoreError>
    where
        K: Resource<Scope = ClusterResourceScope, DynamicType = ()>
            + Serialize
            + DeserializeOwned
            + Clone
            + Debug
            + Send
            + Sync
            + 'static,
    {
        let name = desired
            .meta()
            .name
            .clone()
            .ok_or(StoreError::MissingMetadata("name"))?;
        let api: Api<K> = Api::all(self.client.clone());

        let live = match api.get(&name).await {
            Ok(obj) => Some(obj),
            Err(err) if is_not_found(&err) => None,
            Err(err) => return Err(StoreError::Kube(err)),
        };
        if let Some(live) = &live {
            if desired_matches_live(desired, live)? {
                debug!("{} {} already up-to-date, skipping apply", K::kind(&()), name);
                return Ok(());
            }
        }

        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(&name, &params, &Patch::Apply(desired)).await?;
        Ok(())
    }

    async fn delete_namespaced<K>(&self, namespace: &str, name: &str) -> Result<(), StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + DeserializeOwned
            + Clone
            + Debug
            + Send
            + 'static,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            // Do not return an error if the object has already been deleted
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(StoreError::Kube(err)),
        }
    }

    async fn delete_cluster<K>(&self, name: &str) -> Result<(), StoreError>
    where
        K: Resource<Scope = ClusterResourceScope, DynamicType = ()>
            + DeserializeOwned
            + Clone
            + Debug
            + Send
            + 'static,
    {
        let api: Api<K> = Api::all(self.client.clone());
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            // Do not return an error if the object has already been deleted
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(StoreError::Kube(err)),
        }
    }

    async fn update_status(
        &self,
        namespace: &str,
        name: &str,
        conditions: &[StatusCondition],
    ) -> Result<(), StoreError> {
        let api: Api<NodeFeatureDiscovery> = Api::namespaced(self.client.clone(), namespace);
        let status_patch = serde_json::json!({
            "status": {
                "conditions": conditions,
            }
        });
        let pp = PatchParams::default();
        api.patch_status(name, &pp, &Patch::Merge(&status_patch))
            .await?;
        Ok(())
    }
}
