//! In-memory resource store for unit testing.
//!
//! Stores objects as JSON values keyed by (kind, namespace, name) and logs
//! every read and mutating call, so tests can assert on idempotence and
//! short-circuiting. Per-kind fault injection simulates API failures.

use crate::store::{ResourceStore, StoreError, value_is_subset};
use async_trait::async_trait;
use crds::StatusCondition;
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::Resource;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

/// (kind, namespace — empty for cluster scope, name)
pub type ObjectKey = (String, String, String);

/// Mock resource store for tests.
#[derive(Clone, Default)]
pub struct MockStore {
    objects: Arc<Mutex<BTreeMap<ObjectKey, serde_json::Value>>>,
    failing_kinds: Arc<Mutex<BTreeSet<String>>>,
    fail_status_updates: Arc<Mutex<bool>>,
    reads: Arc<Mutex<Vec<ObjectKey>>>,
    mutations: Arc<Mutex<Vec<ObjectKey>>>,
    status_updates: Arc<Mutex<u32>>,
}

impl MockStore {
    /// Creates an empty mock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an object to the store (for test setup).
    pub fn insert<K>(&self, obj: &K)
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let key = (
            K::kind(&()).to_string(),
            obj.meta().namespace.clone().unwrap_or_default(),
            obj.meta().name.clone().unwrap_or_default(),
        );
        let value = serde_json::to_value(obj).unwrap();
        self.objects.lock().unwrap().insert(key, value);
    }

    /// Removes an object from the store (for test setup).
    pub fn remove(&self, kind: &str, namespace: &str, name: &str) {
        self.objects.lock().unwrap().remove(&(
            kind.to_string(),
            namespace.to_string(),
            name.to_string(),
        ));
    }

    /// Overwrites the stored object's status subtree (for test setup).
    pub fn set_status(&self, kind: &str, namespace: &str, name: &str, status: serde_json::Value) {
        let mut objects = self.objects.lock().unwrap();
        if let Some(value) = objects.get_mut(&(
            kind.to_string(),
            namespace.to_string(),
            name.to_string(),
        )) {
            value["status"] = status;
        }
    }

    /// Makes every call touching `kind` fail.
    pub fn fail_kind(&self, kind: &str) {
        self.failing_kinds.lock().unwrap().insert(kind.to_string());
    }

    /// Makes every status write fail.
    pub fn fail_status_updates(&self) {
        *self.fail_status_updates.lock().unwrap() = true;
    }

    /// True when an object with this identity is stored.
    pub fn contains(&self, kind: &str, namespace: &str, name: &str) -> bool {
        self.objects.lock().unwrap().contains_key(&(
            kind.to_string(),
            namespace.to_string(),
            name.to_string(),
        ))
    }

    /// Every read issued so far, in order.
    pub fn reads(&self) -> Vec<ObjectKey> {
        self.reads.lock().unwrap().clone()
    }

    /// Every mutating apply/delete issued so far, in order. Status writes
    /// are counted separately.
    pub fn mutations(&self) -> Vec<ObjectKey> {
        self.mutations.lock().unwrap().clone()
    }

    /// Number of status writes that went through.
    pub fn status_update_count(&self) -> u32 {
        *self.status_updates.lock().unwrap()
    }

    /// Conditions currently stored on the NodeFeatureDiscovery object.
    pub fn stored_conditions(&self, namespace: &str, name: &str) -> Option<Vec<StatusCondition>> {
        let objects = self.objects.lock().unwrap();
        let value = objects.get(&(
            "NodeFeatureDiscovery".to_string(),
            namespace.to_string(),
            name.to_string(),
        ))?;
        let conditions = value.get("status")?.get("conditions")?;
        serde_json::from_value(conditions.clone()).ok()
    }

    fn check_fail(&self, kind: &str) -> Result<(), StoreError> {
        if self.failing_kinds.lock().unwrap().contains(kind) {
            return Err(StoreError::Backend(format!("injected failure for {kind}")));
        }
        Ok(())
    }

    fn get_value<K>(&self, namespace: &str, name: &str) -> Result<Option<serde_json::Value>, StoreError>
    where
        K: Resource<DynamicType = ()>,
    {
        let kind = K::kind(&()).to_string();
        self.check_fail(&kind)?;
        let key = (kind, namespace.to_string(), name.to_string());
        self.reads.lock().unwrap().push(key.clone());
        Ok(self.objects.lock().unwrap().get(&key).cloned())
    }

    fn apply_value<K>(&self, desired: &K, namespace: String) -> Result<(), StoreError>
    where
        K: Resource<DynamicType = ()> + Serialize,
    {
        let kind = K::kind(&()).to_string();
        self.check_fail(&kind)?;
        let name = desired
            .meta()
            .name
            .clone()
            .ok_or(StoreError::MissingMetadata("name"))?;
        let key = (kind, namespace, name);
        let desired_value = serde_json::to_value(desired)?;

        let mut objects = self.objects.lock().unwrap();
        if let Some(live) = objects.get(&key) {
            if value_is_subset(&desired_value, live) {
                return Ok(());
            }
        }
        objects.insert(key.clone(), desired_value);
        self.mutations.lock().unwrap().push(key);
        Ok(())
    }

    fn delete_value(&self, kind: String, namespace: String, name: String) -> Result<(), StoreError> {
        self.check_fail(&kind)?;
        let key = (kind, namespace, name);
        if self.objects.lock().unwrap().remove(&key).is_some() {
            self.mutations.lock().unwrap().push(key);
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for MockStore {
    async fn get_namespaced<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + DeserializeOwned
            + Clone
            + Debug
            + Send
            + 'static,
    {
        match self.get_value::<K>(namespace, name)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
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
        match self.get_value::<K>("", name)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
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
        self.apply_value(desired, namespace)
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
        self.apply_value(desired, String::new())
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
        self.delete_value(
            K::kind(&()).to_string(),
            namespace.to_string(),
            name.to_string(),
        )
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
        self.delete_value(K::kind(&()).to_string(), String::new(), name.to_string())
    }

    async fn update_status(
        &self,
        namespace: &str,
        name: &str,
        conditions: &[StatusCondition],
    ) -> Result<(), StoreError> {
        if *self.fail_status_updates.lock().unwrap() {
            return Err(StoreError::Backend(
                "injected status update failure".to_string(),
            ));
        }
        let key = (
            "NodeFeatureDiscovery".to_string(),
            namespace.to_string(),
            name.to_string(),
        );
        let mut objects = self.objects.lock().unwrap();
        let Some(value) = objects.get_mut(&key) else {
            return Err(StoreError::Backend(format!(
                "NodeFeatureDiscovery {namespace}/{name} not found"
            )));
        };
        value["status"] = serde_json::json!({ "conditions": conditions });
        *self.status_updates.lock().unwrap() += 1;
        Ok(())
    }
}
