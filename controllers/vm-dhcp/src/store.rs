//! Resource store abstraction
//!
//! The reconciler only needs a handful of operations against the cluster:
//! a cache read of the network-config resource, create / update /
//! update-status writes, a VM update and a re-enqueue request. They are
//! expressed as the [`ResourceStore`] trait so the reconciler can run
//! against [`KubeStore`] in production and an in-memory double in tests.
//!
//! Optimistic-concurrency conflicts are returned as errors; retrying them is
//! left to the controller runtime.

use crds::{IPPool, NetworkAttachmentDefinition, VirtualMachine, VirtualMachineNetworkConfig};
use ipam::NetworkCache;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use kube_runtime::reflector::{ObjectRef, Store};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// Failure writing to the resource store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Kube(#[from] kube::Error),

    #[error("{0}")]
    Serialization(#[from] serde_json::Error),

    /// Write refused by the backing store (conflict, validation, ...)
    #[error("{0}")]
    Rejected(String),
}

impl StoreError {
    /// Separates optimistic-concurrency and admission refusals from
    /// transport failures.
    fn from_kube(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(resp) if resp.code == 409 || resp.code == 422 || resp.code == 403 => {
                Self::Rejected(resp.message)
            }
            other => Self::Kube(other),
        }
    }
}

/// Operations the VM reconciler performs against the cluster.
#[async_trait::async_trait]
pub trait ResourceStore: Send + Sync {
    /// Cached network config for a VM, `None` if it does not exist
    fn get_network_config(&self, namespace: &str, name: &str) -> Option<Arc<VirtualMachineNetworkConfig>>;

    async fn create_network_config(
        &self,
        config: &VirtualMachineNetworkConfig,
    ) -> Result<VirtualMachineNetworkConfig, StoreError>;

    /// Replaces the spec; status is left untouched
    async fn update_network_config(
        &self,
        config: &VirtualMachineNetworkConfig,
    ) -> Result<VirtualMachineNetworkConfig, StoreError>;

    /// Writes only the status subresource
    async fn update_network_config_status(
        &self,
        config: &VirtualMachineNetworkConfig,
    ) -> Result<VirtualMachineNetworkConfig, StoreError>;

    async fn update_virtual_machine(&self, vm: &VirtualMachine) -> Result<VirtualMachine, StoreError>;

    /// Requests another reconciliation pass for the VM
    fn enqueue_virtual_machine(&self, namespace: &str, name: &str);
}

/// Reflector caches the controller reads from
#[derive(Clone)]
pub struct Caches {
    pub network_configs: Store<VirtualMachineNetworkConfig>,
    pub network_attachments: Store<NetworkAttachmentDefinition>,
    pub ip_pools: Store<IPPool>,
}

/// [`ResourceStore`] and [`NetworkCache`] backed by the Kubernetes API
/// (writes) and reflector stores (reads).
pub struct KubeStore {
    client: Client,
    caches: Caches,
    /// VMs that asked for another pass, drained by the watcher
    enqueued: Mutex<HashSet<String>>,
}

fn object_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

impl KubeStore {
    pub fn new(client: Client, caches: Caches) -> Self {
        Self {
            client,
            caches,
            enqueued: Mutex::new(HashSet::new()),
        }
    }

    /// Returns true (once) if the VM was enqueued since the last call.
    pub fn take_enqueued(&self, namespace: &str, name: &str) -> bool {
        self.enqueued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&object_key(namespace, name))
    }

    fn network_config_api(&self, config: &VirtualMachineNetworkConfig) -> Api<VirtualMachineNetworkConfig> {
        Api::namespaced(self.client.clone(), &config.namespace().unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl ResourceStore for KubeStore {
    fn get_network_config(&self, namespace: &str, name: &str) -> Option<Arc<VirtualMachineNetworkConfig>> {
        self.caches
            .network_configs
            .get(&ObjectRef::new(name).within(namespace))
    }

    async fn create_network_config(
        &self,
        config: &VirtualMachineNetworkConfig,
    ) -> Result<VirtualMachineNetworkConfig, StoreError> {
        Ok(self
            .network_config_api(config)
            .create(&PostParams::default(), config)
            .await
            .map_err(StoreError::from_kube)?)
    }

    async fn update_network_config(
        &self,
        config: &VirtualMachineNetworkConfig,
    ) -> Result<VirtualMachineNetworkConfig, StoreError> {
        Ok(self
            .network_config_api(config)
            .replace(&config.name_any(), &PostParams::default(), config)
            .await
            .map_err(StoreError::from_kube)?)
    }

    async fn update_network_config_status(
        &self,
        config: &VirtualMachineNetworkConfig,
    ) -> Result<VirtualMachineNetworkConfig, StoreError> {
        // resourceVersion makes the merge patch conditional on the object we read
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": config.resource_version() },
            "status": serde_json::to_value(&config.status)?,
        });
        Ok(self
            .network_config_api(config)
            .patch_status(&config.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(StoreError::from_kube)?)
    }

    async fn update_virtual_machine(&self, vm: &VirtualMachine) -> Result<VirtualMachine, StoreError> {
        let api: Api<VirtualMachine> = Api::namespaced(self.client.clone(), &vm.namespace().unwrap_or_default());
        Ok(api
            .replace(&vm.name_any(), &PostParams::default(), vm)
            .await
            .map_err(StoreError::from_kube)?)
    }

    fn enqueue_virtual_machine(&self, namespace: &str, name: &str) {
        debug!("Enqueueing VirtualMachine {}/{}", namespace, name);
        self.enqueued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(object_key(namespace, name));
    }
}

impl NetworkCache for KubeStore {
    fn network_attachment(&self, namespace: &str, name: &str) -> Option<Arc<NetworkAttachmentDefinition>> {
        self.caches
            .network_attachments
            .get(&ObjectRef::new(name).within(namespace))
    }

    fn ip_pool(&self, namespace: &str, name: &str) -> Option<Arc<IPPool>> {
        self.caches.ip_pools.get(&ObjectRef::new(name).within(namespace))
    }
}
