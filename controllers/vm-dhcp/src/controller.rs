//! Main controller implementation.
//!
//! Wires the kube client, reflector caches, the VM watcher and the admission
//! webhook together and runs them as background tasks:
//! - NetworkAttachmentDefinition, IPPool and VirtualMachineNetworkConfig
//!   reflectors feed the caches the reconciler and validator read from
//! - the VirtualMachine watcher reconciles VMs into network configs
//! - the webhook server validates network-config creates

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::store::{Caches, KubeStore};
use crate::watcher::{Context, Watcher, reflect_resource};
use crate::webhook::vmnetcfg::Validator;
use crate::webhook::{self, WebhookState};
use crds::{IPPool, NetworkAttachmentDefinition, VirtualMachine, VirtualMachineNetworkConfig};
use kube::{Api, Client};
use kube_runtime::reflector;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

type Task = JoinHandle<Result<(), ControllerError>>;

/// Main controller for VM DHCP network configuration.
pub struct Controller {
    network_attachment_reflector: Task,
    ip_pool_reflector: Task,
    network_config_reflector: Task,
    vm_watcher: Task,
    webhook_server: Option<Task>,
}

impl Controller {
    /// Creates a new controller instance.
    ///
    /// Returns once all caches have completed their initial list.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing VM DHCP Controller");

        let client = Client::try_default().await?;

        // Networks and pools may live in any namespace
        let network_attachment_api: Api<NetworkAttachmentDefinition> = Api::all(client.clone());
        let ip_pool_api: Api<IPPool> = Api::all(client.clone());
        let (network_config_api, vm_api): (Api<VirtualMachineNetworkConfig>, Api<VirtualMachine>) =
            match config.namespace.as_deref() {
                Some(ns) => (Api::namespaced(client.clone(), ns), Api::namespaced(client.clone(), ns)),
                None => (Api::all(client.clone()), Api::all(client.clone())),
            };

        let (network_attachments, network_attachment_writer) = reflector::store();
        let (ip_pools, ip_pool_writer) = reflector::store();
        let (network_configs, network_config_writer) = reflector::store();

        let network_attachment_reflector = tokio::spawn(async move {
            reflect_resource(network_attachment_api, network_attachment_writer, "NetworkAttachmentDefinition").await
        });
        let ip_pool_reflector =
            tokio::spawn(async move { reflect_resource(ip_pool_api, ip_pool_writer, "IPPool").await });
        let network_config_reflector = tokio::spawn(async move {
            reflect_resource(network_config_api, network_config_writer, "VirtualMachineNetworkConfig").await
        });

        let caches = Caches {
            network_configs,
            network_attachments,
            ip_pools,
        };

        info!("Waiting for caches to sync...");
        caches
            .network_attachments
            .wait_until_ready()
            .await
            .map_err(|e| ControllerError::Watch(format!("NetworkAttachmentDefinition cache: {e}")))?;
        caches
            .ip_pools
            .wait_until_ready()
            .await
            .map_err(|e| ControllerError::Watch(format!("IPPool cache: {e}")))?;
        caches
            .network_configs
            .wait_until_ready()
            .await
            .map_err(|e| ControllerError::Watch(format!("VirtualMachineNetworkConfig cache: {e}")))?;
        info!("Caches synced");

        let store = Arc::new(KubeStore::new(client, caches));
        let reconciler = Reconciler::new(store.clone(), store.clone());

        let webhook_server = config.webhook_addr.map(|addr| {
            let state = WebhookState {
                validator: Validator::new(store.clone()),
            };
            tokio::spawn(async move { webhook::serve(addr, state).await })
        });

        let watcher = Watcher::new(Arc::new(Context::new(reconciler, store, config)), vm_api);
        let vm_watcher = tokio::spawn(async move { watcher.watch_virtual_machines().await });

        Ok(Self {
            network_attachment_reflector,
            ip_pool_reflector,
            network_config_reflector,
            vm_watcher,
            webhook_server,
        })
    }

    /// Runs until any background task exits.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("VM DHCP Controller running");

        let webhook_server = self.webhook_server.take();
        let webhook_server = async move {
            match webhook_server {
                Some(task) => task.await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            result = &mut self.vm_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("VirtualMachine watcher panicked: {}", e)))??;
            }
            result = &mut self.network_attachment_reflector => {
                result.map_err(|e| ControllerError::Watch(format!("NetworkAttachmentDefinition reflector panicked: {}", e)))??;
            }
            result = &mut self.ip_pool_reflector => {
                result.map_err(|e| ControllerError::Watch(format!("IPPool reflector panicked: {}", e)))??;
            }
            result = &mut self.network_config_reflector => {
                result.map_err(|e| ControllerError::Watch(format!("VirtualMachineNetworkConfig reflector panicked: {}", e)))??;
            }
            result = webhook_server => {
                result.map_err(|e| ControllerError::Webhook(format!("webhook server panicked: {}", e)))??;
            }
        }

        Ok(())
    }
}
