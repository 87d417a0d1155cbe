//! VirtualMachine reconciler
//!
//! Each pass:
//! 1. skips deleted VMs
//! 2. backfills missing MACs from the MAC annotation (and stops if the VM was updated)
//! 3. builds the desired `{interface -> network, MAC}` map from the VM spec
//! 4. drops networks that do not resolve to an IPPool
//! 5. creates or updates the VirtualMachineNetworkConfig
//!
//! Spec changes of an existing config go through two passes. A config that
//! is in sync is first marked `InSynced=False` and the VM is re-enqueued; the
//! spec is only overwritten on a later pass that sees the config out of
//! sync. The allocation engine therefore always observes the out-of-sync
//! signal before the new spec, and releases old addresses before allocating
//! new ones.

use super::Reconciler;
use crate::error::ControllerError;
use crds::{
    ConditionStatus, HasConditions, IN_SYNCED, MAC_ADDRESS_ANNOTATION_KEY, NETWORK_CONFIG_CHANGED_REASON,
    NetworkConfig, VM_NAME_LABEL_KEY, VirtualMachine, VirtualMachineNetworkConfig, VirtualMachineNetworkConfigSpec,
};
use ipam::{IpamError, ip_pool_from_network_name};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

const OUT_OF_SYNC_MESSAGE: &str = "Network configuration of the upstream virtual machine has been changed";

impl Reconciler {
    /// Reconciles a VirtualMachine.
    ///
    /// Write failures are returned to the caller for retry with backoff.
    pub async fn reconcile_vm(&self, vm: &VirtualMachine) -> Result<(), ControllerError> {
        if vm.metadata.deletion_timestamp.is_some() {
            return Ok(());
        }

        let namespace = vm.namespace().unwrap_or_default();
        let name = vm.name_any();
        let key = format!("{}/{}", namespace, name);

        debug!("VirtualMachine {} has been changed", key);

        let (vm_copy, updated) = apply_mac_address_annotation(vm);
        if updated {
            info!("Applying MAC addresses from annotation to VirtualMachine {}", key);
            self.store
                .update_virtual_machine(&vm_copy)
                .await
                .map_err(|e| ControllerError::persistence("update VirtualMachine", &key, e))?;
            // The update triggers a new event; this object is about to go stale
            return Ok(());
        }

        if vm.interfaces().is_empty() {
            debug!("VirtualMachine {} has no network interfaces, skipping", key);
            return Ok(());
        }

        let mut desired = desired_network_configs(vm);
        let total_count = desired.len();

        // Unresolvable networks are not DHCP-managed (static IPs, BGP, ...)
        // and are skipped here. The admission webhook rejects them instead.
        desired.retain(|_, nc| self.has_ip_pool(&namespace, &key, &nc.network_name));

        let filtered_count = total_count - desired.len();
        if filtered_count > 0 {
            info!(
                "VirtualMachine {}: {}/{} networks have IPPools, {} filtered (no IPPool)",
                key,
                desired.len(),
                total_count,
                filtered_count
            );
        } else if !desired.is_empty() {
            debug!("VirtualMachine {}: all {} networks have IPPools", key, desired.len());
        }

        if desired.is_empty() {
            info!("No effective network configs found for VirtualMachine {}, skipping", key);
            return Ok(());
        }

        let network_configs: Vec<NetworkConfig> = desired.into_values().collect();

        let Some(existing) = self.store.get_network_config(&namespace, &name) else {
            info!("Creating VirtualMachineNetworkConfig for VirtualMachine {}", key);
            let config = prepare_network_config(vm, network_configs);
            self.store
                .create_network_config(&config)
                .await
                .map_err(|e| ControllerError::persistence("create VirtualMachineNetworkConfig", &key, e))?;
            return Ok(());
        };

        if same_network_configs(&existing.spec.network_configs, &network_configs) {
            debug!("VirtualMachineNetworkConfig {} is up-to-date", key);
            return Ok(());
        }

        let mut config = (*existing).clone();

        if existing.is_condition_false(IN_SYNCED) {
            // The engine has not consumed the previous out-of-sync signal yet,
            // so successive changes can be folded into the spec directly.
            info!("VirtualMachineNetworkConfig {} is out-of-sync, updating its spec", key);
            config.spec.network_configs = network_configs;
            self.store
                .update_network_config(&config)
                .await
                .map_err(|e| ControllerError::persistence("update VirtualMachineNetworkConfig", &key, e))?;
            return Ok(());
        }

        info!(
            "Marking VirtualMachineNetworkConfig {} out-of-sync due to network config changes",
            key
        );
        config.set_condition(
            IN_SYNCED,
            ConditionStatus::False,
            NETWORK_CONFIG_CHANGED_REASON,
            OUT_OF_SYNC_MESSAGE,
        );
        self.store
            .update_network_config_status(&config)
            .await
            .map_err(|e| ControllerError::persistence("update VirtualMachineNetworkConfig status", &key, e))?;

        // The spec is written by the follow-up pass
        self.store.enqueue_virtual_machine(&namespace, &name);

        Ok(())
    }

    /// Whether `network_name` resolves to an IPPool, using the VM's namespace
    /// for unqualified names. Never fails.
    fn has_ip_pool(&self, vm_namespace: &str, vm_key: &str, network_name: &str) -> bool {
        match ip_pool_from_network_name(self.cache.as_ref(), network_name, vm_namespace) {
            Ok(_) => true,
            Err(e @ IpamError::NotFound { .. }) => {
                debug!("Network {} has no IPPool: {}", network_name, e);
                false
            }
            Err(e) => {
                warn!(
                    "Unexpected error checking IPPool for network {} on VirtualMachine {}: {}",
                    network_name, vm_key, e
                );
                false
            }
        }
    }
}

/// Copies the VM and fills interfaces lacking a MAC from the MAC annotation.
///
/// Returns the copy and whether any interface was changed. A malformed
/// annotation is logged and ignored.
pub fn apply_mac_address_annotation(vm: &VirtualMachine) -> (VirtualMachine, bool) {
    let Some(raw) = vm.annotations().get(MAC_ADDRESS_ANNOTATION_KEY).filter(|a| !a.is_empty()) else {
        return (vm.clone(), false);
    };

    let mac_addresses: BTreeMap<String, String> = match serde_json::from_str(raw) {
        Ok(m) => m,
        Err(e) => {
            warn!(
                "Failed to parse MAC address annotation for VirtualMachine {}/{}: {}",
                vm.namespace().unwrap_or_default(),
                vm.name_any(),
                e
            );
            return (vm.clone(), false);
        }
    };

    let mut vm_copy = vm.clone();
    let mut updated = false;

    for nic in vm_copy.interfaces_mut() {
        if !nic.mac_address.is_empty() {
            continue;
        }
        if let Some(mac) = mac_addresses.get(&nic.name).filter(|m| !m.is_empty()) {
            info!(
                "Applying MAC address {} to interface {} on VirtualMachine {}/{}",
                mac,
                nic.name,
                vm.namespace().unwrap_or_default(),
                vm.name_any()
            );
            nic.mac_address = mac.clone();
            updated = true;
        }
    }

    (vm_copy, updated)
}

/// Desired network configs keyed by interface name.
///
/// Only interfaces with a MAC whose same-named network is a Multus network
/// are kept.
pub fn desired_network_configs(vm: &VirtualMachine) -> BTreeMap<String, NetworkConfig> {
    let mut configs: BTreeMap<String, NetworkConfig> = vm
        .interfaces()
        .iter()
        .filter(|nic| !nic.mac_address.is_empty())
        .map(|nic| {
            (
                nic.name.clone(),
                NetworkConfig {
                    network_name: String::new(),
                    mac_address: nic.mac_address.clone(),
                },
            )
        })
        .collect();

    for network in vm.networks() {
        let Some(multus) = &network.multus else {
            continue;
        };
        if let Some(nc) = configs.get_mut(&network.name) {
            nc.network_name = multus.network_name.clone();
        }
    }

    configs.retain(|_, nc| !nc.network_name.is_empty());
    configs
}

/// Order-independent comparison of two network config lists
pub fn same_network_configs(a: &[NetworkConfig], b: &[NetworkConfig]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<&NetworkConfig> = a.iter().collect();
    let mut b: Vec<&NetworkConfig> = b.iter().collect();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

fn prepare_network_config(vm: &VirtualMachine, network_configs: Vec<NetworkConfig>) -> VirtualMachineNetworkConfig {
    let name = vm.name_any();
    let mut config = VirtualMachineNetworkConfig::new(
        &name,
        VirtualMachineNetworkConfigSpec {
            vm_name: name.clone(),
            network_configs,
        },
    );
    config.metadata.namespace = vm.namespace();
    config.metadata.labels = Some(BTreeMap::from([(VM_NAME_LABEL_KEY.to_string(), name)]));
    config
}
