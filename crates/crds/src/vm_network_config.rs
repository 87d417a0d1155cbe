//! VirtualMachineNetworkConfig CRD
//!
//! One resource per VM (same namespace and name as the VM) listing the
//! `{network, MAC}` pairs whose addresses are DHCP-managed.
//!
//! Write ownership is split: the VM controller owns `spec`, the allocation
//! engine owns the `InSynced` condition's transition from False to True.

use crate::condition::{Condition, HasConditions};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "network.vmdhcp.io",
    version = "v1alpha1",
    kind = "VirtualMachineNetworkConfig",
    namespaced,
    status = "VirtualMachineNetworkConfigStatus",
    shortname = "vmnetcfg"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineNetworkConfigSpec {
    /// Name of the owning VirtualMachine
    pub vm_name: String,

    /// DHCP-managed network attachments of the VM
    #[serde(default)]
    pub network_configs: Vec<NetworkConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// Network reference, `<namespace>/<name>` or a bare name
    pub network_name: String,

    pub mac_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineNetworkConfigStatus {
    /// Per-network allocation results, written by the allocation engine
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_configs: Vec<NetworkConfigStatus>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfigStatus {
    pub network_name: String,

    pub mac_address: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub allocated_ip_address: String,

    #[serde(default)]
    pub state: NetworkConfigState,
}

/// Allocation state of a single network config
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub enum NetworkConfigState {
    #[default]
    Pending,
    Allocated,
    Stale,
}

impl HasConditions for VirtualMachineNetworkConfig {
    fn conditions(&self) -> &[Condition] {
        self.status.as_ref().map(|s| s.conditions.as_slice()).unwrap_or_default()
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.status.get_or_insert_with(Default::default).conditions
    }
}
