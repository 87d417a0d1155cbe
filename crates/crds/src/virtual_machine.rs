//! KubeVirt VirtualMachine (subset)
//!
//! Models only the fields the controller reads or writes: the domain
//! interfaces (name, MAC) and the network list (name, Multus network name).
//! Every other field is kept in a flattened passthrough map so an object read
//! from the cluster can be written back without losing data.

use kube::CustomResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fields not modelled explicitly
pub type Passthrough = BTreeMap<String, Value>;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[kube(
    group = "kubevirt.io",
    version = "v1",
    kind = "VirtualMachine",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSpec {
    #[serde(default)]
    pub template: VirtualMachineInstanceTemplateSpec,

    #[serde(flatten)]
    pub extra: Passthrough,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceTemplateSpec {
    #[serde(default)]
    pub spec: VirtualMachineInstanceSpec,

    #[serde(flatten)]
    pub extra: Passthrough,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstanceSpec {
    #[serde(default)]
    pub domain: DomainSpec,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<Network>,

    #[serde(flatten)]
    pub extra: Passthrough,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DomainSpec {
    #[serde(default)]
    pub devices: Devices,

    #[serde(flatten)]
    pub extra: Passthrough,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Devices {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,

    #[serde(flatten)]
    pub extra: Passthrough,
}

/// A guest network interface
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    pub name: String,

    /// Empty when KubeVirt is left to generate one
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mac_address: String,

    #[serde(flatten)]
    pub extra: Passthrough,
}

/// A network the VM attaches to; paired with an [`Interface`] by name
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multus: Option<MultusNetwork>,

    #[serde(flatten)]
    pub extra: Passthrough,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MultusNetwork {
    /// NetworkAttachmentDefinition reference, `<namespace>/<name>` or `<name>`
    pub network_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
}

impl VirtualMachine {
    pub fn interfaces(&self) -> &[Interface] {
        &self.spec.template.spec.domain.devices.interfaces
    }

    pub fn interfaces_mut(&mut self) -> &mut Vec<Interface> {
        &mut self.spec.template.spec.domain.devices.interfaces
    }

    pub fn networks(&self) -> &[Network] {
        &self.spec.template.spec.networks
    }
}
