//! VM DHCP CRD Definitions
//!
//! Kubernetes resource definitions used by the VM DHCP controller.
//!
//! Owned kinds (`network.vmdhcp.io/v1alpha1`):
//! - `IPPool`: a DHCP address pool and its allocation map
//! - `VirtualMachineNetworkConfig`: per-VM set of DHCP-managed `{network, MAC}` pairs
//!
//! Consumed kinds (schema generation disabled, only the fields we read or write):
//! - `NetworkAttachmentDefinition` (`k8s.cni.cncf.io/v1`)
//! - `VirtualMachine` (`kubevirt.io/v1`)

pub mod condition;
pub mod ip_pool;
pub mod keys;
pub mod network_attachment;
pub mod virtual_machine;
pub mod vm_network_config;

pub use condition::*;
pub use ip_pool::*;
pub use keys::*;
pub use network_attachment::*;
pub use virtual_machine::*;
pub use vm_network_config::*;
