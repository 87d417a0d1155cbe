//! Well-known label and annotation keys.

/// API group of the resources owned by this controller
pub const API_GROUP: &str = "network.vmdhcp.io";

/// API version of the resources owned by this controller
pub const API_VERSION: &str = "v1alpha1";

/// Label on a NetworkAttachmentDefinition naming the namespace of its IPPool
pub const IPPOOL_NAMESPACE_LABEL_KEY: &str = "network.vmdhcp.io/ippool-namespace";

/// Label on a NetworkAttachmentDefinition naming its IPPool
pub const IPPOOL_NAME_LABEL_KEY: &str = "network.vmdhcp.io/ippool-name";

/// VirtualMachine annotation carrying MAC overrides as a JSON object
/// (`{"<interface-name>": "<mac-address>", ...}`)
pub const MAC_ADDRESS_ANNOTATION_KEY: &str = "network.vmdhcp.io/mac-address";

/// Label on a VirtualMachineNetworkConfig naming the VirtualMachine it was derived from
pub const VM_NAME_LABEL_KEY: &str = "network.vmdhcp.io/vm-name";
