//! NetworkAttachmentDefinition (Multus)
//!
//! Only consumed: the controller reads the labels that point a network at
//! its owning IPPool.

use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, Default)]
#[kube(
    group = "k8s.cni.cncf.io",
    version = "v1",
    kind = "NetworkAttachmentDefinition",
    plural = "network-attachment-definitions",
    namespaced,
    schema = "disabled"
)]
pub struct NetworkAttachmentDefinitionSpec {
    /// Raw CNI configuration (JSON string)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub config: String,
}
