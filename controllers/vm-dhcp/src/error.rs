//! Controller-specific error types.
//!
//! This module defines error types specific to the VM DHCP Controller
//! that are not covered by upstream library errors.

use crate::store::StoreError;
use ipam::IpamError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the VM DHCP Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Pool resolution or pool configuration error
    #[error("IPAM error: {0}")]
    Ipam(#[from] IpamError),

    /// A write to the resource store failed
    #[error("Failed to {action} {object}: {source}")]
    Persistence {
        action: &'static str,
        object: String,
        #[source]
        source: StoreError,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Admission webhook server failed
    #[error("Webhook server failed: {0}")]
    Webhook(String),
}

impl ControllerError {
    pub(crate) fn persistence(action: &'static str, object: impl Into<String>, source: StoreError) -> Self {
        Self::Persistence {
            action,
            object: object.into(),
            source,
        }
    }
}
