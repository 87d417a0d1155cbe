//! VirtualMachineNetworkConfig admission validator
//!
//! Rejects the creation of a VirtualMachineNetworkConfig when any of its
//! networks does not resolve to an IPPool. Unlike the VM reconciler, which
//! silently skips such networks, a direct create is treated as explicit
//! intent and must be fully valid.

use crds::{API_GROUP, API_VERSION, VirtualMachineNetworkConfig};
use ipam::{IpamError, NetworkCache, ip_pool_from_network_name};
use kube::ResourceExt;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, Operation};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

const KIND: &str = "VirtualMachineNetworkConfig";

/// Admission rejection
#[derive(Debug, Error)]
#[error("could not create {kind} {namespace}/{name} because {cause}")]
pub struct ValidationError {
    pub kind: &'static str,
    pub namespace: String,
    pub name: String,
    #[source]
    pub cause: IpamError,
}

/// What the validator intercepts, for webhook registration
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub names: &'static [&'static str],
    /// `Namespaced` or `Cluster`
    pub scope: &'static str,
    pub api_group: &'static str,
    pub api_version: &'static str,
    pub object_kind: &'static str,
    pub operations: &'static [Operation],
}

/// Validates VirtualMachineNetworkConfig creates against the network caches.
#[derive(Clone)]
pub struct Validator {
    cache: Arc<dyn NetworkCache>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator").finish_non_exhaustive()
    }
}

impl Validator {
    pub fn new(cache: Arc<dyn NetworkCache>) -> Self {
        Self { cache }
    }

    pub fn resource() -> ResourceDescriptor {
        ResourceDescriptor {
            names: &["virtualmachinenetworkconfigs"],
            scope: "Namespaced",
            api_group: API_GROUP,
            api_version: API_VERSION,
            object_kind: KIND,
            operations: &[Operation::Create],
        }
    }

    /// Checks that every network of `config` resolves to an IPPool.
    ///
    /// Bare network names resolve in the config's own namespace. The first
    /// failing network rejects the whole object.
    pub fn create(&self, config: &VirtualMachineNetworkConfig) -> Result<(), ValidationError> {
        let namespace = config.namespace().unwrap_or_default();
        let name = config.name_any();

        for nc in &config.spec.network_configs {
            ip_pool_from_network_name(self.cache.as_ref(), &nc.network_name, &namespace).map_err(|cause| {
                ValidationError {
                    kind: KIND,
                    namespace: namespace.clone(),
                    name: name.clone(),
                    cause,
                }
            })?;
        }

        Ok(())
    }

    /// Turns an admission request into an allow/deny response.
    ///
    /// Only creates are validated; any other operation is allowed.
    pub fn admit(&self, request: &AdmissionRequest<VirtualMachineNetworkConfig>) -> AdmissionResponse {
        let response = AdmissionResponse::from(request);

        if request.operation != Operation::Create {
            debug!("Allowing {:?} of {} {}", request.operation, KIND, request.name);
            return response;
        }

        let Some(object) = &request.object else {
            return response.deny(format!("{KIND} create request carries no object"));
        };

        // The object of a create may omit its namespace; the request's is authoritative
        let mut config = object.clone();
        if config.metadata.namespace.as_deref().is_none_or(str::is_empty) {
            config.metadata.namespace = request.namespace.clone();
        }
        if config.metadata.name.as_deref().is_none_or(str::is_empty) && !request.name.is_empty() {
            config.metadata.name = Some(request.name.clone());
        }

        match self.create(&config) {
            Ok(()) => {
                info!(
                    "Admitted {} {}/{}",
                    KIND,
                    config.namespace().unwrap_or_default(),
                    config.name_any()
                );
                response
            }
            Err(e) => {
                warn!("Rejecting {}: {}", KIND, e);
                response.deny(e.to_string())
            }
        }
    }
}
