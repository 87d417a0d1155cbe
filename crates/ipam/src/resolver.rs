//! Network to IPPool resolution
//!
//! A network name points at a NetworkAttachmentDefinition; the NAD's labels
//! point at the IPPool serving it:
//!
//! ```text
//! "default/vlan10" -> NAD default/vlan10
//!                       labels: ippool-namespace=default, ippool-name=vlan10-pool
//!                  -> IPPool default/vlan10-pool
//! ```
//!
//! The two cache reads are not atomic: either resource may disappear between
//! them. Callers re-reconcile on the next event, so a transient `NotFound` is
//! deferred rather than fatal.

use crate::error::IpamError;
use crds::{IPPOOL_NAME_LABEL_KEY, IPPOOL_NAMESPACE_LABEL_KEY, IPPool, NetworkAttachmentDefinition};
use std::sync::Arc;
use tracing::debug;

/// Read-only, non-blocking cache lookups used for resolution.
///
/// Snapshots may be stale relative to the API server.
pub trait NetworkCache: Send + Sync {
    /// Cached NAD by namespace and name
    fn network_attachment(&self, namespace: &str, name: &str) -> Option<Arc<NetworkAttachmentDefinition>>;

    /// Cached IPPool by namespace and name
    fn ip_pool(&self, namespace: &str, name: &str) -> Option<Arc<IPPool>>;
}

/// Splits `"<namespace>/<name>"` on the last `/`.
///
/// A missing or empty namespace portion is replaced by `fallback_namespace`;
/// pass an empty fallback to get no default.
pub fn split_network_name<'a>(network_name: &'a str, fallback_namespace: &'a str) -> (&'a str, &'a str) {
    match network_name.rsplit_once('/') {
        Some(("", name)) => (fallback_namespace, name),
        Some((namespace, name)) => (namespace, name),
        None => (fallback_namespace, network_name),
    }
}

/// Resolves the IPPool serving `network_name`.
pub fn ip_pool_from_network_name(
    cache: &dyn NetworkCache,
    network_name: &str,
    fallback_namespace: &str,
) -> Result<Arc<IPPool>, IpamError> {
    let (nad_namespace, nad_name) = split_network_name(network_name, fallback_namespace);

    let nad = cache
        .network_attachment(nad_namespace, nad_name)
        .ok_or_else(|| IpamError::NotFound {
            kind: "network attachment definition",
            namespace: nad_namespace.to_string(),
            name: nad_name.to_string(),
        })?;

    let missing_label = |key: &'static str| IpamError::MissingLabel {
        namespace: nad_namespace.to_string(),
        name: nad_name.to_string(),
        key,
    };

    let labels = nad
        .metadata
        .labels
        .as_ref()
        .ok_or_else(|| missing_label(IPPOOL_NAMESPACE_LABEL_KEY))?;
    let pool_namespace = labels
        .get(IPPOOL_NAMESPACE_LABEL_KEY)
        .ok_or_else(|| missing_label(IPPOOL_NAMESPACE_LABEL_KEY))?;
    let pool_name = labels
        .get(IPPOOL_NAME_LABEL_KEY)
        .ok_or_else(|| missing_label(IPPOOL_NAME_LABEL_KEY))?;

    debug!(
        "Network {} resolves through NAD {}/{} to IPPool {}/{}",
        network_name, nad_namespace, nad_name, pool_namespace, pool_name
    );

    cache
        .ip_pool(pool_namespace, pool_name)
        .ok_or_else(|| IpamError::NotFound {
            kind: "ippool",
            namespace: pool_namespace.clone(),
            name: pool_name.clone(),
        })
}
