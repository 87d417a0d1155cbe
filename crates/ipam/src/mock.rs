//! In-memory NetworkCache for unit testing
//!
//! Stands in for the reflector-backed caches so resolvers, reconcilers and
//! webhooks can be tested without a cluster.

use crate::resolver::NetworkCache;
use crds::{
    IPPOOL_NAME_LABEL_KEY, IPPOOL_NAMESPACE_LABEL_KEY, IPPool, IPPoolSpec, IPv4Config,
    NetworkAttachmentDefinition, NetworkAttachmentDefinitionSpec,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn key_of<K: kube::Resource>(obj: &K) -> Key {
    let meta = obj.meta();
    key(
        meta.namespace.as_deref().unwrap_or_default(),
        meta.name.as_deref().unwrap_or_default(),
    )
}

/// Mock cache holding NADs and IPPools keyed by namespace/name
#[derive(Debug, Clone, Default)]
pub struct MockNetworkCache {
    network_attachments: Arc<Mutex<HashMap<Key, Arc<NetworkAttachmentDefinition>>>>,
    ip_pools: Arc<Mutex<HashMap<Key, Arc<IPPool>>>>,
}

impl MockNetworkCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a NAD
    pub fn add_network_attachment(&self, nad: NetworkAttachmentDefinition) {
        self.network_attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key_of(&nad), Arc::new(nad));
    }

    /// Inserts or replaces an IPPool
    pub fn add_ip_pool(&self, pool: IPPool) {
        self.ip_pools
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key_of(&pool), Arc::new(pool));
    }

    /// Simulates an IPPool deletion
    pub fn remove_ip_pool(&self, namespace: &str, name: &str) {
        self.ip_pools
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key(namespace, name));
    }

    /// Simulates a NAD deletion
    pub fn remove_network_attachment(&self, namespace: &str, name: &str) {
        self.network_attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key(namespace, name));
    }
}

impl NetworkCache for MockNetworkCache {
    fn network_attachment(&self, namespace: &str, name: &str) -> Option<Arc<NetworkAttachmentDefinition>> {
        self.network_attachments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key(namespace, name))
            .cloned()
    }

    fn ip_pool(&self, namespace: &str, name: &str) -> Option<Arc<IPPool>> {
        self.ip_pools
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key(namespace, name))
            .cloned()
    }
}

/// Builds a NAD, labelled with `pool = (namespace, name)` when given
pub fn test_network_attachment(
    namespace: &str,
    name: &str,
    pool: Option<(&str, &str)>,
) -> NetworkAttachmentDefinition {
    let mut nad = NetworkAttachmentDefinition::new(name, NetworkAttachmentDefinitionSpec::default());
    nad.metadata.namespace = Some(namespace.to_string());
    nad.metadata.labels = pool.map(|(pool_namespace, pool_name)| {
        BTreeMap::from([
            (IPPOOL_NAMESPACE_LABEL_KEY.to_string(), pool_namespace.to_string()),
            (IPPOOL_NAME_LABEL_KEY.to_string(), pool_name.to_string()),
        ])
    });
    nad
}

/// Builds an IPPool over `cidr` with no range or allocations
pub fn test_ip_pool(namespace: &str, name: &str, cidr: &str) -> IPPool {
    let mut pool = IPPool::new(
        name,
        IPPoolSpec {
            ipv4_config: IPv4Config {
                cidr: cidr.to_string(),
                ..Default::default()
            },
            network_name: String::new(),
        },
    );
    pool.metadata.namespace = Some(namespace.to_string());
    pool
}
