//! IPPool CRD
//!
//! Defines a DHCP address pool: the IPv4 subnet it serves, the usable range,
//! infrastructure addresses and the allocation map maintained by the
//! allocation engine.

use crate::condition::{Condition, HasConditions};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Allocation map marker for addresses excluded from the pool
pub const EXCLUDED_MARK: &str = "excluded";

/// Allocation map marker for addresses reserved for infrastructure use
pub const RESERVED_MARK: &str = "reserved";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "network.vmdhcp.io",
    version = "v1alpha1",
    kind = "IPPool",
    namespaced,
    status = "IPPoolStatus",
    shortname = "ippl"
)]
#[serde(rename_all = "camelCase")]
pub struct IPPoolSpec {
    /// IPv4 configuration served by this pool
    pub ipv4_config: IPv4Config,

    /// Name of the network (`<namespace>/<name>`) this pool serves
    #[serde(default)]
    pub network_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IPv4Config {
    /// DHCP server address
    #[serde(default, rename = "serverIP")]
    pub server_ip: String,

    /// Subnet CIDR (e.g. "192.168.0.0/24")
    pub cidr: String,

    /// Usable address range
    #[serde(default)]
    pub pool: Pool,

    /// Default gateway handed out to clients
    #[serde(default)]
    pub router: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_search: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ntp: Vec<String>,

    /// Lease time in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_time: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    /// First usable address (inclusive)
    #[serde(default)]
    pub start: String,

    /// Last usable address (inclusive)
    #[serde(default)]
    pub end: String,

    /// Addresses inside the range that must never be handed out
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct IPPoolStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<IPv4Status>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<chrono::DateTime<chrono::Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct IPv4Status {
    /// Address -> marker. A marker is either [`EXCLUDED_MARK`], [`RESERVED_MARK`]
    /// or the owner tag of an active lease.
    #[serde(default)]
    pub allocated: BTreeMap<String, String>,

    #[serde(default)]
    pub used: i32,

    #[serde(default)]
    pub available: i32,
}

impl IPPool {
    /// Allocation map of the pool; empty when the engine has not written status yet
    pub fn allocated(&self) -> BTreeMap<String, String> {
        self.status
            .as_ref()
            .and_then(|s| s.ipv4.as_ref())
            .map(|ipv4| ipv4.allocated.clone())
            .unwrap_or_default()
    }
}

impl HasConditions for IPPool {
    fn conditions(&self) -> &[Condition] {
        self.status.as_ref().map(|s| s.conditions.as_slice()).unwrap_or_default()
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.status.get_or_insert_with(Default::default).conditions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_config_field_names() {
        let config: IPv4Config = serde_json::from_value(serde_json::json!({
            "serverIP": "10.0.0.2",
            "cidr": "10.0.0.0/24",
            "pool": { "start": "10.0.0.10", "end": "10.0.0.200" },
            "router": "10.0.0.1",
            "leaseTime": 300
        }))
        .unwrap();

        assert_eq!(config.server_ip, "10.0.0.2");
        assert_eq!(config.pool.start, "10.0.0.10");
        assert_eq!(config.lease_time, Some(300));
    }

    #[test]
    fn test_allocated_defaults_to_empty() {
        let pool = IPPool::new("pool", IPPoolSpec::default());
        assert!(pool.allocated().is_empty());
    }
}
