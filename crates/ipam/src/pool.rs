//! Pool state loading
//!
//! Pure functions that turn an [`IPPool`]'s string configuration into typed
//! addresses. The allocation engine consumes the results; nothing here
//! touches the cluster.

use crate::error::IpamError;
use crds::{EXCLUDED_MARK, IPPool, RESERVED_MARK};
use ipnet::IpNet;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Node annotation holding the RKE2 server arguments as a JSON string array
pub const NODE_ARGS_ANNOTATION_KEY: &str = "rke2.io/node-args";

/// Flag within the node arguments whose value is the service CIDR
pub const SERVICE_CIDR_FLAG: &str = "--service-cidr";

/// Typed view of an IPPool's IPv4 configuration.
///
/// Optional addresses are `None` when the corresponding field is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolInfo {
    /// Pool subnet with host bits cleared
    pub ip_net: IpNet,
    /// First address of the subnet
    pub network_ip_addr: IpAddr,
    /// Last address of the subnet
    pub broadcast_ip_addr: IpAddr,
    /// Lower bound of the allocatable range
    pub start_ip_addr: Option<IpAddr>,
    /// Upper bound of the allocatable range
    pub end_ip_addr: Option<IpAddr>,
    /// DHCP server address
    pub server_ip_addr: Option<IpAddr>,
    /// Default gateway handed to clients
    pub router_ip_addr: Option<IpAddr>,
}

/// Allocation map partitioned by marker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocatedAddresses {
    /// Addresses held by a lease owner
    pub allocated: Vec<IpAddr>,
    /// Addresses marked `excluded`
    pub excluded: Vec<IpAddr>,
    /// Addresses marked `reserved`
    pub reserved: Vec<IpAddr>,
}

/// Parses a CIDR and returns it with its network and broadcast addresses.
///
/// Host bits in the input are ignored ("10.0.0.7/24" yields network 10.0.0.0).
pub fn load_cidr(cidr: &str) -> Result<(IpNet, IpAddr, IpAddr), IpamError> {
    let ip_net: IpNet = cidr
        .parse()
        .map_err(|e| IpamError::parse("CIDR", cidr, e))?;
    let ip_net = ip_net.trunc();

    let network = ip_net.network();
    let broadcast = match (network, ip_net.hostmask()) {
        (IpAddr::V4(addr), IpAddr::V4(hostmask)) => {
            IpAddr::V4(Ipv4Addr::from(or_octets(addr.octets(), hostmask.octets())))
        }
        (IpAddr::V6(addr), IpAddr::V6(hostmask)) => {
            IpAddr::V6(Ipv6Addr::from(or_octets(addr.octets(), hostmask.octets())))
        }
        _ => return Err(IpamError::parse("CIDR", cidr, "mixed address families")),
    };

    Ok((ip_net, network, broadcast))
}

fn or_octets<const N: usize>(mut addr: [u8; N], hostmask: [u8; N]) -> [u8; N] {
    for (byte, mask) in addr.iter_mut().zip(hostmask) {
        *byte |= mask;
    }
    addr
}

fn parse_optional(what: &'static str, value: &str) -> Result<Option<IpAddr>, IpamError> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|e| IpamError::parse(what, value, e))
}

/// Loads the typed configuration of a pool.
///
/// Any present-but-malformed field fails the whole load.
pub fn load_pool(pool: &IPPool) -> Result<PoolInfo, IpamError> {
    let config = &pool.spec.ipv4_config;
    let (ip_net, network_ip_addr, broadcast_ip_addr) = load_cidr(&config.cidr)?;

    Ok(PoolInfo {
        ip_net,
        network_ip_addr,
        broadcast_ip_addr,
        start_ip_addr: parse_optional("pool start address", &config.pool.start)?,
        end_ip_addr: parse_optional("pool end address", &config.pool.end)?,
        server_ip_addr: parse_optional("server address", &config.server_ip)?,
        router_ip_addr: parse_optional("router address", &config.router)?,
    })
}

/// Partitions an allocation map into allocated, excluded and reserved
/// addresses. Keys that are not addresses are skipped.
pub fn load_allocated(allocated: &BTreeMap<String, String>) -> AllocatedAddresses {
    let mut out = AllocatedAddresses::default();
    for (ip, marker) in allocated {
        let Ok(addr) = ip.parse::<IpAddr>() else {
            tracing::debug!("Skipping unparsable allocation key {:?}", ip);
            continue;
        };

        match marker.as_str() {
            EXCLUDED_MARK => out.excluded.push(addr),
            RESERVED_MARK => out.reserved.push(addr),
            _ => out.allocated.push(addr),
        }
    }
    out
}

/// Whether `addr` appears in `list`
pub fn is_address_in_list(addr: IpAddr, list: &[IpAddr]) -> bool {
    list.contains(&addr)
}

/// Inclusive range check under the address ordering
pub fn is_in_range(addr: IpAddr, lo: IpAddr, hi: IpAddr) -> bool {
    addr >= lo && addr <= hi
}

/// Like [`is_in_range`] for textual input; false if any input fails to parse.
pub fn is_ip_str_in_range(ip: &str, lo: &str, hi: &str) -> bool {
    match (ip.parse(), lo.parse(), hi.parse()) {
        (Ok(ip), Ok(lo), Ok(hi)) => is_in_range(ip, lo, hi),
        _ => false,
    }
}

/// Reads the cluster service CIDR from a node's RKE2 arguments annotation.
pub fn service_cidr_from_node(node: &Node) -> Result<String, IpamError> {
    let node_name = node.name_any();
    let not_found = |reason: &str| IpamError::ServiceCidr {
        node: node_name.clone(),
        reason: reason.to_string(),
    };

    let raw = node
        .annotations()
        .get(NODE_ARGS_ANNOTATION_KEY)
        .ok_or_else(|| not_found(&format!("annotation {NODE_ARGS_ANNOTATION_KEY} not found")))?;

    let args: Vec<String> = serde_json::from_str(raw)
        .map_err(|e| not_found(&format!("annotation {NODE_ARGS_ANNOTATION_KEY} is malformed: {e}")))?;

    args.iter()
        .position(|arg| arg == SERVICE_CIDR_FLAG)
        .and_then(|i| args.get(i + 1))
        .cloned()
        .ok_or_else(|| not_found(&format!("flag {SERVICE_CIDR_FLAG} has no value")))
}
