//! IPAM core
//!
//! Controller-independent building blocks shared by the VM controller, the
//! admission webhook and the allocation engine:
//!
//! - [`pool`]: turns IPPool configuration into typed address data
//! - [`resolver`]: maps a network name to the IPPool serving it, through the
//!   labels of its NetworkAttachmentDefinition
//!
//! # Example
//!
//! ```
//! use ipam::pool::{load_cidr, is_in_range};
//!
//! let (_, network, broadcast) = load_cidr("10.0.0.0/24").unwrap();
//! assert_eq!(network.to_string(), "10.0.0.0");
//! assert_eq!(broadcast.to_string(), "10.0.0.255");
//! assert!(is_in_range(
//!     "10.0.0.5".parse().unwrap(),
//!     "10.0.0.1".parse().unwrap(),
//!     "10.0.0.10".parse().unwrap(),
//! ));
//! ```

pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod pool;
pub mod resolver;

pub use error::IpamError;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockNetworkCache;
pub use pool::{AllocatedAddresses, PoolInfo};
pub use resolver::{NetworkCache, ip_pool_from_network_name, split_network_name};
