//! Reconciliation logic for the VM DHCP controller.
//!
//! - `vm`: derives a VirtualMachineNetworkConfig from each VirtualMachine and
//!   drives the two-phase out-of-sync protocol

pub mod vm;

use crate::store::ResourceStore;
use ipam::NetworkCache;
use std::sync::Arc;

/// Reconciles VirtualMachines into VirtualMachineNetworkConfigs.
///
/// Holds no mutable state: every pass recomputes everything from the VM and
/// the caches, so passes are idempotent and safe to retry.
#[derive(Clone)]
pub struct Reconciler {
    pub(crate) store: Arc<dyn ResourceStore>,
    pub(crate) cache: Arc<dyn NetworkCache>,
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(store: Arc<dyn ResourceStore>, cache: Arc<dyn NetworkCache>) -> Self {
        Self { store, cache }
    }
}
