//! Test utilities for the VM DHCP controller
//!
//! An in-memory [`ResourceStore`] that records every write, and builders for
//! test VirtualMachines.

use crate::store::{ResourceStore, StoreError};
use crds::{
    ConditionStatus, HasConditions, IN_SYNCED, Interface, MAC_ADDRESS_ANNOTATION_KEY, MultusNetwork, Network,
    VirtualMachine, VirtualMachineNetworkConfig, VirtualMachineSpec,
};
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

/// A write observed by [`MockStore`]
#[derive(Debug, Clone)]
pub enum Write {
    Create(VirtualMachineNetworkConfig),
    Update(VirtualMachineNetworkConfig),
    UpdateStatus(VirtualMachineNetworkConfig),
    UpdateVm(VirtualMachine),
}

#[derive(Default)]
struct MockState {
    network_configs: HashMap<String, VirtualMachineNetworkConfig>,
    writes: Vec<Write>,
    enqueued: Vec<String>,
    fail_writes: bool,
}

/// In-memory resource store.
///
/// Writes are visible to the next `get_network_config` immediately, which
/// models an informer cache that has caught up.
#[derive(Default, Clone)]
pub struct MockStore {
    state: Arc<Mutex<MockState>>,
}

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

fn key_of(config: &VirtualMachineNetworkConfig) -> String {
    key(&config.namespace().unwrap_or_default(), &config.name_any())
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every subsequent write fail
    pub fn fail_writes(&self) {
        self.state().fail_writes = true;
    }

    pub fn writes(&self) -> Vec<Write> {
        self.state().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }

    pub fn enqueued(&self) -> Vec<String> {
        self.state().enqueued.clone()
    }

    pub fn network_config(&self, namespace: &str, name: &str) -> Option<VirtualMachineNetworkConfig> {
        self.state().network_configs.get(&key(namespace, name)).cloned()
    }

    /// Simulates the allocation engine bringing a config in sync
    pub fn mark_in_synced(&self, namespace: &str, name: &str) {
        if let Some(config) = self.state().network_configs.get_mut(&key(namespace, name)) {
            config.set_condition(IN_SYNCED, ConditionStatus::True, "", "");
        }
    }

    fn check_writable(state: &MockState) -> Result<(), StoreError> {
        if state.fail_writes {
            return Err(StoreError::Rejected("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ResourceStore for MockStore {
    fn get_network_config(&self, namespace: &str, name: &str) -> Option<Arc<VirtualMachineNetworkConfig>> {
        self.state()
            .network_configs
            .get(&key(namespace, name))
            .cloned()
            .map(Arc::new)
    }

    async fn create_network_config(
        &self,
        config: &VirtualMachineNetworkConfig,
    ) -> Result<VirtualMachineNetworkConfig, StoreError> {
        let mut state = self.state();
        Self::check_writable(&state)?;
        let k = key_of(config);
        if state.network_configs.contains_key(&k) {
            return Err(StoreError::Rejected(format!("{k} already exists")));
        }
        state.network_configs.insert(k, config.clone());
        state.writes.push(Write::Create(config.clone()));
        Ok(config.clone())
    }

    async fn update_network_config(
        &self,
        config: &VirtualMachineNetworkConfig,
    ) -> Result<VirtualMachineNetworkConfig, StoreError> {
        let mut state = self.state();
        Self::check_writable(&state)?;
        let k = key_of(config);
        let Some(stored) = state.network_configs.get_mut(&k) else {
            return Err(StoreError::Rejected(format!("{k} not found")));
        };
        stored.spec = config.spec.clone();
        let stored = stored.clone();
        state.writes.push(Write::Update(config.clone()));
        Ok(stored)
    }

    async fn update_network_config_status(
        &self,
        config: &VirtualMachineNetworkConfig,
    ) -> Result<VirtualMachineNetworkConfig, StoreError> {
        let mut state = self.state();
        Self::check_writable(&state)?;
        let k = key_of(config);
        let Some(stored) = state.network_configs.get_mut(&k) else {
            return Err(StoreError::Rejected(format!("{k} not found")));
        };
        stored.status = config.status.clone();
        let stored = stored.clone();
        state.writes.push(Write::UpdateStatus(config.clone()));
        Ok(stored)
    }

    async fn update_virtual_machine(&self, vm: &VirtualMachine) -> Result<VirtualMachine, StoreError> {
        let mut state = self.state();
        Self::check_writable(&state)?;
        state.writes.push(Write::UpdateVm(vm.clone()));
        Ok(vm.clone())
    }

    fn enqueue_virtual_machine(&self, namespace: &str, name: &str) {
        self.state().enqueued.push(key(namespace, name));
    }
}

/// Creates a test interface
pub fn create_test_interface(name: &str, mac_address: &str) -> Interface {
    Interface {
        name: name.to_string(),
        mac_address: mac_address.to_string(),
        ..Default::default()
    }
}

/// Creates a test Multus network
pub fn create_test_network(name: &str, network_name: &str) -> Network {
    Network {
        name: name.to_string(),
        multus: Some(MultusNetwork {
            network_name: network_name.to_string(),
            default: None,
        }),
        ..Default::default()
    }
}

/// Creates a test VirtualMachine
pub fn create_test_vm(
    namespace: &str,
    name: &str,
    interfaces: Vec<Interface>,
    networks: Vec<Network>,
    mac_annotation: Option<&str>,
) -> VirtualMachine {
    let mut vm = VirtualMachine::new(name, VirtualMachineSpec::default());
    vm.metadata.namespace = Some(namespace.to_string());
    vm.spec.template.spec.domain.devices.interfaces = interfaces;
    vm.spec.template.spec.networks = networks;
    if let Some(annotation) = mac_annotation {
        vm.metadata.annotations = Some(BTreeMap::from([(
            MAC_ADDRESS_ANNOTATION_KEY.to_string(),
            annotation.to_string(),
        )]));
    }
    vm
}
