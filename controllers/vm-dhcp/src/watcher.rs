//! Kubernetes resource watchers.
//!
//! - `reflect_resource()` keeps a reflector cache of NADs, IPPools or
//!   network configs up to date
//! - `Watcher::watch_virtual_machines()` drives the VM reconciler through
//!   `kube_runtime::Controller`, translating enqueue requests and failures
//!   into requeues

use crate::backoff::BackoffStates;
use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::store::KubeStore;
use crds::VirtualMachine;
use futures::StreamExt;
use kube::{Api, ResourceExt};
use kube_runtime::controller::{Action, Config as RuntimeConfig};
use kube_runtime::reflector::store::Writer;
use kube_runtime::watcher::{Config as WatcherConfig, watcher};
use kube_runtime::{Controller, WatchStreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Maximum number of VMs reconciled in parallel
const VM_RECONCILE_CONCURRENCY: u16 = 4;

/// Feeds a reflector store from a watch on `api` until the stream ends.
pub async fn reflect_resource<K>(api: Api<K>, writer: Writer<K>, resource_name: &str) -> Result<(), ControllerError>
where
    K: kube::Resource + Clone + Send + Sync + 'static + std::fmt::Debug + serde::de::DeserializeOwned,
    K::DynamicType: Default + std::cmp::Eq + std::hash::Hash + Clone,
{
    info!("Starting {} reflector", resource_name);

    watcher(api, WatcherConfig::default())
        .default_backoff()
        .reflect(writer)
        .touched_objects()
        .for_each(|res| async move {
            match res {
                Ok(obj) => debug!(
                    "{} {}/{} cached",
                    resource_name,
                    obj.namespace().unwrap_or_default(),
                    obj.name_any()
                ),
                Err(e) => warn!("{} watch error: {}", resource_name, e),
            }
        })
        .await;

    Err(ControllerError::Watch(format!("{resource_name} watch stream ended")))
}

/// Shared state of the VM controller loop
pub struct Context {
    reconciler: Reconciler,
    store: Arc<KubeStore>,
    config: ControllerConfig,
    backoff_states: BackoffStates,
}

impl Context {
    pub fn new(reconciler: Reconciler, store: Arc<KubeStore>, config: ControllerConfig) -> Self {
        Self {
            backoff_states: BackoffStates::new(config.backoff_min_secs, config.backoff_max_secs),
            reconciler,
            store,
            config,
        }
    }
}

async fn reconcile(vm: Arc<VirtualMachine>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let namespace = vm.namespace().unwrap_or_default();
    let name = vm.name_any();
    debug!("Reconciling VirtualMachine {}/{}", namespace, name);

    ctx.reconciler.reconcile_vm(&vm).await?;
    ctx.backoff_states.reset(&format!("{namespace}/{name}"));

    if ctx.store.take_enqueued(&namespace, &name) {
        return Ok(Action::requeue(ctx.config.requeue_delay));
    }
    Ok(Action::await_change())
}

fn error_policy(vm: Arc<VirtualMachine>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    let key = format!("{}/{}", vm.namespace().unwrap_or_default(), vm.name_any());
    let delay = ctx.backoff_states.next_backoff(&key);
    error!(
        "Reconciliation failed for VirtualMachine {}: {} (retrying in {}s)",
        key,
        error,
        delay.as_secs()
    );
    Action::requeue(delay)
}

/// Watches VirtualMachines and reconciles them.
pub struct Watcher {
    context: Arc<Context>,
    vm_api: Api<VirtualMachine>,
}

impl Watcher {
    pub fn new(context: Arc<Context>, vm_api: Api<VirtualMachine>) -> Self {
        Self { context, vm_api }
    }

    /// Runs the VM controller until its stream ends.
    pub async fn watch_virtual_machines(&self) -> Result<(), ControllerError> {
        info!("Starting VirtualMachine watcher");

        Controller::new(self.vm_api.clone(), WatcherConfig::default())
            .with_config(RuntimeConfig::default().concurrency(VM_RECONCILE_CONCURRENCY))
            .run(reconcile, error_policy, self.context.clone())
            .for_each(|res| async move {
                match res {
                    Ok((obj, _)) => debug!("Reconciled VirtualMachine {}", obj),
                    Err(e) => warn!("VirtualMachine controller error: {}", e),
                }
            })
            .await;

        Err(ControllerError::Watch("VirtualMachine controller stream ended".to_string()))
    }
}
