//! VM DHCP Controller
//!
//! Keeps a VirtualMachineNetworkConfig per KubeVirt VirtualMachine listing
//! the VM's DHCP-managed `{network, MAC}` pairs, and validates direct
//! creates of those configs through an admission webhook.
//!
//! Networks are DHCP-managed when their NetworkAttachmentDefinition carries
//! the `network.vmdhcp.io/ippool-namespace` and `network.vmdhcp.io/ippool-name`
//! labels pointing at an existing IPPool.

mod backoff;
mod config;
mod controller;
mod error;
mod reconciler;
mod store;
#[cfg(test)]
mod test_utils;
mod watcher;
mod webhook;

use crate::config::ControllerConfig;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting VM DHCP Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    match config.webhook_addr {
        Some(addr) => info!("  Webhook: {}", addr),
        None => info!("  Webhook: disabled"),
    }
    info!("  Requeue delay: {:?}", config.requeue_delay);
    info!("  Backoff: {}s..{}s", config.backoff_min_secs, config.backoff_max_secs);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
