// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mcoa_addon::config::Config;
use mcoa_addon::constants::crds;
use mcoa_addon::controller::AddonController;
use mcoa_addon::kubernetes::wait_for_crd;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting observability addon controller");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: addon_name={}, hub_namespace={}",
        config.addon_name, config.hub_namespace
    );
    if config.default_auth_namespace.is_none() {
        warn!("DEFAULT_AUTH_NAMESPACE is not set, credential discovery will fail");
    }

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Addon instances are the primary resource; nothing to do until they exist
    info!("Waiting for the ManagedClusterAddOn CRD to become available...");
    wait_for_crd(&client, crds::MANAGED_CLUSTER_ADDONS).await?;

    let controller = AddonController::new(client, config);
    let tracker = controller.envelope_tracker();

    info!("Starting controller...");
    // The controller returns on shutdown signals; the tracker only on failure
    tokio::select! {
        res = controller.run() => res?,
        res = tracker.run() => {
            res?;
            warn!("Envelope tracker stopped unexpectedly");
        }
    }

    info!("Shut down");
    Ok(())
}
