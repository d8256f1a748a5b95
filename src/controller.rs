// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Controller wiring: the addon watch plus every watch that fans out into it.

use crate::cache::ReferenceCache;
use crate::config::Config;
use crate::constants::{crds, labels};
use crate::kubernetes::{crd_exists, EnvelopeTracker};
use crate::mapper::{ContentDigests, RequestMapper};
use crate::reconciler::{error_policy, reconcile, Context};
use crate::render::DefaultRenderer;
use crate::types::{
    AddOnDeploymentConfig, ClusterLogForwarder, ManagedCluster, ManagedClusterAddOn, ManifestWork,
    OpenTelemetryCollector,
};
use futures::{stream, Stream, StreamExt};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{
    runtime::{reflector, reflector::ObjectRef, watcher, Controller, WatchStreamExt},
    Api, Client, Resource,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reconcile requests from a raw watch of secrets or config maps. The raw
/// events are needed so deletes reach the addons that depended on the object.
fn config_triggers<K, C, F>(
    api: Api<K>,
    mapper: Arc<RequestMapper>,
    content: F,
) -> impl Stream<Item = ObjectRef<ManagedClusterAddOn>> + Send + 'static
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    C: Serialize,
    F: Fn(&K) -> C + Send + 'static,
{
    watcher(api, watcher::Config::default())
        .default_backoff()
        .filter_map(|event| async move {
            match event {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!("{} watch error: {}", K::kind(&()), e);
                    None
                }
            }
        })
        .flat_map(move |event| stream::iter(mapper.map_config_event(&event, &content)))
}

pub struct AddonController {
    client: Client,
    config: Config,
    cache: Arc<ReferenceCache>,
    digests: Arc<ContentDigests>,
}

impl AddonController {
    pub fn new(client: Client, config: Config) -> Self {
        Self {
            client,
            config,
            cache: Arc::new(ReferenceCache::new()),
            digests: Arc::new(ContentDigests::new()),
        }
    }

    /// Tracker keeping the shared reference cache in step with envelope deletes
    pub fn envelope_tracker(&self) -> EnvelopeTracker {
        EnvelopeTracker::new(
            self.client.clone(),
            self.config.clone(),
            self.cache.clone(),
            self.digests.clone(),
        )
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let client = self.client.clone();
        let addon_name = self.config.addon_name.clone();

        let clusters: Api<ManagedCluster> = Api::all(client.clone());
        let (cluster_store, cluster_writer) = reflector::store();
        let cluster_reflector = reflector::reflector(
            cluster_writer,
            watcher(clusters.clone(), watcher::Config::default()),
        )
        .default_backoff()
        .touched_objects()
        .for_each(|res| async move {
            if let Err(e) = res {
                warn!("Managed cluster watch error: {}", e);
            }
        });

        let addons: Api<ManagedClusterAddOn> = Api::all(client.clone());
        let addon_config = watcher::Config::default().fields(&format!("metadata.name={}", addon_name));
        let controller = Controller::new(addons, addon_config);

        let mapper = Arc::new(RequestMapper::new(
            &addon_name,
            controller.store(),
            cluster_store,
            self.cache.clone(),
            self.digests.clone(),
        ));

        let envelope_config =
            watcher::Config::default().labels(&format!("{}={}", labels::ADDON_NAME, addon_name));
        let mut controller = controller
            .watches(Api::<ManifestWork>::all(client.clone()), envelope_config, {
                let mapper = mapper.clone();
                move |envelope: ManifestWork| mapper.map_envelope(&envelope, envelope.manifests())
            })
            .reconcile_on(config_triggers(
                Api::<Secret>::all(client.clone()),
                mapper.clone(),
                |secret: &Secret| secret.data.clone(),
            ))
            .reconcile_on(config_triggers(
                Api::<ConfigMap>::all(client.clone()),
                mapper.clone(),
                |cm: &ConfigMap| (cm.data.clone(), cm.binary_data.clone()),
            ))
            .watches(
                Api::<AddOnDeploymentConfig>::all(client.clone()),
                watcher::Config::default(),
                {
                    let mapper = mapper.clone();
                    move |adc: AddOnDeploymentConfig| mapper.map_fleet(&adc)
                },
            )
            .watches(clusters, watcher::Config::default(), {
                let mapper = mapper.clone();
                move |cluster: ManagedCluster| mapper.map_cluster(&cluster)
            });

        if crd_exists(&client, crds::CLUSTER_LOG_FORWARDERS).await? {
            let mapper = mapper.clone();
            controller = controller.watches(
                Api::<ClusterLogForwarder>::all(client.clone()),
                watcher::Config::default(),
                move |clf: ClusterLogForwarder| mapper.map_fleet(&clf),
            );
        } else {
            info!("{} not installed, not watching log forwarders", crds::CLUSTER_LOG_FORWARDERS);
        }
        if crd_exists(&client, crds::OPENTELEMETRY_COLLECTORS).await? {
            let mapper = mapper.clone();
            controller = controller.watches(
                Api::<OpenTelemetryCollector>::all(client.clone()),
                watcher::Config::default(),
                move |otel: OpenTelemetryCollector| mapper.map_fleet(&otel),
            );
        } else {
            info!("{} not installed, not watching collectors", crds::OPENTELEMETRY_COLLECTORS);
        }

        let context = Arc::new(Context::new(
            client,
            self.config.clone(),
            self.cache.clone(),
            self.digests.clone(),
            Arc::new(DefaultRenderer),
        ));

        info!("Starting controller for addon {}", addon_name);
        let controller = controller
            .shutdown_on_signal()
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled addon: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            });

        // The reflector runs forever; the controller ends on shutdown
        tokio::select! {
            _ = controller => info!("Controller stopped"),
            _ = cluster_reflector => warn!("Managed cluster reflector stopped"),
        }
        Ok(())
    }
}
