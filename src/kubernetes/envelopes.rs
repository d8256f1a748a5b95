// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Keeps the reference cache in step with the envelope lifecycle.

use crate::cache::{ConfigKey, ReferenceCache};
use crate::config::Config;
use crate::constants::labels;
use crate::error::Result;
use crate::mapper::ContentDigests;
use crate::reconciler::reference_keys;
use crate::types::{ManagedClusterAddOn, ManifestWork};
use futures::StreamExt;
use kube::{
    api::ListParams,
    runtime::{watcher, WatchStreamExt},
    Api, Client, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct EnvelopeTracker {
    client: Client,
    config: Config,
    addon_name: String,
    cache: Arc<ReferenceCache>,
    digests: Arc<ContentDigests>,
}

impl EnvelopeTracker {
    pub fn new(
        client: Client,
        config: Config,
        cache: Arc<ReferenceCache>,
        digests: Arc<ContentDigests>,
    ) -> Self {
        Self {
            client,
            addon_name: config.addon_name.clone(),
            config,
            cache,
            digests,
        }
    }

    fn selector(&self) -> String {
        format!("{}={}", labels::ADDON_NAME, self.addon_name)
    }

    /// Rebuild the cache from the labelled envelopes and what their addon
    /// instances depend on: config references and the credential secrets
    /// named on their signal resources. Returns the number of envelopes indexed.
    #[instrument(skip(self), fields(addon = %self.addon_name))]
    pub async fn warm(&self) -> Result<usize> {
        let envelopes: Api<ManifestWork> = Api::all(self.client.clone());
        let list = envelopes
            .list(&ListParams::default().labels(&self.selector()))
            .await?;

        let mut indexed = 0;
        for envelope in list.items {
            let namespace = envelope.namespace().unwrap_or_default();
            let addons: Api<ManagedClusterAddOn> = Api::namespaced(self.client.clone(), &namespace);
            let Some(addon) = addons.get_opt(&self.addon_name).await? else {
                debug!("Envelope {}/{} has no addon instance", namespace, envelope.name_any());
                continue;
            };
            let keys = reference_keys(&self.client, &self.config, &addon).await?;
            self.cache.put(&namespace, &envelope.name_any(), keys);
            indexed += 1;
        }
        info!("Indexed references of {} envelope(s)", indexed);
        Ok(indexed)
    }

    /// Drop the references of deleted envelopes
    pub fn handle(&self, event: &watcher::Event<ManifestWork>) {
        if let watcher::Event::Delete(envelope) = event {
            let namespace = envelope.namespace().unwrap_or_default();
            let name = envelope.name_any();
            debug!("Envelope {}/{} deleted, dropping its references", namespace, name);
            self.cache.delete(&namespace, &name);
            self.digests.forget(&ConfigKey::for_object(envelope));
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        if let Err(e) = self.warm().await {
            warn!("Failed to warm the reference cache: {}", e);
        }

        let envelopes: Api<ManifestWork> = Api::all(self.client.clone());
        let config = WatcherConfig::default().labels(&self.selector());
        let mut events = watcher(envelopes, config).default_backoff().boxed();
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => self.handle(&event),
                Err(e) => warn!("Envelope watch error: {}", e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{list_json, MockService};
    use serde_json::json;

    const ADDON: &str = "multicluster-observability-addon";

    fn envelope(namespace: &str) -> serde_json::Value {
        json!({
            "apiVersion": "work.open-cluster-management.io/v1",
            "kind": "ManifestWork",
            "metadata": {
                "name": "addon-deploy-0",
                "namespace": namespace,
                "labels": {"open-cluster-management.io/addon-name": ADDON}
            },
            "spec": {"workload": {"manifests": []}}
        })
    }

    fn addon(namespace: &str) -> String {
        json!({
            "apiVersion": "addon.open-cluster-management.io/v1alpha1",
            "kind": "ManagedClusterAddOn",
            "metadata": {"name": ADDON, "namespace": namespace},
            "spec": {},
            "status": {"configReferences": [{
                "group": "addon.open-cluster-management.io",
                "resource": "addondeploymentconfigs",
                "namespace": "open-cluster-management-observability",
                "name": "mcoa"
            }]}
        })
        .to_string()
    }

    fn adc_key() -> ConfigKey {
        ConfigKey::new(
            "addon.open-cluster-management.io",
            "AddOnDeploymentConfig",
            "open-cluster-management-observability",
            "mcoa",
        )
    }

    fn tracker(mock: &MockService) -> EnvelopeTracker {
        let config = Config {
            default_auth_namespace: Some("mcoa-auth".to_string()),
            ..Config::default()
        };
        EnvelopeTracker::new(
            mock.clone().into_client(),
            config,
            Arc::new(ReferenceCache::new()),
            Arc::new(ContentDigests::new()),
        )
    }

    #[tokio::test]
    async fn test_warm_indexes_envelopes_with_addons() {
        let mock = MockService::new()
            .on_get(
                "/apis/work.open-cluster-management.io/v1/manifestworks",
                200,
                &list_json(
                    "work.open-cluster-management.io/v1",
                    "ManifestWork",
                    &[envelope("spoke-1"), envelope("spoke-2")],
                ),
            )
            .on_get(
                &format!(
                    "/apis/addon.open-cluster-management.io/v1alpha1/namespaces/spoke-1/managedclusteraddons/{}",
                    ADDON
                ),
                200,
                &addon("spoke-1"),
            );
        let tracker = tracker(&mock);

        assert_eq!(tracker.warm().await.unwrap(), 1);
        assert_eq!(tracker.cache.namespaces(&adc_key()), vec!["spoke-1"]);
    }

    #[tokio::test]
    async fn test_delete_event_drops_references() {
        let mock = MockService::new();
        let tracker = tracker(&mock);
        tracker.cache.put("spoke-1", "addon-deploy-0", [adc_key()]);

        let deleted: ManifestWork = serde_json::from_value(envelope("spoke-1")).unwrap();
        tracker.handle(&watcher::Event::Apply(deleted.clone()));
        assert_eq!(tracker.cache.namespaces(&adc_key()).len(), 1);

        tracker.handle(&watcher::Event::Delete(deleted));
        assert!(tracker.cache.namespaces(&adc_key()).is_empty());
        assert!(tracker.cache.is_empty());
    }

    #[tokio::test]
    async fn test_warm_indexes_credential_secrets() {
        let mut addon: serde_json::Value = serde_json::from_str(&addon("spoke-1")).unwrap();
        addon["status"]["configReferences"]
            .as_array_mut()
            .unwrap()
            .push(json!({
                "group": "observability.openshift.io",
                "resource": "clusterlogforwarders",
                "namespace": "open-cluster-management-observability",
                "name": "instance"
            }));
        let forwarder = json!({
            "apiVersion": "observability.openshift.io/v1",
            "kind": "ClusterLogForwarder",
            "metadata": {
                "name": "instance",
                "namespace": "open-cluster-management-observability",
                "annotations": {"authentication.mcoa.openshift.io/loki": "Static"}
            },
            "spec": {}
        });
        let mock = MockService::new()
            .on_get(
                "/apis/work.open-cluster-management.io/v1/manifestworks",
                200,
                &list_json("work.open-cluster-management.io/v1", "ManifestWork", &[envelope("spoke-1")]),
            )
            .on_get(
                &format!(
                    "/apis/addon.open-cluster-management.io/v1alpha1/namespaces/spoke-1/managedclusteraddons/{}",
                    ADDON
                ),
                200,
                &addon.to_string(),
            )
            .on_get(
                "/apis/observability.openshift.io/v1/namespaces/open-cluster-management-observability/clusterlogforwarders/instance",
                200,
                &forwarder.to_string(),
            );
        let tracker = tracker(&mock);

        assert_eq!(tracker.warm().await.unwrap(), 1);
        let source = ConfigKey::new("", "Secret", "mcoa-auth", "loki");
        assert_eq!(tracker.cache.namespaces(&source), vec!["spoke-1"]);
    }
}
