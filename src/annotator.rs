// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Stamps the config hash onto the addon's envelopes and writes the
//! rendered manifests into the primary one.

use crate::constants::{annotations, labels};
use crate::error::{AddonError, Result};
use crate::mutate::{dynamic_api, update_existing, OperationResult};
use crate::options::Options;
use crate::types::ManifestWork;
use kube::{
    api::{ApiResource, DynamicObject, ListParams},
    Api, Client, ResourceExt,
};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Hex SHA-256 of the canonical encoding of the options
pub fn config_hash(options: &Options) -> Result<String> {
    let canonical = serde_json::to_vec(&serde_json::to_value(options)?)?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(format!("{:x}", hasher.finalize()))
}

fn manifest_field<'a>(manifest: &'a Value, pointer: &str) -> &'a str {
    manifest.pointer(pointer).and_then(Value::as_str).unwrap_or_default()
}

fn sort_key(manifest: &Value) -> (&str, &str, &str) {
    (
        manifest_field(manifest, "/kind"),
        manifest_field(manifest, "/metadata/namespace"),
        manifest_field(manifest, "/metadata/name"),
    )
}

/// Sort manifests by (kind, namespace, name)
pub fn sort_manifests(manifests: &mut [Value]) {
    manifests.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
}

/// Name of the envelope the addon framework creates for an addon
pub fn primary_envelope_name(addon_name: &str) -> String {
    format!("addon-{}-deploy-0", addon_name)
}

/// Envelope receiving the manifests: the framework's default one, else the first by name
fn primary_envelope<'a>(envelopes: &'a [ManifestWork], addon_name: &str) -> Option<&'a ManifestWork> {
    let preferred = primary_envelope_name(addon_name);
    envelopes
        .iter()
        .find(|mw| mw.name_any() == preferred)
        .or_else(|| envelopes.iter().min_by_key(|mw| mw.name_any()))
}

pub struct DeliveryAnnotator {
    client: Client,
}

impl DeliveryAnnotator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Envelopes in the cluster namespace labelled with the addon name
    #[instrument(skip(self))]
    pub async fn list_envelopes(&self, namespace: &str, addon_name: &str) -> Result<Vec<ManifestWork>> {
        let api: Api<ManifestWork> = Api::namespaced(self.client.clone(), namespace);
        let lp = ListParams::default().labels(&format!("{}={}", labels::ADDON_NAME, addon_name));
        let mut envelopes = api.list(&lp).await?.items;
        envelopes.sort_by_key(|mw| mw.name_any());
        Ok(envelopes)
    }

    /// Stamp every envelope with the hash. When `manifests` is given they
    /// replace the primary envelope's workload, sorted; nothing else in an
    /// envelope spec is touched. Envelopes deleted since listing are skipped.
    /// Returns the envelopes as they now stand.
    #[instrument(skip(self, envelopes, manifests), fields(envelopes = envelopes.len()))]
    pub async fn annotate(
        &self,
        envelopes: &[ManifestWork],
        addon_name: &str,
        hash: &str,
        manifests: Option<Vec<Value>>,
    ) -> Result<Vec<ManifestWork>> {
        let extra = BTreeMap::from([(annotations::CONFIG_HASH.to_string(), hash.to_string())]);
        let primary = primary_envelope(envelopes, addon_name).map(|mw| mw.name_any());
        let mut manifests = manifests;
        if let Some(manifests) = manifests.as_mut() {
            sort_manifests(manifests);
        }
        let resource = ApiResource::erase::<ManifestWork>(&());

        let mut delivered = Vec::with_capacity(envelopes.len());
        for envelope in envelopes {
            let namespace = envelope.namespace().unwrap_or_default();
            let name = envelope.name_any();

            let mut desired = DynamicObject::new(&name, &resource).within(&namespace);
            if primary.as_deref() == Some(name.as_str()) {
                if let Some(manifests) = manifests.as_ref() {
                    desired.data = json!({ "spec": { "workload": { "manifests": manifests } } });
                }
            }

            let api = dynamic_api::<ManifestWork>(self.client.clone(), &namespace);
            let Some((result, current)) = update_existing(&api, &desired, &extra).await? else {
                debug!("Envelope {}/{} is gone, skipping", namespace, name);
                continue;
            };
            match result {
                OperationResult::Unchanged => debug!("Envelope {}/{} up to date", namespace, name),
                result => info!("Envelope {}/{} {:?} with config hash {}", namespace, name, result, hash),
            }
            delivered.push(current.try_parse::<ManifestWork>().map_err(|e| {
                AddonError::Render(format!("envelope {}/{} is malformed: {}", namespace, name, e))
            })?);
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::variables;
    use crate::test_utils::{list_json, MockService};
    use crate::values::tests::make_options;
    use serde_json::json;

    const MW_PATH: &str = "/apis/work.open-cluster-management.io/v1/namespaces/spoke-1/manifestworks";

    fn make_envelope(name: &str, hash: Option<&str>, manifests: Vec<Value>) -> Value {
        let mut mw = json!({
            "apiVersion": "work.open-cluster-management.io/v1",
            "kind": "ManifestWork",
            "metadata": {
                "name": name,
                "namespace": "spoke-1",
                "labels": {"open-cluster-management.io/addon-name": "multicluster-observability-addon"}
            },
            "spec": {"workload": {"manifests": manifests}}
        });
        if let Some(hash) = hash {
            mw["metadata"]["annotations"] = json!({"mcoa.openshift.io/config-hash": hash});
        }
        mw
    }

    fn namespace_manifest(name: &str) -> Value {
        json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": name}})
    }

    #[test]
    fn test_hash_is_stable_and_sensitive() {
        let options = make_options(&[(variables::METRICS_DISABLED, "true")]);
        let a = config_hash(&options).unwrap();
        let b = config_hash(&options.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let other = make_options(&[(variables::METRICS_DISABLED, "false")]);
        assert_ne!(a, config_hash(&other).unwrap());
    }

    #[test]
    fn test_hash_ignores_variable_order() {
        let a = make_options(&[
            (variables::METRICS_DISABLED, "true"),
            (variables::LOGGING_DISABLED, "true"),
        ]);
        let b = make_options(&[
            (variables::LOGGING_DISABLED, "true"),
            (variables::METRICS_DISABLED, "true"),
        ]);
        assert_eq!(config_hash(&a).unwrap(), config_hash(&b).unwrap());
    }

    #[test]
    fn test_sort_by_kind_namespace_name() {
        let mut manifests = vec![
            json!({"kind": "Secret", "metadata": {"namespace": "b", "name": "x"}}),
            json!({"kind": "Namespace", "metadata": {"name": "z"}}),
            json!({"kind": "Secret", "metadata": {"namespace": "a", "name": "y"}}),
            json!({"kind": "Secret", "metadata": {"namespace": "a", "name": "b"}}),
        ];
        sort_manifests(&mut manifests);
        let order: Vec<(&str, &str)> = manifests
            .iter()
            .map(|m| (manifest_field(m, "/kind"), manifest_field(m, "/metadata/name")))
            .collect();
        assert_eq!(
            order,
            vec![("Namespace", "z"), ("Secret", "b"), ("Secret", "y"), ("Secret", "x")]
        );
    }

    #[test]
    fn test_primary_envelope_selection() {
        let envelopes: Vec<ManifestWork> = vec![
            serde_json::from_value(make_envelope("b-extra", None, vec![])).unwrap(),
            serde_json::from_value(make_envelope(
                "addon-multicluster-observability-addon-deploy-0",
                None,
                vec![],
            ))
            .unwrap(),
        ];
        let primary = primary_envelope(&envelopes, "multicluster-observability-addon").unwrap();
        assert_eq!(primary.name_any(), "addon-multicluster-observability-addon-deploy-0");

        let primary = primary_envelope(&envelopes[..1], "multicluster-observability-addon").unwrap();
        assert_eq!(primary.name_any(), "b-extra");
    }

    #[tokio::test]
    async fn test_stamp_and_write_manifests() {
        let live = make_envelope("addon-multicluster-observability-addon-deploy-0", None, vec![]);
        let mock = MockService::new()
            .on_get(MW_PATH, 200, &list_json("work.open-cluster-management.io/v1", "ManifestWork", &[live.clone()]))
            .on_get(
                &format!("{}/addon-multicluster-observability-addon-deploy-0", MW_PATH),
                200,
                &live.to_string(),
            );
        let annotator = DeliveryAnnotator::new(mock.clone().into_client());

        let envelopes = annotator
            .list_envelopes("spoke-1", "multicluster-observability-addon")
            .await
            .unwrap();
        let delivered = annotator
            .annotate(
                &envelopes,
                "multicluster-observability-addon",
                "abc123",
                Some(vec![namespace_manifest("z"), namespace_manifest("a")]),
            )
            .await
            .unwrap();

        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].manifests().len(), 2);
        let written = mock.last_body("PUT").unwrap();
        assert_eq!(written["metadata"]["annotations"]["mcoa.openshift.io/config-hash"], "abc123");
        let manifests = written["spec"]["workload"]["manifests"].as_array().unwrap();
        assert_eq!(manifests[0]["metadata"]["name"], "a");
        assert_eq!(manifests[1]["metadata"]["name"], "z");
    }

    #[tokio::test]
    async fn test_unchanged_envelope_is_not_written() {
        let live = make_envelope(
            "addon-multicluster-observability-addon-deploy-0",
            Some("abc123"),
            vec![namespace_manifest("a")],
        );
        let mock = MockService::new().on_get(
            &format!("{}/addon-multicluster-observability-addon-deploy-0", MW_PATH),
            200,
            &live.to_string(),
        );
        let envelopes: Vec<ManifestWork> = vec![serde_json::from_value(live).unwrap()];
        let annotator = DeliveryAnnotator::new(mock.clone().into_client());

        annotator
            .annotate(
                &envelopes,
                "multicluster-observability-addon",
                "abc123",
                Some(vec![namespace_manifest("a")]),
            )
            .await
            .unwrap();
        assert_eq!(mock.writes(), 0);
    }

    #[tokio::test]
    async fn test_secondary_envelope_only_stamped() {
        let primary = make_envelope("addon-multicluster-observability-addon-deploy-0", Some("abc123"), vec![]);
        let secondary = make_envelope("extra", Some("old"), vec![namespace_manifest("keep")]);
        let mock = MockService::new()
            .on_get(
                &format!("{}/addon-multicluster-observability-addon-deploy-0", MW_PATH),
                200,
                &primary.to_string(),
            )
            .on_get(&format!("{}/extra", MW_PATH), 200, &secondary.to_string());
        let envelopes: Vec<ManifestWork> = vec![
            serde_json::from_value(primary).unwrap(),
            serde_json::from_value(secondary).unwrap(),
        ];
        let annotator = DeliveryAnnotator::new(mock.clone().into_client());

        annotator
            .annotate(&envelopes, "multicluster-observability-addon", "abc123", Some(vec![]))
            .await
            .unwrap();

        assert_eq!(mock.count("PUT", &format!("{}/extra", MW_PATH)), 1);
        let written = mock.last_body("PUT").unwrap();
        assert_eq!(written["metadata"]["annotations"]["mcoa.openshift.io/config-hash"], "abc123");
        assert_eq!(written["spec"]["workload"]["manifests"][0]["metadata"]["name"], "keep");
    }

    fn with_framework_fields(mut envelope: Value) -> Value {
        envelope["spec"]["deleteOption"] = json!({"propagationPolicy": "SelectivelyOrphan"});
        envelope["spec"]["manifestConfigs"] = json!([{
            "resourceIdentifier": {"resource": "namespaces", "name": "a"},
            "updateStrategy": {"type": "ServerSideApply"}
        }]);
        envelope
    }

    #[tokio::test]
    async fn test_framework_fields_survive_converged_envelope() {
        let live = with_framework_fields(make_envelope(
            "addon-multicluster-observability-addon-deploy-0",
            Some("abc123"),
            vec![namespace_manifest("a")],
        ));
        let mock = MockService::new().on_get(
            &format!("{}/addon-multicluster-observability-addon-deploy-0", MW_PATH),
            200,
            &live.to_string(),
        );
        let envelopes: Vec<ManifestWork> = vec![serde_json::from_value(live).unwrap()];
        let annotator = DeliveryAnnotator::new(mock.clone().into_client());

        let delivered = annotator
            .annotate(
                &envelopes,
                "multicluster-observability-addon",
                "abc123",
                Some(vec![namespace_manifest("a")]),
            )
            .await
            .unwrap();

        assert_eq!(mock.writes(), 0);
        assert!(delivered[0].spec.extra.contains_key("deleteOption"));
    }

    #[tokio::test]
    async fn test_manifest_update_keeps_framework_fields() {
        let live = with_framework_fields(make_envelope(
            "addon-multicluster-observability-addon-deploy-0",
            Some("old"),
            vec![],
        ));
        let mock = MockService::new().on_get(
            &format!("{}/addon-multicluster-observability-addon-deploy-0", MW_PATH),
            200,
            &live.to_string(),
        );
        let envelopes: Vec<ManifestWork> = vec![serde_json::from_value(live).unwrap()];
        let annotator = DeliveryAnnotator::new(mock.clone().into_client());

        annotator
            .annotate(
                &envelopes,
                "multicluster-observability-addon",
                "abc123",
                Some(vec![namespace_manifest("a")]),
            )
            .await
            .unwrap();

        let written = mock.last_body("PUT").unwrap();
        assert_eq!(written["spec"]["deleteOption"]["propagationPolicy"], "SelectivelyOrphan");
        assert_eq!(written["spec"]["manifestConfigs"][0]["updateStrategy"]["type"], "ServerSideApply");
        assert_eq!(written["spec"]["workload"]["manifests"][0]["metadata"]["name"], "a");
    }

    #[tokio::test]
    async fn test_secondary_envelope_stamped_from_fetched_state() {
        let primary = make_envelope("addon-multicluster-observability-addon-deploy-0", Some("abc123"), vec![]);
        let listed = make_envelope("extra", Some("old"), vec![namespace_manifest("listed")]);
        // Changed by someone else between list and get
        let fetched = with_framework_fields(make_envelope("extra", Some("old"), vec![namespace_manifest("fresh")]));
        let mock = MockService::new()
            .on_get(
                &format!("{}/addon-multicluster-observability-addon-deploy-0", MW_PATH),
                200,
                &primary.to_string(),
            )
            .on_get(&format!("{}/extra", MW_PATH), 200, &fetched.to_string());
        let envelopes: Vec<ManifestWork> = vec![
            serde_json::from_value(primary).unwrap(),
            serde_json::from_value(listed).unwrap(),
        ];
        let annotator = DeliveryAnnotator::new(mock.clone().into_client());

        let delivered = annotator
            .annotate(&envelopes, "multicluster-observability-addon", "abc123", Some(vec![]))
            .await
            .unwrap();

        let written = mock.last_body("PUT").unwrap();
        assert_eq!(written["spec"]["workload"]["manifests"][0]["metadata"]["name"], "fresh");
        assert!(written["spec"].get("deleteOption").is_some());
        assert_eq!(delivered[1].manifests()[0]["metadata"]["name"], "fresh");
    }

    #[tokio::test]
    async fn test_envelope_deleted_since_listing_is_skipped() {
        let listed = make_envelope("addon-multicluster-observability-addon-deploy-0", None, vec![]);
        let mock = MockService::new();
        let envelopes: Vec<ManifestWork> = vec![serde_json::from_value(listed).unwrap()];
        let annotator = DeliveryAnnotator::new(mock.clone().into_client());

        let delivered = annotator
            .annotate(&envelopes, "multicluster-observability-addon", "abc123", Some(vec![]))
            .await
            .unwrap();

        assert!(delivered.is_empty());
        assert_eq!(mock.writes(), 0);
    }
}
