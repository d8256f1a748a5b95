// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::cache::ConfigKey;
use crate::types::Condition;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Installation of the addon in one cluster namespace
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(
    group = "addon.open-cluster-management.io",
    version = "v1alpha1",
    kind = "ManagedClusterAddOn"
)]
#[kube(namespaced)]
#[kube(status = "ManagedClusterAddOnStatus")]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterAddOnSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_namespace: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterAddOnStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_references: Vec<ConfigReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl ManagedClusterAddOn {
    pub fn config_references(&self) -> &[ConfigReference] {
        self.status
            .as_ref()
            .map(|s| s.config_references.as_slice())
            .unwrap_or_default()
    }

    /// Reference to the AddOnDeploymentConfig parameterising this instance, if any
    pub fn deployment_config(&self) -> Option<&ConfigReference> {
        self.config_references()
            .iter()
            .find(|r| r.group == AddOnDeploymentConfig::GROUP && r.resource == "addondeploymentconfigs")
    }

    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.status
            .as_ref()?
            .conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }
}

/// A configuration object referenced from the addon status
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigReference {
    #[serde(default)]
    pub group: String,
    pub resource: String,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
}

impl ConfigReference {
    /// Identity of the referenced object in the reference cache
    pub fn config_key(&self) -> ConfigKey {
        ConfigKey::new(
            &self.group,
            kind_for_resource(&self.resource),
            &self.namespace,
            &self.name,
        )
    }
}

/// Kind for the plural resource names the addon is configured with.
/// Unknown resources keep their resource name so keys stay unique.
pub fn kind_for_resource(resource: &str) -> &str {
    match resource {
        "addondeploymentconfigs" => "AddOnDeploymentConfig",
        "clusterlogforwarders" => "ClusterLogForwarder",
        "opentelemetrycollectors" => "OpenTelemetryCollector",
        "instrumentations" => "Instrumentation",
        "secrets" => "Secret",
        "configmaps" => "ConfigMap",
        other => other,
    }
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(
    group = "addon.open-cluster-management.io",
    version = "v1alpha1",
    kind = "AddOnDeploymentConfig"
)]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct AddOnDeploymentConfigSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub customized_variables: Vec<CustomizedVariable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_install_namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_placement: Option<NodePlacement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_config: Option<ProxyConfig>,
}

impl AddOnDeploymentConfig {
    pub const GROUP: &'static str = "addon.open-cluster-management.io";
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, schemars::JsonSchema)]
pub struct CustomizedVariable {
    pub name: String,
    pub value: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodePlacement {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Toleration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https_proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::ObjectMeta;

    fn make_addon(refs: Vec<ConfigReference>) -> ManagedClusterAddOn {
        ManagedClusterAddOn {
            metadata: ObjectMeta {
                name: Some("multicluster-observability-addon".to_string()),
                namespace: Some("spoke-1".to_string()),
                ..Default::default()
            },
            spec: ManagedClusterAddOnSpec::default(),
            status: Some(ManagedClusterAddOnStatus {
                config_references: refs,
                conditions: vec![],
            }),
        }
    }

    fn adc_ref() -> ConfigReference {
        ConfigReference {
            group: "addon.open-cluster-management.io".to_string(),
            resource: "addondeploymentconfigs".to_string(),
            namespace: "open-cluster-management-observability".to_string(),
            name: "mcoa".to_string(),
        }
    }

    #[test]
    fn test_deployment_config_found() {
        let addon = make_addon(vec![adc_ref()]);
        assert_eq!(addon.deployment_config().unwrap().name, "mcoa");
    }

    #[test]
    fn test_deployment_config_absent_without_status() {
        let mut addon = make_addon(vec![]);
        addon.status = None;
        assert!(addon.deployment_config().is_none());
        assert!(addon.config_references().is_empty());
    }

    #[test]
    fn test_config_key_maps_resource_to_kind() {
        let key = adc_ref().config_key();
        assert_eq!(key.group, "addon.open-cluster-management.io");
        assert_eq!(key.kind, "AddOnDeploymentConfig");
        assert_eq!(key.namespace, "open-cluster-management-observability");
        assert_eq!(key.name, "mcoa");
    }

    #[test]
    fn test_unknown_resource_keeps_resource_name() {
        assert_eq!(kind_for_resource("widgets"), "widgets");
    }
}
