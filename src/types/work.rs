// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{annotations, labels};
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-cluster delivery envelope of embedded manifests
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "work.open-cluster-management.io", version = "v1", kind = "ManifestWork")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct ManifestWorkSpec {
    #[serde(default)]
    pub workload: ManifestsTemplate,
    /// Fields owned by the addon framework (deleteOption, manifestConfigs, executor)
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
pub struct ManifestsTemplate {
    #[serde(default)]
    pub manifests: Vec<serde_json::Value>,
}

impl ManifestWork {
    pub fn manifests(&self) -> &[serde_json::Value] {
        &self.spec.workload.manifests
    }

    pub fn config_hash(&self) -> Option<&str> {
        self.annotations()
            .get(annotations::CONFIG_HASH)
            .map(String::as_str)
    }

    /// Name of the addon owning this envelope, from its label
    pub fn addon_name(&self) -> Option<&str> {
        self.labels().get(labels::ADDON_NAME).map(String::as_str)
    }
}
