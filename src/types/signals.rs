// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Fleet-wide signal resources. Only the parts the addon reads are typed;
//! the rest of the resource spec is carried through to the values bundle untouched.

use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(
    group = "observability.openshift.io",
    version = "v1",
    kind = "ClusterLogForwarder"
)]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct ClusterLogForwarderSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pipelines: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

impl ClusterLogForwarder {
    /// Names of the declared outputs, in declaration order
    pub fn output_names(&self) -> Vec<String> {
        self.spec
            .outputs
            .iter()
            .filter_map(|o| o.get("name").and_then(|n| n.as_str()))
            .map(String::from)
            .collect()
    }
}

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(
    group = "opentelemetry.io",
    version = "v1beta1",
    kind = "OpenTelemetryCollector"
)]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct OpenTelemetryCollectorSpec {
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

impl OpenTelemetryCollector {
    /// Names of the exporters declared in the collector config, sorted
    pub fn exporter_names(&self) -> Vec<String> {
        self.spec
            .config
            .get("exporters")
            .and_then(|e| e.as_object())
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }
}
