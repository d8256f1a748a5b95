// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::labels;
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "cluster.open-cluster-management.io", version = "v1", kind = "ManagedCluster")]
#[kube(status = "ManagedClusterStatus")]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterSpec {
    #[serde(default)]
    pub hub_accepts_client: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_duration_seconds: Option<i32>,
}

impl ManagedCluster {
    /// Check if this is the hub's own managed cluster
    pub fn is_local(&self) -> bool {
        self.labels()
            .get(labels::LOCAL_CLUSTER)
            .is_some_and(|v| v == "true")
    }

    /// Name of the cluster-set this cluster belongs to, if any
    pub fn cluster_set(&self) -> Option<&str> {
        self.labels().get(labels::CLUSTER_SET).map(String::as_str)
    }

    /// Check membership in the named cluster-set
    pub fn in_cluster_set(&self, set: &str) -> bool {
        self.cluster_set() == Some(set)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<crate::types::Condition>,
}
