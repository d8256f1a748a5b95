// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed custom resources consumed and produced by the addon.

pub mod addon;
pub mod certificate;
pub mod cluster;
pub mod signals;
pub mod work;

pub use addon::{
    AddOnDeploymentConfig, AddOnDeploymentConfigSpec, ConfigReference, CustomizedVariable,
    ManagedClusterAddOn, ManagedClusterAddOnSpec, ManagedClusterAddOnStatus,
};
pub use certificate::{Certificate, CertificateSpec};
pub use cluster::ManagedCluster;
pub use signals::{ClusterLogForwarder, OpenTelemetryCollector};
pub use work::ManifestWork;

use serde::{Deserialize, Serialize};

/// Status condition shared by the OCM resources
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl Condition {
    /// Equal in everything but the transition time
    pub fn same_state(&self, other: &Condition) -> bool {
        self.condition_type == other.condition_type
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}
