// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Composition of the values bundle handed to the renderer.
//!
//! Composition is pure. Each enabled signal contributes one section built by
//! its own sub-composer; disabled signals contribute nothing at all, so the
//! serialised bundle does not change shape when new fields are added to a
//! signal that is switched off.

pub mod logging;
pub mod metrics;
pub mod traces;

pub use self::logging::LoggingValues;
pub use self::metrics::MetricsValues;
pub use self::traces::TracingValues;

use crate::auth::CredentialMaterial;
use crate::constants::DEFAULT_INSTALL_NAMESPACE;
use crate::error::Result;
use crate::options::{Options, Signal};
use crate::types::addon::{NodePlacement, ProxyConfig};
use crate::types::{ClusterLogForwarder, OpenTelemetryCollector};
use k8s_openapi::ByteString;
use serde::Serialize;
use std::collections::BTreeMap;

/// Fetched credential bytes per signal, then per target
pub type SignalCredentials = BTreeMap<Signal, BTreeMap<String, CredentialMaterial>>;

/// Everything a composition reads. Nothing here is fetched by the composer.
#[derive(Debug, Clone, Copy)]
pub struct CompositionContext<'a> {
    pub cluster_name: &'a str,
    pub addon_name: &'a str,
    /// The target is the hub's own cluster
    pub hub: bool,
    pub options: &'a Options,
    pub credentials: &'a SignalCredentials,
    pub forwarder: Option<&'a ClusterLogForwarder>,
    pub collector: Option<&'a OpenTelemetryCollector>,
}

impl<'a> CompositionContext<'a> {
    pub fn install_namespace(&self) -> &'a str {
        self.options
            .install_namespace
            .as_deref()
            .unwrap_or(DEFAULT_INSTALL_NAMESPACE)
    }

    fn credentials_for(&self, signal: Signal) -> Option<&'a BTreeMap<String, CredentialMaterial>> {
        self.credentials.get(&signal)
    }
}

/// A secret to deliver to the managed cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretValues {
    pub name: String,
    pub data: BTreeMap<String, ByteString>,
}

/// One delivered secret per target, named after the target
pub(crate) fn secrets_for(
    credentials: Option<&BTreeMap<String, CredentialMaterial>>,
) -> Vec<SecretValues> {
    credentials
        .into_iter()
        .flatten()
        .map(|(target, material)| SecretValues {
            name: target.clone(),
            data: material.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuesBundle {
    pub cluster_name: String,
    pub addon_name: String,
    pub install_namespace: String,
    pub hub: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_placement: Option<NodePlacement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracing: Option<TracingValues>,
}

impl ValuesBundle {
    /// Canonical JSON encoding with keys sorted at every level
    pub fn to_canonical_json(&self) -> Result<Vec<u8>> {
        // serde_json::Value maps are ordered by key
        let value = serde_json::to_value(self)?;
        Ok(serde_json::to_vec(&value)?)
    }
}

/// Compose the values bundle for one (cluster, addon) pair
pub fn compose(ctx: &CompositionContext<'_>) -> Result<ValuesBundle> {
    let options = ctx.options;

    let metrics = if options.signal_enabled(Signal::Metrics) {
        Some(metrics::compose(ctx)?)
    } else {
        None
    };
    let logging = if options.signal_enabled(Signal::Logging) {
        Some(logging::compose(ctx)?)
    } else {
        None
    };
    let tracing = if options.signal_enabled(Signal::Tracing) {
        Some(traces::compose(ctx)?)
    } else {
        None
    };

    Ok(ValuesBundle {
        cluster_name: ctx.cluster_name.to_string(),
        addon_name: ctx.addon_name.to_string(),
        install_namespace: ctx.install_namespace().to_string(),
        hub: ctx.hub,
        node_placement: options.node_placement.clone(),
        proxy: options.proxy.clone(),
        metrics,
        logging,
        tracing,
    })
}
