// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::CompositionContext;
use crate::error::{AddonError, Result};
use crate::options::{CollectionOptions, ResourceSelector};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<MetricsCollectorValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_workloads: Option<MetricsCollectorValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiValues>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsCollectorValues {
    pub name: String,
    pub collector: ResourceSelector,
    pub remote_write_url: String,
}

/// UI plugin settings; only delivered to the hub's own cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiValues {
    pub plugin: ResourceSelector,
    pub incident_detection: bool,
    pub metrics: bool,
}

pub fn compose(ctx: &CompositionContext<'_>) -> Result<MetricsValues> {
    let metrics = &ctx.options.metrics;
    let hub_endpoint = ctx.options.hub_endpoint.as_deref();

    let platform = collector(&metrics.platform, "platform-metrics", hub_endpoint)?;
    let user_workloads = collector(&metrics.user_workloads, "user-workload-metrics", hub_endpoint)?;

    let ui = if ctx.hub && metrics.ui.enabled() {
        metrics
            .ui
            .incident_detection
            .as_ref()
            .or(metrics.ui.metrics.as_ref())
            .map(|plugin| UiValues {
                plugin: plugin.clone(),
                incident_detection: metrics.ui.incident_detection.is_some(),
                metrics: metrics.ui.metrics.is_some(),
            })
    } else {
        None
    };

    Ok(MetricsValues {
        platform,
        user_workloads,
        ui,
    })
}

fn collector(
    options: &CollectionOptions,
    name: &str,
    hub_endpoint: Option<&str>,
) -> Result<Option<MetricsCollectorValues>> {
    let Some(selector) = options.collector.as_ref() else {
        return Ok(None);
    };
    let remote_write_url = hub_endpoint.ok_or_else(|| {
        AddonError::Configuration(format!(
            "metrics collection with {} needs a hub endpoint",
            selector
        ))
    })?;
    Ok(Some(MetricsCollectorValues {
        name: name.to_string(),
        collector: selector.clone(),
        remote_write_url: remote_write_url.to_string(),
    }))
}
