// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::{secrets_for, CompositionContext, SecretValues};
use crate::error::{AddonError, Result};
use crate::options::Signal;
use kube::ResourceExt;
use serde::Serialize;

/// OTLP gRPC port of the delivered collector
const OTLP_GRPC_PORT: u16 = 4317;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TracingValues {
    pub subscription_channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collector: Option<CollectorValues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrumentation: Option<InstrumentationValues>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<SecretValues>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorValues {
    pub name: String,
    /// Collector pipeline configuration as YAML
    pub config: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentationValues {
    pub name: String,
    pub exporter_endpoint: String,
}

pub fn compose(ctx: &CompositionContext<'_>) -> Result<TracingValues> {
    let tracing = &ctx.options.tracing;

    let collector = if tracing.user_workloads.enabled() {
        let otel = ctx.collector.ok_or_else(|| {
            AddonError::Configuration(
                "trace collection is enabled but no OpenTelemetryCollector is referenced"
                    .to_string(),
            )
        })?;
        let config = serde_yaml::to_string(&otel.spec.config)
            .map_err(|e| AddonError::Render(format!("collector config: {}", e)))?;
        Some(CollectorValues {
            name: otel.name_any(),
            config,
        })
    } else {
        None
    };

    let instrumentation = match (&tracing.instrumentation, &collector) {
        (Some(_), Some(collector)) => Some(InstrumentationValues {
            name: collector.name.clone(),
            exporter_endpoint: format!(
                "http://{}-collector.{}.svc:{}",
                collector.name,
                ctx.install_namespace(),
                OTLP_GRPC_PORT
            ),
        }),
        (Some(_), None) => {
            return Err(AddonError::Configuration(
                "instrumentation requires user workload trace collection".to_string(),
            ))
        }
        _ => None,
    };

    Ok(TracingValues {
        subscription_channel: tracing.subscription_channel.clone(),
        collector,
        instrumentation,
        secrets: secrets_for(ctx.credentials_for(Signal::Tracing)),
    })
}
