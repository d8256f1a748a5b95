// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::{secrets_for, CompositionContext, SecretValues};
use crate::error::{AddonError, Result};
use crate::options::Signal;
use kube::ResourceExt;
use serde::Serialize;

/// Input names the log forwarder uses for each collection scope
const PLATFORM_INPUTS: [&str; 2] = ["infrastructure", "audit"];
const USER_WORKLOAD_INPUTS: [&str; 1] = ["application"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingValues {
    pub subscription_channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forwarder: Option<ForwarderValues>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<SecretValues>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwarderValues {
    pub name: String,
    /// Forwarder spec with pipelines restricted to the enabled inputs
    pub spec: serde_json::Value,
}

pub fn compose(ctx: &CompositionContext<'_>) -> Result<LoggingValues> {
    let logging = &ctx.options.logging;
    let mut inputs: Vec<&str> = Vec::new();
    if logging.platform.enabled() {
        inputs.extend(PLATFORM_INPUTS);
    }
    if logging.user_workloads.enabled() {
        inputs.extend(USER_WORKLOAD_INPUTS);
    }

    let forwarder = if inputs.is_empty() {
        None
    } else {
        let clf = ctx.forwarder.ok_or_else(|| {
            AddonError::Configuration(
                "log collection is enabled but no ClusterLogForwarder is referenced".to_string(),
            )
        })?;
        let mut spec = serde_json::to_value(&clf.spec)?;
        restrict_pipelines(&mut spec, &inputs);
        Some(ForwarderValues {
            name: clf.name_any(),
            spec,
        })
    };

    Ok(LoggingValues {
        subscription_channel: logging.subscription_channel.clone(),
        forwarder,
        secrets: secrets_for(ctx.credentials_for(Signal::Logging)),
    })
}

/// Drop input refs of disabled scopes; pipelines left without inputs are removed
fn restrict_pipelines(spec: &mut serde_json::Value, inputs: &[&str]) {
    let Some(pipelines) = spec.get_mut("pipelines").and_then(|p| p.as_array_mut()) else {
        return;
    };
    for pipeline in pipelines.iter_mut() {
        if let Some(refs) = pipeline.get_mut("inputRefs").and_then(|r| r.as_array_mut()) {
            refs.retain(|r| r.as_str().is_some_and(|name| inputs.contains(&name)));
        }
    }
    pipelines.retain(|p| {
        p.get("inputRefs")
            .and_then(|r| r.as_array())
            .map_or(true, |r| !r.is_empty())
    });
}
