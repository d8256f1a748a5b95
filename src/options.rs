// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed view of an AddOnDeploymentConfig.
//!
//! Building options is pure: unknown variables are ignored, malformed values
//! for known variables are configuration errors.

use crate::constants::{selectors, variables, DEFAULT_LOGGING_CHANNEL, DEFAULT_OPENTELEMETRY_CHANNEL};
use crate::error::{AddonError, Result};
use crate::types::addon::{AddOnDeploymentConfigSpec, NodePlacement, ProxyConfig};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Observability signal families delivered by the addon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Metrics,
    Logging,
    Tracing,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Metrics => "metrics",
            Signal::Logging => "logging",
            Signal::Tracing => "tracing",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `Kind.version.group` resource selector
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceSelector {
    pub kind: String,
    pub version: String,
    pub group: String,
}

impl FromStr for ResourceSelector {
    type Err = AddonError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, '.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(kind), Some(version), Some(group))
                if !kind.is_empty() && !version.is_empty() && !group.is_empty() =>
            {
                Ok(ResourceSelector {
                    kind: kind.to_string(),
                    version: version.to_string(),
                    group: group.to_string(),
                })
            }
            _ => Err(AddonError::Configuration(format!(
                "'{}' is not a Kind.version.group resource selector",
                s
            ))),
        }
    }
}

impl fmt::Display for ResourceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.kind, self.version, self.group)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collector: Option<ResourceSelector>,
}

impl CollectionOptions {
    pub fn enabled(&self) -> bool {
        self.collector.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident_detection: Option<ResourceSelector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ResourceSelector>,
}

impl UiOptions {
    pub fn enabled(&self) -> bool {
        self.incident_detection.is_some() || self.metrics.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsOptions {
    pub disabled: bool,
    pub platform: CollectionOptions,
    pub user_workloads: CollectionOptions,
    pub ui: UiOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingOptions {
    pub disabled: bool,
    pub platform: CollectionOptions,
    pub user_workloads: CollectionOptions,
    pub subscription_channel: String,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            disabled: false,
            platform: CollectionOptions::default(),
            user_workloads: CollectionOptions::default(),
            subscription_channel: DEFAULT_LOGGING_CHANNEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TracingOptions {
    pub disabled: bool,
    pub user_workloads: CollectionOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrumentation: Option<ResourceSelector>,
    pub subscription_channel: String,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            disabled: false,
            user_workloads: CollectionOptions::default(),
            instrumentation: None,
            subscription_channel: DEFAULT_OPENTELEMETRY_CHANNEL.to_string(),
        }
    }
}

/// Feature options for one addon instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_placement: Option<NodePlacement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hub_endpoint: Option<String>,
    pub metrics: MetricsOptions,
    pub logging: LoggingOptions,
    pub tracing: TracingOptions,
}

impl Options {
    pub fn signal_enabled(&self, signal: Signal) -> bool {
        match signal {
            Signal::Metrics => !self.metrics.disabled,
            Signal::Logging => !self.logging.disabled,
            Signal::Tracing => !self.tracing.disabled,
        }
    }

    /// Build options from a deployment config; `None` yields the defaults
    pub fn build(config: Option<&AddOnDeploymentConfigSpec>) -> Result<Options> {
        let mut opts = Options::default();
        let Some(config) = config else {
            return Ok(opts);
        };

        opts.install_namespace = config
            .agent_install_namespace
            .clone()
            .filter(|ns| !ns.is_empty());
        opts.node_placement = config.node_placement.clone();
        opts.proxy = config.proxy_config.clone();

        for var in &config.customized_variables {
            let value = var.value.as_str();
            match var.name.as_str() {
                variables::METRICS_DISABLED => opts.metrics.disabled = parse_bool(&var.name, value)?,
                variables::LOGGING_DISABLED => opts.logging.disabled = parse_bool(&var.name, value)?,
                variables::TRACING_DISABLED => opts.tracing.disabled = parse_bool(&var.name, value)?,
                variables::PLATFORM_METRICS_COLLECTION => {
                    opts.metrics.platform.collector =
                        Some(parse_selector(&var.name, value, &[selectors::PROMETHEUS_AGENT])?)
                }
                variables::USER_WORKLOADS_METRICS_COLLECTION => {
                    opts.metrics.user_workloads.collector =
                        Some(parse_selector(&var.name, value, &[selectors::PROMETHEUS_AGENT])?)
                }
                variables::PLATFORM_INCIDENT_DETECTION => {
                    opts.metrics.ui.incident_detection =
                        Some(parse_selector(&var.name, value, &[selectors::UI_PLUGIN])?)
                }
                variables::OBSERVABILITY_UI_METRICS => {
                    opts.metrics.ui.metrics =
                        Some(parse_selector(&var.name, value, &[selectors::UI_PLUGIN])?)
                }
                variables::PLATFORM_SIGNALS_HUB_ENDPOINT => {
                    opts.hub_endpoint = Some(parse_endpoint(&var.name, value)?)
                }
                variables::PLATFORM_LOGS_COLLECTION => {
                    opts.logging.platform.collector = Some(parse_selector(
                        &var.name,
                        value,
                        &[selectors::CLUSTER_LOG_FORWARDER],
                    )?)
                }
                variables::USER_WORKLOAD_LOGS_COLLECTION => {
                    opts.logging.user_workloads.collector = Some(parse_selector(
                        &var.name,
                        value,
                        &[selectors::CLUSTER_LOG_FORWARDER],
                    )?)
                }
                variables::USER_WORKLOAD_TRACES_COLLECTION => {
                    opts.tracing.user_workloads.collector = Some(parse_selector(
                        &var.name,
                        value,
                        &[selectors::OPENTELEMETRY_COLLECTOR],
                    )?)
                }
                variables::USER_WORKLOAD_INSTRUMENTATION => {
                    opts.tracing.instrumentation =
                        Some(parse_selector(&var.name, value, &[selectors::INSTRUMENTATION])?)
                }
                variables::OPENSHIFT_LOGGING_CHANNEL if !value.is_empty() => {
                    opts.logging.subscription_channel = value.to_string()
                }
                variables::OPENTELEMETRY_CHANNEL if !value.is_empty() => {
                    opts.tracing.subscription_channel = value.to_string()
                }
                _ => {}
            }
        }

        Ok(opts)
    }
}

/// Booleans in the spellings OCM tooling writes
fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(AddonError::Configuration(format!(
            "variable {} has invalid boolean value '{}'",
            name, value
        ))),
    }
}

fn parse_selector(name: &str, value: &str, supported: &[&str]) -> Result<ResourceSelector> {
    let selector: ResourceSelector = value.parse()?;
    if !supported.contains(&value) {
        return Err(AddonError::Configuration(format!(
            "variable {} selects unsupported resource {} (supported: {})",
            name,
            selector,
            supported.join(", ")
        )));
    }
    Ok(selector)
}

fn parse_endpoint(name: &str, value: &str) -> Result<String> {
    let url = url::Url::parse(value).map_err(|e| {
        AddonError::Configuration(format!("variable {} is not a valid URL: {}", name, e))
    })?;
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::addon::CustomizedVariable;

    fn make_config(vars: &[(&str, &str)]) -> AddOnDeploymentConfigSpec {
        AddOnDeploymentConfigSpec {
            customized_variables: vars
                .iter()
                .map(|(n, v)| CustomizedVariable {
                    name: n.to_string(),
                    value: v.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_config_yields_defaults() {
        let opts = Options::build(None).unwrap();
        assert_eq!(opts, Options::default());
        assert!(opts.signal_enabled(Signal::Metrics));
        assert_eq!(opts.logging.subscription_channel, DEFAULT_LOGGING_CHANNEL);
    }

    #[test]
    fn test_disabled_flags() {
        let config = make_config(&[
            (variables::METRICS_DISABLED, "true"),
            (variables::LOGGING_DISABLED, "True"),
            (variables::TRACING_DISABLED, "0"),
        ]);
        let opts = Options::build(Some(&config)).unwrap();
        assert!(!opts.signal_enabled(Signal::Metrics));
        assert!(!opts.signal_enabled(Signal::Logging));
        assert!(opts.signal_enabled(Signal::Tracing));
    }

    #[test]
    fn test_malformed_bool_fails() {
        let config = make_config(&[(variables::LOGGING_DISABLED, "yes")]);
        let err = Options::build(Some(&config)).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_unknown_variables_ignored() {
        let config = make_config(&[("someFutureToggle", "whatever")]);
        assert_eq!(Options::build(Some(&config)).unwrap(), Options::default());
    }

    #[test]
    fn test_collection_and_ui_selectors() {
        let config = make_config(&[
            (variables::PLATFORM_METRICS_COLLECTION, selectors::PROMETHEUS_AGENT),
            (variables::PLATFORM_INCIDENT_DETECTION, selectors::UI_PLUGIN),
        ]);
        let opts = Options::build(Some(&config)).unwrap();
        let collector = opts.metrics.platform.collector.as_ref().unwrap();
        assert_eq!(collector.kind, "PrometheusAgent");
        assert_eq!(collector.version, "v1alpha1");
        assert_eq!(collector.group, "monitoring.rhobs");
        assert!(!opts.metrics.user_workloads.enabled());
        assert!(opts.metrics.ui.enabled());
    }

    #[test]
    fn test_unsupported_selector_fails() {
        let config = make_config(&[(variables::PLATFORM_METRICS_COLLECTION, selectors::UI_PLUGIN)]);
        assert!(Options::build(Some(&config)).unwrap_err().is_configuration());

        let config = make_config(&[(variables::PLATFORM_METRICS_COLLECTION, "PrometheusAgent")]);
        assert!(Options::build(Some(&config)).unwrap_err().is_configuration());
    }

    #[test]
    fn test_hub_endpoint_must_be_url() {
        let config = make_config(&[(variables::PLATFORM_SIGNALS_HUB_ENDPOINT, "not a url")]);
        assert!(Options::build(Some(&config)).unwrap_err().is_configuration());

        let config = make_config(&[(
            variables::PLATFORM_SIGNALS_HUB_ENDPOINT,
            "https://hub.example.com/api/v1/receive",
        )]);
        let opts = Options::build(Some(&config)).unwrap();
        assert_eq!(
            opts.hub_endpoint.as_deref(),
            Some("https://hub.example.com/api/v1/receive")
        );
    }

    #[test]
    fn test_install_namespace_and_channels() {
        let mut config = make_config(&[(variables::OPENSHIFT_LOGGING_CHANNEL, "stable-6.2")]);
        config.agent_install_namespace = Some("observability".to_string());
        let opts = Options::build(Some(&config)).unwrap();
        assert_eq!(opts.install_namespace.as_deref(), Some("observability"));
        assert_eq!(opts.logging.subscription_channel, "stable-6.2");
        assert_eq!(opts.tracing.subscription_channel, DEFAULT_OPENTELEMETRY_CHANNEL);
    }

    #[test]
    fn test_last_value_wins_for_repeated_variable() {
        let config = make_config(&[
            (variables::METRICS_DISABLED, "true"),
            (variables::METRICS_DISABLED, "false"),
        ]);
        assert!(!Options::build(Some(&config)).unwrap().metrics.disabled);
    }
}
