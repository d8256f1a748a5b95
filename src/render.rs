// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Turns a values bundle into the manifest objects embedded in an envelope.

use crate::error::Result;
use crate::types::addon::{NodePlacement, ProxyConfig};
use crate::values::logging::LoggingValues;
use crate::values::metrics::{MetricsCollectorValues, MetricsValues};
use crate::values::traces::TracingValues;
use crate::values::{SecretValues, ValuesBundle};
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::ObjectMeta;
use serde_json::{json, Value};

const OPERATORS_API: &str = "operators.coreos.com/v1";
const SUBSCRIPTIONS_API: &str = "operators.coreos.com/v1alpha1";
const CATALOG_SOURCE: &str = "redhat-operators";
const CATALOG_NAMESPACE: &str = "openshift-marketplace";

const LOGGING_PACKAGE: &str = "cluster-logging";
const OPENTELEMETRY_PACKAGE: &str = "opentelemetry-product";

/// Renders manifests from values
pub trait ManifestRenderer: Send + Sync {
    fn render(&self, values: &ValuesBundle) -> Result<Vec<Value>>;
}

/// Renders the install namespace and operator group, then one group of
/// objects per signal section present in the bundle.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRenderer;

impl ManifestRenderer for DefaultRenderer {
    fn render(&self, values: &ValuesBundle) -> Result<Vec<Value>> {
        let mut manifests = baseline(values)?;
        if let Some(metrics) = &values.metrics {
            manifests.extend(render_metrics(values, metrics));
        }
        if let Some(logging) = &values.logging {
            manifests.extend(render_logging(values, logging)?);
        }
        if let Some(tracing) = &values.tracing {
            manifests.extend(render_tracing(values, tracing)?);
        }
        Ok(manifests)
    }
}

fn meta(name: &str, namespace: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(String::from),
        ..Default::default()
    }
}

fn baseline(values: &ValuesBundle) -> Result<Vec<Value>> {
    let mut namespace = serde_json::to_value(Namespace {
        metadata: meta(&values.install_namespace, None),
        ..Default::default()
    })?;
    namespace["apiVersion"] = json!("v1");
    namespace["kind"] = json!("Namespace");

    let operator_group = json!({
        "apiVersion": OPERATORS_API,
        "kind": "OperatorGroup",
        "metadata": {"name": values.addon_name, "namespace": values.install_namespace},
        "spec": {"upgradeStrategy": "Default"}
    });
    Ok(vec![namespace, operator_group])
}

fn subscription(values: &ValuesBundle, package: &str, channel: &str) -> Value {
    let mut spec = json!({
        "channel": channel,
        "installPlanApproval": "Automatic",
        "name": package,
        "source": CATALOG_SOURCE,
        "sourceNamespace": CATALOG_NAMESPACE,
    });
    let config = subscription_config(values.node_placement.as_ref(), values.proxy.as_ref());
    if !config.is_empty() {
        spec["config"] = Value::Object(config);
    }
    json!({
        "apiVersion": SUBSCRIPTIONS_API,
        "kind": "Subscription",
        "metadata": {"name": package, "namespace": values.install_namespace},
        "spec": spec
    })
}

fn subscription_config(
    placement: Option<&NodePlacement>,
    proxy: Option<&ProxyConfig>,
) -> serde_json::Map<String, Value> {
    let mut config = serde_json::Map::new();
    if let Some(placement) = placement {
        if !placement.node_selector.is_empty() {
            config.insert("nodeSelector".to_string(), json!(placement.node_selector));
        }
        if !placement.tolerations.is_empty() {
            config.insert("tolerations".to_string(), json!(placement.tolerations));
        }
    }
    if let Some(proxy) = proxy {
        let env: Vec<Value> = [
            ("HTTP_PROXY", &proxy.http_proxy),
            ("HTTPS_PROXY", &proxy.https_proxy),
            ("NO_PROXY", &proxy.no_proxy),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_ref().map(|v| json!({"name": name, "value": v})))
        .collect();
        if !env.is_empty() {
            config.insert("env".to_string(), Value::Array(env));
        }
    }
    config
}

fn secret(values: &ValuesBundle, secret: &SecretValues) -> Result<Value> {
    let mut rendered = serde_json::to_value(Secret {
        metadata: meta(&secret.name, Some(&values.install_namespace)),
        data: Some(secret.data.clone()),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    })?;
    rendered["apiVersion"] = json!("v1");
    rendered["kind"] = json!("Secret");
    Ok(rendered)
}

fn render_metrics(values: &ValuesBundle, metrics: &MetricsValues) -> Vec<Value> {
    let mut manifests: Vec<Value> = [&metrics.platform, &metrics.user_workloads]
        .into_iter()
        .flatten()
        .map(|collector| metrics_collector(values, collector))
        .collect();

    if let Some(ui) = &metrics.ui {
        manifests.push(json!({
            "apiVersion": format!("{}/{}", ui.plugin.group, ui.plugin.version),
            "kind": ui.plugin.kind,
            "metadata": {"name": "monitoring"},
            "spec": {
                "type": "Monitoring",
                "monitoring": {
                    "incidents": {"enabled": ui.incident_detection},
                    "acm": {"enabled": ui.metrics}
                }
            }
        }));
    }
    manifests
}

fn metrics_collector(values: &ValuesBundle, collector: &MetricsCollectorValues) -> Value {
    json!({
        "apiVersion": format!("{}/{}", collector.collector.group, collector.collector.version),
        "kind": collector.collector.kind,
        "metadata": {"name": collector.name, "namespace": values.install_namespace},
        "spec": {
            "remoteWrite": [{"url": collector.remote_write_url}],
            "externalLabels": {"cluster": values.cluster_name}
        }
    })
}

fn render_logging(values: &ValuesBundle, logging: &LoggingValues) -> Result<Vec<Value>> {
    let mut manifests = vec![subscription(values, LOGGING_PACKAGE, &logging.subscription_channel)];
    for s in &logging.secrets {
        manifests.push(secret(values, s)?);
    }
    if let Some(forwarder) = &logging.forwarder {
        manifests.push(json!({
            "apiVersion": "observability.openshift.io/v1",
            "kind": "ClusterLogForwarder",
            "metadata": {"name": forwarder.name, "namespace": values.install_namespace},
            "spec": forwarder.spec
        }));
    }
    Ok(manifests)
}

fn render_tracing(values: &ValuesBundle, tracing: &TracingValues) -> Result<Vec<Value>> {
    let mut manifests = vec![subscription(
        values,
        OPENTELEMETRY_PACKAGE,
        &tracing.subscription_channel,
    )];
    for s in &tracing.secrets {
        manifests.push(secret(values, s)?);
    }
    if let Some(collector) = &tracing.collector {
        manifests.push(json!({
            "apiVersion": "opentelemetry.io/v1alpha1",
            "kind": "OpenTelemetryCollector",
            "metadata": {"name": collector.name, "namespace": values.install_namespace},
            "spec": {"config": collector.config}
        }));
    }
    if let Some(instrumentation) = &tracing.instrumentation {
        manifests.push(json!({
            "apiVersion": "opentelemetry.io/v1alpha1",
            "kind": "Instrumentation",
            "metadata": {"name": instrumentation.name, "namespace": values.install_namespace},
            "spec": {"exporter": {"endpoint": instrumentation.exporter_endpoint}}
        }));
    }
    Ok(manifests)
}
