// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Kubernetes annotation keys read or owned by the addon
pub mod annotations {
    /// Prefix of the per-target authentication annotations
    pub const AUTHENTICATION_PREFIX: &str = "authentication.mcoa.openshift.io/";
    /// Marks a secret or config map as belonging to a named collector exporter
    pub const TARGET_OUTPUT_NAME: &str = "tracing.mcoa.openshift.io/target-output-name";
    /// Content hash stamped on every envelope, overwritten on each reconcile
    pub const CONFIG_HASH: &str = "mcoa.openshift.io/config-hash";
    /// Restricts fleet-wide configuration to one cluster-set
    pub const CLUSTER_SET: &str = "cluster.open-cluster-management.io/clusterset";
}

/// Label keys used for selection
pub mod labels {
    /// Carried by every envelope owned by the addon
    pub const ADDON_NAME: &str = "open-cluster-management.io/addon-name";
    /// Cluster-set membership on managed clusters
    pub const CLUSTER_SET: &str = "cluster.open-cluster-management.io/clusterset";
    /// Marks the hub's own managed cluster
    pub const LOCAL_CLUSTER: &str = "local-cluster";
}

/// Customised variable names recognised in an AddOnDeploymentConfig
pub mod variables {
    pub const METRICS_DISABLED: &str = "metricsDisabled";
    pub const LOGGING_DISABLED: &str = "loggingDisabled";
    pub const TRACING_DISABLED: &str = "tracingDisabled";

    pub const PLATFORM_METRICS_COLLECTION: &str = "platformMetricsCollection";
    pub const USER_WORKLOADS_METRICS_COLLECTION: &str = "userWorkloadsMetricsCollection";
    pub const PLATFORM_INCIDENT_DETECTION: &str = "platformIncidentDetection";
    pub const OBSERVABILITY_UI_METRICS: &str = "observabilityUIMetrics";
    pub const PLATFORM_SIGNALS_HUB_ENDPOINT: &str = "platformSignalsHubEndpoint";

    pub const PLATFORM_LOGS_COLLECTION: &str = "platformLogsCollection";
    pub const USER_WORKLOAD_LOGS_COLLECTION: &str = "userWorkloadLogsCollection";
    pub const USER_WORKLOAD_TRACES_COLLECTION: &str = "userWorkloadTracesCollection";
    pub const USER_WORKLOAD_INSTRUMENTATION: &str = "userWorkloadInstrumentation";
    pub const OPENSHIFT_LOGGING_CHANNEL: &str = "openshiftLoggingChannel";
    pub const OPENTELEMETRY_CHANNEL: &str = "openTelemetryChannel";
}

/// Resource selectors accepted by the collection and UI variables, as `Kind.version.group`
pub mod selectors {
    pub const PROMETHEUS_AGENT: &str = "PrometheusAgent.v1alpha1.monitoring.rhobs";
    pub const UI_PLUGIN: &str = "UIPlugin.v1alpha1.observability.openshift.io";
    pub const CLUSTER_LOG_FORWARDER: &str = "ClusterLogForwarder.v1.observability.openshift.io";
    pub const OPENTELEMETRY_COLLECTOR: &str = "OpenTelemetryCollector.v1beta1.opentelemetry.io";
    pub const INSTRUMENTATION: &str = "Instrumentation.v1alpha1.opentelemetry.io";
}

/// CRDs the addon depends on, by `plural.group` name
pub mod crds {
    /// Required before mTLS credentials can be requested
    pub const CERTIFICATES: &str = "certificates.cert-manager.io";
    pub const CLUSTER_ISSUERS: &str = "clusterissuers.cert-manager.io";

    pub const MANAGED_CLUSTER_ADDONS: &str = "managedclusteraddons.addon.open-cluster-management.io";

    /// Signal CRs; only watched when installed on the hub
    pub const CLUSTER_LOG_FORWARDERS: &str = "clusterlogforwarders.observability.openshift.io";
    pub const OPENTELEMETRY_COLLECTORS: &str = "opentelemetrycollectors.opentelemetry.io";

    /// Initial polling interval in seconds when waiting for a CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

/// Status condition written on the addon instance
pub mod conditions {
    pub const CONFIGURED: &str = "Configured";
    pub const REASON_RECONCILED: &str = "Reconciled";
    pub const REASON_INVALID_CONFIGURATION: &str = "InvalidConfiguration";
    pub const REASON_MISSING_PRECONDITION: &str = "MissingPrecondition";
}

/// The operator name used as field manager
pub const OPERATOR_NAME: &str = "mcoa-addon";

/// Default install namespace on managed clusters
pub const DEFAULT_INSTALL_NAMESPACE: &str = "open-cluster-management-agent-addon";

/// Default operator subscription channels
pub const DEFAULT_LOGGING_CHANNEL: &str = "stable-6.1";
pub const DEFAULT_OPENTELEMETRY_CHANNEL: &str = "stable";
