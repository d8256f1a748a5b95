// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Addon reconciler: options, credentials, values, manifests, envelopes.

use crate::annotator::{config_hash, DeliveryAnnotator};
use crate::auth::{parse_target_auth, AuthEngine, AuthenticationKind, TargetAuthMap};
use crate::cache::{ConfigKey, ReferenceCache};
use crate::config::Config;
use crate::constants::{conditions, OPERATOR_NAME};
use crate::error::{AddonError, Result};
use crate::mapper::ContentDigests;
use crate::options::{Options, Signal};
use crate::render::ManifestRenderer;
use crate::types::{
    AddOnDeploymentConfig, ClusterLogForwarder, Condition, ConfigReference, ManagedCluster,
    ManagedClusterAddOn, OpenTelemetryCollector,
};
use crate::values::{compose, CompositionContext, SignalCredentials};
use kube::{
    api::{Patch, PatchParams},
    runtime::controller::Action,
    Api, Client, Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

const MISSING_PRECONDITION_REQUEUE: Duration = Duration::from_secs(300);
const ERROR_REQUEUE: Duration = Duration::from_secs(30);

/// Shared state of the reconciler
pub struct Context {
    pub client: Client,
    pub config: Config,
    pub cache: Arc<ReferenceCache>,
    pub digests: Arc<ContentDigests>,
    pub renderer: Arc<dyn ManifestRenderer>,
}

impl Context {
    pub fn new(
        client: Client,
        config: Config,
        cache: Arc<ReferenceCache>,
        digests: Arc<ContentDigests>,
        renderer: Arc<dyn ManifestRenderer>,
    ) -> Self {
        Self {
            client,
            config,
            cache,
            digests,
            renderer,
        }
    }
}

pub async fn reconcile(addon: Arc<ManagedClusterAddOn>, ctx: Arc<Context>) -> Result<Action> {
    let namespace = addon.namespace().unwrap_or_default();
    reconcile_addon(&ctx, &namespace, &addon.name_any()).await
}

/// Reconcile the addon instance `name` in cluster namespace `namespace`
#[instrument(skip(ctx))]
pub async fn reconcile_addon(ctx: &Context, namespace: &str, name: &str) -> Result<Action> {
    let api: Api<ManagedClusterAddOn> = Api::namespaced(ctx.client.clone(), namespace);
    let Some(addon) = api.get_opt(name).await? else {
        debug!("Addon {}/{} is gone, nothing to do", namespace, name);
        return Ok(Action::await_change());
    };

    let result = converge(ctx, &addon).await;
    let condition = match &result {
        Ok(()) => Some(configured("True", conditions::REASON_RECONCILED, "")),
        Err(e) if e.is_configuration() => Some(configured(
            "False",
            conditions::REASON_INVALID_CONFIGURATION,
            &e.to_string(),
        )),
        Err(e) if e.is_missing_precondition() => Some(configured(
            "False",
            conditions::REASON_MISSING_PRECONDITION,
            &e.to_string(),
        )),
        Err(_) => None,
    };
    if let Some(condition) = condition {
        update_condition(&api, &addon, condition).await?;
    }

    result.map(|()| Action::await_change())
}

fn configured(status: &str, reason: &str, message: &str) -> Condition {
    Condition {
        condition_type: conditions::CONFIGURED.to_string(),
        status: status.to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
    }
}

/// Write the condition unless the addon already carries it
async fn update_condition(
    api: &Api<ManagedClusterAddOn>,
    addon: &ManagedClusterAddOn,
    condition: Condition,
) -> Result<()> {
    if addon
        .condition(&condition.condition_type)
        .is_some_and(|current| current.same_state(&condition))
    {
        debug!("Condition {} unchanged", condition.condition_type);
        return Ok(());
    }

    let mut conditions: Vec<Condition> = addon
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();
    conditions.retain(|c| c.condition_type != condition.condition_type);
    conditions.push(condition);

    let patch = serde_json::json!({ "status": { "conditions": conditions } });
    api.patch_status(
        &addon.name_any(),
        &PatchParams::apply(OPERATOR_NAME),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

/// Fetch the object named by a config reference; a missing object is skipped
async fn fetch_reference<K>(client: &Client, reference: &ConfigReference) -> Result<Option<K>>
where
    K: Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + std::fmt::Debug,
{
    let api: Api<K> = Api::namespaced(client.clone(), &reference.namespace);
    let found = api.get_opt(&reference.name).await?;
    if found.is_none() {
        debug!("Referenced {} {}/{} not found, skipping", K::kind(&()), reference.namespace, reference.name);
    }
    Ok(found)
}

async fn fetch_signal_resource<K>(
    client: &Client,
    addon: &ManagedClusterAddOn,
    resource: &str,
) -> Result<Option<K>>
where
    K: Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + std::fmt::Debug,
{
    match addon
        .config_references()
        .iter()
        .find(|r| r.resource == resource && r.group == K::group(&()))
    {
        Some(reference) => fetch_reference(client, reference).await,
        None => Ok(None),
    }
}

/// Keys of the secrets a signal's targets read from or materialise into.
/// Secrets found by the tracing output-name fallback are only known once
/// discovered.
pub fn credential_keys(
    signal: Signal,
    targets: &TargetAuthMap,
    cluster_namespace: &str,
    default_namespace: Option<&str>,
) -> Vec<ConfigKey> {
    let mut keys = Vec::new();
    for (target, kind) in targets {
        if matches!(kind, AuthenticationKind::Static | AuthenticationKind::SecretReference) {
            keys.push(ConfigKey::new("", "Secret", cluster_namespace, target));
            if let Some(ns) = default_namespace.filter(|ns| !ns.is_empty()) {
                keys.push(ConfigKey::new("", "Secret", ns, target));
            }
        }
        match kind {
            AuthenticationKind::Static | AuthenticationKind::Managed => {
                let name = format!("{}-{}-auth", signal, target);
                keys.push(ConfigKey::new("", "Secret", cluster_namespace, &name));
            }
            // The issuer writes the certificate into a secret named after the cluster
            AuthenticationKind::MTLS => {
                keys.push(ConfigKey::new("", "Secret", cluster_namespace, cluster_namespace));
            }
            AuthenticationKind::SecretReference | AuthenticationKind::MCO => {}
        }
    }
    keys
}

async fn targets_of<K>(
    client: &Client,
    addon: &ManagedClusterAddOn,
    resource: &str,
) -> Result<TargetAuthMap>
where
    K: Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + std::fmt::Debug,
{
    match fetch_signal_resource::<K>(client, addon, resource).await? {
        Some(obj) => parse_target_auth(obj.annotations()),
        None => Ok(TargetAuthMap::new()),
    }
}

/// Everything an addon's delivery depends on, computed without generating
/// credentials: its config references plus the credential secrets of the
/// targets named on its signal resources
pub async fn reference_keys(
    client: &Client,
    config: &Config,
    addon: &ManagedClusterAddOn,
) -> Result<BTreeSet<ConfigKey>> {
    let cluster_namespace = addon.namespace().unwrap_or_default();
    let mut keys: BTreeSet<ConfigKey> = addon
        .config_references()
        .iter()
        .map(ConfigReference::config_key)
        .collect();

    let logging = targets_of::<ClusterLogForwarder>(client, addon, "clusterlogforwarders").await?;
    let traces = targets_of::<OpenTelemetryCollector>(client, addon, "opentelemetrycollectors").await?;
    for (signal, targets) in [(Signal::Logging, logging), (Signal::Tracing, traces)] {
        keys.extend(credential_keys(
            signal,
            &targets,
            &cluster_namespace,
            config.default_auth_namespace.as_deref(),
        ));
    }
    Ok(keys)
}

#[instrument(skip(ctx, addon), fields(addon = %addon.name_any(), cluster = %addon.namespace().unwrap_or_default()))]
async fn converge(ctx: &Context, addon: &ManagedClusterAddOn) -> Result<()> {
    let cluster_namespace = addon.namespace().unwrap_or_default();
    let addon_name = addon.name_any();

    let deployment_config = match addon.deployment_config() {
        Some(reference) => fetch_reference::<AddOnDeploymentConfig>(&ctx.client, reference).await?,
        None => None,
    };
    let options = Options::build(deployment_config.as_ref().map(|c| &c.spec))?;
    let hash = config_hash(&options)?;

    let annotator = DeliveryAnnotator::new(ctx.client.clone());
    let envelopes = annotator.list_envelopes(&cluster_namespace, &addon_name).await?;
    if envelopes.is_empty() {
        debug!("No envelopes for {} in {} yet", addon_name, cluster_namespace);
        return Ok(());
    }

    let clusters: Api<ManagedCluster> = Api::all(ctx.client.clone());
    let hub = clusters
        .get_opt(&cluster_namespace)
        .await?
        .is_some_and(|c| c.is_local());

    let forwarder: Option<ClusterLogForwarder> = if options.signal_enabled(Signal::Logging) {
        fetch_signal_resource(&ctx.client, addon, "clusterlogforwarders").await?
    } else {
        None
    };
    let collector: Option<OpenTelemetryCollector> = if options.signal_enabled(Signal::Tracing) {
        fetch_signal_resource(&ctx.client, addon, "opentelemetrycollectors").await?
    } else {
        None
    };

    let mut keys: BTreeSet<ConfigKey> = addon
        .config_references()
        .iter()
        .map(ConfigReference::config_key)
        .collect();

    // A missing precondition only skips the signal's credentials; the error
    // is returned once everything else is delivered
    let mut deferred: Option<AddonError> = None;
    let mut credentials = SignalCredentials::new();
    let signal_targets = [
        (Signal::Logging, forwarder.as_ref().map(|f| f.annotations())),
        (Signal::Tracing, collector.as_ref().map(|c| c.annotations())),
    ];
    for (signal, annotations) in signal_targets {
        let Some(annotations) = annotations else {
            continue;
        };
        let targets = parse_target_auth(annotations)?;
        if targets.is_empty() {
            continue;
        }
        keys.extend(credential_keys(
            signal,
            &targets,
            &cluster_namespace,
            ctx.config.default_auth_namespace.as_deref(),
        ));

        let engine = AuthEngine::new(ctx.client.clone(), signal, &cluster_namespace, &ctx.config)
            .with_owner(addon.controller_owner_ref(&()));
        let handles = match engine.generate(&targets).await {
            Ok(handles) => handles,
            Err(e) if e.is_missing_precondition() => {
                warn!("Skipping {} credentials for {}: {}", signal, cluster_namespace, e);
                deferred.get_or_insert(e);
                continue;
            }
            Err(e) => return Err(e),
        };
        keys.extend(
            handles
                .values()
                .map(|h| ConfigKey::new("", "Secret", &h.namespace, &h.name)),
        );
        credentials.insert(signal, engine.fetch(&handles).await?);
    }

    let values = compose(&CompositionContext {
        cluster_name: &cluster_namespace,
        addon_name: &addon_name,
        hub,
        options: &options,
        credentials: &credentials,
        forwarder: forwarder.as_ref(),
        collector: collector.as_ref(),
    })?;
    let manifests = ctx.renderer.render(&values)?;

    let delivered = annotator
        .annotate(&envelopes, &addon_name, &hash, Some(manifests))
        .await?;
    for envelope in &delivered {
        let namespace = envelope.namespace().unwrap_or_default();
        ctx.cache.put(&namespace, &envelope.name_any(), keys.iter().cloned());
        ctx.digests
            .observe(ConfigKey::for_object(envelope), envelope.manifests());
    }

    info!(
        "Reconciled {} envelope(s) for {} with config hash {}",
        delivered.len(),
        addon_name,
        hash
    );
    deferred.map_or(Ok(()), Err)
}

pub fn error_policy(addon: Arc<ManagedClusterAddOn>, error: &AddonError, _ctx: Arc<Context>) -> Action {
    let name = format!("{}/{}", addon.namespace().unwrap_or_default(), addon.name_any());
    if error.is_configuration() {
        warn!("Invalid configuration for {}: {}", name, error);
        Action::await_change()
    } else if error.is_missing_precondition() {
        warn!("Precondition not met for {}: {}", name, error);
        Action::requeue(MISSING_PRECONDITION_REQUEUE)
    } else if error.is_transient() {
        debug!("Transient error reconciling {}: {}", name, error);
        Action::requeue(ERROR_REQUEUE)
    } else {
        error!("Reconciliation of {} failed: {}", name, error);
        Action::requeue(ERROR_REQUEUE)
    }
}
