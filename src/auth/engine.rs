// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Materialises credentials for the targets of one signal in one cluster.

use crate::auth::certificate::client_certificate;
use crate::auth::{AuthenticationKind, CredentialHandle, CredentialMaterial, TargetAuthMap};
use crate::config::Config;
use crate::constants::{annotations, crds, labels};
use crate::error::{AddonError, Result};
use crate::kubernetes::require_crds;
use crate::mutate::{create_or_update, dynamic_api, to_dynamic, OperationResult};
use crate::options::Signal;
use crate::types::Certificate;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::ByteString;
use kube::{
    api::{ListParams, ObjectMeta, PostParams},
    Api, Client, ResourceExt,
};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

const ROLE_ARN_KEY: &str = "roleARN";
const WEB_IDENTITY_TOKEN_KEY: &str = "webIdentityToken";

pub struct AuthEngine {
    client: Client,
    signal: Signal,
    cluster_namespace: String,
    addon_name: String,
    default_namespace: Option<String>,
    issuer: String,
    owner: Option<OwnerReference>,
}

impl AuthEngine {
    pub fn new(client: Client, signal: Signal, cluster_namespace: &str, config: &Config) -> Self {
        Self {
            client,
            signal,
            cluster_namespace: cluster_namespace.to_string(),
            addon_name: config.addon_name.clone(),
            default_namespace: config.default_auth_namespace.clone(),
            issuer: config.cert_issuer.clone(),
            owner: None,
        }
    }

    /// Owner set on every materialised object, so deletion is left to GC
    pub fn with_owner(mut self, owner: Option<OwnerReference>) -> Self {
        self.owner = owner;
        self
    }

    /// Deterministic name of the per-target credential object
    pub fn credential_name(&self, target: &str) -> String {
        format!("{}-{}-auth", self.signal, target)
    }

    fn object_meta(&self, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(self.cluster_namespace.clone()),
            labels: Some(BTreeMap::from([(
                labels::ADDON_NAME.to_string(),
                self.addon_name.clone(),
            )])),
            owner_references: self.owner.clone().map(|o| vec![o]),
            ..Default::default()
        }
    }

    /// Ensure a credential object exists for every target.
    /// Targets whose kind materialises nothing (MCO) get no handle.
    #[instrument(skip(self, targets), fields(signal = %self.signal, cluster = %self.cluster_namespace))]
    pub async fn generate(
        &self,
        targets: &TargetAuthMap,
    ) -> Result<BTreeMap<String, CredentialHandle>> {
        if targets.values().any(|k| *k == AuthenticationKind::MTLS) {
            require_crds(&self.client, &[crds::CERTIFICATES, crds::CLUSTER_ISSUERS]).await?;
        }

        let mut handles = BTreeMap::new();
        for (target, kind) in targets {
            let handle = match kind {
                AuthenticationKind::Static => Some(self.generate_static(target).await?),
                AuthenticationKind::Managed => Some(self.generate_managed(target).await?),
                AuthenticationKind::MTLS => Some(self.generate_mtls(target).await?),
                AuthenticationKind::SecretReference => Some(self.discover(target).await?),
                AuthenticationKind::MCO => {
                    debug!("Target {} uses MCO authentication, nothing to generate", target);
                    None
                }
            };
            if let Some(handle) = handle {
                handles.insert(target.clone(), handle);
            }
        }
        Ok(handles)
    }

    /// Copy the administrator-provided secret into the per-target secret
    async fn generate_static(&self, target: &str) -> Result<CredentialHandle> {
        let source = self.discover(target).await?;
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &source.namespace);
        let source_secret = secrets.get(&source.name).await?;

        let name = self.credential_name(target);
        let desired = Secret {
            metadata: self.object_meta(&name),
            data: source_secret.data.clone(),
            type_: source_secret.type_.clone(),
            ..Default::default()
        };

        let api = dynamic_api::<Secret>(self.client.clone(), &self.cluster_namespace);
        let result = create_or_update(&api, to_dynamic(&desired)?, &BTreeMap::new()).await?;
        log_result(&name, result);
        Ok(CredentialHandle::new(&name, &self.cluster_namespace))
    }

    /// Placeholder secret; the identity sidecar owns its values once created
    async fn generate_managed(&self, target: &str) -> Result<CredentialHandle> {
        let name = self.credential_name(target);
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &self.cluster_namespace);

        if secrets.get_opt(&name).await?.is_none() {
            let placeholder = Secret {
                metadata: self.object_meta(&name),
                data: Some(BTreeMap::from([
                    (ROLE_ARN_KEY.to_string(), ByteString(Vec::new())),
                    (WEB_IDENTITY_TOKEN_KEY.to_string(), ByteString(Vec::new())),
                ])),
                type_: Some("Opaque".to_string()),
                ..Default::default()
            };
            secrets.create(&PostParams::default(), &placeholder).await?;
            info!("Created managed credential placeholder {}", name);
        }
        Ok(CredentialHandle::new(&name, &self.cluster_namespace))
    }

    async fn generate_mtls(&self, target: &str) -> Result<CredentialHandle> {
        let name = self.credential_name(target);
        let cert: Certificate = client_certificate(
            self.signal,
            target,
            &self.cluster_namespace,
            &self.issuer,
            self.object_meta(&name),
        );

        let api = dynamic_api::<Certificate>(self.client.clone(), &self.cluster_namespace);
        let result = create_or_update(&api, to_dynamic(&cert)?, &BTreeMap::new()).await?;
        log_result(&name, result);

        let secret_name = cert.spec.secret_name;
        Ok(CredentialHandle::new(&secret_name, &self.cluster_namespace))
    }

    /// Read back credential bytes. Handles whose secret does not exist yet
    /// (e.g. a certificate not issued) are skipped.
    #[instrument(skip(self, handles), fields(signal = %self.signal, cluster = %self.cluster_namespace))]
    pub async fn fetch(
        &self,
        handles: &BTreeMap<String, CredentialHandle>,
    ) -> Result<BTreeMap<String, CredentialMaterial>> {
        let mut material = BTreeMap::new();
        for (target, handle) in handles {
            let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &handle.namespace);
            match secrets.get_opt(&handle.name).await? {
                Some(secret) => {
                    material.insert(target.clone(), secret.data.unwrap_or_default());
                }
                None => debug!(
                    "Credential {}/{} for target {} not found yet, skipping",
                    handle.namespace, handle.name, target
                ),
            }
        }
        Ok(material)
    }

    /// Resolve an administrator-provided secret: the cluster namespace
    /// first, then the default namespace.
    #[instrument(skip(self), fields(signal = %self.signal, cluster = %self.cluster_namespace))]
    pub async fn discover(&self, name: &str) -> Result<CredentialHandle> {
        let default_namespace = self
            .default_namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .ok_or_else(|| {
                AddonError::Configuration(
                    "no default namespace configured for credential discovery".to_string(),
                )
            })?;

        for namespace in [self.cluster_namespace.as_str(), default_namespace] {
            let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
            if secrets.get_opt(name).await?.is_some() {
                debug!("Discovered secret {}/{}", namespace, name);
                return Ok(CredentialHandle::new(name, namespace));
            }
        }

        if self.signal == Signal::Tracing {
            if let Some(handle) = self.discover_by_output_name(name, default_namespace).await? {
                return Ok(handle);
            }
        }

        Err(AddonError::Configuration(format!(
            "secret {} found neither in {} nor in {}",
            name, self.cluster_namespace, default_namespace
        )))
    }

    /// Secrets may be bound to a collector exporter by annotation instead of by name
    async fn discover_by_output_name(
        &self,
        output: &str,
        namespace: &str,
    ) -> Result<Option<CredentialHandle>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let mut candidates: Vec<Secret> = secrets
            .list(&ListParams::default())
            .await?
            .items
            .into_iter()
            .filter(|s| {
                s.annotations()
                    .get(annotations::TARGET_OUTPUT_NAME)
                    .is_some_and(|v| v == output)
            })
            .collect();
        candidates.sort_by_key(|s| s.name_any());

        Ok(candidates
            .first()
            .map(|s| CredentialHandle::new(&s.name_any(), namespace)))
    }
}

fn log_result(name: &str, result: OperationResult) {
    match result {
        OperationResult::Created => info!("Created credential {}", name),
        OperationResult::Updated => info!("Updated credential {}", name),
        OperationResult::Unchanged => debug!("Credential {} unchanged", name),
    }
}
