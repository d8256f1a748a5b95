// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checks

use crate::constants::crds::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::error::{AddonError, Result};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{Api, Client};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Check whether a CRD is installed, by its `plural.group` name
#[instrument(skip(client))]
pub async fn crd_exists(client: &Client, name: &str) -> Result<bool> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let found = crds.get_opt(name).await?.is_some();
    debug!("CRD {} installed: {}", name, found);
    Ok(found)
}

/// Fail with a missing-precondition error unless every CRD is installed
pub async fn require_crds(client: &Client, names: &[&str]) -> Result<()> {
    for name in names {
        if !crd_exists(client, name).await? {
            return Err(AddonError::MissingPrecondition(format!(
                "CRD {} is not installed",
                name
            )));
        }
    }
    Ok(())
}

/// Wait for a CRD to become available.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_crd(client: &Client, name: &str) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match crd_exists(client, name).await {
            Ok(true) => {
                info!("CRD {} is available", name);
                return Ok(());
            }
            Ok(false) => {
                info!(
                    "CRD {} not yet available, waiting {} seconds...",
                    name, interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for CRD {}: {}, retrying in {} seconds...",
                    name, e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        // Exponential backoff with max cap
        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::crds;
    use crate::test_utils::MockService;

    const CRD_PATH: &str = "/apis/apiextensions.k8s.io/v1/customresourcedefinitions";

    fn crd_json(name: &str) -> String {
        serde_json::json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": {"name": name},
            "spec": {
                "group": "cert-manager.io",
                "names": {"kind": "Certificate", "plural": "certificates"},
                "scope": "Namespaced",
                "versions": []
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_crd_exists() {
        let path = format!("{}/{}", CRD_PATH, crds::CERTIFICATES);
        let client = MockService::new()
            .on_get(&path, 200, &crd_json(crds::CERTIFICATES))
            .into_client();
        assert!(crd_exists(&client, crds::CERTIFICATES).await.unwrap());
    }

    #[tokio::test]
    async fn test_crd_missing() {
        let client = MockService::new().into_client();
        assert!(!crd_exists(&client, crds::CERTIFICATES).await.unwrap());
    }

    #[tokio::test]
    async fn test_require_crds_reports_first_missing() {
        let path = format!("{}/{}", CRD_PATH, crds::CERTIFICATES);
        let client = MockService::new()
            .on_get(&path, 200, &crd_json(crds::CERTIFICATES))
            .into_client();
        let err = require_crds(&client, &[crds::CERTIFICATES, crds::CLUSTER_ISSUERS])
            .await
            .unwrap_err();
        assert!(err.is_missing_precondition());
        assert!(err.to_string().contains(crds::CLUSTER_ISSUERS));
    }
}
