// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::options::Signal;
use crate::types::certificate::{IssuerRef, PrivateKey, X509Subject};
use crate::types::{Certificate, CertificateSpec};
use kube::api::ObjectMeta;

const KEY_ALGORITHM: &str = "RSA";
const KEY_ENCODING: &str = "PKCS8";
const KEY_SIZE: u32 = 4096;
const USAGES: [&str; 3] = ["client auth", "key encipherment", "digital signature"];

/// Client certificate request for one signal target.
///
/// The issued secret is named after the cluster namespace, which is where
/// the issuer writes it.
pub fn client_certificate(
    signal: Signal,
    target: &str,
    cluster_namespace: &str,
    issuer: &str,
    meta: ObjectMeta,
) -> Certificate {
    let name = format!("{}-{}", signal, target);
    Certificate {
        metadata: meta,
        spec: CertificateSpec {
            common_name: name.clone(),
            dns_names: vec![format!("{}.{}", name, cluster_namespace)],
            subject: Some(X509Subject {
                organizations: vec![cluster_namespace.to_string()],
                organizational_units: vec![signal.to_string()],
            }),
            private_key: Some(PrivateKey {
                algorithm: KEY_ALGORITHM.to_string(),
                encoding: KEY_ENCODING.to_string(),
                size: KEY_SIZE,
            }),
            usages: USAGES.iter().map(|u| u.to_string()).collect(),
            secret_name: cluster_namespace.to_string(),
            issuer_ref: IssuerRef {
                name: issuer.to_string(),
                kind: "ClusterIssuer".to_string(),
                group: "cert-manager.io".to_string(),
            },
        },
    }
}
