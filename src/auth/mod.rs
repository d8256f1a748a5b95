// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-target credential materialisation.

pub mod certificate;
pub mod engine;

pub use engine::AuthEngine;

use crate::constants::annotations::AUTHENTICATION_PREFIX;
use crate::error::{AddonError, Result};
use k8s_openapi::ByteString;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How credentials for one target are obtained
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AuthenticationKind {
    /// Copied from an administrator-provided secret
    Static,
    /// Placeholder filled by a federated-identity sidecar
    Managed,
    /// Client certificate from the issuer
    #[serde(rename = "mTLS")]
    MTLS,
    /// Reserved
    MCO,
    /// Secret referenced as-is, nothing is materialised
    SecretReference,
}

impl FromStr for AuthenticationKind {
    type Err = AddonError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Static" => Ok(AuthenticationKind::Static),
            "Managed" => Ok(AuthenticationKind::Managed),
            "mTLS" => Ok(AuthenticationKind::MTLS),
            "MCO" => Ok(AuthenticationKind::MCO),
            "SecretReference" => Ok(AuthenticationKind::SecretReference),
            other => Err(AddonError::InvalidAnnotation(format!(
                "unknown authentication kind '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for AuthenticationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthenticationKind::Static => "Static",
            AuthenticationKind::Managed => "Managed",
            AuthenticationKind::MTLS => "mTLS",
            AuthenticationKind::MCO => "MCO",
            AuthenticationKind::SecretReference => "SecretReference",
        };
        f.write_str(s)
    }
}

/// Target name -> authentication kind
pub type TargetAuthMap = BTreeMap<String, AuthenticationKind>;

/// Locator of a materialised credential object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CredentialHandle {
    pub name: String,
    pub namespace: String,
}

impl CredentialHandle {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }
}

/// Credential bytes keyed by secret data key
pub type CredentialMaterial = BTreeMap<String, ByteString>;

/// Extract the target authentication map from annotations.
///
/// The key path after the prefix is the target name and must be exactly
/// one non-empty segment.
pub fn parse_target_auth(annotations: &BTreeMap<String, String>) -> Result<TargetAuthMap> {
    let mut targets = TargetAuthMap::new();
    for (key, value) in annotations {
        let Some(target) = key.strip_prefix(AUTHENTICATION_PREFIX) else {
            continue;
        };
        if target.is_empty() {
            return Err(AddonError::InvalidAnnotation(format!(
                "{} has an empty target name",
                key
            )));
        }
        if target.contains('/') {
            return Err(AddonError::InvalidAnnotation(format!(
                "{} must name exactly one target",
                key
            )));
        }
        targets.insert(target.to_string(), value.parse()?);
    }
    Ok(targets)
}
