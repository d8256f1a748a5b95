// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;

pub const DEFAULT_ADDON_NAME: &str = "multicluster-observability-addon";
pub const DEFAULT_HUB_NAMESPACE: &str = "open-cluster-management-observability";
pub const DEFAULT_CERT_ISSUER: &str = "mcoa-root-issuer";

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the addon; selects envelopes and addon instances
    pub addon_name: String,
    /// Namespace on the hub holding fleet-wide signal configuration
    pub hub_namespace: String,
    /// Fallback namespace searched for administrator-provided credentials
    pub default_auth_namespace: Option<String>,
    /// ClusterIssuer used for mTLS certificate requests
    pub cert_issuer: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let addon_name = env_or("ADDON_NAME", DEFAULT_ADDON_NAME)?;
        let hub_namespace = env_or("HUB_NAMESPACE", DEFAULT_HUB_NAMESPACE)?;
        let cert_issuer = env_or("CERT_ISSUER", DEFAULT_CERT_ISSUER)?;
        // Left unset it stays None; discovery reports it as a configuration error
        let default_auth_namespace = env::var("DEFAULT_AUTH_NAMESPACE").ok();

        Ok(Config {
            addon_name,
            hub_namespace,
            default_auth_namespace,
            cert_issuer,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addon_name: DEFAULT_ADDON_NAME.to_string(),
            hub_namespace: DEFAULT_HUB_NAMESPACE.to_string(),
            default_auth_namespace: None,
            cert_issuer: DEFAULT_CERT_ISSUER.to_string(),
        }
    }
}

fn env_or(key: &str, default: &str) -> Result<String> {
    match env::var(key) {
        Ok(v) if v.is_empty() => Ok(default.to_string()),
        Ok(v) => Ok(v),
        Err(env::VarError::NotPresent) => Ok(default.to_string()),
        Err(e) => Err(e).with_context(|| format!("{} environment variable is not valid unicode", key)),
    }
}
