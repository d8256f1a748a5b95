// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AddonError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid annotation: {0}")]
    InvalidAnnotation(String),

    #[error("Missing precondition: {0}")]
    MissingPrecondition(String),

    #[error("Unsupported kind for mutation: {0}")]
    UnsupportedKind(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Rendering failed: {0}")]
    Render(String),
}

impl AddonError {
    /// Errors caused by user configuration; retrying without a change cannot succeed
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AddonError::Configuration(_)
                | AddonError::InvalidAnnotation(_)
                | AddonError::UnsupportedKind(_)
        )
    }

    pub fn is_missing_precondition(&self) -> bool {
        matches!(self, AddonError::MissingPrecondition(_))
    }

    /// Conflicts, timeouts and not-found on concurrently changed objects
    pub fn is_transient(&self) -> bool {
        match self {
            AddonError::KubeError(kube::Error::Api(resp)) => {
                matches!(resp.code, 404 | 409 | 429 | 500 | 503 | 504)
            }
            AddonError::KubeError(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, AddonError>;
