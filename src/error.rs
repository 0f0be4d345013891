// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::remote::RemoteError;
use crate::types::ResourceKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("AppOptics API error: {0}")]
    RemoteError(#[from] RemoteError),

    #[error("Invalid {kind} spec: {reason}")]
    InvalidSpec { kind: ResourceKind, reason: String },

    #[error("Secret {namespace}/{secret} has no '{key}' key")]
    MissingToken {
        namespace: String,
        secret: String,
        key: &'static str,
    },

    #[error("Failed to serialize: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid reconcile key: {0}")]
    InvalidKey(String),
}

impl OperatorError {
    /// Whether retrying the same input can succeed.
    ///
    /// A spec document that does not parse fails identically on every retry, so it is
    /// dropped from the queue until the resource changes or the next resync.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            OperatorError::InvalidSpec { .. } | OperatorError::InvalidKey(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, OperatorError>;
