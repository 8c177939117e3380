// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for infrastructure synthesis and provisioning
//!
//! Errors fall into two tiers:
//! - **Structural** errors are detected while composing and synthesizing
//!   stacks, before any provisioning call is made.
//! - **Provisioning** errors come back from the provisioning engine and are
//!   surfaced unchanged.

use thiserror::Error;

use crate::domain::{LogicalIdError, NetworkError, ValidationError};
use crate::state_machine::TransitionError;

/// Errors that can occur in infrastructure operations
#[derive(Debug, Error)]
pub enum InfrastructureError {
    /// A consuming stack requires an output the producer does not export
    #[error("Stack '{consumer}' requires input '{input}' which stack '{producer}' does not export")]
    MissingInput {
        consumer: String,
        producer: String,
        input: String,
    },

    /// A stack imports from another stack without declaring a dependency on it
    #[error("Stack '{consumer}' imports '{export}' from '{producer}' but does not depend on it")]
    MissingStackDependency {
        consumer: String,
        producer: String,
        export: String,
    },

    /// Stack dependency graph contains a cycle
    #[error("Stack dependency cycle detected: {0}")]
    DependencyCycle(String),

    /// A referenced stack was never added to the app
    #[error("Unknown stack: {0}")]
    UnknownStack(String),

    /// Two stacks share a name
    #[error("Duplicate stack name: {0}")]
    DuplicateStack(String),

    /// Invalid network value
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Invalid logical id or export name
    #[error(transparent)]
    LogicalId(#[from] LogicalIdError),

    /// Graph or business invariant violated
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Stack lifecycle transition rejected
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A stack was deployed alone before the stacks it depends on
    #[error("Stack '{stack}' depends on '{dependency}' which is not deployed")]
    DependencyNotDeployed { stack: String, dependency: String },

    /// A stack was destroyed alone while a dependent is still deployed
    #[error("Stack '{stack}' is still required by deployed stack '{dependent}'")]
    DependentStillDeployed { stack: String, dependent: String },

    /// Error reported by the provisioning engine
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Filesystem error while reading or writing artifacts
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl InfrastructureError {
    /// Whether this error comes from the declarations alone, without
    /// consulting deployed state
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            InfrastructureError::Provisioning(_)
                | InfrastructureError::Io(_)
                | InfrastructureError::Transition(_)
                | InfrastructureError::DependencyNotDeployed { .. }
                | InfrastructureError::DependentStillDeployed { .. }
        )
    }
}

/// Result type for infrastructure operations
pub type InfrastructureResult<T> = Result<T, InfrastructureError>;

impl From<serde_json::Error> for InfrastructureError {
    fn from(err: serde_json::Error) -> Self {
        InfrastructureError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for InfrastructureError {
    fn from(err: toml::de::Error) -> Self {
        InfrastructureError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_classification() {
        let missing = InfrastructureError::MissingInput {
            consumer: "compute".to_string(),
            producer: "network".to_string(),
            input: "EcsSecurityGroupId".to_string(),
        };
        assert!(missing.is_structural());
        assert!(missing.to_string().contains("EcsSecurityGroupId"));

        let provisioning = InfrastructureError::Provisioning("throttled".to_string());
        assert!(!provisioning.is_structural());
    }

    #[test]
    fn test_from_serde_error() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: InfrastructureError = err.into();
        assert!(matches!(err, InfrastructureError::Serialization(_)));
    }
}
