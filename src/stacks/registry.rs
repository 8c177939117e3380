// Copyright (c) 2025 - Cowboy AI, Inc.
//! Registry stack: one image repository per distinct service repository

use serde_json::json;
use tracing::debug;

use super::{logical_id, REGISTRY};
use crate::config::DeploymentConfig;
use crate::domain::invariants::validate_image_retention;
use crate::domain::logical_id::pascal_case;
use crate::domain::ResourceType;
use crate::errors::InfrastructureResult;
use crate::graph::{Resource, Stack, Value};

/// `<Repository>RepositoryUri`
pub fn repository_uri_output(repository: &str) -> String {
    format!("{}RepositoryUri", pascal_case(&[repository]))
}

/// Lifecycle policy expiring everything beyond the newest `retain` images
pub fn lifecycle_policy(retain: u32) -> InfrastructureResult<String> {
    validate_image_retention(retain)?;

    let policy = json!({
        "rules": [{
            "rulePriority": 1,
            "description": format!("Retain the last {} images", retain),
            "selection": {
                "tagStatus": "any",
                "countType": "imageCountMoreThan",
                "countNumber": retain,
            },
            "action": { "type": "expire" },
        }]
    });

    Ok(serde_json::to_string(&policy)?)
}

/// Build the registry stack
pub fn build(config: &DeploymentConfig) -> InfrastructureResult<Stack> {
    let mut stack = Stack::new(&config.project, REGISTRY, "Container image repositories");
    let policy = lifecycle_policy(config.registry.retain_images)?;

    for repository in config.repositories() {
        let id = stack.add(
            Resource::new(logical_id(&[repository, "repository"])?, ResourceType::EcrRepository)
                .property("RepositoryName", format!("{}/{}", config.project, repository))
                .property("ImageTagMutability", "MUTABLE")
                .property(
                    "ImageScanningConfiguration",
                    Value::map([("ScanOnPush", config.registry.scan_on_push)]),
                )
                .property(
                    "LifecyclePolicy",
                    Value::map([("LifecyclePolicyText", policy.as_str())]),
                ),
        )?;

        stack.export(
            &repository_uri_output(repository),
            Value::attribute(&id, "RepositoryUri"),
            &format!("Image repository URI for {}", repository),
        )?;
    }

    debug!(stack = %stack.name(), repositories = stack.outputs().len(), "Built registry stack");
    Ok(stack)
}
