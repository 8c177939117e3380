// Copyright (c) 2025 - Cowboy AI, Inc.
//! Static inspection of a stack's resource graph

use std::collections::BTreeMap;
use tracing::warn;

use super::stack::Stack;
use super::value::Value;
use crate::domain::invariants::{validate_listener_priorities, validate_readiness};
use crate::domain::{LogicalId, ResourceType};
use crate::errors::InfrastructureResult;

/// Run every graph-level check on one stack
pub fn check_stack(stack: &Stack) -> InfrastructureResult<()> {
    check_listener_priorities(stack)?;
    check_filesystem_readiness(stack)?;
    Ok(())
}

/// Listener rules sharing a listener must have unique priorities
pub fn check_listener_priorities(stack: &Stack) -> InfrastructureResult<()> {
    let mut by_listener: BTreeMap<String, Vec<(String, i64)>> = BTreeMap::new();

    for resource in stack
        .resources()
        .iter()
        .filter(|r| r.resource_type() == ResourceType::ListenerRule)
    {
        let listener = resource
            .get("ListenerArn")
            .map(|v| v.to_json().to_string())
            .unwrap_or_default();
        let priority = resource.get("Priority").and_then(Value::as_int).unwrap_or(0);

        by_listener
            .entry(listener)
            .or_default()
            .push((resource.logical_id().to_string(), priority));
    }

    for (listener, rules) in &by_listener {
        validate_listener_priorities(listener, rules)?;
    }

    Ok(())
}

/// Filesystems a task definition mounts, via its EFS volume configuration
pub fn mounted_filesystems<'a>(stack: &'a Stack, task_definition: &LogicalId) -> Vec<&'a LogicalId> {
    stack
        .resource(task_definition)
        .and_then(|td| td.get("Volumes"))
        .and_then(Value::as_list)
        .map(|volumes| {
            volumes
                .iter()
                .filter_map(|volume| {
                    volume
                        .get("EFSVolumeConfiguration")
                        .and_then(|efs| efs.get("FilesystemId"))
                        .and_then(Value::as_ref_id)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Mount targets belonging to a filesystem
pub fn mount_targets<'a>(stack: &'a Stack, filesystem: &LogicalId) -> Vec<&'a LogicalId> {
    stack
        .resources()
        .iter()
        .filter(|r| r.resource_type() == ResourceType::MountTarget)
        .filter(|r| r.get("FileSystemId").and_then(Value::as_ref_id) == Some(filesystem))
        .map(|r| r.logical_id())
        .collect()
}

/// Every service mounting a filesystem must be created after all of that
/// filesystem's mount targets
pub fn check_filesystem_readiness(stack: &Stack) -> InfrastructureResult<()> {
    for service in stack
        .resources()
        .iter()
        .filter(|r| r.resource_type() == ResourceType::Service)
    {
        let Some(task_definition) = service.get("TaskDefinition").and_then(Value::as_ref_id) else {
            continue;
        };

        for filesystem in mounted_filesystems(stack, task_definition) {
            let targets = mount_targets(stack, filesystem);
            if targets.is_empty() {
                warn!(
                    stack = %stack.name(),
                    service = %service.logical_id(),
                    filesystem = %filesystem,
                    "Mounted filesystem has no mount targets in this stack"
                );
            }

            for target in targets {
                validate_readiness(
                    service.logical_id().as_str(),
                    target.as_str(),
                    stack.depends_transitively(service.logical_id(), target),
                )?;
            }
        }
    }

    Ok(())
}
