// Copyright (c) 2025 - Cowboy AI, Inc.
//! Change Planning
//!
//! Planning is a pure function: `(applied template, desired template) →
//! change set`. Nothing is contacted; the provisioner receives the change
//! set as data and performs it.
//!
//! ```text
//! applied ─┐
//!          ├──> plan_stack() ──> StackChangeSet ──> Provisioner::apply()
//! desired ─┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::template::{Template, TemplateResource};

/// What happens to one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeAction {
    Add,
    Modify,
    Remove,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ChangeAction::Add => "+",
            ChangeAction::Modify => "~",
            ChangeAction::Remove => "-",
        };
        write!(f, "{}", symbol)
    }
}

/// One planned resource change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub action: ChangeAction,
    pub logical_id: String,
    pub resource_type: String,
    /// Top-level properties that differ (empty unless `Modify`)
    pub changed_properties: Vec<String>,
}

impl fmt::Display for ResourceChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.action, self.logical_id, self.resource_type)?;
        if !self.changed_properties.is_empty() {
            write!(f, " [{}]", self.changed_properties.join(", "))?;
        }
        Ok(())
    }
}

/// Planned changes for one stack, sorted by logical id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackChangeSet {
    pub stack: String,
    pub changes: Vec<ResourceChange>,
    /// Stack description or outputs changed
    pub outputs_changed: bool,
}

impl StackChangeSet {
    /// Nothing to do
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && !self.outputs_changed
    }

    pub fn count(&self, action: ChangeAction) -> usize {
        self.changes.iter().filter(|c| c.action == action).count()
    }

    /// One-line summary, e.g. `network: 3 to add, 1 to modify, 0 to remove`
    pub fn summary(&self) -> String {
        format!(
            "{}: {} to add, {} to modify, {} to remove",
            self.stack,
            self.count(ChangeAction::Add),
            self.count(ChangeAction::Modify),
            self.count(ChangeAction::Remove)
        )
    }
}

fn changed_properties(applied: &TemplateResource, desired: &TemplateResource) -> Vec<String> {
    let keys: BTreeSet<&String> = applied
        .properties
        .keys()
        .chain(desired.properties.keys())
        .collect();

    let mut changed: Vec<String> = keys
        .into_iter()
        .filter(|k| applied.properties.get(*k) != desired.properties.get(*k))
        .cloned()
        .collect();

    if applied.depends_on != desired.depends_on {
        changed.push("DependsOn".to_string());
    }
    if applied.metadata != desired.metadata {
        changed.push("Metadata".to_string());
    }
    changed
}

/// Compare an applied template (if any) with the desired one
pub fn plan_stack(stack: &str, applied: Option<&Template>, desired: &Template) -> StackChangeSet {
    let Some(applied) = applied else {
        return StackChangeSet {
            stack: stack.to_string(),
            changes: desired
                .resources
                .iter()
                .map(|(id, resource)| ResourceChange {
                    action: ChangeAction::Add,
                    logical_id: id.clone(),
                    resource_type: resource.resource_type.clone(),
                    changed_properties: Vec::new(),
                })
                .collect(),
            outputs_changed: !desired.outputs.is_empty(),
        };
    };

    let ids: BTreeSet<&String> = applied
        .resources
        .keys()
        .chain(desired.resources.keys())
        .collect();

    let changes = ids
        .into_iter()
        .filter_map(|id| {
            match (applied.resources.get(id), desired.resources.get(id)) {
                (None, Some(new)) => Some(ResourceChange {
                    action: ChangeAction::Add,
                    logical_id: id.clone(),
                    resource_type: new.resource_type.clone(),
                    changed_properties: Vec::new(),
                }),
                (Some(old), None) => Some(ResourceChange {
                    action: ChangeAction::Remove,
                    logical_id: id.clone(),
                    resource_type: old.resource_type.clone(),
                    changed_properties: Vec::new(),
                }),
                (Some(old), Some(new)) if old != new => {
                    // A type change is a replacement; report it as a modify of "Type"
                    let mut changed = changed_properties(old, new);
                    if old.resource_type != new.resource_type {
                        changed.insert(0, "Type".to_string());
                    }
                    Some(ResourceChange {
                        action: ChangeAction::Modify,
                        logical_id: id.clone(),
                        resource_type: new.resource_type.clone(),
                        changed_properties: changed,
                    })
                }
                _ => None,
            }
        })
        .collect();

    StackChangeSet {
        stack: stack.to_string(),
        changes,
        outputs_changed: applied.outputs != desired.outputs
            || applied.description != desired.description,
    }
}

/// Every resource of an applied template removed
pub fn plan_destroy(stack: &str, applied: &Template) -> StackChangeSet {
    StackChangeSet {
        stack: stack.to_string(),
        changes: applied
            .resources
            .iter()
            .map(|(id, resource)| ResourceChange {
                action: ChangeAction::Remove,
                logical_id: id.clone(),
                resource_type: resource.resource_type.clone(),
                changed_properties: Vec::new(),
            })
            .collect(),
        outputs_changed: !applied.outputs.is_empty(),
    }
}
