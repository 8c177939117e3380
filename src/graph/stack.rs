// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack: the explicit construction scope
//!
//! Every builder receives the [`Stack`] it declares into; there is no ambient
//! "current scope". A stack enforces declaration order as resources are
//! added: a resource may only reference resources already present.

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::resource::Resource;
use super::value::{Import, Value};
use crate::domain::invariants::{validate_declared_before, ValidationError};
use crate::domain::{ExportName, LogicalId};
use crate::errors::{InfrastructureError, InfrastructureResult};

/// A published stack output
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub value: Value,
    pub export: ExportName,
    pub description: String,
}

/// The set of outputs one stack exports, as plain data
///
/// Consumers resolve their typed inputs from this with [`Exports::require`],
/// so a missing output fails at synthesis time rather than at deploy time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exports {
    producer: String,
    values: BTreeMap<String, Import>,
}

impl Exports {
    pub fn new(producer: impl Into<String>) -> Self {
        Self {
            producer: producer.into(),
            values: BTreeMap::new(),
        }
    }

    /// Name of the stack that exports these values
    pub fn producer(&self) -> &str {
        &self.producer
    }

    pub fn insert(&mut self, import: Import) {
        self.values.insert(import.output().to_string(), import);
    }

    pub fn remove(&mut self, output: &str) -> Option<Import> {
        self.values.remove(output)
    }

    pub fn get(&self, output: &str) -> Option<&Import> {
        self.values.get(output)
    }

    pub fn contains(&self, output: &str) -> bool {
        self.values.contains_key(output)
    }

    /// Output names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Resolve a required input for `consumer`
    pub fn require(&self, consumer: &str, output: &str) -> InfrastructureResult<Import> {
        self.values
            .get(output)
            .cloned()
            .ok_or_else(|| InfrastructureError::MissingInput {
                consumer: consumer.to_string(),
                producer: self.producer.clone(),
                input: output.to_string(),
            })
    }
}

/// A unit of declared resources with its own outputs
#[derive(Debug, Clone)]
pub struct Stack {
    project: String,
    name: String,
    description: String,
    resources: Vec<Resource>,
    index: BTreeMap<LogicalId, usize>,
    outputs: BTreeMap<String, Output>,
    dependencies: BTreeSet<String>,
}

impl Stack {
    pub fn new(project: &str, name: &str, description: &str) -> Self {
        Self {
            project: project.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            resources: Vec::new(),
            index: BTreeMap::new(),
            outputs: BTreeMap::new(),
            dependencies: BTreeSet::new(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Deployed stack name: `<project>-<stack>`
    pub fn qualified_name(&self) -> String {
        format!("{}-{}", self.project, self.name)
    }

    /// Declare a resource
    ///
    /// # Invariants
    /// - Logical id unique within the stack
    /// - Every referenced resource and dependency target already declared
    /// - Taggable resources carry `Project` and `Stack` tags
    pub fn add(&mut self, mut resource: Resource) -> InfrastructureResult<LogicalId> {
        let id = resource.logical_id().clone();

        if self.index.contains_key(&id) {
            return Err(ValidationError::DuplicateLogicalId(id.to_string()).into());
        }

        for prerequisite in resource.prerequisites() {
            validate_declared_before(
                id.as_str(),
                prerequisite.as_str(),
                self.index.contains_key(prerequisite),
            )?;
        }

        if let Some(tags) = resource.resource_type().tags_property() {
            if resource.get(tags).is_none() {
                resource.set_property(tags, self.default_tags());
            }
        }

        debug!(
            stack = %self.name,
            logical_id = %id,
            resource_type = %resource.resource_type(),
            category = ?resource.resource_type().category(),
            "Declared resource"
        );

        self.index.insert(id.clone(), self.resources.len());
        self.resources.push(resource);
        Ok(id)
    }

    fn default_tags(&self) -> Value {
        Value::list(vec![
            Value::map([("Key", "Project"), ("Value", self.project.as_str())]),
            Value::map([("Key", "Stack"), ("Value", self.name.as_str())]),
        ])
    }

    /// Resources in declaration order
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, id: &LogicalId) -> Option<&Resource> {
        self.index.get(id).map(|&i| &self.resources[i])
    }

    pub fn contains(&self, id: &LogicalId) -> bool {
        self.index.contains_key(id)
    }

    /// Publish an output under `<project>-<stack>-<name>`
    pub fn export(
        &mut self,
        name: &str,
        value: Value,
        description: &str,
    ) -> InfrastructureResult<Import> {
        if self.outputs.contains_key(name) {
            return Err(ValidationError::DuplicateOutput(name.to_string()).into());
        }

        let mut references = BTreeSet::new();
        value.collect_references(&mut references);
        for reference in references {
            validate_declared_before(
                &format!("Output {}", name),
                reference.as_str(),
                self.index.contains_key(reference),
            )?;
        }

        let export = ExportName::for_output(&self.project, &self.name, name)?;
        let import = Import::new(self.name.clone(), name, export.clone());

        self.outputs.insert(
            name.to_string(),
            Output {
                value,
                export,
                description: description.to_string(),
            },
        );

        Ok(import)
    }

    pub fn outputs(&self) -> &BTreeMap<String, Output> {
        &self.outputs
    }

    /// Everything this stack exports, as plain data
    pub fn exports(&self) -> Exports {
        let mut exports = Exports::new(self.name.clone());
        for (name, output) in &self.outputs {
            exports.insert(Import::new(self.name.clone(), name.clone(), output.export.clone()));
        }
        exports
    }

    /// Declare that this stack is deployed after `producer`
    pub fn add_dependency(&mut self, producer: &str) {
        self.dependencies.insert(producer.to_string());
    }

    /// Declared stack dependencies
    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    /// All cross-stack imports used by resources and outputs
    pub fn imports(&self) -> BTreeSet<&Import> {
        let mut out = BTreeSet::new();
        for resource in &self.resources {
            out.extend(resource.imports());
        }
        for output in self.outputs.values() {
            output.value.collect_imports(&mut out);
        }
        out
    }

    /// Whether `dependent` is (transitively) created after `prerequisite`
    pub fn depends_transitively(&self, dependent: &LogicalId, prerequisite: &LogicalId) -> bool {
        let mut stack = vec![dependent];
        let mut visited = BTreeSet::new();

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(resource) = self.resource(current) else {
                continue;
            };
            for next in resource.prerequisites() {
                if next == prerequisite {
                    return true;
                }
                stack.push(next);
            }
        }

        false
    }
}
