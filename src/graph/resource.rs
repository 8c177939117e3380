// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource declarations and dependency edges

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::value::{Import, Value};
use crate::domain::{LogicalId, ResourceType};

/// Condition a readiness probe waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadinessCondition {
    /// Filesystem mount target is available in its subnet
    MountTargetAvailable,
    /// Database instance accepts connections
    DatabaseAvailable,
}

impl ReadinessCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadinessCondition::MountTargetAvailable => "MountTargetAvailable",
            ReadinessCondition::DatabaseAvailable => "DatabaseAvailable",
        }
    }
}

impl fmt::Display for ReadinessCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// "Do not create the dependent until `prerequisite` reaches `condition`"
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadinessProbe {
    pub prerequisite: LogicalId,
    pub condition: ReadinessCondition,
}

impl ReadinessProbe {
    pub fn new(prerequisite: &LogicalId, condition: ReadinessCondition) -> Self {
        Self {
            prerequisite: prerequisite.clone(),
            condition,
        }
    }

    /// Wait for a filesystem mount target
    pub fn mount_target(mount_target: &LogicalId) -> Self {
        Self::new(mount_target, ReadinessCondition::MountTargetAvailable)
    }
}

/// Explicit dependency edge from a resource to a prerequisite
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// Plain creation ordering
    Order(LogicalId),
    /// Ordering plus a readiness condition on the prerequisite
    Readiness(ReadinessProbe),
}

impl Dependency {
    /// The prerequisite resource
    pub fn target(&self) -> &LogicalId {
        match self {
            Dependency::Order(id) => id,
            Dependency::Readiness(probe) => &probe.prerequisite,
        }
    }
}

/// A single declared resource
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    logical_id: LogicalId,
    resource_type: ResourceType,
    properties: BTreeMap<String, Value>,
    dependencies: Vec<Dependency>,
}

impl Resource {
    pub fn new(logical_id: LogicalId, resource_type: ResourceType) -> Self {
        Self {
            logical_id,
            resource_type,
            properties: BTreeMap::new(),
            dependencies: Vec::new(),
        }
    }

    /// Set a property (builder form)
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_property(key, value);
        self
    }

    /// Set a property
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Declare an ordering dependency
    ///
    /// Duplicate edges are ignored (idempotent).
    pub fn depends_on(mut self, prerequisite: &LogicalId) -> Self {
        let dependency = Dependency::Order(prerequisite.clone());
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }

    /// Declare a readiness dependency
    pub fn waits_for(mut self, probe: ReadinessProbe) -> Self {
        let dependency = Dependency::Readiness(probe);
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
        self
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Readiness probes declared on this resource
    pub fn readiness_probes(&self) -> impl Iterator<Item = &ReadinessProbe> {
        self.dependencies.iter().filter_map(|d| match d {
            Dependency::Readiness(probe) => Some(probe),
            Dependency::Order(_) => None,
        })
    }

    /// Every resource this one must be created after
    ///
    /// Property references imply ordering, so the set is the union of
    /// referenced resources and explicit dependency targets.
    pub fn prerequisites(&self) -> BTreeSet<&LogicalId> {
        let mut out = BTreeSet::new();
        for value in self.properties.values() {
            value.collect_references(&mut out);
        }
        out.extend(self.dependencies.iter().map(Dependency::target));
        out
    }

    /// Cross-stack imports used by this resource
    pub fn imports(&self) -> BTreeSet<&Import> {
        let mut out = BTreeSet::new();
        for value in self.properties.values() {
            value.collect_imports(&mut out);
        }
        out
    }

    /// Explicit dependency targets, sorted and de-duplicated
    pub fn explicit_dependencies(&self) -> BTreeSet<&LogicalId> {
        self.dependencies.iter().map(Dependency::target).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    #[test]
    fn test_prerequisites_include_references_and_edges() {
        let service = Resource::new(id("WebuiService"), ResourceType::Service)
            .property("Cluster", Value::reference(&id("Cluster")))
            .property("TaskDefinition", Value::reference(&id("WebuiTaskDefinition")))
            .waits_for(ReadinessProbe::mount_target(&id("FileSystemMountTarget1")));

        let prereqs: Vec<&str> = service.prerequisites().into_iter().map(|p| p.as_str()).collect();
        assert_eq!(
            prereqs,
            vec!["Cluster", "FileSystemMountTarget1", "WebuiTaskDefinition"]
        );
        assert_eq!(service.readiness_probes().count(), 1);
    }

    #[test]
    fn test_dependencies_idempotent() {
        let route = Resource::new(id("PublicDefaultRoute"), ResourceType::Route)
            .depends_on(&id("GatewayAttachment"))
            .depends_on(&id("GatewayAttachment"));
        assert_eq!(route.dependencies().len(), 1);
    }
}
