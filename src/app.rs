// Copyright (c) 2025 - Cowboy AI, Inc.
//! Application: the set of stacks deployed together
//!
//! The app owns every stack, validates cross-stack wiring and produces a
//! [`CloudAssembly`] of rendered templates in deployment order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::{InfrastructureError, InfrastructureResult};
use crate::graph::analysis;
use crate::graph::{Exports, Stack};
use crate::template::Template;

/// Manifest file written next to the templates
pub const MANIFEST_FILE: &str = "manifest.json";

/// Target region and account, supplied externally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub region: String,
    pub account: String,
}

impl Environment {
    pub fn new(region: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account: account.into(),
        }
    }
}

/// A set of stacks sharing one project and environment
#[derive(Debug, Clone)]
pub struct App {
    project: String,
    environment: Environment,
    stacks: Vec<Stack>,
}

impl App {
    pub fn new(project: impl Into<String>, environment: Environment) -> Self {
        Self {
            project: project.into(),
            environment,
            stacks: Vec::new(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Add a stack; names are unique within the app
    pub fn add_stack(&mut self, stack: Stack) -> InfrastructureResult<()> {
        if self.get(stack.name()).is_some() {
            return Err(InfrastructureError::DuplicateStack(stack.name().to_string()));
        }
        debug!(
            stack = %stack.name(),
            resources = stack.resources().len(),
            outputs = stack.outputs().len(),
            "Added stack"
        );
        self.stacks.push(stack);
        Ok(())
    }

    /// Stacks in declaration order
    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    pub fn get(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.name() == name)
    }

    /// Outputs exported by a stack
    pub fn exports(&self, name: &str) -> InfrastructureResult<Exports> {
        self.get(name)
            .map(Stack::exports)
            .ok_or_else(|| InfrastructureError::UnknownStack(name.to_string()))
    }

    /// Stack names ordered so every producer precedes its consumers
    ///
    /// Ties are broken by declaration order, so the result is stable.
    pub fn deployment_order(&self) -> InfrastructureResult<Vec<&str>> {
        for stack in &self.stacks {
            for dependency in stack.dependencies() {
                if self.get(dependency).is_none() {
                    return Err(InfrastructureError::UnknownStack(dependency.clone()));
                }
            }
        }

        let mut remaining: Vec<&Stack> = self.stacks.iter().collect();
        let mut placed: BTreeSet<&str> = BTreeSet::new();
        let mut order = Vec::with_capacity(self.stacks.len());

        while !remaining.is_empty() {
            let ready = remaining.iter().position(|stack| {
                stack
                    .dependencies()
                    .iter()
                    .all(|d| placed.contains(d.as_str()))
            });

            match ready {
                Some(index) => {
                    let stack = remaining.remove(index);
                    placed.insert(stack.name());
                    order.push(stack.name());
                }
                None => {
                    let cycle: Vec<&str> = remaining.iter().map(|s| s.name()).collect();
                    return Err(InfrastructureError::DependencyCycle(cycle.join(" -> ")));
                }
            }
        }

        Ok(order)
    }

    /// Stacks that (directly or transitively) depend on `name`
    pub fn dependents(&self, name: &str) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        let mut frontier = vec![name];
        while let Some(current) = frontier.pop() {
            for stack in &self.stacks {
                if stack.dependencies().contains(current) && out.insert(stack.name()) {
                    frontier.push(stack.name());
                }
            }
        }
        out
    }

    /// Transitive stack dependencies of `name`
    pub fn transitive_dependencies(&self, name: &str) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        let mut frontier = vec![name];
        while let Some(current) = frontier.pop() {
            if let Some(stack) = self.get(current) {
                for dependency in stack.dependencies() {
                    if out.insert(dependency.as_str()) {
                        frontier.push(dependency.as_str());
                    }
                }
            }
        }
        out
    }

    /// Validate cross-stack wiring and every stack's graph
    ///
    /// # Invariants
    /// - Stack dependencies are acyclic and name known stacks
    /// - Every import is exported by its producer
    /// - Every import's producer is a (transitive) dependency of the consumer
    /// - Listener priorities unique and readiness edges present per stack
    pub fn validate(&self) -> InfrastructureResult<()> {
        self.deployment_order()?;

        for stack in &self.stacks {
            let dependencies = self.transitive_dependencies(stack.name());

            for import in stack.imports() {
                let producer = self
                    .get(import.producer())
                    .ok_or_else(|| InfrastructureError::UnknownStack(import.producer().to_string()))?;

                if !producer.outputs().contains_key(import.output()) {
                    return Err(InfrastructureError::MissingInput {
                        consumer: stack.name().to_string(),
                        producer: producer.name().to_string(),
                        input: import.output().to_string(),
                    });
                }

                if !dependencies.contains(import.producer()) {
                    return Err(InfrastructureError::MissingStackDependency {
                        consumer: stack.name().to_string(),
                        producer: import.producer().to_string(),
                        export: import.export().to_string(),
                    });
                }
            }

            analysis::check_stack(stack)?;
        }

        Ok(())
    }

    /// Validate and render every stack
    pub fn synth(&self) -> InfrastructureResult<CloudAssembly> {
        self.validate()?;

        let stacks = self
            .deployment_order()?
            .into_iter()
            .filter_map(|name| self.get(name))
            .map(|stack| SynthesizedStack {
                name: stack.name().to_string(),
                qualified_name: stack.qualified_name(),
                dependencies: stack.dependencies().iter().cloned().collect(),
                template: Template::from_stack(stack),
            })
            .collect::<Vec<_>>();

        info!(
            project = %self.project,
            region = %self.environment.region,
            stacks = stacks.len(),
            "Synthesized cloud assembly"
        );

        Ok(CloudAssembly {
            project: self.project.clone(),
            environment: self.environment.clone(),
            stacks,
        })
    }
}

/// One rendered stack
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedStack {
    pub name: String,
    pub qualified_name: String,
    pub dependencies: Vec<String>,
    pub template: Template,
}

impl SynthesizedStack {
    /// Template file name inside the output directory
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.qualified_name)
    }
}

/// Synthesis output: rendered templates in deployment order
#[derive(Debug, Clone, PartialEq)]
pub struct CloudAssembly {
    pub project: String,
    pub environment: Environment,
    pub stacks: Vec<SynthesizedStack>,
}

/// Manifest entry for one stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestStack {
    pub name: String,
    pub stack_name: String,
    pub template_file: String,
    pub dependencies: Vec<String>,
}

/// Assembly manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub project: String,
    pub environment: Environment,
    pub stacks: Vec<ManifestStack>,
}

impl CloudAssembly {
    pub fn stack(&self, name: &str) -> Option<&SynthesizedStack> {
        self.stacks.iter().find(|s| s.name == name)
    }

    pub fn manifest(&self) -> Manifest {
        Manifest {
            project: self.project.clone(),
            environment: self.environment.clone(),
            stacks: self
                .stacks
                .iter()
                .map(|s| ManifestStack {
                    name: s.name.clone(),
                    stack_name: s.qualified_name.clone(),
                    template_file: s.template_file(),
                    dependencies: s.dependencies.clone(),
                })
                .collect(),
        }
    }

    /// Rendered files as (file name, contents), templates then manifest
    pub fn files(&self) -> InfrastructureResult<BTreeMap<String, String>> {
        let mut files = BTreeMap::new();
        for stack in &self.stacks {
            files.insert(stack.template_file(), stack.template.to_json_string()?);
        }
        let mut manifest = serde_json::to_string_pretty(&self.manifest())?;
        manifest.push('\n');
        files.insert(MANIFEST_FILE.to_string(), manifest);
        Ok(files)
    }

    /// Write every file into `dir`, creating it if needed
    pub async fn write_to(&self, dir: &Path) -> InfrastructureResult<Vec<PathBuf>> {
        tokio::fs::create_dir_all(dir).await?;

        let mut written = Vec::new();
        for (name, contents) in self.files()? {
            let path = dir.join(&name);
            tokio::fs::write(&path, contents).await?;
            debug!(path = %path.display(), "Wrote artifact");
            written.push(path);
        }

        info!(dir = %dir.display(), files = written.len(), "Wrote cloud assembly");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LogicalId, ResourceType};
    use crate::graph::{Resource, Value};
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    fn env() -> Environment {
        Environment::new("eu-west-1", "123456789012")
    }

    fn producer() -> Stack {
        let mut stack = Stack::new("p", "network", "Network");
        let vpc = stack
            .add(Resource::new(id("Vpc"), ResourceType::Vpc).property("CidrBlock", "10.0.0.0/16"))
            .unwrap();
        stack.export("VpcId", Value::reference(&vpc), "VPC").unwrap();
        stack
    }

    fn consumer(producer: &Stack, declare_dependency: bool) -> Stack {
        let vpc = producer.exports().require("compute", "VpcId").unwrap();
        let mut stack = Stack::new("p", "compute", "Compute");
        stack
            .add(
                Resource::new(id("Group"), ResourceType::SecurityGroup)
                    .property("GroupDescription", "g")
                    .property("VpcId", vpc.value()),
            )
            .unwrap();
        if declare_dependency {
            stack.add_dependency(producer.name());
        }
        stack
    }

    #[test]
    fn test_deployment_order_respects_dependencies() {
        let network = producer();
        let compute = consumer(&network, true);

        let mut app = App::new("p", env());
        app.add_stack(compute).unwrap();
        app.add_stack(network).unwrap();

        assert_eq!(app.deployment_order().unwrap(), vec!["network", "compute"]);
        assert_eq!(app.dependents("network"), BTreeSet::from(["compute"]));
        app.validate().unwrap();
    }

    #[test]
    fn test_import_without_dependency_rejected() {
        let network = producer();
        let compute = consumer(&network, false);

        let mut app = App::new("p", env());
        app.add_stack(network).unwrap();
        app.add_stack(compute).unwrap();

        assert!(matches!(
            app.validate(),
            Err(InfrastructureError::MissingStackDependency { .. })
        ));
    }

    #[test]
    fn test_cycle_and_unknown_stack() {
        let mut a = Stack::new("p", "a", "");
        a.add_dependency("b");
        let mut b = Stack::new("p", "b", "");
        b.add_dependency("a");

        let mut app = App::new("p", env());
        app.add_stack(a).unwrap();
        app.add_stack(b).unwrap();
        assert!(matches!(
            app.deployment_order(),
            Err(InfrastructureError::DependencyCycle(_))
        ));

        let mut c = Stack::new("p", "c", "");
        c.add_dependency("missing");
        let mut app = App::new("p", env());
        app.add_stack(c).unwrap();
        assert!(matches!(
            app.deployment_order(),
            Err(InfrastructureError::UnknownStack(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_duplicate_stack_rejected() {
        let mut app = App::new("p", env());
        app.add_stack(producer()).unwrap();
        assert!(matches!(
            app.add_stack(producer()),
            Err(InfrastructureError::DuplicateStack(_))
        ));
    }

    #[test]
    fn test_synth_files() {
        let network = producer();
        let compute = consumer(&network, true);
        let mut app = App::new("p", env());
        app.add_stack(network).unwrap();
        app.add_stack(compute).unwrap();

        let assembly = app.synth().unwrap();
        let files = assembly.files().unwrap();
        assert_eq!(
            files.keys().cloned().collect::<Vec<_>>(),
            vec![
                "manifest.json".to_string(),
                "p-compute.template.json".to_string(),
                "p-network.template.json".to_string(),
            ]
        );

        let manifest = assembly.manifest();
        assert_eq!(manifest.stacks[1].dependencies, vec!["network".to_string()]);
    }
}
