// Copyright (c) 2025 - Cowboy AI, Inc.
//! Local state provisioner
//!
//! Persists applied templates and the deployment event log as JSON under a
//! state directory:
//!
//! ```text
//! <root>/stacks/<stack>.json   DeployedStack
//! <root>/events.jsonl          one DeploymentEvent per line
//! ```

use async_trait::async_trait;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{DeployedStack, DeploymentEvent, Provisioner};
use crate::app::SynthesizedStack;
use crate::errors::{InfrastructureError, InfrastructureResult};
use crate::plan::StackChangeSet;
use crate::state_machine::StackStatus;

const EVENTS_FILE: &str = "events.jsonl";
const STACKS_DIR: &str = "stacks";

/// File-backed provisioning engine
#[derive(Debug, Clone)]
pub struct LocalStateProvisioner {
    root: PathBuf,
}

impl LocalStateProvisioner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stack_path(&self, stack: &str) -> PathBuf {
        self.root.join(STACKS_DIR).join(format!("{}.json", stack))
    }

    fn events_path(&self) -> PathBuf {
        self.root.join(EVENTS_FILE)
    }

    async fn load(&self, stack: &str) -> InfrastructureResult<Option<DeployedStack>> {
        match fs::read_to_string(self.stack_path(stack)).await {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a temporary file so a crash never leaves half a state file
    async fn store(&self, state: &DeployedStack) -> InfrastructureResult<()> {
        let path = self.stack_path(&state.name);
        let tmp = path.with_extension("json.tmp");
        let mut raw = serde_json::to_string_pretty(state)?;
        raw.push('\n');
        fs::write(&tmp, raw).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Every recorded event, oldest first
    pub async fn events(&self) -> InfrastructureResult<Vec<DeploymentEvent>> {
        let raw = match fs::read_to_string(self.events_path()).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(InfrastructureError::from))
            .collect()
    }
}

#[async_trait]
impl Provisioner for LocalStateProvisioner {
    async fn initialize(&mut self) -> InfrastructureResult<()> {
        fs::create_dir_all(self.root.join(STACKS_DIR)).await?;
        debug!(root = %self.root.display(), "Initialized local state");
        Ok(())
    }

    async fn current(&self, stack: &str) -> InfrastructureResult<Option<DeployedStack>> {
        self.load(stack).await
    }

    async fn apply(&mut self, stack: &SynthesizedStack, changes: &StackChangeSet) -> InfrastructureResult<()> {
        let mut state = self
            .load(&stack.name)
            .await?
            .unwrap_or_else(|| DeployedStack::new(stack.name.clone()));

        state.template = Some(stack.template.clone());
        state.updated_at = Utc::now();
        self.store(&state).await?;

        info!(
            stack = %stack.qualified_name,
            changes = changes.changes.len(),
            "Applied stack"
        );
        Ok(())
    }

    async fn destroy(&mut self, stack: &str) -> InfrastructureResult<()> {
        let Some(mut state) = self.load(stack).await? else {
            return Err(InfrastructureError::Provisioning(format!(
                "stack '{}' has no state to destroy",
                stack
            )));
        };

        state.template = None;
        state.updated_at = Utc::now();
        self.store(&state).await?;

        info!(stack = %stack, "Destroyed stack");
        Ok(())
    }

    async fn record(&mut self, event: &DeploymentEvent) -> InfrastructureResult<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut log = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.events_path())
            .await?;
        log.write_all(line.as_bytes()).await?;
        log.flush().await?;

        if event.to == StackStatus::NotDeployed {
            match fs::remove_file(self.stack_path(&event.stack)).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        } else {
            let mut state = self
                .load(&event.stack)
                .await?
                .unwrap_or_else(|| DeployedStack::new(event.stack.clone()));
            state.status = event.to;
            state.updated_at = event.timestamp;
            self.store(&state).await?;
        }

        debug!(
            stack = %event.stack,
            from = %event.from,
            to = %event.to,
            event_id = %event.event_id,
            "Recorded deployment event"
        );
        Ok(())
    }

    async fn health_check(&self) -> InfrastructureResult<()> {
        match fs::metadata(self.root.join(STACKS_DIR)).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(InfrastructureError::Provisioning(format!(
                "state path {} is not a directory",
                self.root.display()
            ))),
            Err(e) => Err(InfrastructureError::Provisioning(format!(
                "state directory {} unavailable: {}",
                self.root.display(),
                e
            ))),
        }
    }

    fn name(&self) -> &str {
        "local-state"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Stack;
    use crate::plan::plan_stack;
    use crate::template::Template;

    fn synthesized(name: &str) -> SynthesizedStack {
        let stack = Stack::new("p", name, "test");
        SynthesizedStack {
            name: name.to_string(),
            qualified_name: stack.qualified_name(),
            dependencies: Vec::new(),
            template: Template::from_stack(&stack),
        }
    }

    #[test]
    fn test_apply_record_and_destroy() {
        tokio_test::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let mut provisioner = LocalStateProvisioner::new(dir.path());

            assert!(provisioner.health_check().await.is_err());
            provisioner.initialize().await.unwrap();
            provisioner.health_check().await.unwrap();
            assert!(provisioner.current("network").await.unwrap().is_none());

            let stack = synthesized("network");
            let changes = plan_stack("network", None, &stack.template);

            provisioner
                .record(&DeploymentEvent::new("network", StackStatus::NotDeployed, StackStatus::Deploying, 0))
                .await
                .unwrap();
            provisioner.apply(&stack, &changes).await.unwrap();
            provisioner
                .record(&DeploymentEvent::new("network", StackStatus::Deploying, StackStatus::Deployed, 0))
                .await
                .unwrap();

            let state = provisioner.current("network").await.unwrap().unwrap();
            assert_eq!(state.status, StackStatus::Deployed);
            assert_eq!(state.template.as_ref(), Some(&stack.template));

            provisioner.destroy("network").await.unwrap();
            provisioner
                .record(&DeploymentEvent::new("network", StackStatus::Destroying, StackStatus::NotDeployed, 0))
                .await
                .unwrap();
            assert!(provisioner.current("network").await.unwrap().is_none());

            let events = provisioner.events().await.unwrap();
            assert_eq!(events.len(), 3);
            assert!(events[0].timestamp <= events[2].timestamp);
            assert_eq!(events[2].to, StackStatus::NotDeployed);
        });
    }

    #[test]
    fn test_destroy_unknown_stack_is_provisioning_error() {
        tokio_test::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let mut provisioner = LocalStateProvisioner::new(dir.path());
            provisioner.initialize().await.unwrap();

            let err = provisioner.destroy("compute").await.unwrap_err();
            assert!(matches!(err, InfrastructureError::Provisioning(_)));
            assert!(!err.is_structural());
        });
    }
}
