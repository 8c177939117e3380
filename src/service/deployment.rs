// Copyright (c) 2025 - Cowboy AI, Inc.
//! Diff, deploy and destroy over a synthesized cloud assembly

use tracing::{info, warn};

use crate::app::{CloudAssembly, SynthesizedStack};
use crate::errors::{InfrastructureError, InfrastructureResult};
use crate::plan::{plan_destroy, plan_stack, StackChangeSet};
use crate::provisioner::{DeploymentEvent, Provisioner};
use crate::state_machine::{StackCommand, StackStatus, StateMachine};

/// Result of deploying or destroying one stack
#[derive(Debug, Clone, PartialEq)]
pub struct StackOutcome {
    pub change_set: StackChangeSet,
    pub status: StackStatus,
    /// Nothing changed, no provisioning call made
    pub skipped: bool,
}

/// Orchestrates verbs against a provisioner
pub struct DeploymentService<P: Provisioner> {
    provisioner: P,
}

impl<P: Provisioner> DeploymentService<P> {
    pub fn new(provisioner: P) -> Self {
        Self { provisioner }
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    pub fn into_inner(self) -> P {
        self.provisioner
    }

    /// Prepare and verify the provisioner
    pub async fn initialize(&mut self) -> InfrastructureResult<()> {
        self.provisioner.initialize().await?;
        self.provisioner.health_check().await
    }

    async fn status(&self, stack: &str) -> InfrastructureResult<StackStatus> {
        Ok(self
            .provisioner
            .current(stack)
            .await?
            .map(|s| s.status)
            .unwrap_or_default())
    }

    fn selected<'a>(
        assembly: &'a CloudAssembly,
        only: Option<&str>,
    ) -> InfrastructureResult<Vec<&'a SynthesizedStack>> {
        match only {
            Some(name) => assembly
                .stack(name)
                .map(|s| vec![s])
                .ok_or_else(|| InfrastructureError::UnknownStack(name.to_string())),
            None => Ok(assembly.stacks.iter().collect()),
        }
    }

    /// Change sets against deployed state, in deployment order
    pub async fn diff(
        &self,
        assembly: &CloudAssembly,
        only: Option<&str>,
    ) -> InfrastructureResult<Vec<StackChangeSet>> {
        let mut plans = Vec::new();
        for stack in Self::selected(assembly, only)? {
            let current = self.provisioner.current(&stack.name).await?;
            let applied = current.as_ref().and_then(|c| c.template.as_ref());
            plans.push(plan_stack(&stack.name, applied, &stack.template));
        }
        Ok(plans)
    }

    async fn transition(
        &mut self,
        stack: &str,
        from: StackStatus,
        command: StackCommand,
        changes: usize,
    ) -> InfrastructureResult<StackStatus> {
        let (to, output) = from.transition(&command)?;
        for warning in &output.warnings {
            warn!(stack = %stack, "{}", warning);
        }
        self.provisioner
            .record(&DeploymentEvent::new(stack, from, to, changes))
            .await?;
        Ok(to)
    }

    /// Mark a stack failed after an engine error and hand the error back
    ///
    /// The engine error is what the caller sees; a failure to record the
    /// transition is only logged.
    async fn record_failure(
        &mut self,
        stack: &str,
        from: StackStatus,
        changes: usize,
        err: InfrastructureError,
    ) -> InfrastructureError {
        let failed = match from.transition(&StackCommand::Fail) {
            Ok((failed, output)) => {
                for warning in &output.warnings {
                    warn!(stack = %stack, "{}", warning);
                }
                failed
            }
            Err(transition) => {
                warn!(stack = %stack, error = %transition, "Cannot mark stack failed");
                return err;
            }
        };

        let event = DeploymentEvent::new(stack, from, failed, changes).with_message(err.to_string());
        if let Err(record) = self.provisioner.record(&event).await {
            warn!(
                stack = %stack,
                error = %record,
                "Failed to record failure; stack status may be stale"
            );
        }
        err
    }

    /// Apply stacks in dependency order
    ///
    /// With `only`, every dependency of that stack must already be deployed.
    pub async fn deploy(
        &mut self,
        assembly: &CloudAssembly,
        only: Option<&str>,
    ) -> InfrastructureResult<Vec<StackOutcome>> {
        let mut outcomes = Vec::new();

        for stack in Self::selected(assembly, only)? {
            for dependency in &stack.dependencies {
                if !self.status(dependency).await?.is_stable() {
                    return Err(InfrastructureError::DependencyNotDeployed {
                        stack: stack.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }

            let current = self.provisioner.current(&stack.name).await?;
            let status = current.as_ref().map(|c| c.status).unwrap_or_default();
            let applied = current.as_ref().and_then(|c| c.template.as_ref());
            let change_set = plan_stack(&stack.name, applied, &stack.template);

            if status == StackStatus::Deployed && change_set.is_empty() {
                info!(stack = %stack.qualified_name, "No changes");
                outcomes.push(StackOutcome {
                    change_set,
                    status,
                    skipped: true,
                });
                continue;
            }

            let changes = change_set.changes.len();
            let deploying = self
                .transition(&stack.name, status, StackCommand::BeginDeploy, changes)
                .await?;

            if let Err(err) = self.provisioner.apply(stack, &change_set).await {
                return Err(self.record_failure(&stack.name, deploying, changes, err).await);
            }

            let status = self
                .transition(&stack.name, deploying, StackCommand::Complete, changes)
                .await?;

            info!(stack = %stack.qualified_name, "{}", change_set.summary());
            outcomes.push(StackOutcome {
                change_set,
                status,
                skipped: false,
            });
        }

        Ok(outcomes)
    }

    /// Remove stacks in reverse dependency order
    ///
    /// With `only`, no deployed stack may still depend on it.
    pub async fn destroy(
        &mut self,
        assembly: &CloudAssembly,
        only: Option<&str>,
    ) -> InfrastructureResult<Vec<StackOutcome>> {
        if let Some(name) = only {
            let dependents = assembly
                .stacks
                .iter()
                .filter(|s| s.dependencies.iter().any(|d| d == name));
            for dependent in dependents {
                if self.status(&dependent.name).await?.is_present() {
                    return Err(InfrastructureError::DependentStillDeployed {
                        stack: name.to_string(),
                        dependent: dependent.name.clone(),
                    });
                }
            }
        }

        let mut outcomes = Vec::new();

        for stack in Self::selected(assembly, only)?.into_iter().rev() {
            let Some(current) = self.provisioner.current(&stack.name).await? else {
                info!(stack = %stack.qualified_name, "Not deployed");
                continue;
            };

            let change_set = match &current.template {
                Some(template) => plan_destroy(&stack.name, template),
                // failed before the first apply, nothing recorded
                None => StackChangeSet {
                    stack: stack.name.clone(),
                    changes: Vec::new(),
                    outputs_changed: false,
                },
            };
            let changes = change_set.changes.len();

            let destroying = self
                .transition(&stack.name, current.status, StackCommand::BeginDestroy, changes)
                .await?;

            if let Err(err) = self.provisioner.destroy(&stack.name).await {
                return Err(self.record_failure(&stack.name, destroying, changes, err).await);
            }

            let status = self
                .transition(&stack.name, destroying, StackCommand::CompleteDestroy, changes)
                .await?;

            info!(stack = %stack.qualified_name, "{}", change_set.summary());
            outcomes.push(StackOutcome {
                change_set,
                status,
                skipped: false,
            });
        }

        Ok(outcomes)
    }

    /// Mark stacks left mid-deploy or mid-destroy by an interrupted run as failed
    ///
    /// Recovered stacks can then be destroyed and deployed again. Stacks in
    /// any other state are left alone.
    pub async fn recover(
        &mut self,
        assembly: &CloudAssembly,
        only: Option<&str>,
    ) -> InfrastructureResult<Vec<StackOutcome>> {
        let mut outcomes = Vec::new();

        for stack in Self::selected(assembly, only)? {
            let status = self.status(&stack.name).await?;
            if !status.is_in_progress() {
                continue;
            }

            let (failed, output) = status.transition(&StackCommand::Recover)?;
            for warning in &output.warnings {
                warn!(stack = %stack.qualified_name, "{}", warning);
            }
            self.provisioner
                .record(
                    &DeploymentEvent::new(&stack.name, status, failed, 0)
                        .with_message(format!("recovered from interrupted {}", status)),
                )
                .await?;

            outcomes.push(StackOutcome {
                change_set: StackChangeSet {
                    stack: stack.name.clone(),
                    changes: Vec::new(),
                    outputs_changed: false,
                },
                status: failed,
                skipped: false,
            });
        }

        Ok(outcomes)
    }
}
