// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioner - the seam to the provisioning engine
//!
//! The engine owns live state: it applies rendered templates, removes
//! stacks and records lifecycle events. Everything before this seam (graph,
//! synthesis, planning) is pure and runs without an engine.
//!
//! ```text
//! CloudAssembly ──plan──> StackChangeSet ──apply──> Provisioner ──> live state
//!                                                       │
//!                                                       └──record──> DeploymentEvent log
//! ```
//!
//! Errors returned by an engine are surfaced to the caller unchanged. There
//! is no retry policy at this layer.

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::SynthesizedStack;
use crate::errors::InfrastructureResult;
use crate::plan::StackChangeSet;
use crate::state_machine::StackStatus;
use crate::template::Template;

pub use local::LocalStateProvisioner;

/// What the engine knows about one stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployedStack {
    pub name: String,
    pub status: StackStatus,
    /// Last successfully applied template
    pub template: Option<Template>,
    pub updated_at: DateTime<Utc>,
}

impl DeployedStack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StackStatus::NotDeployed,
            template: None,
            updated_at: Utc::now(),
        }
    }
}

/// Recorded stack lifecycle transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentEvent {
    /// Time-ordered id (UUID v7)
    pub event_id: Uuid,
    pub stack: String,
    pub from: StackStatus,
    pub to: StackStatus,
    /// Number of resource changes in the operation
    pub changes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl DeploymentEvent {
    pub fn new(stack: impl Into<String>, from: StackStatus, to: StackStatus, changes: usize) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            stack: stack.into(),
            from,
            to,
            changes,
            message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Provisioning engine adapter
///
/// Implementations must:
/// - Apply a change set entirely or report an error
/// - Persist the lifecycle status passed to [`Provisioner::record`]
/// - Return engine errors unchanged
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Prepare the engine (create state storage, check credentials)
    ///
    /// Should be idempotent.
    async fn initialize(&mut self) -> InfrastructureResult<()>;

    /// Current state of a stack, `None` if the engine has never seen it
    async fn current(&self, stack: &str) -> InfrastructureResult<Option<DeployedStack>>;

    /// Converge a stack onto its rendered template
    async fn apply(&mut self, stack: &SynthesizedStack, changes: &StackChangeSet) -> InfrastructureResult<()>;

    /// Remove every resource of a stack
    async fn destroy(&mut self, stack: &str) -> InfrastructureResult<()>;

    /// Persist a lifecycle transition
    async fn record(&mut self, event: &DeploymentEvent) -> InfrastructureResult<()>;

    /// Verify the engine is reachable
    async fn health_check(&self) -> InfrastructureResult<()>;

    /// Get the name of this provisioner
    fn name(&self) -> &str;
}
