// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for gateway-infra
//!
//! Deterministic configurations and a provisioner that fails on demand.
//! Targets are fixed constants; nothing is read from the process environment.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeSet;

use gateway_infra::app::SynthesizedStack;
use gateway_infra::errors::{InfrastructureError, InfrastructureResult};
use gateway_infra::plan::StackChangeSet;
use gateway_infra::provisioner::{DeployedStack, DeploymentEvent, LocalStateProvisioner, Provisioner};
use gateway_infra::state_machine::StackStatus;
use gateway_infra::DeploymentConfig;

pub const REGION: &str = "eu-west-1";
pub const ACCOUNT: &str = "123456789012";

/// TOML configuration for a gateway-only deployment
pub const GATEWAY_ONLY_TOML: &str = include_str!("gateway-only.toml");

/// Default configuration with a fixed target
pub fn targeted_config() -> DeploymentConfig {
    let mut config = DeploymentConfig::default();
    config.region = REGION.to_string();
    config.account = ACCOUNT.to_string();
    config
}

/// Gateway-only configuration parsed from the TOML fixture
pub fn gateway_only_config() -> DeploymentConfig {
    DeploymentConfig::from_toml(GATEWAY_ONLY_TOML).expect("Invalid TOML fixture")
}

/// Local state engine that reports an engine error for selected stacks
pub struct FailingProvisioner {
    inner: LocalStateProvisioner,
    fail_apply: BTreeSet<String>,
    fail_destroy: BTreeSet<String>,
    fail_record: BTreeSet<String>,
}

impl FailingProvisioner {
    pub fn new(inner: LocalStateProvisioner) -> Self {
        Self {
            inner,
            fail_apply: BTreeSet::new(),
            fail_destroy: BTreeSet::new(),
            fail_record: BTreeSet::new(),
        }
    }

    pub fn failing_apply(mut self, stack: &str) -> Self {
        self.fail_apply.insert(stack.to_string());
        self
    }

    pub fn failing_destroy(mut self, stack: &str) -> Self {
        self.fail_destroy.insert(stack.to_string());
        self
    }

    /// Refuse to record the transition into `Failed` for `stack`
    pub fn failing_record(mut self, stack: &str) -> Self {
        self.fail_record.insert(stack.to_string());
        self
    }

    pub fn inner(&self) -> &LocalStateProvisioner {
        &self.inner
    }
}

#[async_trait]
impl Provisioner for FailingProvisioner {
    async fn initialize(&mut self) -> InfrastructureResult<()> {
        self.inner.initialize().await
    }

    async fn current(&self, stack: &str) -> InfrastructureResult<Option<DeployedStack>> {
        self.inner.current(stack).await
    }

    async fn apply(&mut self, stack: &SynthesizedStack, changes: &StackChangeSet) -> InfrastructureResult<()> {
        if self.fail_apply.contains(&stack.name) {
            return Err(InfrastructureError::Provisioning(format!(
                "CREATE_FAILED: {} quota exceeded",
                stack.qualified_name
            )));
        }
        self.inner.apply(stack, changes).await
    }

    async fn destroy(&mut self, stack: &str) -> InfrastructureResult<()> {
        if self.fail_destroy.contains(stack) {
            return Err(InfrastructureError::Provisioning(format!(
                "DELETE_FAILED: {} has dependent objects",
                stack
            )));
        }
        self.inner.destroy(stack).await
    }

    async fn record(&mut self, event: &DeploymentEvent) -> InfrastructureResult<()> {
        if event.to == StackStatus::Failed && self.fail_record.contains(&event.stack) {
            return Err(InfrastructureError::Provisioning(format!(
                "state store unavailable while recording {}",
                event.stack
            )));
        }
        self.inner.record(event).await
    }

    async fn health_check(&self) -> InfrastructureResult<()> {
        self.inner.health_check().await
    }

    fn name(&self) -> &str {
        "failing"
    }
}
