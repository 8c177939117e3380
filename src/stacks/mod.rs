// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Builders
//!
//! One builder per stack, composed leaf-first:
//!
//! ```text
//! network ──┬──────────────> data ──┐
//!           │                       ├──> compute
//! registry ─┴───────────────────────┘
//! ```
//!
//! Each consuming stack resolves a typed input struct from its producers'
//! [`Exports`](crate::graph::Exports) before declaring anything, so a missing
//! output surfaces as [`InfrastructureError::MissingInput`] during synthesis.

pub mod compute;
pub mod data;
pub mod network;
pub mod registry;

use tracing::info;

use crate::app::{App, Environment};
use crate::config::DeploymentConfig;
use crate::domain::LogicalId;
use crate::errors::InfrastructureResult;

pub use compute::ComputeInputs;
pub use data::DataInputs;

/// Network foundation, security groups and load balancer
pub const NETWORK: &str = "network";
/// Container image registry
pub const REGISTRY: &str = "registry";
/// Database and credentials
pub const DATA: &str = "data";
/// Filesystem, cluster and services
pub const COMPUTE: &str = "compute";

/// Build every stack for a configuration
pub fn compose(config: &DeploymentConfig) -> InfrastructureResult<App> {
    config.validate()?;

    let network = network::build(config)?;
    let registry = registry::build(config)?;

    let data_inputs = DataInputs::resolve(config, &network.exports())?;
    let data = data::build(config, &data_inputs)?;

    let compute_inputs =
        ComputeInputs::resolve(config, &network.exports(), &registry.exports(), &data.exports())?;
    let compute = compute::build(config, &compute_inputs)?;

    let mut app = App::new(
        config.project.clone(),
        Environment::new(config.region.clone(), config.account.clone()),
    );
    app.add_stack(network)?;
    app.add_stack(registry)?;
    app.add_stack(data)?;
    app.add_stack(compute)?;

    info!(
        project = %config.project,
        stacks = app.stacks().len(),
        resources = app.stacks().iter().map(|s| s.resources().len()).sum::<usize>(),
        "Composed application"
    );

    Ok(app)
}

/// Logical id from name parts, e.g. `["webui", "task", "role"]` -> `WebuiTaskRole`
pub(crate) fn logical_id(parts: &[&str]) -> InfrastructureResult<LogicalId> {
    Ok(LogicalId::from_parts(parts)?)
}
