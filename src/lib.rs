// Copyright (c) 2025 - Cowboy AI, Inc.
//! Declarative infrastructure for a web UI and an LLM gateway
//!
//! Four stacks (network, registry, data, compute) are composed into an
//! [`App`], wired through typed exports and imports, and synthesized into
//! deterministic templates. Deployment runs through a
//! [`Provisioner`](provisioner::Provisioner).
//!
//! ```text
//! DeploymentConfig ──compose──> App ──synth──> CloudAssembly
//!                                                   │
//!                         DeploymentService <───────┘
//!                                │ diff / deploy / destroy
//!                                ▼
//!                           Provisioner
//! ```

pub mod app;
pub mod config;
pub mod domain;
pub mod errors;
pub mod graph;
pub mod plan;
pub mod provisioner;
pub mod service;
pub mod stacks;
pub mod state_machine;
pub mod template;

// Re-export commonly used types
pub use app::{App, CloudAssembly, Environment, SynthesizedStack};
pub use config::DeploymentConfig;
pub use errors::{InfrastructureError, InfrastructureResult};
pub use graph::{Dependency, Exports, ReadinessProbe, Resource, Stack, Value};
pub use plan::{ChangeAction, StackChangeSet};
pub use provisioner::{DeployedStack, DeploymentEvent, LocalStateProvisioner, Provisioner};
pub use service::{DeploymentService, StackOutcome};
pub use stacks::compose;
pub use state_machine::StackStatus;
pub use template::Template;
