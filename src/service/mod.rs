// Copyright (c) 2025 - Cowboy AI, Inc.
//! Service Layer for Deployment
//!
//! Coordinates the pure parts (synthesis, planning, lifecycle transitions)
//! with a [`Provisioner`](crate::provisioner::Provisioner).
//!
//! ```text
//! CLI verb
//!     ↓
//! DeploymentService (this module)
//!     ↓
//! plan_stack() → StackStatus::transition() → Provisioner::apply()/destroy()
//!     ↓
//! Provisioner::record(DeploymentEvent)
//! ```

pub mod deployment;

pub use deployment::{DeploymentService, StackOutcome};
