// Copyright (c) 2025 - Cowboy AI, Inc.
//! Declarative Resource Graph
//!
//! Resources, their property values and dependency edges, and the [`Stack`]
//! scope they are declared into.
//!
//! # Edges
//!
//! ```text
//! Ref / GetAtt in a property   ──> implicit ordering edge
//! Dependency::Order            ──> explicit ordering edge
//! Dependency::Readiness        ──> ordering edge + readiness condition
//! Import (Fn::ImportValue)     ──> cross-stack edge, must be covered by a
//!                                  stack dependency
//! ```

pub mod analysis;
pub mod resource;
pub mod stack;
pub mod value;

pub use resource::{Dependency, ReadinessCondition, ReadinessProbe, Resource};
pub use stack::{Exports, Output, Stack};
pub use value::{Import, PseudoParameter, Value};
