// Copyright (c) 2025 - Cowboy AI, Inc.
//! Infrastructure Domain Models
//!
//! Value objects and pure invariants shared by every stack.
//!
//! # Value Objects with Invariants
//!
//! - [`Ipv4Cidr`] - network-aligned IPv4 CIDR blocks
//! - [`SubnetLayout`] - tiered, per-zone partition of a VPC block
//! - [`LogicalId`] - template-unique resource identifiers
//! - [`ExportName`] - cross-stack export names
//! - [`ResourceType`] - cloud resource taxonomy

pub mod invariants;
pub mod logical_id;
pub mod network;
pub mod resource_type;

pub use invariants::{ValidationError, ValidationResult};
pub use logical_id::{ExportName, LogicalId, LogicalIdError};
pub use network::{Ipv4Cidr, NetworkError, SubnetLayout, SubnetSlot, SubnetTier};
pub use resource_type::{ResourceCategory, ResourceType};
