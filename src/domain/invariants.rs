// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Validation Functions - Synthesis Invariants
//!
//! Every rule here runs during synthesis, before anything is handed to the
//! provisioning engine. All functions are pure and return the first
//! violation found.
//!
//! # Invariant Categories
//!
//! 1. **Ordering**: references point only at already-declared resources
//! 2. **Network**: subnets are contained in the VPC and pairwise disjoint
//! 3. **Routing**: listener rule priorities are in range and unique
//! 4. **Placement**: databases live in isolated subnets
//! 5. **Secrets**: credentials never travel as plaintext environment values
//! 6. **Readiness**: dependents wait for asynchronous prerequisites

use std::collections::{BTreeMap, HashMap};

use crate::domain::{Ipv4Cidr, SubnetTier};

/// Validation result with detailed error information
pub type ValidationResult = Result<(), ValidationError>;

/// Validation error with context
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A resource references something declared later (or never)
    #[error("Resource '{resource}' references '{reference}' before it is declared")]
    ForwardReference { resource: String, reference: String },

    /// Logical ids must be unique within a stack
    #[error("Duplicate logical id '{0}'")]
    DuplicateLogicalId(String),

    /// Output names must be unique within a stack
    #[error("Duplicate output '{0}'")]
    DuplicateOutput(String),

    /// Subnet not contained in the VPC block
    #[error("Subnet '{subnet}' ({cidr}) is outside VPC block {vpc}")]
    SubnetOutsideVpc {
        subnet: String,
        cidr: String,
        vpc: String,
    },

    /// Two subnets share addresses
    #[error("Subnets '{first}' and '{second}' overlap")]
    OverlappingSubnets { first: String, second: String },

    /// Listener rule priority outside the accepted range
    #[error("Listener rule '{rule}' priority {priority} is outside 1..=50000")]
    PriorityOutOfRange { rule: String, priority: i64 },

    /// Two rules on one listener share a priority
    #[error("Listener '{listener}' rules '{first}' and '{second}' share priority {priority}")]
    DuplicatePriority {
        listener: String,
        priority: i64,
        first: String,
        second: String,
    },

    /// Database placed outside the isolated tier
    #[error("Database subnets must be in the isolated tier, got {0}")]
    DatabaseNotIsolated(SubnetTier),

    /// Credential-like value passed as a plaintext environment variable
    #[error("Container '{container}' passes '{key}' as plaintext; inject it from the secret store")]
    PlaintextSecret { container: String, key: String },

    /// User environment sets a variable the synthesizer injects itself
    #[error("Container '{container}' sets reserved variable '{key}'")]
    ReservedVariable { container: String, key: String },

    /// A dependent resource has no dependency path to its prerequisite
    #[error("Resource '{dependent}' does not wait for '{prerequisite}' to become ready")]
    ReadinessNotSatisfied {
        dependent: String,
        prerequisite: String,
    },

    /// Image lifecycle must keep at least one image
    #[error("Image retention must be at least 1, got {0}")]
    InvalidRetention(u32),

    /// Business rule violation
    #[error("Business rule violated: {0}")]
    BusinessRule(String),
}

/// Lowest listener rule priority accepted by the load balancer
pub const MIN_RULE_PRIORITY: i64 = 1;

/// Highest listener rule priority accepted by the load balancer
pub const MAX_RULE_PRIORITY: i64 = 50_000;

/// Validate that a reference target was declared before the referencing resource
pub fn validate_declared_before(
    resource: &str,
    reference: &str,
    declared: bool,
) -> ValidationResult {
    if !declared {
        return Err(ValidationError::ForwardReference {
            resource: resource.to_string(),
            reference: reference.to_string(),
        });
    }
    Ok(())
}

/// Validate subnet partitioning of a VPC block
///
/// # Rules
/// - Every subnet lies within the VPC block
/// - No two subnets overlap
pub fn validate_subnet_partition(vpc: &Ipv4Cidr, subnets: &[(String, Ipv4Cidr)]) -> ValidationResult {
    for (name, cidr) in subnets {
        if !vpc.contains(cidr) {
            return Err(ValidationError::SubnetOutsideVpc {
                subnet: name.clone(),
                cidr: cidr.as_cidr(),
                vpc: vpc.as_cidr(),
            });
        }
    }

    for (i, (first, a)) in subnets.iter().enumerate() {
        if let Some((second, _)) = subnets[i + 1..].iter().find(|(_, b)| a.overlaps(b)) {
            return Err(ValidationError::OverlappingSubnets {
                first: first.clone(),
                second: second.clone(),
            });
        }
    }

    Ok(())
}

/// Validate routing rule priorities on one listener
///
/// # Rules
/// - Priorities within 1..=50000
/// - Priorities pairwise unique
pub fn validate_listener_priorities(listener: &str, rules: &[(String, i64)]) -> ValidationResult {
    let mut seen: HashMap<i64, &str> = HashMap::new();

    for (rule, priority) in rules {
        if !(MIN_RULE_PRIORITY..=MAX_RULE_PRIORITY).contains(priority) {
            return Err(ValidationError::PriorityOutOfRange {
                rule: rule.clone(),
                priority: *priority,
            });
        }

        if let Some(first) = seen.insert(*priority, rule) {
            return Err(ValidationError::DuplicatePriority {
                listener: listener.to_string(),
                priority: *priority,
                first: first.to_string(),
                second: rule.clone(),
            });
        }
    }

    Ok(())
}

/// Validate database subnet placement
pub fn validate_database_placement(tier: SubnetTier) -> ValidationResult {
    if tier != SubnetTier::Isolated {
        return Err(ValidationError::DatabaseNotIsolated(tier));
    }
    Ok(())
}

/// Validate image lifecycle retention count
pub fn validate_image_retention(retain: u32) -> ValidationResult {
    if retain == 0 {
        return Err(ValidationError::InvalidRetention(retain));
    }
    Ok(())
}

const SECRET_KEY_MARKERS: [&str; 7] = [
    "PASSWORD",
    "PASSWD",
    "SECRET",
    "TOKEN",
    "API_KEY",
    "MASTER_KEY",
    "PRIVATE_KEY",
];

/// Whether an environment variable looks like it carries a credential
///
/// Flags keys containing a credential marker, and URL values with an embedded
/// `user:password@` userinfo section.
pub fn looks_like_credential(key: &str, value: &str) -> bool {
    let upper = key.to_ascii_uppercase();
    if SECRET_KEY_MARKERS.iter().any(|marker| upper.contains(marker)) {
        return true;
    }

    value
        .split_once("://")
        .map(|(_, rest)| {
            let authority = rest.split('/').next().unwrap_or(rest);
            authority
                .rsplit_once('@')
                .map(|(userinfo, _)| userinfo.contains(':'))
                .unwrap_or(false)
        })
        .unwrap_or(false)
}

/// Validate that plaintext container environment carries no credentials
pub fn validate_plaintext_environment(
    container: &str,
    environment: &BTreeMap<String, String>,
) -> ValidationResult {
    match environment
        .iter()
        .find(|(key, value)| looks_like_credential(key, value))
    {
        Some((key, _)) => Err(ValidationError::PlaintextSecret {
            container: container.to_string(),
            key: key.clone(),
        }),
        None => Ok(()),
    }
}

/// Variables injected into containers that use the database
pub const DATABASE_VARIABLES: [&str; 5] = ["DB_HOST", "DB_PORT", "DB_NAME", "DB_USERNAME", "DB_PASSWORD"];

/// Whether a value names a secret-store or parameter-store entry by ARN
pub fn is_secret_reference(value: &str) -> bool {
    value.starts_with("arn:") && (value.contains(":secretsmanager:") || value.contains(":ssm:"))
}

/// Validate that every injected secret is a store reference, never a literal
pub fn validate_secret_references(
    container: &str,
    secrets: &BTreeMap<String, String>,
) -> ValidationResult {
    match secrets.iter().find(|(_, value)| !is_secret_reference(value)) {
        Some((key, _)) => Err(ValidationError::PlaintextSecret {
            container: container.to_string(),
            key: key.clone(),
        }),
        None => Ok(()),
    }
}

/// Validate that user-supplied variable names avoid the injected database set
pub fn validate_reserved_variables<'a>(
    container: &str,
    keys: impl IntoIterator<Item = &'a String>,
) -> ValidationResult {
    match keys
        .into_iter()
        .find(|key| DATABASE_VARIABLES.contains(&key.as_str()))
    {
        Some(key) => Err(ValidationError::ReservedVariable {
            container: container.to_string(),
            key: key.clone(),
        }),
        None => Ok(()),
    }
}

/// Validate that a dependent waits for its prerequisite
pub fn validate_readiness(dependent: &str, prerequisite: &str, has_path: bool) -> ValidationResult {
    if !has_path {
        return Err(ValidationError::ReadinessNotSatisfied {
            dependent: dependent.to_string(),
            prerequisite: prerequisite.to_string(),
        });
    }
    Ok(())
}
