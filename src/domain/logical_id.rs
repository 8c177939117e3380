// Copyright (c) 2025 - Cowboy AI, Inc.
//! Logical Id and Export Name Value Objects

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Logical id / export name validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LogicalIdError {
    #[error("Identifier is empty")]
    Empty,

    #[error("Identifier exceeds maximum length of 255 characters: {0}")]
    TooLong(usize),

    #[error("Invalid character '{1}' in identifier: {0}")]
    InvalidCharacter(String, char),

    #[error("Logical id must start with a letter: {0}")]
    InvalidStart(String),
}

/// Template-unique resource identifier
///
/// Invariants:
/// - Non-empty, at most 255 characters
/// - ASCII alphanumeric only
/// - Starts with a letter
///
/// Logical ids are derived from declaration names, never generated, so the
/// same declarations always produce the same ids.
///
/// # Examples
///
/// ```rust
/// use gateway_infra::domain::LogicalId;
///
/// let id = LogicalId::from_parts(&["web-ui", "task", "role"]).unwrap();
/// assert_eq!(id.as_str(), "WebUiTaskRole");
/// assert!(LogicalId::new("Bad-Id").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LogicalId(String);

impl LogicalId {
    /// Maximum length of a logical id
    pub const MAX_LENGTH: usize = 255;

    /// Create a logical id with validation
    pub fn new(id: impl Into<String>) -> Result<Self, LogicalIdError> {
        let id = id.into();

        if id.is_empty() {
            return Err(LogicalIdError::Empty);
        }

        if id.len() > Self::MAX_LENGTH {
            return Err(LogicalIdError::TooLong(id.len()));
        }

        if let Some(ch) = id.chars().find(|c| !c.is_ascii_alphanumeric()) {
            return Err(LogicalIdError::InvalidCharacter(id, ch));
        }

        if !id.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(LogicalIdError::InvalidStart(id));
        }

        Ok(Self(id))
    }

    /// Build a PascalCase id from name fragments
    ///
    /// Each fragment is split on non-alphanumeric characters and every word
    /// is capitalised, so `["llm-gateway", "service"]` becomes
    /// `LlmGatewayService`.
    pub fn from_parts(parts: &[&str]) -> Result<Self, LogicalIdError> {
        Self::new(pascal_case(parts))
    }

    /// Get the logical id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub(crate) fn pascal_case(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| part.split(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LogicalId {
    type Err = LogicalIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LogicalId {
    type Error = LogicalIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LogicalId> for String {
    fn from(id: LogicalId) -> Self {
        id.0
    }
}

/// Name under which a stack output is exported to other stacks
///
/// Invariants:
/// - Non-empty, at most 255 characters
/// - ASCII alphanumeric, `-` and `:` only
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExportName(String);

impl ExportName {
    /// Create an export name with validation
    pub fn new(name: impl Into<String>) -> Result<Self, LogicalIdError> {
        let name = name.into();

        if name.is_empty() {
            return Err(LogicalIdError::Empty);
        }

        if name.len() > LogicalId::MAX_LENGTH {
            return Err(LogicalIdError::TooLong(name.len()));
        }

        if let Some(ch) = name
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != ':')
        {
            return Err(LogicalIdError::InvalidCharacter(name, ch));
        }

        Ok(Self(name))
    }

    /// Export name for a stack output: `<project>-<stack>-<output>`
    pub fn for_output(project: &str, stack: &str, output: &str) -> Result<Self, LogicalIdError> {
        Self::new(format!("{}-{}-{}", project, stack, output))
    }

    /// Get the export name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExportName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ExportName {
    type Error = LogicalIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExportName> for String {
    fn from(name: ExportName) -> Self {
        name.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Vpc" ; "simple")]
    #[test_case("PublicSubnet1" ; "trailing digit")]
    #[test_case("DbSecurityGroupIngressFromEcs5432" ; "long")]
    fn test_valid_logical_ids(id: &str) {
        assert!(LogicalId::new(id).is_ok());
    }

    #[test]
    fn test_invalid_logical_ids() {
        assert_eq!(LogicalId::new(""), Err(LogicalIdError::Empty));
        assert!(matches!(
            LogicalId::new("web-ui"),
            Err(LogicalIdError::InvalidCharacter(_, '-'))
        ));
        assert!(matches!(
            LogicalId::new("1Subnet"),
            Err(LogicalIdError::InvalidStart(_))
        ));
        assert!(matches!(
            LogicalId::new("A".repeat(256)),
            Err(LogicalIdError::TooLong(256))
        ));
    }

    #[test]
    fn test_from_parts() {
        let id = LogicalId::from_parts(&["llm-gateway", "service"]).unwrap();
        assert_eq!(id.as_str(), "LlmGatewayService");

        let id = LogicalId::from_parts(&["webui", "Data", "access_point"]).unwrap();
        assert_eq!(id.as_str(), "WebuiDataAccessPoint");

        assert!(LogicalId::from_parts(&["--", ""]).is_err());
    }

    #[test]
    fn test_export_name() {
        let name = ExportName::for_output("llm-stack", "network", "VpcId").unwrap();
        assert_eq!(name.as_str(), "llm-stack-network-VpcId");
        assert!(ExportName::new("has space").is_err());
        assert!(ExportName::new("").is_err());
    }
}
