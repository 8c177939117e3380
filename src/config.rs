// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deployment configuration
//!
//! Loaded from a TOML file with environment overrides for the target region,
//! account and project name. Without a file, [`DeploymentConfig::default`]
//! describes the web UI + LLM gateway deployment.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

use crate::domain::invariants::{
    validate_image_retention, validate_plaintext_environment, validate_reserved_variables,
    validate_secret_references,
};
use crate::domain::{Ipv4Cidr, SubnetTier};
use crate::errors::{InfrastructureError, InfrastructureResult};

/// Top-level deployment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeploymentConfig {
    /// Project name, prefixes every stack and export name
    pub project: String,
    /// Target region (supplied externally)
    pub region: String,
    /// Target account (supplied externally)
    pub account: String,
    pub network: NetworkConfig,
    pub registry: RegistryConfig,
    pub database: DatabaseConfig,
    pub filesystem: FilesystemConfig,
    /// Log group retention for every service
    pub log_retention_days: u32,
    pub services: Vec<ServiceConfig>,
}

/// VPC layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub vpc_cidr: Ipv4Cidr,
    pub availability_zones: usize,
    pub subnet_prefix: u8,
    /// Number of NAT gateways (1..=availability_zones)
    pub nat_gateways: usize,
    /// Create interface endpoints for ECR, logs and Secrets Manager
    pub interface_endpoints: bool,
    /// Public listener port
    pub listener_port: u16,
    /// Load balancer idle timeout (long for streamed completions)
    pub idle_timeout_seconds: u32,
}

/// Image registry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Lifecycle policy keeps the last N images
    pub retain_images: u32,
    pub scan_on_push: bool,
}

/// Relational database settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub engine: String,
    pub engine_version: String,
    pub instance_class: String,
    pub allocated_storage_gb: u32,
    pub database_name: String,
    pub username: String,
    pub port: u16,
    pub multi_az: bool,
    pub backup_retention_days: u32,
    pub deletion_protection: bool,
    /// Subnet tier for the database (must be isolated)
    pub subnet_tier: SubnetTier,
}

/// Shared filesystem settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilesystemConfig {
    pub encrypted: bool,
    pub performance_mode: String,
    pub throughput_mode: String,
}

/// Which security group a service runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceGroup {
    /// Web-facing containers
    Web,
    /// LLM gateway containers
    Gateway,
}

/// Public load balancer route to a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    pub path_patterns: Vec<String>,
    pub priority: u32,
    pub health_check_path: String,
}

/// Filesystem mount through a dedicated access point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MountConfig {
    /// Access point / volume name
    pub name: String,
    /// Root directory inside the filesystem
    pub root_path: String,
    /// Mount path inside the container
    pub container_path: String,
    pub uid: u32,
    pub gid: u32,
    #[serde(default = "default_permissions")]
    pub permissions: String,
}

fn default_permissions() -> String {
    "0755".to_string()
}

/// Container health check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthCheckConfig {
    pub command: Vec<String>,
    pub interval_seconds: u32,
    pub timeout_seconds: u32,
    pub retries: u32,
    pub start_period_seconds: u32,
}

/// Environment variable pointing at another service through service discovery
///
/// Rendered as `http://<service>.<project>.internal:<port><path>`, so the
/// address follows the project name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceLink {
    /// Discoverable service to reach
    pub service: String,
    /// Path appended to the address, e.g. `/v1`
    #[serde(default)]
    pub path: String,
}

/// One containerized service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub name: String,
    /// Registry repository the image is published to
    pub repository: String,
    pub image_tag: String,
    pub cpu: u32,
    pub memory: u32,
    pub desired_count: u32,
    pub container_port: u16,
    pub group: ServiceGroup,
    /// Route from the public load balancer
    #[serde(default)]
    pub route: Option<RouteConfig>,
    /// Register in the private service-discovery namespace
    #[serde(default)]
    pub discoverable: bool,
    /// Inject database connection details
    #[serde(default)]
    pub database: bool,
    /// Plaintext, non-secret environment
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Environment variable -> secret ARN (optionally `arn:...:json-key::`)
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
    /// Environment variable -> address of a discoverable service
    #[serde(default)]
    pub links: BTreeMap<String, ServiceLink>,
    #[serde(default)]
    pub mounts: Vec<MountConfig>,
    #[serde(default)]
    pub health_check: Option<HealthCheckConfig>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            vpc_cidr: Ipv4Cidr::default_vpc(),
            availability_zones: 2,
            subnet_prefix: 20,
            nat_gateways: 1,
            interface_endpoints: true,
            listener_port: 80,
            idle_timeout_seconds: 300,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            retain_images: 10,
            scan_on_push: true,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine: "postgres".to_string(),
            engine_version: "16.4".to_string(),
            instance_class: "db.t4g.micro".to_string(),
            allocated_storage_gb: 20,
            database_name: "llmgateway".to_string(),
            username: "llmadmin".to_string(),
            port: 5432,
            multi_az: false,
            backup_retention_days: 7,
            deletion_protection: true,
            subnet_tier: SubnetTier::Isolated,
        }
    }
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            encrypted: true,
            performance_mode: "generalPurpose".to_string(),
            throughput_mode: "bursting".to_string(),
        }
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        let project = "llm-stack".to_string();

        let webui = ServiceConfig {
            name: "webui".to_string(),
            repository: "webui".to_string(),
            image_tag: "latest".to_string(),
            cpu: 1024,
            memory: 2048,
            desired_count: 1,
            container_port: 8080,
            group: ServiceGroup::Web,
            route: Some(RouteConfig {
                path_patterns: vec!["/*".to_string()],
                priority: 100,
                health_check_path: "/health".to_string(),
            }),
            discoverable: false,
            database: false,
            environment: BTreeMap::from([("DATA_DIR".to_string(), "/app/backend/data".to_string())]),
            secrets: BTreeMap::new(),
            links: BTreeMap::from([(
                "OPENAI_API_BASE_URL".to_string(),
                ServiceLink {
                    service: "gateway".to_string(),
                    path: "/v1".to_string(),
                },
            )]),
            mounts: vec![MountConfig {
                name: "data".to_string(),
                root_path: "/webui".to_string(),
                container_path: "/app/backend/data".to_string(),
                uid: 1000,
                gid: 1000,
                permissions: default_permissions(),
            }],
            health_check: Some(HealthCheckConfig {
                command: vec![
                    "CMD-SHELL".to_string(),
                    "curl -f http://localhost:8080/health || exit 1".to_string(),
                ],
                interval_seconds: 30,
                timeout_seconds: 5,
                retries: 3,
                start_period_seconds: 60,
            }),
        };

        let gateway = ServiceConfig {
            name: "gateway".to_string(),
            repository: "llm-gateway".to_string(),
            image_tag: "latest".to_string(),
            cpu: 512,
            memory: 1024,
            desired_count: 1,
            container_port: 4000,
            group: ServiceGroup::Gateway,
            route: Some(RouteConfig {
                path_patterns: vec!["/v1/*".to_string()],
                priority: 10,
                health_check_path: "/health/liveliness".to_string(),
            }),
            discoverable: true,
            database: true,
            environment: BTreeMap::from([("STORE_MODEL_IN_DB".to_string(), "True".to_string())]),
            secrets: BTreeMap::new(),
            links: BTreeMap::new(),
            mounts: Vec::new(),
            health_check: None,
        };

        Self {
            project,
            region: String::new(),
            account: String::new(),
            network: NetworkConfig::default(),
            registry: RegistryConfig::default(),
            database: DatabaseConfig::default(),
            filesystem: FilesystemConfig::default(),
            log_retention_days: 14,
            services: vec![webui, gateway],
        }
    }
}

/// Private DNS namespace for a project
pub fn namespace_name(project: &str) -> String {
    format!("{}.internal", project)
}

const REGION_VARS: [&str; 3] = ["GATEWAY_INFRA_REGION", "AWS_REGION", "AWS_DEFAULT_REGION"];
const ACCOUNT_VARS: [&str; 2] = ["GATEWAY_INFRA_ACCOUNT", "AWS_ACCOUNT_ID"];
const PROJECT_VAR: &str = "GATEWAY_INFRA_PROJECT";

impl DeploymentConfig {
    /// Load from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> InfrastructureResult<Self> {
        let config = match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading deployment configuration");
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    InfrastructureError::Configuration(format!(
                        "cannot read {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };

        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_toml(raw: &str) -> InfrastructureResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply region/account/project overrides from a variable lookup
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|k| lookup(k).filter(|v| !v.is_empty()));

        if let Some(region) = first(&REGION_VARS) {
            self.region = region;
        }
        if let Some(account) = first(&ACCOUNT_VARS) {
            self.account = account;
        }
        if let Some(project) = first(&[PROJECT_VAR]) {
            self.project = project;
        }
        self
    }

    /// Look up a service by name
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Distinct repositories in first-use order
    pub fn repositories(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.services
            .iter()
            .map(|s| s.repository.as_str())
            .filter(|r| seen.insert(*r))
            .collect()
    }

    /// Whether any service mounts the shared filesystem
    pub fn uses_filesystem(&self) -> bool {
        self.services.iter().any(|s| !s.mounts.is_empty())
    }

    /// Validate configuration before any stack is built
    pub fn validate(&self) -> InfrastructureResult<()> {
        let invalid = |msg: String| Err(InfrastructureError::Configuration(msg));

        if self.project.is_empty()
            || !self
                .project
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return invalid(format!(
                "project '{}' must be non-empty lowercase alphanumeric with hyphens",
                self.project
            ));
        }
        if self.region.is_empty() {
            return invalid("region is not set (use GATEWAY_INFRA_REGION or AWS_REGION)".to_string());
        }
        if self.account.is_empty() {
            return invalid(
                "account is not set (use GATEWAY_INFRA_ACCOUNT or AWS_ACCOUNT_ID)".to_string(),
            );
        }

        let network = &self.network;
        if !(2..=6).contains(&network.availability_zones) {
            return invalid(format!(
                "availability_zones must be 2..=6, got {}",
                network.availability_zones
            ));
        }
        if !(16..=24).contains(&network.vpc_cidr.prefix_length()) {
            return invalid(format!(
                "vpc_cidr prefix must be /16../24, got {}",
                network.vpc_cidr
            ));
        }
        if network.subnet_prefix <= network.vpc_cidr.prefix_length() || network.subnet_prefix > 28 {
            return invalid(format!(
                "subnet_prefix /{} must be longer than the VPC prefix and at most /28",
                network.subnet_prefix
            ));
        }
        if network.nat_gateways == 0 || network.nat_gateways > network.availability_zones {
            return invalid(format!(
                "nat_gateways must be 1..={}, got {}",
                network.availability_zones, network.nat_gateways
            ));
        }

        validate_image_retention(self.registry.retain_images)?;

        if self.log_retention_days == 0 {
            return invalid("log_retention_days must be >= 1".to_string());
        }

        if self.services.is_empty() {
            return invalid("at least one service is required".to_string());
        }

        let mut names = BTreeSet::new();
        for service in &self.services {
            if service.name.is_empty()
                || !service
                    .name
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            {
                return invalid(format!(
                    "service name '{}' must be lowercase alphanumeric with hyphens",
                    service.name
                ));
            }
            if !names.insert(service.name.as_str()) {
                return invalid(format!("duplicate service name '{}'", service.name));
            }
            if service.desired_count == 0 {
                return invalid(format!("service '{}' desired_count must be >= 1", service.name));
            }
            if service.image_tag.is_empty() {
                return invalid(format!("service '{}' image_tag is empty", service.name));
            }
            if let Some(route) = &service.route {
                if route.path_patterns.is_empty() {
                    return invalid(format!("service '{}' route has no path patterns", service.name));
                }
            }
            let mut mounts = BTreeSet::new();
            for mount in &service.mounts {
                if !mounts.insert(mount.name.as_str()) {
                    return invalid(format!(
                        "service '{}' declares mount '{}' twice",
                        service.name, mount.name
                    ));
                }
                if !mount.root_path.starts_with('/') || !mount.container_path.starts_with('/') {
                    return invalid(format!(
                        "service '{}' mount '{}' paths must be absolute",
                        service.name, mount.name
                    ));
                }
            }
            validate_plaintext_environment(&service.name, &service.environment)?;
            validate_secret_references(&service.name, &service.secrets)?;
            for key in service.secrets.keys() {
                if service.environment.contains_key(key) {
                    return invalid(format!(
                        "service '{}' sets '{}' both as plaintext and as a secret",
                        service.name, key
                    ));
                }
            }
            for (key, link) in &service.links {
                if service.environment.contains_key(key) || service.secrets.contains_key(key) {
                    return invalid(format!(
                        "service '{}' sets '{}' both as a link and as another variable",
                        service.name, key
                    ));
                }
                match self.service(&link.service) {
                    Some(target) if target.discoverable => {}
                    Some(_) => {
                        return invalid(format!(
                            "service '{}' links to '{}', which is not discoverable",
                            service.name, link.service
                        ))
                    }
                    None => {
                        return invalid(format!(
                            "service '{}' links to unknown service '{}'",
                            service.name, link.service
                        ))
                    }
                }
            }
            if service.database {
                validate_reserved_variables(
                    &service.name,
                    service
                        .environment
                        .keys()
                        .chain(service.secrets.keys())
                        .chain(service.links.keys()),
                )?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValidationError;
    use std::collections::HashMap;

    fn with_target(config: DeploymentConfig) -> DeploymentConfig {
        let env: HashMap<&str, &str> =
            HashMap::from([("AWS_REGION", "eu-west-1"), ("AWS_ACCOUNT_ID", "123456789012")]);
        config.with_env_overrides(|k| env.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn test_default_config_is_valid_once_targeted() {
        let config = DeploymentConfig::default();
        assert!(config.validate().is_err());

        let config = with_target(config);
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.account, "123456789012");
        config.validate().unwrap();
    }

    #[test]
    fn test_env_override_precedence() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GATEWAY_INFRA_REGION", "us-west-2"),
            ("AWS_REGION", "eu-west-1"),
            ("GATEWAY_INFRA_PROJECT", "demo"),
        ]);
        let config = DeploymentConfig::default().with_env_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.project, "demo");
    }

    #[test]
    fn test_from_toml_with_defaults() {
        let raw = r#"
            project = "team-llm"
            region = "eu-central-1"
            account = "111122223333"

            [network]
            vpc_cidr = "10.20.0.0/16"
            availability_zones = 3

            [[services]]
            name = "gateway"
            repository = "llm-gateway"
            image_tag = "v1.2.3"
            cpu = 512
            memory = 1024
            desired_count = 2
            container_port = 4000
            group = "gateway"
            discoverable = true
        "#;

        let config = DeploymentConfig::from_toml(raw).unwrap();
        assert_eq!(config.network.vpc_cidr.as_cidr(), "10.20.0.0/16");
        assert_eq!(config.network.availability_zones, 3);
        assert_eq!(config.network.subnet_prefix, 20);
        assert_eq!(config.services.len(), 1);
        assert_eq!(config.services[0].route, None);
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_field_rejected() {
        let raw = "project = \"x\"\nregoin = \"eu-west-1\"\n";
        assert!(matches!(
            DeploymentConfig::from_toml(raw),
            Err(InfrastructureError::Configuration(_))
        ));
    }

    #[test]
    fn test_plaintext_secret_rejected() {
        let mut config = with_target(DeploymentConfig::default());
        config.services[1].environment.insert(
            "DATABASE_URL".to_string(),
            "postgresql://llmadmin:hunter2@db:5432/llm".to_string(),
        );
        assert!(matches!(
            config.validate(),
            Err(InfrastructureError::Validation(ValidationError::PlaintextSecret { .. }))
        ));
    }

    #[test]
    fn test_literal_secret_value_rejected() {
        let mut config = with_target(DeploymentConfig::default());
        config.services[0]
            .secrets
            .insert("OPENAI_API_KEY".to_string(), "sk-live-abc123".to_string());
        assert!(matches!(
            config.validate(),
            Err(InfrastructureError::Validation(ValidationError::PlaintextSecret { ref key, .. }))
                if key == "OPENAI_API_KEY"
        ));

        config.services[0].secrets.insert(
            "OPENAI_API_KEY".to_string(),
            "arn:aws:secretsmanager:eu-west-1:123456789012:secret:llm-keys-AbCd:OPENAI_API_KEY::"
                .to_string(),
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_reserved_database_variable_rejected() {
        let mut config = with_target(DeploymentConfig::default());
        config.services[1]
            .environment
            .insert("DB_HOST".to_string(), "db.example.com".to_string());
        assert!(matches!(
            config.validate(),
            Err(InfrastructureError::Validation(ValidationError::ReservedVariable { ref key, .. }))
                if key == "DB_HOST"
        ));

        // only services that receive database details reserve the names
        let mut config = with_target(DeploymentConfig::default());
        config.services[0]
            .environment
            .insert("DB_HOST".to_string(), "sqlite".to_string());
        config.validate().unwrap();
    }

    #[test]
    fn test_service_links_checked() {
        let mut config = with_target(DeploymentConfig::default());
        config.services[0].links.insert(
            "UPSTREAM_URL".to_string(),
            ServiceLink {
                service: "missing".to_string(),
                path: String::new(),
            },
        );
        assert!(matches!(config.validate(), Err(InfrastructureError::Configuration(_))));

        let mut config = with_target(DeploymentConfig::default());
        config.services[1].discoverable = false;
        assert!(matches!(config.validate(), Err(InfrastructureError::Configuration(_))));
    }

    #[test]
    fn test_structural_limits() {
        let mut config = with_target(DeploymentConfig::default());
        config.network.nat_gateways = 3;
        assert!(config.validate().is_err());

        let mut config = with_target(DeploymentConfig::default());
        config.services[1].name = "webui".to_string();
        assert!(config.validate().is_err());

        let mut config = with_target(DeploymentConfig::default());
        config.registry.retain_images = 0;
        assert!(matches!(
            config.validate(),
            Err(InfrastructureError::Validation(ValidationError::InvalidRetention(0)))
        ));
    }

    #[test]
    fn test_repositories_distinct() {
        let mut config = DeploymentConfig::default();
        let mut extra = config.services[0].clone();
        extra.name = "webui-canary".to_string();
        config.services.push(extra);
        assert_eq!(config.repositories(), vec!["webui", "llm-gateway"]);
    }
}
