// Copyright (c) 2025 - Cowboy AI, Inc.
//! Compute stack: shared filesystem, cluster, discovery, roles, task
//! definitions and services
//!
//! Every service that mounts the filesystem waits for all of its mount
//! targets through a readiness dependency; the filesystem lives in this stack
//! so the edge is checked by static inspection at synthesis.

use std::collections::BTreeMap;
use tracing::debug;

use super::data::outputs as data_outputs;
use super::network::outputs as network_outputs;
use super::registry::repository_uri_output;
use super::{logical_id, COMPUTE, DATA, NETWORK, REGISTRY};
use crate::config::{namespace_name, DeploymentConfig, ServiceConfig, ServiceGroup, ServiceLink};
use crate::domain::invariants::{validate_plaintext_environment, validate_secret_references};
use crate::domain::{LogicalId, ResourceType, SubnetTier};
use crate::errors::{InfrastructureError, InfrastructureResult};
use crate::graph::{Exports, Import, PseudoParameter, ReadinessProbe, Resource, Stack, Value};

/// Export names published by the compute stack
pub mod outputs {
    pub const CLUSTER_NAME: &str = "ClusterName";
    pub const FILE_SYSTEM_ID: &str = "FileSystemId";
    pub const NAMESPACE_ID: &str = "NamespaceId";
}

const TASK_EXECUTION_POLICY: &str = "policy/service-role/AmazonECSTaskExecutionRolePolicy";

/// Database connection details injected into services
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseInputs {
    pub endpoint: Import,
    pub port: Import,
    pub secret_arn: Import,
}

/// Inputs the compute stack requires from network, registry and data
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeInputs {
    pub vpc_id: Import,
    pub private_subnet_ids: Import,
    pub ecs_security_group_id: Import,
    pub gateway_security_group_id: Import,
    /// Only required when a service mounts the filesystem
    pub efs_security_group_id: Option<Import>,
    /// Service name -> target group ARN, for routed services
    pub target_groups: BTreeMap<String, Import>,
    /// Repository name -> repository URI
    pub repositories: BTreeMap<String, Import>,
    /// Only required when a service uses the database
    pub database: Option<DatabaseInputs>,
}

impl ComputeInputs {
    pub fn resolve(
        config: &DeploymentConfig,
        network: &Exports,
        registry: &Exports,
        data: &Exports,
    ) -> InfrastructureResult<Self> {
        let efs_security_group_id = if config.uses_filesystem() {
            Some(network.require(COMPUTE, network_outputs::EFS_SECURITY_GROUP_ID)?)
        } else {
            None
        };

        let mut target_groups = BTreeMap::new();
        for service in config.services.iter().filter(|s| s.route.is_some()) {
            target_groups.insert(
                service.name.clone(),
                network.require(COMPUTE, &network_outputs::target_group_arn(&service.name))?,
            );
        }

        let mut repositories = BTreeMap::new();
        for repository in config.repositories() {
            repositories.insert(
                repository.to_string(),
                registry.require(COMPUTE, &repository_uri_output(repository))?,
            );
        }

        let database = if config.services.iter().any(|s| s.database) {
            Some(DatabaseInputs {
                endpoint: data.require(COMPUTE, data_outputs::DB_ENDPOINT)?,
                port: data.require(COMPUTE, data_outputs::DB_PORT)?,
                secret_arn: data.require(COMPUTE, data_outputs::DB_SECRET_ARN)?,
            })
        } else {
            None
        };

        Ok(Self {
            vpc_id: network.require(COMPUTE, network_outputs::VPC_ID)?,
            private_subnet_ids: network.require(COMPUTE, &network_outputs::subnet_ids(SubnetTier::Private))?,
            ecs_security_group_id: network.require(COMPUTE, network_outputs::ECS_SECURITY_GROUP_ID)?,
            gateway_security_group_id: network
                .require(COMPUTE, network_outputs::GATEWAY_SECURITY_GROUP_ID)?,
            efs_security_group_id,
            target_groups,
            repositories,
            database,
        })
    }

    fn security_group(&self, group: ServiceGroup) -> &Import {
        match group {
            ServiceGroup::Web => &self.ecs_security_group_id,
            ServiceGroup::Gateway => &self.gateway_security_group_id,
        }
    }

    /// Producer stacks actually imported from
    fn producers(&self) -> Vec<&'static str> {
        let mut producers = vec![NETWORK];
        if !self.repositories.is_empty() {
            producers.push(REGISTRY);
        }
        if self.database.is_some() {
            producers.push(DATA);
        }
        producers
    }
}

/// Filesystem resources services mount through
struct SharedFilesystem {
    filesystem: LogicalId,
    mount_targets: Vec<LogicalId>,
    /// (service, mount name) -> access point
    access_points: BTreeMap<(String, String), LogicalId>,
}

/// Build the compute stack
pub fn build(config: &DeploymentConfig, inputs: &ComputeInputs) -> InfrastructureResult<Stack> {
    let mut stack = Stack::new(
        &config.project,
        COMPUTE,
        "Shared filesystem, cluster and container services",
    );

    for producer in inputs.producers() {
        stack.add_dependency(producer);
    }

    let filesystem = declare_filesystem(&mut stack, config, inputs)?;

    let cluster = stack.add(
        Resource::new(logical_id(&["cluster"])?, ResourceType::Cluster)
            .property("ClusterName", config.project.as_str())
            .property(
                "ClusterSettings",
                Value::list(vec![Value::map([("Name", "containerInsights"), ("Value", "enabled")])]),
            ),
    )?;

    let namespace = stack.add(
        Resource::new(logical_id(&["service", "discovery", "namespace"])?, ResourceType::PrivateDnsNamespace)
            .property("Name", namespace_name(&config.project))
            .property("Vpc", inputs.vpc_id.value())
            .property("Description", format!("Private service discovery for {}", config.project)),
    )?;

    let execution_role = declare_execution_role(&mut stack, config, inputs)?;

    for service in &config.services {
        declare_service(
            &mut stack,
            config,
            inputs,
            service,
            &cluster,
            &namespace,
            &execution_role,
            filesystem.as_ref(),
        )?;
    }

    stack.export(outputs::CLUSTER_NAME, Value::reference(&cluster), "Container cluster")?;
    stack.export(
        outputs::NAMESPACE_ID,
        Value::attribute(&namespace, "Id"),
        "Service discovery namespace",
    )?;
    if let Some(shared) = &filesystem {
        stack.export(
            outputs::FILE_SYSTEM_ID,
            Value::reference(&shared.filesystem),
            "Shared filesystem",
        )?;
    }

    debug!(
        stack = %stack.name(),
        services = config.services.len(),
        resources = stack.resources().len(),
        "Built compute stack"
    );

    Ok(stack)
}

fn declare_filesystem(
    stack: &mut Stack,
    config: &DeploymentConfig,
    inputs: &ComputeInputs,
) -> InfrastructureResult<Option<SharedFilesystem>> {
    let Some(efs_group) = &inputs.efs_security_group_id else {
        return Ok(None);
    };

    let fs = &config.filesystem;
    let filesystem = stack.add(
        Resource::new(logical_id(&["file", "system"])?, ResourceType::FileSystem)
            .property("Encrypted", fs.encrypted)
            .property("PerformanceMode", fs.performance_mode.as_str())
            .property("ThroughputMode", fs.throughput_mode.as_str()),
    )?;

    let mut mount_targets = Vec::with_capacity(config.network.availability_zones);
    for zone in 0..config.network.availability_zones {
        mount_targets.push(stack.add(
            Resource::new(
                logical_id(&["mount", "target", &(zone + 1).to_string()])?,
                ResourceType::MountTarget,
            )
            .property("FileSystemId", Value::reference(&filesystem))
            .property("SubnetId", Value::select(zone, inputs.private_subnet_ids.list()))
            .property("SecurityGroups", Value::list(vec![efs_group.value()])),
        )?);
    }

    let mut access_points = BTreeMap::new();
    for service in &config.services {
        for mount in &service.mounts {
            let id = stack.add(
                Resource::new(
                    logical_id(&[&service.name, &mount.name, "access", "point"])?,
                    ResourceType::AccessPoint,
                )
                .property("FileSystemId", Value::reference(&filesystem))
                .property(
                    "PosixUser",
                    Value::map([("Uid", mount.uid.to_string()), ("Gid", mount.gid.to_string())]),
                )
                .property(
                    "RootDirectory",
                    Value::map([
                        ("Path", Value::from(mount.root_path.as_str())),
                        (
                            "CreationInfo",
                            Value::map([
                                ("OwnerUid", mount.uid.to_string()),
                                ("OwnerGid", mount.gid.to_string()),
                                ("Permissions", mount.permissions.clone()),
                            ]),
                        ),
                    ]),
                ),
            )?;
            access_points.insert((service.name.clone(), mount.name.clone()), id);
        }
    }

    Ok(Some(SharedFilesystem {
        filesystem,
        mount_targets,
        access_points,
    }))
}

fn assume_role_policy() -> Value {
    Value::map([
        ("Version", Value::from("2012-10-17")),
        (
            "Statement",
            Value::list(vec![Value::map([
                ("Effect", Value::from("Allow")),
                ("Principal", Value::map([("Service", "ecs-tasks.amazonaws.com")])),
                ("Action", Value::from("sts:AssumeRole")),
            ])]),
        ),
    ])
}

fn policy(name: &str, actions: &[&str], resources: Vec<Value>) -> Value {
    Value::map([
        ("PolicyName", Value::from(name)),
        (
            "PolicyDocument",
            Value::map([
                ("Version", Value::from("2012-10-17")),
                (
                    "Statement",
                    Value::list(vec![Value::map([
                        ("Effect", Value::from("Allow")),
                        ("Action", Value::list(actions.iter().copied())),
                        ("Resource", Value::list(resources)),
                    ])]),
                ),
            ]),
        ),
    ])
}

/// Secret ARN without a `:json-key:version-stage:version-id` suffix
///
/// Parameter-store ARNs have no such suffix and pass through unchanged.
fn secret_arn(value_from: &str) -> &str {
    // arn:aws:secretsmanager:region:account:secret:name[:key:stage:version]
    let mut end = value_from.len();
    for (count, (index, _)) in value_from.match_indices(':').enumerate() {
        if count == 6 {
            end = index;
            break;
        }
    }
    &value_from[..end]
}

/// Shared execution role: pulls images, writes logs, reads injected secrets
fn declare_execution_role(
    stack: &mut Stack,
    config: &DeploymentConfig,
    inputs: &ComputeInputs,
) -> InfrastructureResult<LogicalId> {
    for service in &config.services {
        validate_secret_references(&service.name, &service.secrets)?;
    }

    let mut secrets: Vec<Value> = Vec::new();
    if let Some(database) = &inputs.database {
        secrets.push(database.secret_arn.value());
    }
    let (mut parameters, mut configured): (Vec<&str>, Vec<&str>) = config
        .services
        .iter()
        .flat_map(|s| s.secrets.values())
        .map(|v| secret_arn(v))
        .partition(|arn| arn.contains(":ssm:"));
    configured.sort_unstable();
    configured.dedup();
    parameters.sort_unstable();
    parameters.dedup();
    secrets.extend(configured.into_iter().map(Value::from));

    let mut role = Resource::new(logical_id(&["task", "execution", "role"])?, ResourceType::Role)
        .property("AssumeRolePolicyDocument", assume_role_policy())
        .property(
            "ManagedPolicyArns",
            Value::list(vec![Value::join(
                "",
                [
                    Value::from("arn:"),
                    Value::from(PseudoParameter::Partition),
                    Value::from(format!(":iam::aws:{}", TASK_EXECUTION_POLICY)),
                ],
            )]),
        );

    let mut policies = Vec::new();
    if !secrets.is_empty() {
        policies.push(policy("read-secrets", &["secretsmanager:GetSecretValue"], secrets));
    }
    if !parameters.is_empty() {
        policies.push(policy(
            "read-parameters",
            &["ssm:GetParameters"],
            parameters.into_iter().map(Value::from).collect(),
        ));
    }
    if !policies.is_empty() {
        role = role.property("Policies", Value::list(policies));
    }

    stack.add(role)
}

#[allow(clippy::too_many_arguments)]
fn declare_service(
    stack: &mut Stack,
    config: &DeploymentConfig,
    inputs: &ComputeInputs,
    service: &ServiceConfig,
    cluster: &LogicalId,
    namespace: &LogicalId,
    execution_role: &LogicalId,
    filesystem: Option<&SharedFilesystem>,
) -> InfrastructureResult<LogicalId> {
    let name = service.name.as_str();
    validate_plaintext_environment(name, &service.environment)?;
    validate_secret_references(name, &service.secrets)?;

    let log_group = stack.add(
        Resource::new(logical_id(&[name, "log", "group"])?, ResourceType::LogGroup)
            .property("LogGroupName", format!("/ecs/{}/{}", config.project, name))
            .property("RetentionInDays", config.log_retention_days),
    )?;

    let shared = match (service.mounts.is_empty(), filesystem) {
        (true, _) => None,
        (false, Some(shared)) => Some(shared),
        (false, None) => {
            return Err(InfrastructureError::Configuration(format!(
                "service '{}' mounts a filesystem but none is declared",
                name
            )))
        }
    };

    let mut task_role = Resource::new(logical_id(&[name, "task", "role"])?, ResourceType::Role)
        .property("AssumeRolePolicyDocument", assume_role_policy());
    if let Some(shared) = shared {
        task_role = task_role.property(
            "Policies",
            Value::list(vec![policy(
                "filesystem-access",
                &["elasticfilesystem:ClientMount", "elasticfilesystem:ClientWrite"],
                vec![Value::attribute(&shared.filesystem, "Arn")],
            )]),
        );
    }
    let task_role = stack.add(task_role)?;

    let repository = inputs.repositories.get(&service.repository).ok_or_else(|| {
        InfrastructureError::MissingInput {
            consumer: COMPUTE.to_string(),
            producer: REGISTRY.to_string(),
            input: repository_uri_output(&service.repository),
        }
    })?;

    let mut container = BTreeMap::from([
        ("Name".to_string(), Value::from(name)),
        (
            "Image".to_string(),
            Value::join(
                "",
                [repository.value(), Value::from(format!(":{}", service.image_tag))],
            ),
        ),
        ("Essential".to_string(), Value::from(true)),
        (
            "PortMappings".to_string(),
            Value::list(vec![Value::map([
                ("ContainerPort", Value::from(service.container_port)),
                ("Protocol", Value::from("tcp")),
            ])]),
        ),
        ("Environment".to_string(), environment(config, service, inputs)?),
        (
            "LogConfiguration".to_string(),
            Value::map([
                ("LogDriver", Value::from("awslogs")),
                (
                    "Options",
                    Value::map([
                        ("awslogs-group", Value::reference(&log_group)),
                        ("awslogs-region", Value::from(PseudoParameter::Region)),
                        ("awslogs-stream-prefix", Value::from(name)),
                    ]),
                ),
            ]),
        ),
    ]);

    let secrets = secrets(service, inputs);
    if !secrets.is_empty() {
        container.insert("Secrets".to_string(), Value::list(secrets));
    }

    if let Some(check) = &service.health_check {
        container.insert(
            "HealthCheck".to_string(),
            Value::map([
                ("Command", Value::list(check.command.iter().map(Value::from))),
                ("Interval", Value::from(check.interval_seconds)),
                ("Timeout", Value::from(check.timeout_seconds)),
                ("Retries", Value::from(check.retries)),
                ("StartPeriod", Value::from(check.start_period_seconds)),
            ]),
        );
    }

    let mut volumes = Vec::new();
    if let Some(shared) = shared {
        let mut mount_points = Vec::with_capacity(service.mounts.len());
        for mount in &service.mounts {
            let access_point = shared
                .access_points
                .get(&(service.name.clone(), mount.name.clone()))
                .ok_or_else(|| {
                    InfrastructureError::Configuration(format!(
                        "no access point for mount '{}' of service '{}'",
                        mount.name, name
                    ))
                })?;

            volumes.push(Value::map([
                ("Name", Value::from(mount.name.as_str())),
                (
                    "EFSVolumeConfiguration",
                    Value::map([
                        ("FilesystemId", Value::reference(&shared.filesystem)),
                        ("TransitEncryption", Value::from("ENABLED")),
                        (
                            "AuthorizationConfig",
                            Value::map([
                                ("AccessPointId", Value::reference(access_point)),
                                ("IAM", Value::from("ENABLED")),
                            ]),
                        ),
                    ]),
                ),
            ]));
            mount_points.push(Value::map([
                ("SourceVolume", Value::from(mount.name.as_str())),
                ("ContainerPath", Value::from(mount.container_path.as_str())),
                ("ReadOnly", Value::from(false)),
            ]));
        }
        container.insert("MountPoints".to_string(), Value::list(mount_points));
    }

    let mut task_definition =
        Resource::new(logical_id(&[name, "task", "definition"])?, ResourceType::TaskDefinition)
            .property("Family", format!("{}-{}", config.project, name))
            .property("Cpu", service.cpu.to_string())
            .property("Memory", service.memory.to_string())
            .property("NetworkMode", "awsvpc")
            .property("RequiresCompatibilities", Value::list(["FARGATE"]))
            .property("ExecutionRoleArn", Value::attribute(execution_role, "Arn"))
            .property("TaskRoleArn", Value::attribute(&task_role, "Arn"))
            .property("ContainerDefinitions", Value::list(vec![Value::Map(container)]));
    if !volumes.is_empty() {
        task_definition = task_definition.property("Volumes", Value::list(volumes));
    }
    let task_definition = stack.add(task_definition)?;

    let discovery = if service.discoverable {
        Some(stack.add(
            Resource::new(logical_id(&[name, "discovery", "service"])?, ResourceType::DiscoveryService)
                .property("Name", name)
                .property("NamespaceId", Value::attribute(namespace, "Id"))
                .property(
                    "DnsConfig",
                    Value::map([
                        (
                            "DnsRecords",
                            Value::list(vec![Value::map([
                                ("Type", Value::from("A")),
                                ("TTL", Value::from(10u32)),
                            ])]),
                        ),
                        ("RoutingPolicy", Value::from("MULTIVALUE")),
                    ]),
                )
                .property("HealthCheckCustomConfig", Value::map([("FailureThreshold", 1u32)])),
        )?)
    } else {
        None
    };

    let mut ecs_service = Resource::new(logical_id(&[name, "service"])?, ResourceType::Service)
        .property("ServiceName", name)
        .property("Cluster", Value::reference(cluster))
        .property("TaskDefinition", Value::reference(&task_definition))
        .property("DesiredCount", service.desired_count)
        .property("LaunchType", "FARGATE")
        .property(
            "DeploymentConfiguration",
            Value::map([("MinimumHealthyPercent", 100u32), ("MaximumPercent", 200u32)]),
        )
        .property(
            "NetworkConfiguration",
            Value::map([(
                "AwsvpcConfiguration",
                Value::map([
                    ("AssignPublicIp", Value::from("DISABLED")),
                    ("Subnets", inputs.private_subnet_ids.list()),
                    (
                        "SecurityGroups",
                        Value::list(vec![inputs.security_group(service.group).value()]),
                    ),
                ]),
            )]),
        );

    if let Some(target_group) = inputs.target_groups.get(&service.name) {
        ecs_service = ecs_service
            .property("HealthCheckGracePeriodSeconds", 60u32)
            .property(
                "LoadBalancers",
                Value::list(vec![Value::map([
                    ("ContainerName", Value::from(name)),
                    ("ContainerPort", Value::from(service.container_port)),
                    ("TargetGroupArn", target_group.value()),
                ])]),
            );
    }

    if let Some(discovery) = &discovery {
        ecs_service = ecs_service.property(
            "ServiceRegistries",
            Value::list(vec![Value::map([("RegistryArn", Value::attribute(discovery, "Arn"))])]),
        );
    }

    if let Some(shared) = shared {
        for mount_target in &shared.mount_targets {
            ecs_service = ecs_service.waits_for(ReadinessProbe::mount_target(mount_target));
        }
    }

    stack.add(ecs_service)
}

/// `http://<service>.<namespace>:<port><path>` of a discoverable service
fn link_address(config: &DeploymentConfig, consumer: &str, link: &ServiceLink) -> InfrastructureResult<String> {
    let target = config
        .service(&link.service)
        .filter(|target| target.discoverable)
        .ok_or_else(|| {
            InfrastructureError::Configuration(format!(
                "service '{}' links to '{}', which is not a discoverable service",
                consumer, link.service
            ))
        })?;

    Ok(format!(
        "http://{}.{}:{}{}",
        target.name,
        namespace_name(&config.project),
        target.container_port,
        link.path
    ))
}

/// Plaintext environment, service links and non-secret database connection details
fn environment(
    config: &DeploymentConfig,
    service: &ServiceConfig,
    inputs: &ComputeInputs,
) -> InfrastructureResult<Value> {
    let mut entries: BTreeMap<String, Value> = service
        .environment
        .iter()
        .map(|(k, v)| (k.clone(), Value::from(v)))
        .collect();

    for (variable, link) in &service.links {
        entries.insert(variable.clone(), Value::from(link_address(config, &service.name, link)?));
    }

    if let (true, Some(database)) = (service.database, &inputs.database) {
        entries.insert("DB_HOST".to_string(), database.endpoint.value());
        entries.insert("DB_PORT".to_string(), database.port.value());
        entries.insert(
            "DB_NAME".to_string(),
            Value::from(config.database.database_name.as_str()),
        );
    }

    Ok(Value::list(
        entries
            .into_iter()
            .map(|(name, value)| Value::map([("Name", Value::from(name)), ("Value", value)])),
    ))
}

/// Secret store references; never literal values
fn secrets(service: &ServiceConfig, inputs: &ComputeInputs) -> Vec<Value> {
    let mut entries: BTreeMap<String, Value> = service
        .secrets
        .iter()
        .map(|(k, v)| (k.clone(), Value::from(v)))
        .collect();

    if let (true, Some(database)) = (service.database, &inputs.database) {
        for (variable, key) in [("DB_USERNAME", "username"), ("DB_PASSWORD", "password")] {
            entries.insert(
                variable.to_string(),
                Value::join(
                    "",
                    [database.secret_arn.value(), Value::from(format!(":{}::", key))],
                ),
            );
        }
    }

    entries
        .into_iter()
        .map(|(name, value)| Value::map([("Name", Value::from(name)), ("ValueFrom", value)]))
        .collect()
}
