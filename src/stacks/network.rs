// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network stack: VPC, subnets, routing, endpoints, security groups and the
//! public load balancer

use std::collections::BTreeSet;
use tracing::debug;

use super::{logical_id, NETWORK};
use crate::config::{DeploymentConfig, ServiceConfig, ServiceGroup};
use crate::domain::invariants::validate_subnet_partition;
use crate::domain::{LogicalId, ResourceType, SubnetLayout, SubnetTier};
use crate::errors::{InfrastructureError, InfrastructureResult};
use crate::graph::{Resource, Stack, Value};

/// Interface endpoints keeping image pulls, logs and secrets off the NAT
const INTERFACE_ENDPOINTS: [(&str, &str); 4] = [
    ("ecr.api", "EcrApiEndpoint"),
    ("ecr.dkr", "EcrDkrEndpoint"),
    ("logs", "LogsEndpoint"),
    ("secretsmanager", "SecretsManagerEndpoint"),
];

/// NFS port used by filesystem mount targets
pub const NFS_PORT: u16 = 2049;
const HTTPS_PORT: u16 = 443;
const ANYWHERE: &str = "0.0.0.0/0";

/// Export names published by the network stack
pub mod outputs {
    use crate::domain::logical_id::pascal_case;
    use crate::domain::SubnetTier;

    pub const VPC_ID: &str = "VpcId";
    pub const ALB_SECURITY_GROUP_ID: &str = "AlbSecurityGroupId";
    pub const ECS_SECURITY_GROUP_ID: &str = "EcsSecurityGroupId";
    pub const GATEWAY_SECURITY_GROUP_ID: &str = "GatewaySecurityGroupId";
    pub const DB_SECURITY_GROUP_ID: &str = "DbSecurityGroupId";
    pub const EFS_SECURITY_GROUP_ID: &str = "EfsSecurityGroupId";
    pub const LOAD_BALANCER_DNS_NAME: &str = "LoadBalancerDnsName";
    pub const LISTENER_ARN: &str = "ListenerArn";

    /// `PublicSubnetIds`, `PrivateSubnetIds` or `IsolatedSubnetIds`
    pub fn subnet_ids(tier: SubnetTier) -> String {
        format!("{}SubnetIds", tier.label())
    }

    /// `<Service>TargetGroupArn`
    pub fn target_group_arn(service: &str) -> String {
        format!("{}TargetGroupArn", pascal_case(&[service]))
    }
}

/// Security groups in declaration order
#[derive(Debug, Clone)]
struct SecurityGroups {
    alb: LogicalId,
    ecs: LogicalId,
    gateway: LogicalId,
    db: LogicalId,
    efs: LogicalId,
    endpoints: LogicalId,
}

impl SecurityGroups {
    fn for_service(&self, group: ServiceGroup) -> &LogicalId {
        match group {
            ServiceGroup::Web => &self.ecs,
            ServiceGroup::Gateway => &self.gateway,
        }
    }
}

/// Ingress source: another group or a CIDR block
enum Source<'a> {
    Group(&'a LogicalId),
    Cidr(&'a str),
}

/// Build the network stack
pub fn build(config: &DeploymentConfig) -> InfrastructureResult<Stack> {
    let network = &config.network;
    let mut stack = Stack::new(
        &config.project,
        NETWORK,
        "VPC, subnets, routing, security groups and load balancer",
    );

    let vpc = stack.add(
        Resource::new(logical_id(&["vpc"])?, ResourceType::Vpc)
            .property("CidrBlock", network.vpc_cidr.as_cidr())
            .property("EnableDnsHostnames", true)
            .property("EnableDnsSupport", true),
    )?;

    let layout = SubnetLayout::plan(
        network.vpc_cidr,
        network.availability_zones,
        network.subnet_prefix,
    )?;
    let subnets = declare_subnets(&mut stack, &layout, &vpc)?;

    let igw = stack.add(Resource::new(logical_id(&["internet", "gateway"])?, ResourceType::InternetGateway))?;
    let attachment = stack.add(
        Resource::new(logical_id(&["internet", "gateway", "attachment"])?, ResourceType::VpcGatewayAttachment)
            .property("VpcId", Value::reference(&vpc))
            .property("InternetGatewayId", Value::reference(&igw)),
    )?;

    let route_tables = declare_routing(&mut stack, config, &vpc, &igw, &attachment, &subnets)?;

    stack.add(
        Resource::new(logical_id(&["s3", "endpoint"])?, ResourceType::VpcEndpoint)
            .property("VpcId", Value::reference(&vpc))
            .property("ServiceName", Value::sub("com.amazonaws.${AWS::Region}.s3"))
            .property("VpcEndpointType", "Gateway")
            .property(
                "RouteTableIds",
                Value::list(route_tables.iter().map(Value::reference)),
            ),
    )?;

    let groups = declare_security_groups(&mut stack, config, &vpc)?;

    if network.interface_endpoints {
        for (service, name) in INTERFACE_ENDPOINTS {
            stack.add(
                Resource::new(LogicalId::new(name)?, ResourceType::VpcEndpoint)
                    .property("VpcId", Value::reference(&vpc))
                    .property(
                        "ServiceName",
                        Value::sub(&format!("com.amazonaws.${{AWS::Region}}.{}", service)),
                    )
                    .property("VpcEndpointType", "Interface")
                    .property("PrivateDnsEnabled", true)
                    .property("SubnetIds", subnet_refs(&subnets, SubnetTier::Private))
                    .property(
                        "SecurityGroupIds",
                        Value::list(vec![Value::attribute(&groups.endpoints, "GroupId")]),
                    ),
            )?;
        }
    }

    let listener = declare_load_balancer(&mut stack, config, &vpc, &attachment, &subnets, &groups)?;

    stack.export(outputs::VPC_ID, Value::reference(&vpc), "VPC id")?;
    for tier in SubnetTier::ALL {
        stack.export(
            &outputs::subnet_ids(tier),
            Value::join(",", subnets_of(&subnets, tier).map(Value::reference)),
            &format!("Comma-separated {} subnet ids", tier),
        )?;
    }
    for (output, group, description) in [
        (outputs::ALB_SECURITY_GROUP_ID, &groups.alb, "Load balancer security group"),
        (outputs::ECS_SECURITY_GROUP_ID, &groups.ecs, "Web service security group"),
        (outputs::GATEWAY_SECURITY_GROUP_ID, &groups.gateway, "Gateway service security group"),
        (outputs::DB_SECURITY_GROUP_ID, &groups.db, "Database security group"),
        (outputs::EFS_SECURITY_GROUP_ID, &groups.efs, "Filesystem security group"),
    ] {
        stack.export(output, Value::attribute(group, "GroupId"), description)?;
    }
    stack.export(outputs::LISTENER_ARN, Value::reference(&listener.listener), "HTTP listener")?;
    stack.export(
        outputs::LOAD_BALANCER_DNS_NAME,
        Value::attribute(&listener.load_balancer, "DNSName"),
        "Public load balancer DNS name",
    )?;
    for (service, target_group) in &listener.target_groups {
        stack.export(
            &outputs::target_group_arn(service),
            Value::reference(target_group),
            &format!("Target group for {}", service),
        )?;
    }

    debug!(
        stack = %stack.name(),
        subnets = subnets.len(),
        resources = stack.resources().len(),
        "Built network stack"
    );

    Ok(stack)
}

fn declare_subnets(
    stack: &mut Stack,
    layout: &SubnetLayout,
    vpc: &LogicalId,
) -> InfrastructureResult<Vec<(SubnetTier, LogicalId)>> {
    let mut planned = Vec::with_capacity(layout.slots().len());
    for slot in layout.slots() {
        let id = logical_id(&[slot.tier.label(), "subnet", &(slot.zone + 1).to_string()])?;
        planned.push((id.to_string(), slot.cidr));
    }
    validate_subnet_partition(&layout.vpc(), &planned)?;

    let mut subnets = Vec::with_capacity(planned.len());
    for (slot, (name, _)) in layout.slots().iter().zip(&planned) {
        let id = stack.add(
            Resource::new(LogicalId::new(name.as_str())?, ResourceType::Subnet)
                .property("VpcId", Value::reference(vpc))
                .property("CidrBlock", slot.cidr.as_cidr())
                .property("AvailabilityZone", Value::availability_zone(slot.zone))
                .property("MapPublicIpOnLaunch", slot.tier == SubnetTier::Public),
        )?;
        subnets.push((slot.tier, id));
    }

    Ok(subnets)
}

fn subnets_of(
    subnets: &[(SubnetTier, LogicalId)],
    tier: SubnetTier,
) -> impl Iterator<Item = &LogicalId> {
    subnets.iter().filter(move |(t, _)| *t == tier).map(|(_, id)| id)
}

fn subnet_refs(subnets: &[(SubnetTier, LogicalId)], tier: SubnetTier) -> Value {
    Value::list(subnets_of(subnets, tier).map(Value::reference))
}

fn associate(stack: &mut Stack, subnet: &LogicalId, table: &LogicalId) -> InfrastructureResult<()> {
    stack.add(
        Resource::new(
            logical_id(&[subnet.as_str(), "route", "table", "association"])?,
            ResourceType::SubnetRouteTableAssociation,
        )
        .property("SubnetId", Value::reference(subnet))
        .property("RouteTableId", Value::reference(table)),
    )?;
    Ok(())
}

/// Route tables and NAT; returns the private and isolated route tables
fn declare_routing(
    stack: &mut Stack,
    config: &DeploymentConfig,
    vpc: &LogicalId,
    igw: &LogicalId,
    attachment: &LogicalId,
    subnets: &[(SubnetTier, LogicalId)],
) -> InfrastructureResult<Vec<LogicalId>> {
    let public_table = stack.add(
        Resource::new(logical_id(&["public", "route", "table"])?, ResourceType::RouteTable)
            .property("VpcId", Value::reference(vpc)),
    )?;
    stack.add(
        Resource::new(logical_id(&["public", "default", "route"])?, ResourceType::Route)
            .property("RouteTableId", Value::reference(&public_table))
            .property("DestinationCidrBlock", ANYWHERE)
            .property("GatewayId", Value::reference(igw))
            .depends_on(attachment),
    )?;

    let public: Vec<LogicalId> = subnets_of(subnets, SubnetTier::Public).cloned().collect();
    for subnet in &public {
        associate(stack, subnet, &public_table)?;
    }

    let mut nat_gateways = Vec::with_capacity(config.network.nat_gateways);
    for (index, subnet) in public.iter().take(config.network.nat_gateways).enumerate() {
        let n = (index + 1).to_string();
        let eip = stack.add(
            Resource::new(logical_id(&["nat", "eip", &n])?, ResourceType::Eip)
                .property("Domain", "vpc")
                .depends_on(attachment),
        )?;
        nat_gateways.push(stack.add(
            Resource::new(logical_id(&["nat", "gateway", &n])?, ResourceType::NatGateway)
                .property("AllocationId", Value::attribute(&eip, "AllocationId"))
                .property("SubnetId", Value::reference(subnet)),
        )?);
    }

    if nat_gateways.is_empty() {
        return Err(InfrastructureError::Configuration(
            "private subnets need at least one NAT gateway".to_string(),
        ));
    }

    let mut tables = Vec::new();
    let private: Vec<LogicalId> = subnets_of(subnets, SubnetTier::Private).cloned().collect();
    for (zone, subnet) in private.iter().enumerate() {
        let n = (zone + 1).to_string();
        let table = stack.add(
            Resource::new(logical_id(&["private", "route", "table", &n])?, ResourceType::RouteTable)
                .property("VpcId", Value::reference(vpc)),
        )?;
        let nat = &nat_gateways[zone % nat_gateways.len()];
        stack.add(
            Resource::new(logical_id(&["private", "default", "route", &n])?, ResourceType::Route)
                .property("RouteTableId", Value::reference(&table))
                .property("DestinationCidrBlock", ANYWHERE)
                .property("NatGatewayId", Value::reference(nat)),
        )?;
        associate(stack, subnet, &table)?;
        tables.push(table);
    }

    // No routes: isolated subnets only reach the VPC and gateway endpoints
    let isolated_table = stack.add(
        Resource::new(logical_id(&["isolated", "route", "table"])?, ResourceType::RouteTable)
            .property("VpcId", Value::reference(vpc)),
    )?;
    let isolated: Vec<LogicalId> = subnets_of(subnets, SubnetTier::Isolated).cloned().collect();
    for subnet in &isolated {
        associate(stack, subnet, &isolated_table)?;
    }
    tables.push(isolated_table);

    Ok(tables)
}

fn declare_security_groups(
    stack: &mut Stack,
    config: &DeploymentConfig,
    vpc: &LogicalId,
) -> InfrastructureResult<SecurityGroups> {
    let mut group = |name: &str, description: &str| -> InfrastructureResult<LogicalId> {
        stack.add(
            Resource::new(logical_id(&[name, "security", "group"])?, ResourceType::SecurityGroup)
                .property(
                    "GroupDescription",
                    format!("{} {}", config.project, description),
                )
                .property("VpcId", Value::reference(vpc)),
        )
    };

    let groups = SecurityGroups {
        alb: group("alb", "load balancer")?,
        ecs: group("ecs", "web services")?,
        gateway: group("gateway", "LLM gateway")?,
        db: group("db", "database")?,
        efs: group("efs", "shared filesystem")?,
        endpoints: group("endpoints", "VPC interface endpoints")?,
    };

    let mut rules = IngressRules::default();

    rules.add(stack, &groups.alb, Source::Cidr(ANYWHERE), "internet", config.network.listener_port)?;

    for service in &config.services {
        let target = groups.for_service(service.group);
        if service.route.is_some() {
            rules.add(stack, target, Source::Group(&groups.alb), "alb", service.container_port)?;
        }
        if service.group == ServiceGroup::Gateway {
            // web containers call the gateway through service discovery
            rules.add(stack, target, Source::Group(&groups.ecs), "ecs", service.container_port)?;
        }
    }

    for source in [(&groups.ecs, "ecs"), (&groups.gateway, "gateway")] {
        if config.services.iter().any(|s| s.database) {
            rules.add(stack, &groups.db, Source::Group(source.0), source.1, config.database.port)?;
        }
        if config.uses_filesystem() {
            rules.add(stack, &groups.efs, Source::Group(source.0), source.1, NFS_PORT)?;
        }
        if config.network.interface_endpoints {
            rules.add(stack, &groups.endpoints, Source::Group(source.0), source.1, HTTPS_PORT)?;
        }
    }

    Ok(groups)
}

/// Directed ingress edges, de-duplicated by (target, source, port)
#[derive(Default)]
struct IngressRules {
    declared: BTreeSet<LogicalId>,
}

impl IngressRules {
    fn add(
        &mut self,
        stack: &mut Stack,
        target: &LogicalId,
        source: Source<'_>,
        source_name: &str,
        port: u16,
    ) -> InfrastructureResult<()> {
        let target_name = target.as_str().trim_end_matches("SecurityGroup");
        let id = logical_id(&[target_name, "from", source_name, &port.to_string()])?;
        if !self.declared.insert(id.clone()) {
            return Ok(());
        }

        let rule = Resource::new(id, ResourceType::SecurityGroupIngress)
            .property("GroupId", Value::attribute(target, "GroupId"))
            .property("IpProtocol", "tcp")
            .property("FromPort", port)
            .property("ToPort", port)
            .property("Description", format!("{} to {} on {}", source_name, target_name, port));

        let rule = match source {
            Source::Group(group) => {
                rule.property("SourceSecurityGroupId", Value::attribute(group, "GroupId"))
            }
            Source::Cidr(cidr) => rule.property("CidrIp", cidr),
        };

        stack.add(rule)?;
        Ok(())
    }
}

/// Load balancer resources other stacks wire into
struct LoadBalancer {
    load_balancer: LogicalId,
    listener: LogicalId,
    target_groups: Vec<(String, LogicalId)>,
}

fn declare_load_balancer(
    stack: &mut Stack,
    config: &DeploymentConfig,
    vpc: &LogicalId,
    attachment: &LogicalId,
    subnets: &[(SubnetTier, LogicalId)],
    groups: &SecurityGroups,
) -> InfrastructureResult<LoadBalancer> {
    let load_balancer = stack.add(
        Resource::new(logical_id(&["load", "balancer"])?, ResourceType::LoadBalancer)
            .property("Name", format!("{}-alb", config.project))
            .property("Type", "application")
            .property("Scheme", "internet-facing")
            .property("Subnets", subnet_refs(subnets, SubnetTier::Public))
            .property(
                "SecurityGroups",
                Value::list(vec![Value::attribute(&groups.alb, "GroupId")]),
            )
            .property(
                "LoadBalancerAttributes",
                Value::list(vec![Value::map([
                    ("Key", Value::from("idle_timeout.timeout_seconds")),
                    ("Value", Value::from(config.network.idle_timeout_seconds.to_string())),
                ])]),
            )
            .depends_on(attachment),
    )?;

    let routed: Vec<&ServiceConfig> = config.services.iter().filter(|s| s.route.is_some()).collect();

    let mut target_groups = Vec::with_capacity(routed.len());
    for service in &routed {
        let Some(route) = &service.route else { continue };
        let id = stack.add(
            Resource::new(logical_id(&[&service.name, "target", "group"])?, ResourceType::TargetGroup)
                .property("VpcId", Value::reference(vpc))
                .property("Port", service.container_port)
                .property("Protocol", "HTTP")
                .property("TargetType", "ip")
                .property("HealthCheckPath", route.health_check_path.as_str())
                .property("HealthCheckIntervalSeconds", 30u32)
                .property("HealthyThresholdCount", 2u32)
                .property("UnhealthyThresholdCount", 3u32)
                .property("Matcher", Value::map([("HttpCode", "200")])),
        )?;
        target_groups.push((service.name.clone(), id));
    }

    let listener = stack.add(
        Resource::new(logical_id(&["http", "listener"])?, ResourceType::Listener)
            .property("LoadBalancerArn", Value::reference(&load_balancer))
            .property("Port", config.network.listener_port)
            .property("Protocol", "HTTP")
            .property(
                "DefaultActions",
                Value::list(vec![Value::map([
                    ("Type", Value::from("fixed-response")),
                    (
                        "FixedResponseConfig",
                        Value::map([
                            ("StatusCode", "404"),
                            ("ContentType", "text/plain"),
                            ("MessageBody", "Not Found"),
                        ]),
                    ),
                ])]),
            ),
    )?;

    for (service, (_, target_group)) in routed.iter().zip(&target_groups) {
        let Some(route) = &service.route else { continue };
        stack.add(
            Resource::new(logical_id(&[&service.name, "listener", "rule"])?, ResourceType::ListenerRule)
                .property("ListenerArn", Value::reference(&listener))
                .property("Priority", route.priority)
                .property(
                    "Conditions",
                    Value::list(vec![Value::map([
                        ("Field", Value::from("path-pattern")),
                        (
                            "PathPatternConfig",
                            Value::map([(
                                "Values",
                                Value::list(route.path_patterns.iter().map(Value::from)),
                            )]),
                        ),
                    ])]),
                )
                .property(
                    "Actions",
                    Value::list(vec![Value::map([
                        ("Type", Value::from("forward")),
                        ("TargetGroupArn", Value::reference(target_group)),
                    ])]),
                ),
        )?;
    }

    Ok(LoadBalancer {
        load_balancer,
        listener,
        target_groups,
    })
}
