// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cloud Resource Type Domain Model
//!
//! Defines the taxonomy of cloud resources the stacks declare. Each type maps
//! to exactly one provider type name in the rendered template.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cloud resource type taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    // Network Foundation
    /// Virtual private cloud
    Vpc,
    /// Subnet within a VPC
    Subnet,
    /// Internet gateway
    InternetGateway,
    /// Attachment of an internet gateway to a VPC
    VpcGatewayAttachment,
    /// Elastic IP address
    Eip,
    /// NAT gateway
    NatGateway,
    /// Route table
    RouteTable,
    /// Route entry
    Route,
    /// Subnet to route table association
    SubnetRouteTableAssociation,
    /// Gateway or interface VPC endpoint
    VpcEndpoint,

    // Security Perimeter
    /// Security group
    SecurityGroup,
    /// Security group ingress rule
    SecurityGroupIngress,

    // Load Balancing
    /// Application load balancer
    LoadBalancer,
    /// Load balancer listener
    Listener,
    /// Listener routing rule
    ListenerRule,
    /// Target group
    TargetGroup,

    // Registry
    /// Container image repository
    EcrRepository,

    // Data Store
    /// Database subnet group
    DbSubnetGroup,
    /// Managed relational database instance
    DbInstance,
    /// Secret store entry
    Secret,
    /// Secret to database attachment
    SecretTargetAttachment,

    // Shared Filesystem
    /// Network filesystem
    FileSystem,
    /// Filesystem mount target
    MountTarget,
    /// Filesystem access point
    AccessPoint,

    // Compute
    /// Container cluster
    Cluster,
    /// Task definition
    TaskDefinition,
    /// Container service
    Service,

    // Identity
    /// IAM role
    Role,

    // Observability
    /// Log group
    LogGroup,

    // Service Discovery
    /// Private DNS namespace
    PrivateDnsNamespace,
    /// Service discovery registration
    DiscoveryService,
}

/// Resource category (high-level grouping)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Network,
    Security,
    LoadBalancing,
    Registry,
    Database,
    Storage,
    Compute,
    Identity,
    Observability,
    Discovery,
}

impl ResourceType {
    /// Every resource type, in declaration order
    pub const ALL: [ResourceType; 31] = [
        Self::Vpc,
        Self::Subnet,
        Self::InternetGateway,
        Self::VpcGatewayAttachment,
        Self::Eip,
        Self::NatGateway,
        Self::RouteTable,
        Self::Route,
        Self::SubnetRouteTableAssociation,
        Self::VpcEndpoint,
        Self::SecurityGroup,
        Self::SecurityGroupIngress,
        Self::LoadBalancer,
        Self::Listener,
        Self::ListenerRule,
        Self::TargetGroup,
        Self::EcrRepository,
        Self::DbSubnetGroup,
        Self::DbInstance,
        Self::Secret,
        Self::SecretTargetAttachment,
        Self::FileSystem,
        Self::MountTarget,
        Self::AccessPoint,
        Self::Cluster,
        Self::TaskDefinition,
        Self::Service,
        Self::Role,
        Self::LogGroup,
        Self::PrivateDnsNamespace,
        Self::DiscoveryService,
    ];

    /// Provider type name used in the rendered template
    pub fn provider_type(&self) -> &'static str {
        match self {
            Self::Vpc => "AWS::EC2::VPC",
            Self::Subnet => "AWS::EC2::Subnet",
            Self::InternetGateway => "AWS::EC2::InternetGateway",
            Self::VpcGatewayAttachment => "AWS::EC2::VPCGatewayAttachment",
            Self::Eip => "AWS::EC2::EIP",
            Self::NatGateway => "AWS::EC2::NatGateway",
            Self::RouteTable => "AWS::EC2::RouteTable",
            Self::Route => "AWS::EC2::Route",
            Self::SubnetRouteTableAssociation => "AWS::EC2::SubnetRouteTableAssociation",
            Self::VpcEndpoint => "AWS::EC2::VPCEndpoint",
            Self::SecurityGroup => "AWS::EC2::SecurityGroup",
            Self::SecurityGroupIngress => "AWS::EC2::SecurityGroupIngress",
            Self::LoadBalancer => "AWS::ElasticLoadBalancingV2::LoadBalancer",
            Self::Listener => "AWS::ElasticLoadBalancingV2::Listener",
            Self::ListenerRule => "AWS::ElasticLoadBalancingV2::ListenerRule",
            Self::TargetGroup => "AWS::ElasticLoadBalancingV2::TargetGroup",
            Self::EcrRepository => "AWS::ECR::Repository",
            Self::DbSubnetGroup => "AWS::RDS::DBSubnetGroup",
            Self::DbInstance => "AWS::RDS::DBInstance",
            Self::Secret => "AWS::SecretsManager::Secret",
            Self::SecretTargetAttachment => "AWS::SecretsManager::SecretTargetAttachment",
            Self::FileSystem => "AWS::EFS::FileSystem",
            Self::MountTarget => "AWS::EFS::MountTarget",
            Self::AccessPoint => "AWS::EFS::AccessPoint",
            Self::Cluster => "AWS::ECS::Cluster",
            Self::TaskDefinition => "AWS::ECS::TaskDefinition",
            Self::Service => "AWS::ECS::Service",
            Self::Role => "AWS::IAM::Role",
            Self::LogGroup => "AWS::Logs::LogGroup",
            Self::PrivateDnsNamespace => "AWS::ServiceDiscovery::PrivateDnsNamespace",
            Self::DiscoveryService => "AWS::ServiceDiscovery::Service",
        }
    }

    /// Look up a resource type by its provider type name
    pub fn from_provider_type(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.provider_type() == name)
    }

    /// Get the category for this resource type
    pub fn category(&self) -> ResourceCategory {
        match self {
            Self::Vpc
            | Self::Subnet
            | Self::InternetGateway
            | Self::VpcGatewayAttachment
            | Self::Eip
            | Self::NatGateway
            | Self::RouteTable
            | Self::Route
            | Self::SubnetRouteTableAssociation
            | Self::VpcEndpoint => ResourceCategory::Network,

            Self::SecurityGroup | Self::SecurityGroupIngress => ResourceCategory::Security,

            Self::LoadBalancer | Self::Listener | Self::ListenerRule | Self::TargetGroup => {
                ResourceCategory::LoadBalancing
            }

            Self::EcrRepository => ResourceCategory::Registry,

            Self::DbSubnetGroup
            | Self::DbInstance
            | Self::Secret
            | Self::SecretTargetAttachment => ResourceCategory::Database,

            Self::FileSystem | Self::MountTarget | Self::AccessPoint => ResourceCategory::Storage,

            Self::Cluster | Self::TaskDefinition | Self::Service => ResourceCategory::Compute,

            Self::Role => ResourceCategory::Identity,

            Self::LogGroup => ResourceCategory::Observability,

            Self::PrivateDnsNamespace | Self::DiscoveryService => ResourceCategory::Discovery,
        }
    }

    /// Property that carries key/value tags, if the type supports tagging
    pub fn tags_property(&self) -> Option<&'static str> {
        match self {
            Self::FileSystem => Some("FileSystemTags"),
            Self::AccessPoint => Some("AccessPointTags"),
            Self::VpcGatewayAttachment
            | Self::Route
            | Self::SubnetRouteTableAssociation
            | Self::VpcEndpoint
            | Self::SecurityGroupIngress
            | Self::Listener
            | Self::ListenerRule
            | Self::SecretTargetAttachment
            | Self::MountTarget => None,
            _ => Some("Tags"),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.provider_type())
    }
}
