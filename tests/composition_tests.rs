// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Composition Tests
//!
//! Compose the four stacks from configuration and check the cross-stack
//! wiring the synthesized templates depend on.

mod fixtures;

use fixtures::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;

use gateway_infra::app::{App, Environment};
use gateway_infra::domain::{LogicalId, ResourceType, ValidationError};
use gateway_infra::graph::{analysis, Resource, Stack, Value};
use gateway_infra::stacks::{self, compute, network, ComputeInputs, COMPUTE, DATA, NETWORK, REGISTRY};
use gateway_infra::{compose, InfrastructureError};

fn id(s: &str) -> LogicalId {
    LogicalId::new(s).unwrap()
}

#[test]
fn test_default_composition_synthesizes_in_order() {
    let assembly = compose(&targeted_config()).unwrap().synth().unwrap();

    let order: Vec<&str> = assembly.stacks.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(order, vec![NETWORK, REGISTRY, DATA, COMPUTE]);

    let compute = assembly.stack(COMPUTE).unwrap();
    assert_eq!(compute.qualified_name, "llm-stack-compute");
    assert_eq!(compute.dependencies, vec![DATA, NETWORK, REGISTRY]);

    let manifest = assembly.manifest();
    assert_eq!(manifest.environment, Environment::new(REGION, ACCOUNT));
    assert_eq!(manifest.stacks[0].template_file, "llm-stack-network.template.json");
}

#[test]
fn test_every_import_is_exported_by_a_dependency() {
    let app = compose(&targeted_config()).unwrap();

    for stack in app.stacks() {
        let dependencies = app.transitive_dependencies(stack.name());
        for import in stack.imports() {
            assert!(dependencies.contains(import.producer()), "{} -> {}", stack.name(), import.producer());
            let producer = app.get(import.producer()).unwrap();
            assert!(producer.outputs().contains_key(import.output()));
            assert_eq!(
                import.export().as_str(),
                format!("llm-stack-{}-{}", import.producer(), import.output())
            );
        }
    }
}

/// Network exports {vpc, alb sg, ecs sg}; compute requires {vpc, ecs sg}
fn minimal_network(export_ecs_group: bool) -> Stack {
    let mut stack = Stack::new("demo", NETWORK, "network");
    let vpc = stack
        .add(Resource::new(id("Vpc"), ResourceType::Vpc).property("CidrBlock", "10.0.0.0/16"))
        .unwrap();
    stack.export("VpcId", Value::reference(&vpc), "VPC").unwrap();

    for name in ["Alb", "Ecs"] {
        let group = stack
            .add(
                Resource::new(id(&format!("{}SecurityGroup", name)), ResourceType::SecurityGroup)
                    .property("VpcId", Value::reference(&vpc)),
            )
            .unwrap();
        if name == "Alb" || export_ecs_group {
            stack
                .export(
                    &format!("{}SecurityGroupId", name),
                    Value::attribute(&group, "GroupId"),
                    name,
                )
                .unwrap();
        }
    }
    stack
}

fn minimal_compute(network: &Stack) -> Result<Stack, InfrastructureError> {
    let exports = network.exports();
    let vpc = exports.require(COMPUTE, "VpcId")?;
    let group = exports.require(COMPUTE, "EcsSecurityGroupId")?;

    let mut stack = Stack::new("demo", COMPUTE, "compute");
    stack.add_dependency(NETWORK);
    stack.add(
        Resource::new(id("TaskSecurityGroup"), ResourceType::SecurityGroup)
            .property("VpcId", vpc.value())
            .property("SourceSecurityGroupId", group.value()),
    )?;
    Ok(stack)
}

#[test]
fn test_minimal_wiring_composes() {
    let network = minimal_network(true);
    let compute = minimal_compute(&network).unwrap();

    let mut app = App::new("demo", Environment::new(REGION, ACCOUNT));
    app.add_stack(network).unwrap();
    app.add_stack(compute).unwrap();
    app.validate().unwrap();
    assert_eq!(app.deployment_order().unwrap(), vec![NETWORK, COMPUTE]);
}

#[test]
fn test_missing_security_group_output_is_structural() {
    let network = minimal_network(false);
    let err = minimal_compute(&network).unwrap_err();

    assert!(err.is_structural());
    match err {
        InfrastructureError::MissingInput { consumer, producer, input } => {
            assert_eq!((consumer.as_str(), producer.as_str()), (COMPUTE, NETWORK));
            assert_eq!(input, "EcsSecurityGroupId");
        }
        other => panic!("expected MissingInput, got {:?}", other),
    }
}

#[test]
fn test_missing_input_through_compose_path() {
    let config = targeted_config();
    let network = network::build(&config).unwrap();
    let registry = stacks::registry::build(&config).unwrap();
    let data = stacks::data::build(
        &config,
        &stacks::DataInputs::resolve(&config, &network.exports()).unwrap(),
    )
    .unwrap();

    let mut network_exports = network.exports();
    network_exports.remove(network::outputs::ECS_SECURITY_GROUP_ID);

    assert!(matches!(
        ComputeInputs::resolve(&config, &network_exports, &registry.exports(), &data.exports()),
        Err(InfrastructureError::MissingInput { .. })
    ));
}

#[test]
fn test_import_without_stack_dependency_rejected() {
    let network = minimal_network(true);
    let vpc = network.exports().require(COMPUTE, "VpcId").unwrap();

    let mut compute = Stack::new("demo", COMPUTE, "compute");
    compute
        .add(Resource::new(id("TaskSecurityGroup"), ResourceType::SecurityGroup).property("VpcId", vpc.value()))
        .unwrap();

    let mut app = App::new("demo", Environment::new(REGION, ACCOUNT));
    app.add_stack(network).unwrap();
    app.add_stack(compute).unwrap();

    assert!(matches!(
        app.validate(),
        Err(InfrastructureError::MissingStackDependency { .. })
    ));
    assert!(app.synth().is_err());
}

/// Rebuild a stack with the readiness edges of one resource removed
fn without_readiness(stack: &Stack, target: &str) -> Stack {
    let mut rebuilt = Stack::new(stack.project(), stack.name(), stack.description());
    for dependency in stack.dependencies() {
        rebuilt.add_dependency(dependency);
    }

    for resource in stack.resources() {
        let mut copy = Resource::new(resource.logical_id().clone(), resource.resource_type());
        for (key, value) in resource.properties() {
            copy = copy.property(key.clone(), value.clone());
        }
        for dependency in resource.dependencies() {
            copy = match dependency {
                gateway_infra::Dependency::Order(prerequisite) => copy.depends_on(prerequisite),
                gateway_infra::Dependency::Readiness(probe) if resource.logical_id().as_str() != target => {
                    copy.waits_for(probe.clone())
                }
                gateway_infra::Dependency::Readiness(_) => copy,
            };
        }
        rebuilt.add(copy).unwrap();
    }

    for (name, output) in stack.outputs() {
        rebuilt.export(name, output.value.clone(), &output.description).unwrap();
    }
    rebuilt
}

#[test]
fn test_removed_mount_readiness_detected_statically() {
    let app = compose(&targeted_config()).unwrap();
    let compute = app.get(COMPUTE).unwrap();

    analysis::check_filesystem_readiness(compute).unwrap();
    let service = id("WebuiService");
    for target in analysis::mount_targets(compute, &id("FileSystem")) {
        assert!(compute.depends_transitively(&service, target));
    }

    let broken = without_readiness(compute, "WebuiService");
    match analysis::check_filesystem_readiness(&broken) {
        Err(InfrastructureError::Validation(ValidationError::ReadinessNotSatisfied {
            dependent,
            prerequisite,
        })) => {
            assert_eq!(dependent, "WebuiService");
            assert_eq!(prerequisite, "MountTarget1");
        }
        other => panic!("expected ReadinessNotSatisfied, got {:?}", other),
    }
}

#[test]
fn test_readiness_rendered_in_template() {
    let assembly = compose(&targeted_config()).unwrap().synth().unwrap();
    let template = &assembly.stack(COMPUTE).unwrap().template;
    let service = &template.resources["WebuiService"];

    assert!(service.depends_on.contains(&"MountTarget1".to_string()));
    assert!(service.depends_on.contains(&"MountTarget2".to_string()));
    assert_eq!(
        service.metadata,
        Some(json!({ "Readiness": [
            { "Prerequisite": "MountTarget1", "Condition": "MountTargetAvailable" },
            { "Prerequisite": "MountTarget2", "Condition": "MountTargetAvailable" }
        ]}))
    );
}

#[test]
fn test_listener_priorities_unique() {
    let app = compose(&targeted_config()).unwrap();
    let network = app.get(NETWORK).unwrap();

    let priorities: Vec<i64> = network
        .resources()
        .iter()
        .filter(|r| r.resource_type() == ResourceType::ListenerRule)
        .filter_map(|r| r.get("Priority").and_then(Value::as_int))
        .collect();
    let mut unique = priorities.clone();
    unique.sort_unstable();
    unique.dedup();

    assert_eq!(priorities.len(), 2);
    assert_eq!(unique.len(), priorities.len());
}

#[test]
fn test_duplicate_route_priority_rejected() {
    let mut config = targeted_config();
    for service in &mut config.services {
        if let Some(route) = service.route.as_mut() {
            route.priority = 50;
        }
    }

    let err = compose(&config).and_then(|app| app.synth()).unwrap_err();
    assert!(err.is_structural());
}

#[test]
fn test_database_only_in_isolated_subnets() {
    let app = compose(&targeted_config()).unwrap();
    let data = app.get(DATA).unwrap();
    let subnet_group = data.resource(&id("DatabaseSubnetGroup")).unwrap();
    let rendered = subnet_group.get("SubnetIds").unwrap().to_json().to_string();

    assert!(rendered.contains("llm-stack-network-IsolatedSubnetIds"));
    assert!(!rendered.contains("PrivateSubnetIds"));
}

#[test]
fn test_gateway_only_from_toml() {
    let config = gateway_only_config();
    assert_eq!(config.project, "gw-only");
    assert!(!config.uses_filesystem());

    let app = compose(&config).unwrap();
    let assembly = app.synth().unwrap();
    let compute = assembly.stack(COMPUTE).unwrap();

    assert_eq!(assembly.environment, Environment::new("us-east-2", "210987654321"));
    assert!(!compute.template.resources.contains_key("FileSystem"));
    assert!(compute.template.resources.contains_key("GatewayService"));
    assert!(!compute.template.resources.contains_key("WebuiService"));

    let network = assembly.stack(NETWORK).unwrap();
    let nat_gateways = network
        .template
        .resources
        .values()
        .filter(|r| r.resource_type == "AWS::EC2::NatGateway")
        .count();
    assert_eq!(nat_gateways, 3);
    assert!(!network.template.resources.contains_key("EcrApiEndpoint"));

    let outputs = compute::outputs::FILE_SYSTEM_ID;
    assert!(!compute.template.outputs.contains_key(outputs));
}

#[test_case("project = \"\"" ; "empty project")]
#[test_case("[network]\navailability_zones = 1" ; "single zone")]
#[test_case("[network]\nvpc_cidr = \"10.0.0.0/12\"" ; "vpc too large")]
#[test_case("[registry]\nretain_images = 0" ; "no retained images")]
#[test_case("unknown_key = true" ; "unknown key")]
fn test_invalid_configuration_rejected(fragment: &str) {
    let raw = format!("region = \"{}\"\naccount = \"{}\"\n{}\n", REGION, ACCOUNT, fragment);
    let result = gateway_infra::DeploymentConfig::from_toml(&raw).and_then(|config| compose(&config));

    let err = result.unwrap_err();
    assert!(err.is_structural(), "{:?}", err);
}

#[test]
fn test_tags_on_taggable_resources() {
    let assembly = compose(&targeted_config()).unwrap().synth().unwrap();
    let vpc = &assembly.stack(NETWORK).unwrap().template.resources["Vpc"];

    assert_eq!(
        vpc.properties["Tags"],
        json!([
            { "Key": "Project", "Value": "llm-stack" },
            { "Key": "Stack", "Value": "network" }
        ])
    );
}

#[test]
fn test_project_override_moves_service_addresses() {
    let config = targeted_config().with_env_overrides(|key| {
        (key == "GATEWAY_INFRA_PROJECT").then(|| "demo".to_string())
    });
    let assembly = compose(&config).unwrap().synth().unwrap();
    let rendered = assembly.stack(COMPUTE).unwrap().template.to_json_string().unwrap();

    assert!(rendered.contains("\"demo.internal\""));
    assert!(rendered.contains("http://gateway.demo.internal:4000/v1"));
    assert!(!rendered.contains("llm-stack.internal"));
}

#[test]
fn test_literal_secret_never_reaches_templates() {
    let mut config = targeted_config();
    config.services[0]
        .secrets
        .insert("OPENAI_API_KEY".to_string(), "sk-live-abc123".to_string());

    match compose(&config) {
        Err(InfrastructureError::Validation(ValidationError::PlaintextSecret { container, key })) => {
            assert_eq!(container, "webui");
            assert_eq!(key, "OPENAI_API_KEY");
        }
        Err(other) => panic!("expected PlaintextSecret, got {:?}", other),
        Ok(_) => panic!("literal secret value accepted"),
    }
}
