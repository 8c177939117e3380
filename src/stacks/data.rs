// Copyright (c) 2025 - Cowboy AI, Inc.
//! Data stack: generated credentials, subnet group and database instance

use serde_json::json;
use tracing::debug;

use super::network::outputs as network_outputs;
use super::{logical_id, DATA, NETWORK};
use crate::config::DeploymentConfig;
use crate::domain::invariants::validate_database_placement;
use crate::domain::ResourceType;
use crate::errors::InfrastructureResult;
use crate::graph::{Exports, Import, ReadinessCondition, ReadinessProbe, Resource, Stack, Value};

/// Export names published by the data stack
pub mod outputs {
    pub const DB_ENDPOINT: &str = "DbEndpoint";
    pub const DB_PORT: &str = "DbPort";
    pub const DB_SECRET_ARN: &str = "DbSecretArn";
}

/// Inputs the data stack requires from the network stack
#[derive(Debug, Clone, PartialEq)]
pub struct DataInputs {
    /// Comma-separated subnet ids of the database tier
    pub subnet_ids: Import,
    pub db_security_group_id: Import,
}

impl DataInputs {
    pub fn resolve(config: &DeploymentConfig, network: &Exports) -> InfrastructureResult<Self> {
        let tier = config.database.subnet_tier;
        validate_database_placement(tier)?;

        Ok(Self {
            subnet_ids: network.require(DATA, &network_outputs::subnet_ids(tier))?,
            db_security_group_id: network.require(DATA, network_outputs::DB_SECURITY_GROUP_ID)?,
        })
    }
}

/// `{{resolve:secretsmanager:<secret>:SecretString:<key>}}`
fn resolve_secret_key(secret: &Value, key: &str) -> Value {
    Value::join(
        "",
        [
            Value::from("{{resolve:secretsmanager:"),
            secret.clone(),
            Value::from(format!(":SecretString:{}}}}}", key)),
        ],
    )
}

/// Build the data stack
pub fn build(config: &DeploymentConfig, inputs: &DataInputs) -> InfrastructureResult<Stack> {
    let database = &config.database;
    let mut stack = Stack::new(&config.project, DATA, "Database credentials and instance");

    let template = serde_json::to_string(&json!({ "username": database.username }))?;
    let secret = stack.add(
        Resource::new(logical_id(&["database", "secret"])?, ResourceType::Secret)
            .property("Name", format!("{}/database", config.project))
            .property("Description", "Generated database credentials")
            .property(
                "GenerateSecretString",
                Value::map([
                    ("SecretStringTemplate", Value::from(template)),
                    ("GenerateStringKey", Value::from("password")),
                    ("PasswordLength", Value::from(32u32)),
                    ("ExcludePunctuation", Value::from(true)),
                ]),
            ),
    )?;

    let subnet_group = stack.add(
        Resource::new(logical_id(&["database", "subnet", "group"])?, ResourceType::DbSubnetGroup)
            .property(
                "DBSubnetGroupDescription",
                format!("{} database subnets ({} tier)", config.project, database.subnet_tier),
            )
            .property("SubnetIds", inputs.subnet_ids.list()),
    )?;

    let secret_ref = Value::reference(&secret);
    let instance = stack.add(
        Resource::new(logical_id(&["database"])?, ResourceType::DbInstance)
            .property("Engine", database.engine.as_str())
            .property("EngineVersion", database.engine_version.as_str())
            .property("DBInstanceClass", database.instance_class.as_str())
            .property("AllocatedStorage", database.allocated_storage_gb.to_string())
            .property("StorageEncrypted", true)
            .property("DBName", database.database_name.as_str())
            .property("Port", database.port.to_string())
            .property("MasterUsername", resolve_secret_key(&secret_ref, "username"))
            .property("MasterUserPassword", resolve_secret_key(&secret_ref, "password"))
            .property("DBSubnetGroupName", Value::reference(&subnet_group))
            .property(
                "VPCSecurityGroups",
                Value::list(vec![inputs.db_security_group_id.value()]),
            )
            .property("MultiAZ", database.multi_az)
            .property("PubliclyAccessible", false)
            .property("BackupRetentionPeriod", database.backup_retention_days)
            .property("DeletionProtection", database.deletion_protection),
    )?;

    stack.add(
        Resource::new(logical_id(&["database", "secret", "attachment"])?, ResourceType::SecretTargetAttachment)
            .property("SecretId", Value::reference(&secret))
            .property("TargetId", Value::reference(&instance))
            .property("TargetType", "AWS::RDS::DBInstance")
            .waits_for(ReadinessProbe::new(&instance, ReadinessCondition::DatabaseAvailable)),
    )?;

    stack.add_dependency(NETWORK);

    stack.export(
        outputs::DB_ENDPOINT,
        Value::attribute(&instance, "Endpoint.Address"),
        "Database endpoint hostname",
    )?;
    stack.export(
        outputs::DB_PORT,
        Value::attribute(&instance, "Endpoint.Port"),
        "Database port",
    )?;
    stack.export(outputs::DB_SECRET_ARN, Value::reference(&secret), "Database credentials secret")?;

    debug!(stack = %stack.name(), engine = %database.engine, "Built data stack");
    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LogicalId, SubnetTier, ValidationError};
    use crate::errors::InfrastructureError;
    use crate::stacks::network;
    use crate::stacks::tests::config;
    use crate::template::Template;
    use pretty_assertions::assert_eq;

    fn build_default() -> Stack {
        let config = config();
        let network = network::build(&config).unwrap();
        let inputs = DataInputs::resolve(&config, &network.exports()).unwrap();
        build(&config, &inputs).unwrap()
    }

    #[test]
    fn test_database_uses_isolated_subnets() {
        let config = config();
        let network = network::build(&config).unwrap();
        let inputs = DataInputs::resolve(&config, &network.exports()).unwrap();
        assert_eq!(inputs.subnet_ids.output(), "IsolatedSubnetIds");
        assert_eq!(inputs.subnet_ids.export().as_str(), "llm-stack-network-IsolatedSubnetIds");
    }

    #[test]
    fn test_non_isolated_placement_rejected() {
        let mut config = config();
        config.database.subnet_tier = SubnetTier::Private;
        let network = network::build(&config).unwrap();
        assert!(matches!(
            DataInputs::resolve(&config, &network.exports()),
            Err(InfrastructureError::Validation(ValidationError::DatabaseNotIsolated(
                SubnetTier::Private
            )))
        ));
    }

    #[test]
    fn test_credentials_never_plaintext() {
        let template = Template::from_stack(&build_default());
        let db = &template.resources["Database"];
        assert_eq!(
            db.properties["MasterUserPassword"],
            json!({ "Fn::Join": ["", [
                "{{resolve:secretsmanager:",
                { "Ref": "DatabaseSecret" },
                ":SecretString:password}}"
            ]]})
        );
        let secret = &template.resources["DatabaseSecret"];
        assert_eq!(
            secret.properties["GenerateSecretString"]["SecretStringTemplate"],
            json!("{\"username\":\"llmadmin\"}")
        );
    }

    #[test]
    fn test_exports_and_dependency() {
        let stack = build_default();
        assert!(stack.dependencies().contains(NETWORK));
        assert_eq!(
            stack.exports().names().collect::<Vec<_>>(),
            vec!["DbEndpoint", "DbPort", "DbSecretArn"]
        );

        let attachment = stack
            .resource(&LogicalId::new("DatabaseSecretAttachment").unwrap())
            .unwrap();
        assert_eq!(attachment.readiness_probes().count(), 1);
    }
}
