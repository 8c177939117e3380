// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provider template rendering
//!
//! Rendering is deterministic: every object is key-sorted and every list is
//! emitted in declaration order, so the same stack always renders to the same
//! bytes.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use crate::errors::InfrastructureResult;
use crate::graph::Stack;

/// Template format version understood by the provisioning engine
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// One rendered resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateResource {
    #[serde(rename = "Type")]
    pub resource_type: String,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub properties: serde_json::Map<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// One rendered output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateOutput {
    pub description: String,
    pub value: serde_json::Value,
    pub export: TemplateExport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateExport {
    pub name: String,
}

/// A fully rendered stack template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    #[serde(rename = "Description")]
    pub description: String,

    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, TemplateResource>,

    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, TemplateOutput>,
}

impl Template {
    /// Render a stack
    pub fn from_stack(stack: &Stack) -> Self {
        let resources = stack
            .resources()
            .iter()
            .map(|resource| {
                let properties = resource
                    .properties()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();

                let depends_on = resource
                    .explicit_dependencies()
                    .into_iter()
                    .map(|id| id.to_string())
                    .collect();

                let probes: Vec<serde_json::Value> = resource
                    .readiness_probes()
                    .map(|probe| {
                        json!({
                            "Prerequisite": probe.prerequisite.as_str(),
                            "Condition": probe.condition.as_str(),
                        })
                    })
                    .collect();

                let metadata = (!probes.is_empty()).then(|| json!({ "Readiness": probes }));

                (
                    resource.logical_id().to_string(),
                    TemplateResource {
                        resource_type: resource.resource_type().provider_type().to_string(),
                        properties,
                        depends_on,
                        metadata,
                    },
                )
            })
            .collect();

        let outputs = stack
            .outputs()
            .iter()
            .map(|(name, output)| {
                (
                    name.clone(),
                    TemplateOutput {
                        description: output.description.clone(),
                        value: output.value.to_json(),
                        export: TemplateExport {
                            name: output.export.to_string(),
                        },
                    },
                )
            })
            .collect();

        Self {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: stack.description().to_string(),
            resources,
            outputs,
        }
    }

    /// Pretty JSON with a trailing newline
    pub fn to_json_string(&self) -> InfrastructureResult<String> {
        let mut rendered = serde_json::to_string_pretty(self)?;
        rendered.push('\n');
        Ok(rendered)
    }

    pub fn from_json(json: &str) -> InfrastructureResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
