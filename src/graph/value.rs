// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property values and intrinsic references
//!
//! A [`Value`] is a property expression in a resource declaration. Literal
//! values render as JSON; references render as provider intrinsics. Because
//! references are data, the dependency graph can be inspected without any
//! provisioning engine.

use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{ExportName, LogicalId};

/// Provider pseudo parameters resolved at deploy time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PseudoParameter {
    Region,
    AccountId,
    Partition,
    StackName,
}

impl PseudoParameter {
    /// Provider name of the pseudo parameter
    pub fn name(&self) -> &'static str {
        match self {
            PseudoParameter::Region => "AWS::Region",
            PseudoParameter::AccountId => "AWS::AccountId",
            PseudoParameter::Partition => "AWS::Partition",
            PseudoParameter::StackName => "AWS::StackName",
        }
    }
}

/// Reference to another stack's exported output
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Import {
    producer: String,
    output: String,
    export: ExportName,
}

impl Import {
    pub fn new(producer: impl Into<String>, output: impl Into<String>, export: ExportName) -> Self {
        Self {
            producer: producer.into(),
            output: output.into(),
            export,
        }
    }

    /// Name of the stack that exports the value
    pub fn producer(&self) -> &str {
        &self.producer
    }

    /// Output name within the producing stack
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Export name the value is published under
    pub fn export(&self) -> &ExportName {
        &self.export
    }

    /// The import as a property value
    pub fn value(&self) -> Value {
        Value::Import(self.clone())
    }

    /// The import split on commas (for exported id lists)
    pub fn list(&self) -> Value {
        Value::split(",", self.value())
    }
}

/// Property expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Reference to a resource in the same stack
    Ref(LogicalId),
    /// Attribute of a resource in the same stack
    GetAtt(LogicalId, String),
    /// Deploy-time pseudo parameter
    Pseudo(PseudoParameter),
    /// Value exported by another stack
    Import(Import),
    /// Any other provider function, e.g. `Fn::Join`
    Intrinsic(&'static str, Box<Value>),
}

impl Value {
    /// Build a map value from key/value pairs
    pub fn map<K, V, I>(entries: I) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a list value
    pub fn list<V, I>(items: I) -> Value
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// `Ref` to a resource
    pub fn reference(id: &LogicalId) -> Value {
        Value::Ref(id.clone())
    }

    /// `Fn::GetAtt` of a resource attribute
    pub fn attribute(id: &LogicalId, attribute: &str) -> Value {
        Value::GetAtt(id.clone(), attribute.to_string())
    }

    /// `Fn::Join`
    pub fn join<I>(separator: &str, parts: I) -> Value
    where
        I: IntoIterator<Item = Value>,
    {
        Value::Intrinsic(
            "Fn::Join",
            Box::new(Value::List(vec![
                Value::from(separator),
                Value::List(parts.into_iter().collect()),
            ])),
        )
    }

    /// `Fn::Split`
    pub fn split(separator: &str, source: Value) -> Value {
        Value::Intrinsic(
            "Fn::Split",
            Box::new(Value::List(vec![Value::from(separator), source])),
        )
    }

    /// `Fn::Sub` over a template string using pseudo parameters only
    pub fn sub(template: &str) -> Value {
        Value::Intrinsic("Fn::Sub", Box::new(Value::from(template)))
    }

    /// `Fn::Select` of one element of a list value
    pub fn select(index: usize, source: Value) -> Value {
        Value::Intrinsic(
            "Fn::Select",
            Box::new(Value::List(vec![Value::Int(index as i64), source])),
        )
    }

    /// The n-th availability zone of the deployment region
    pub fn availability_zone(index: usize) -> Value {
        Value::select(index, Value::Intrinsic("Fn::GetAZs", Box::new(Value::from(""))))
    }

    /// Look up a key in a map value
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The resource a plain `Ref` points at
    pub fn as_ref_id(&self) -> Option<&LogicalId> {
        match self {
            Value::Ref(id) => Some(id),
            _ => None,
        }
    }

    /// Collect every same-stack resource this value references
    pub fn collect_references<'a>(&'a self, out: &mut BTreeSet<&'a LogicalId>) {
        match self {
            Value::Ref(id) | Value::GetAtt(id, _) => {
                out.insert(id);
            }
            Value::List(items) => items.iter().for_each(|v| v.collect_references(out)),
            Value::Map(map) => map.values().for_each(|v| v.collect_references(out)),
            Value::Intrinsic(_, args) => args.collect_references(out),
            _ => {}
        }
    }

    /// Collect every cross-stack import in this value
    pub fn collect_imports<'a>(&'a self, out: &mut BTreeSet<&'a Import>) {
        match self {
            Value::Import(import) => {
                out.insert(import);
            }
            Value::List(items) => items.iter().for_each(|v| v.collect_imports(out)),
            Value::Map(map) => map.values().for_each(|v| v.collect_imports(out)),
            Value::Intrinsic(_, args) => args.collect_imports(out),
            _ => {}
        }
    }

    /// Render as provider template JSON
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Int(i) => json!(i),
            Value::String(s) => json!(s),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Ref(id) => json!({ "Ref": id.as_str() }),
            Value::GetAtt(id, attribute) => json!({ "Fn::GetAtt": [id.as_str(), attribute] }),
            Value::Pseudo(param) => json!({ "Ref": param.name() }),
            Value::Import(import) => json!({ "Fn::ImportValue": import.export().as_str() }),
            Value::Intrinsic(name, args) => {
                let mut object = serde_json::Map::new();
                object.insert((*name).to_string(), args.to_json());
                serde_json::Value::Object(object)
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u16> for Value {
    fn from(i: u16) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<PseudoParameter> for Value {
    fn from(param: PseudoParameter) -> Self {
        Value::Pseudo(param)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
