//! Declarative workflow definitions
//!
//! A workflow is a DAG of nodes. Each node owns one collection on the target
//! service and declares the parents whose identifiers it needs. Payloads are
//! JSON templates, see [`crate::template`].

use crate::error::WorkflowResult;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;

/// The built-in cadastre workflow
pub const KATASTR_WORKFLOW: &str = include_str!("../workflows/katastr.yaml");

/// Complete workflow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub name: String,

    /// Values generated once per iteration
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub variables: BTreeMap<String, VariableSpec>,

    pub nodes: Vec<NodeSpec>,

    /// Read-only queries issued after every creation stage
    #[serde(default)]
    pub queries: Vec<QuerySpec>,
}

impl WorkflowSpec {
    pub fn from_yaml_str(yaml: &str) -> WorkflowResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> WorkflowResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// The cadastre workflow shipped with the binary
    pub fn builtin() -> WorkflowResult<Self> {
        Self::from_yaml_str(KATASTR_WORKFLOW)
    }

    pub fn node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

/// Per-iteration generated value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableSpec {
    /// Uniform integer in `0..max`
    Random { max: i64 },
    /// Another random variable plus a constant
    Offset { of: String, by: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Row with its own `id`, found again through a list lookup
    #[default]
    Entity,
    /// Relationship row identified by composite key fields
    Link,
}

/// Field/value pair locating a freshly created entity in a list response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSpec {
    pub field: String,
    pub value: JsonValue,
}

/// One node of the workflow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,

    #[serde(default)]
    pub kind: NodeKind,

    /// Collection path; defaults to the node name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// Name used in step keys; defaults to the node name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,

    #[serde(default)]
    pub parents: Vec<String>,

    pub create: JsonValue,

    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub matcher: Option<MatchSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<JsonValue>,

    /// Composite key fields of a link, taken from its create payload
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,

    /// Whether the resolution lookup is recorded under `get_<metric>`
    #[serde(default = "default_true")]
    pub track_lookup: bool,
}

fn default_true() -> bool {
    true
}

impl NodeSpec {
    pub fn collection(&self) -> &str {
        self.collection
            .as_deref()
            .unwrap_or(&self.name)
            .trim_start_matches('/')
    }

    pub fn metric_name(&self) -> &str {
        self.metric.as_deref().unwrap_or(&self.name)
    }

    pub fn is_link(&self) -> bool {
        self.kind == NodeKind::Link
    }
}

/// Read-only query gated on identifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Recorded as `get_<name>`
    pub name: String,
    /// Path and query string, relative to the base URL
    pub path: String,
    #[serde(default)]
    pub requires: Vec<String>,
}

impl QuerySpec {
    pub fn step_key(&self) -> String {
        format!("get_{}", self.name)
    }
}
