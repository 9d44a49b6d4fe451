//! Per-iteration state

use crate::definition::VariableSpec;
use crate::template::{Placeholder, Scope};
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle of one node within one iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum NodeState {
    Pending,
    Creating,
    Resolving,
    Resolved,
    Unresolved,
    Updating,
    Ready,
    Skipped(SkipReason),
}

impl NodeState {
    pub fn is_ready(&self) -> bool {
        matches!(self, NodeState::Ready)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Ready | NodeState::Skipped(_))
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Pending => write!(f, "pending"),
            NodeState::Creating => write!(f, "creating"),
            NodeState::Resolving => write!(f, "resolving"),
            NodeState::Resolved => write!(f, "resolved"),
            NodeState::Unresolved => write!(f, "unresolved"),
            NodeState::Updating => write!(f, "updating"),
            NodeState::Ready => write!(f, "ready"),
            NodeState::Skipped(reason) => write!(f, "skipped ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The node's own identifier could not be obtained
    Unresolved,
    /// A parent never became ready
    ParentUnavailable(String),
    /// A template could not be rendered
    Render(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unresolved => write!(f, "unresolved"),
            SkipReason::ParentUnavailable(parent) => write!(f, "parent '{}' unavailable", parent),
            SkipReason::Render(message) => write!(f, "render failed: {}", message),
        }
    }
}

/// How a created row is addressed for deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Server-assigned `id`
    Id(JsonValue),
    /// Composite key fields, in declaration order
    Keys(Vec<(String, JsonValue)>),
}

impl Identifier {
    /// Query pairs that address this row
    pub fn query_pairs(&self) -> Vec<(String, JsonValue)> {
        match self {
            Identifier::Id(id) => vec![("id".to_string(), id.clone())],
            Identifier::Keys(keys) => keys.clone(),
        }
    }
}

/// Uniqueness token: `<unix-millis>_<random 0..1_000_000>`
pub fn uniqueness_token() -> String {
    format!(
        "{}_{}",
        Utc::now().timestamp_millis(),
        rand::rng().random_range(0..1_000_000)
    )
}

/// Draw a fresh value for every variable
pub fn generate_variables(specs: &BTreeMap<String, VariableSpec>) -> BTreeMap<String, JsonValue> {
    let mut rng = rand::rng();
    let mut values: BTreeMap<String, i64> = BTreeMap::new();

    for (name, spec) in specs {
        if let VariableSpec::Random { max } = spec {
            values.insert(name.clone(), rng.random_range(0..*max));
        }
    }
    for (name, spec) in specs {
        if let VariableSpec::Offset { of, by } = spec {
            if let Some(base) = values.get(of).copied() {
                values.insert(name.clone(), base.saturating_add(*by));
            }
        }
    }

    values
        .into_iter()
        .map(|(name, value)| (name, JsonValue::from(value)))
        .collect()
}

/// Everything one iteration knows; discarded after its cleanup
#[derive(Debug, Clone)]
pub struct IterationContext {
    suffix: String,
    variables: BTreeMap<String, JsonValue>,
    states: BTreeMap<String, NodeState>,
    identifiers: BTreeMap<String, Identifier>,
}

impl IterationContext {
    pub fn new(suffix: impl Into<String>, variables: BTreeMap<String, JsonValue>) -> Self {
        Self {
            suffix: suffix.into(),
            variables,
            states: BTreeMap::new(),
            identifiers: BTreeMap::new(),
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn variable(&self, name: &str) -> Option<&JsonValue> {
        self.variables.get(name)
    }

    pub fn state(&self, node: &str) -> NodeState {
        self.states.get(node).cloned().unwrap_or(NodeState::Pending)
    }

    pub fn states(&self) -> &BTreeMap<String, NodeState> {
        &self.states
    }

    pub fn set_state(&mut self, node: &str, state: NodeState) {
        self.states.insert(node.to_string(), state);
    }

    /// Mark a node ready and keep the identifier cleanup will use
    pub fn mark_ready(&mut self, node: &str, identifier: Identifier) {
        self.identifiers.insert(node.to_string(), identifier);
        self.set_state(node, NodeState::Ready);
    }

    pub fn identifier(&self, node: &str) -> Option<&Identifier> {
        self.identifiers.get(node)
    }

    /// Remove and return the identifier; a node is deleted at most once
    pub fn take_identifier(&mut self, node: &str) -> Option<Identifier> {
        self.identifiers.remove(node)
    }

    /// First listed parent that is not ready
    pub fn unavailable_parent<'a>(&self, parents: &'a [String]) -> Option<&'a str> {
        parents
            .iter()
            .find(|p| !self.state(p).is_ready())
            .map(String::as_str)
    }
}

impl Scope for IterationContext {
    fn lookup(&self, placeholder: &Placeholder) -> Option<JsonValue> {
        match placeholder {
            Placeholder::Suffix => Some(JsonValue::String(self.suffix.clone())),
            Placeholder::Var(name) => self.variables.get(name).cloned(),
            Placeholder::Id(node) => match self.identifiers.get(node) {
                Some(Identifier::Id(id)) => Some(id.clone()),
                _ => None,
            },
        }
    }
}

/// Context plus the identifier of the node being updated
pub(crate) struct NodeScope<'a> {
    pub context: &'a IterationContext,
    pub node: &'a str,
    pub id: &'a JsonValue,
}

impl Scope for NodeScope<'_> {
    fn lookup(&self, placeholder: &Placeholder) -> Option<JsonValue> {
        match placeholder {
            Placeholder::Id(node) if node == self.node => Some(self.id.clone()),
            other => self.context.lookup(other),
        }
    }
}
