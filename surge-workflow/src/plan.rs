//! Validated, staged form of a [`WorkflowSpec`]

use crate::definition::{NodeSpec, VariableSpec, WorkflowSpec};
use crate::error::{WorkflowError, WorkflowResult};
use crate::template::{self, Placeholder};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};

/// A workflow that passed validation, with its dependency levels computed
#[derive(Debug, Clone)]
pub struct WorkflowPlan {
    spec: WorkflowSpec,
    stages: Vec<Vec<usize>>,
    order: Vec<usize>,
}

/// Requests issued by one iteration in which every step succeeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestEstimate {
    pub creates: usize,
    pub lookups: usize,
    pub updates: usize,
    pub queries: usize,
    pub deletes: usize,
}

impl RequestEstimate {
    pub fn total(&self) -> usize {
        self.creates + self.lookups + self.updates + self.queries + self.deletes
    }
}

impl WorkflowPlan {
    pub fn new(spec: WorkflowSpec) -> WorkflowResult<Self> {
        if spec.nodes.is_empty() {
            return Err(WorkflowError::Empty);
        }

        // First pass: unique names
        let mut index = HashMap::new();
        for (i, node) in spec.nodes.iter().enumerate() {
            if index.insert(node.name.as_str(), i).is_some() {
                return Err(WorkflowError::DuplicateName(node.name.clone()));
            }
        }
        let mut query_names = HashSet::new();
        for query in &spec.queries {
            if !query_names.insert(query.name.as_str()) {
                return Err(WorkflowError::DuplicateName(query.name.clone()));
            }
        }

        // Second pass: parents exist
        for node in &spec.nodes {
            for parent in &node.parents {
                if parent == &node.name || !index.contains_key(parent.as_str()) {
                    return Err(WorkflowError::UnknownParent {
                        node: node.name.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }

        let stages = levels(&spec, &index)?;
        let order = stages.iter().flatten().copied().collect();

        validate_variables(&spec)?;
        for node in &spec.nodes {
            validate_node(&spec, node)?;
        }
        validate_queries(&spec)?;

        Ok(Self {
            spec,
            stages,
            order,
        })
    }

    pub fn spec(&self) -> &WorkflowSpec {
        &self.spec
    }

    /// Dependency levels; members of one level never depend on each other
    pub fn stages(&self) -> impl Iterator<Item = Vec<&NodeSpec>> + '_ {
        self.stages
            .iter()
            .map(|stage| stage.iter().map(|&i| &self.spec.nodes[i]).collect())
    }

    /// Topological order, stable with respect to declaration order
    pub fn topological_order(&self) -> impl DoubleEndedIterator<Item = &NodeSpec> + '_ {
        self.order.iter().map(|&i| &self.spec.nodes[i])
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn estimate_requests(&self) -> RequestEstimate {
        let nodes = &self.spec.nodes;
        RequestEstimate {
            creates: nodes.len(),
            lookups: nodes.iter().filter(|n| !n.is_link()).count(),
            updates: nodes.iter().filter(|n| n.update.is_some()).count(),
            queries: self.spec.queries.len(),
            deletes: nodes.len(),
        }
    }
}

/// Kahn's algorithm, one level at a time
fn levels(spec: &WorkflowSpec, index: &HashMap<&str, usize>) -> WorkflowResult<Vec<Vec<usize>>> {
    let count = spec.nodes.len();
    let mut remaining: Vec<usize> = spec.nodes.iter().map(|n| n.parents.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (i, node) in spec.nodes.iter().enumerate() {
        for parent in &node.parents {
            dependents[index[parent.as_str()]].push(i);
        }
    }

    let mut stages = Vec::new();
    let mut placed = 0;
    let mut current: Vec<usize> = (0..count).filter(|&i| remaining[i] == 0).collect();

    while !current.is_empty() {
        placed += current.len();
        let mut next = Vec::new();
        for &i in &current {
            for &dependent in &dependents[i] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        next.sort_unstable();
        stages.push(current);
        current = next;
    }

    if placed < count {
        let cycle = spec
            .nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| remaining[*i] > 0)
            .map(|(_, n)| n.name.clone())
            .collect();
        return Err(WorkflowError::Cycle(cycle));
    }

    Ok(stages)
}

fn validate_variables(spec: &WorkflowSpec) -> WorkflowResult<()> {
    for (name, variable) in &spec.variables {
        let invalid = |message: &str| WorkflowError::InvalidVariable {
            name: name.clone(),
            message: message.to_string(),
        };
        match variable {
            VariableSpec::Random { max } if *max <= 0 => {
                return Err(invalid("max must be positive"));
            }
            VariableSpec::Offset { of, .. } => match spec.variables.get(of) {
                Some(VariableSpec::Random { .. }) => {}
                _ => return Err(invalid("offset must refer to a random variable")),
            },
            _ => {}
        }
    }
    Ok(())
}

fn check_references(
    spec: &WorkflowSpec,
    owner: &str,
    template: &JsonValue,
    allowed_ids: &[&str],
) -> WorkflowResult<()> {
    let found = template::placeholders(template).map_err(|source| WorkflowError::Template {
        owner: owner.to_string(),
        source,
    })?;
    check_placeholders(spec, owner, &found, allowed_ids)
}

fn check_placeholders(
    spec: &WorkflowSpec,
    owner: &str,
    found: &[Placeholder],
    allowed_ids: &[&str],
) -> WorkflowResult<()> {
    for placeholder in found {
        let ok = match placeholder {
            Placeholder::Suffix => true,
            Placeholder::Var(name) => spec.variables.contains_key(name),
            Placeholder::Id(name) => {
                allowed_ids.contains(&name.as_str())
                    && spec.node(name).is_some_and(|n| !n.is_link())
            }
        };
        if !ok {
            return Err(WorkflowError::UnknownReference {
                owner: owner.to_string(),
                reference: placeholder.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_node(spec: &WorkflowSpec, node: &NodeSpec) -> WorkflowResult<()> {
    let invalid = |message: &str| WorkflowError::InvalidNode {
        node: node.name.clone(),
        message: message.to_string(),
    };

    if node.collection().is_empty() {
        return Err(invalid("collection must not be empty"));
    }

    let parents: Vec<&str> = node.parents.iter().map(String::as_str).collect();
    check_references(spec, &node.name, &node.create, &parents)?;

    let mut with_self = parents.clone();
    with_self.push(&node.name);
    if let Some(update) = &node.update {
        check_references(spec, &node.name, update, &with_self)?;
    }

    if node.is_link() {
        if node.matcher.is_some() {
            return Err(invalid("links are not resolved and cannot declare a match"));
        }
        if node.keys.is_empty() {
            return Err(invalid("links must declare their key fields"));
        }
        let payload = node
            .create
            .as_object()
            .ok_or_else(|| invalid("link payload must be an object"))?;
        if let Some(missing) = node.keys.iter().find(|k| !payload.contains_key(*k)) {
            return Err(invalid(&format!(
                "key field '{}' is not in the create payload",
                missing
            )));
        }
    } else {
        let matcher = node
            .matcher
            .as_ref()
            .ok_or_else(|| invalid("entities must declare a match"))?;
        if matcher.field.is_empty() {
            return Err(invalid("match field must not be empty"));
        }
        check_references(spec, &node.name, &matcher.value, &parents)?;
    }

    Ok(())
}

fn validate_queries(spec: &WorkflowSpec) -> WorkflowResult<()> {
    for query in &spec.queries {
        for required in &query.requires {
            if spec.node(required).is_none() {
                return Err(WorkflowError::UnknownParent {
                    node: query.name.clone(),
                    parent: required.clone(),
                });
            }
        }
        let found = template::placeholders_in_str(&query.path).map_err(|source| {
            WorkflowError::Template {
                owner: query.name.clone(),
                source,
            }
        })?;
        let requires: Vec<&str> = query.requires.iter().map(String::as_str).collect();
        check_placeholders(spec, &query.name, &found, &requires)?;
    }
    Ok(())
}
