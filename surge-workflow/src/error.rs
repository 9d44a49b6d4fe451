//! Workflow error types

use crate::template::TemplateError;
use thiserror::Error;

/// Errors raised while loading or validating a workflow
///
/// Nothing here is raised while an iteration runs: per-iteration failures
/// become node states instead.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Failed to read workflow file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse workflow: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Workflow has no nodes")]
    Empty,

    #[error("Duplicate name '{0}'")]
    DuplicateName(String),

    #[error("Node '{node}' depends on unknown node '{parent}'")]
    UnknownParent { node: String, parent: String },

    #[error("Circular dependency between nodes: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("'{owner}' references '{reference}', which is not available to it")]
    UnknownReference { owner: String, reference: String },

    #[error("Node '{node}' is invalid: {message}")]
    InvalidNode { node: String, message: String },

    #[error("Variable '{name}' is invalid: {message}")]
    InvalidVariable { name: String, message: String },

    #[error("Template error in '{owner}': {source}")]
    Template {
        owner: String,
        #[source]
        source: TemplateError,
    },

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
