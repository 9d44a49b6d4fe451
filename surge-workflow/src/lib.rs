//! Workflow engine for surge
//!
//! A [`WorkflowSpec`] describes the entities one iteration creates, how they
//! depend on each other and how each one is found again after creation.
//! [`WorkflowPlan`] validates it and orders it into stages, and
//! [`WorkflowRunner`] executes iterations of it through a
//! [`surge_http::StepExecutor`].

pub mod context;
pub mod definition;
pub mod engine;
pub mod error;
pub mod plan;
pub mod resolver;
pub mod template;

pub use context::{Identifier, IterationContext, NodeState, SkipReason};
pub use definition::{
    MatchSpec, NodeKind, NodeSpec, QuerySpec, VariableSpec, WorkflowSpec, KATASTR_WORKFLOW,
};
pub use engine::{IterationReport, WorkflowRunner};
pub use error::{WorkflowError, WorkflowResult};
pub use plan::{RequestEstimate, WorkflowPlan};
pub use resolver::resolve;
