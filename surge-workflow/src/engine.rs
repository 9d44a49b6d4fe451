//! Iteration engine
//!
//! One iteration walks the plan stage by stage. Nodes of a stage run
//! concurrently against a read-only view of the context, and their results
//! are applied once the whole stage has concluded. Enrichment queries follow
//! the last stage, then cleanup deletes every ready node in reverse
//! topological order.

use crate::context::{
    generate_variables, uniqueness_token, Identifier, IterationContext, NodeScope, NodeState,
    SkipReason,
};
use crate::definition::{NodeSpec, QuerySpec};
use crate::error::WorkflowResult;
use crate::plan::WorkflowPlan;
use crate::resolver::resolve;
use crate::template::{self, display_value, Scope};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use surge_http::{HttpMethod, StepCall, StepExecutor};
use tracing::{debug, trace, warn};
use url::Url;

/// What one iteration did
#[derive(Debug, Clone, Serialize)]
pub struct IterationReport {
    pub suffix: String,
    /// Final state of every node
    pub states: BTreeMap<String, NodeState>,
    /// Enrichment queries issued
    pub queries: Vec<String>,
    /// Nodes deleted by cleanup, in order
    pub cleanup_order: Vec<String>,
}

impl IterationReport {
    pub fn state(&self, node: &str) -> Option<&NodeState> {
        self.states.get(node)
    }

    pub fn ready_count(&self) -> usize {
        self.states.values().filter(|s| s.is_ready()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.states.len() - self.ready_count()
    }
}

struct NodeOutcome {
    state: NodeState,
    identifier: Option<Identifier>,
}

impl NodeOutcome {
    fn ready(identifier: Identifier) -> Self {
        Self {
            state: NodeState::Ready,
            identifier: Some(identifier),
        }
    }

    fn skipped(reason: SkipReason) -> Self {
        Self {
            state: NodeState::Skipped(reason),
            identifier: None,
        }
    }
}

fn advance(node: &str, state: &mut NodeState, next: NodeState) {
    trace!(node = node, "{} -> {}", state, next);
    *state = next;
}

/// Runs workflow iterations against the target service
#[derive(Debug, Clone)]
pub struct WorkflowRunner {
    plan: Arc<WorkflowPlan>,
    executor: StepExecutor,
    base_url: Url,
}

impl WorkflowRunner {
    pub fn new(
        plan: Arc<WorkflowPlan>,
        executor: StepExecutor,
        base_url: &str,
    ) -> WorkflowResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            plan,
            executor,
            base_url,
        })
    }

    pub fn plan(&self) -> &WorkflowPlan {
        &self.plan
    }

    /// Fresh context with a new uniqueness token and variables
    pub fn new_context(&self) -> IterationContext {
        IterationContext::new(
            uniqueness_token(),
            generate_variables(&self.plan.spec().variables),
        )
    }

    /// Run one complete iteration, cleanup included
    pub async fn run_iteration(&self) -> IterationReport {
        let mut context = self.new_context();
        self.run_with_context(&mut context).await
    }

    pub async fn run_with_context(&self, context: &mut IterationContext) -> IterationReport {
        self.create(context).await;
        let queries = self.enrich(context).await;
        let cleanup_order = self.cleanup(context).await;

        let report = IterationReport {
            suffix: context.suffix().to_string(),
            states: context.states().clone(),
            queries,
            cleanup_order,
        };
        debug!(
            suffix = %report.suffix,
            ready = report.ready_count(),
            skipped = report.skipped_count(),
            "Iteration finished"
        );
        report
    }

    fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path.trim_start_matches('/'))
    }

    /// Run every creation stage
    pub async fn create(&self, context: &mut IterationContext) {
        for stage in self.plan.stages() {
            let mut attempts = Vec::new();
            for node in stage {
                match context.unavailable_parent(&node.parents) {
                    Some(parent) => {
                        trace!(node = %node.name, parent = parent, "Skipping node");
                        context.set_state(
                            &node.name,
                            NodeState::Skipped(SkipReason::ParentUnavailable(parent.to_string())),
                        );
                    }
                    None => attempts.push(node),
                }
            }

            let view: &IterationContext = context;
            let outcomes = join_all(
                attempts
                    .iter()
                    .map(|node| async move { (*node, self.attempt(node, view).await) }),
            )
            .await;

            for (node, outcome) in outcomes {
                match outcome.identifier {
                    Some(identifier) => context.mark_ready(&node.name, identifier),
                    None => context.set_state(&node.name, outcome.state),
                }
            }
        }
    }

    async fn attempt(&self, node: &NodeSpec, context: &IterationContext) -> NodeOutcome {
        let mut state = NodeState::Pending;
        let outcome = if node.is_link() {
            self.attempt_link(node, context, &mut state).await
        } else {
            self.attempt_entity(node, context, &mut state).await
        };
        advance(&node.name, &mut state, outcome.state.clone());
        outcome
    }

    async fn send(
        &self,
        step: Option<String>,
        method: HttpMethod,
        url: &Url,
        body: Option<JsonValue>,
    ) -> surge_http::Outcome {
        let call = match &step {
            Some(step) => StepCall::new(step, method, url.as_str()),
            None => StepCall::untracked(method, url.as_str()),
        };
        let call = match body {
            Some(body) => call.with_body(body),
            None => call,
        };
        self.executor.execute(call).await
    }

    async fn attempt_entity(
        &self,
        node: &NodeSpec,
        context: &IterationContext,
        state: &mut NodeState,
    ) -> NodeOutcome {
        let Some(matcher) = &node.matcher else {
            return NodeOutcome::skipped(SkipReason::Unresolved);
        };
        let rendered = template::render(&node.create, context)
            .and_then(|payload| Ok((payload, template::render(&matcher.value, context)?)));
        let (payload, expected) = match rendered {
            Ok(rendered) => rendered,
            Err(err) => return render_failure(node, err),
        };
        let url = match self.endpoint(node.collection()) {
            Ok(url) => url,
            Err(err) => return render_failure(node, err),
        };
        let metric = node.metric_name();

        advance(&node.name, state, NodeState::Creating);
        self.send(
            Some(HttpMethod::Post.step_key(metric)),
            HttpMethod::Post,
            &url,
            Some(payload),
        )
        .await;

        // The lookup happens whatever the create status was
        advance(&node.name, state, NodeState::Resolving);
        let lookup_step = node
            .track_lookup
            .then(|| HttpMethod::Get.step_key(metric));
        let listing = self.send(lookup_step, HttpMethod::Get, &url, None).await;

        let Some(id) = resolve(&listing.body, &matcher.field, &expected) else {
            advance(&node.name, state, NodeState::Unresolved);
            return NodeOutcome::skipped(SkipReason::Unresolved);
        };
        advance(&node.name, state, NodeState::Resolved);

        if let Some(update) = &node.update {
            let scope = NodeScope {
                context,
                node: &node.name,
                id: &id,
            };
            match template::render(update, &scope) {
                Ok(body) => {
                    advance(&node.name, state, NodeState::Updating);
                    self.send(
                        Some(HttpMethod::Put.step_key(metric)),
                        HttpMethod::Put,
                        &url,
                        Some(body),
                    )
                    .await;
                }
                Err(err) => warn!(node = %node.name, "Update skipped: {}", err),
            }
        }

        NodeOutcome::ready(Identifier::Id(id))
    }

    async fn attempt_link(
        &self,
        node: &NodeSpec,
        context: &IterationContext,
        state: &mut NodeState,
    ) -> NodeOutcome {
        let payload = match template::render(&node.create, context) {
            Ok(payload) => payload,
            Err(err) => return render_failure(node, err),
        };
        let url = match self.endpoint(node.collection()) {
            Ok(url) => url,
            Err(err) => return render_failure(node, err),
        };
        let mut keys = Vec::with_capacity(node.keys.len());
        for key in &node.keys {
            match payload.get(key) {
                Some(value) => keys.push((key.clone(), value.clone())),
                None => return render_failure(node, format!("key field '{}' missing", key)),
            }
        }
        let metric = node.metric_name();

        advance(&node.name, state, NodeState::Creating);
        let created = self
            .send(
                Some(HttpMethod::Post.step_key(metric)),
                HttpMethod::Post,
                &url,
                Some(payload),
            )
            .await;

        // A link is its own key: the create status is the resolution
        advance(&node.name, state, NodeState::Resolving);
        if !created.is_success() {
            advance(&node.name, state, NodeState::Unresolved);
            return NodeOutcome::skipped(SkipReason::Unresolved);
        }
        advance(&node.name, state, NodeState::Resolved);

        if let Some(update) = &node.update {
            match template::render(update, context) {
                Ok(body) => {
                    advance(&node.name, state, NodeState::Updating);
                    self.send(
                        Some(HttpMethod::Put.step_key(metric)),
                        HttpMethod::Put,
                        &url,
                        Some(body),
                    )
                    .await;
                }
                Err(err) => warn!(node = %node.name, "Update skipped: {}", err),
            }
        }

        NodeOutcome::ready(Identifier::Keys(keys))
    }

    /// Issue every query whose required nodes are ready
    pub async fn enrich(&self, context: &IterationContext) -> Vec<String> {
        let eligible: Vec<&QuerySpec> = self
            .plan
            .spec()
            .queries
            .iter()
            .filter(|q| context.unavailable_parent(&q.requires).is_none())
            .collect();

        let issued = join_all(eligible.into_iter().map(|query| async move {
            let url = template::render_str(&query.path, context as &dyn Scope)
                .map_err(|e| e.to_string())
                .and_then(|path| self.endpoint(&path).map_err(|e| e.to_string()));
            match url {
                Ok(url) => {
                    self.send(Some(query.step_key()), HttpMethod::Get, &url, None)
                        .await;
                    Some(query.name.clone())
                }
                Err(err) => {
                    warn!(query = %query.name, "Query skipped: {}", err);
                    None
                }
            }
        }))
        .await;

        issued.into_iter().flatten().collect()
    }

    /// Delete every node that still holds an identifier, children first
    ///
    /// Each delete is attempted once whatever happened to the previous ones.
    /// The identifier is consumed by the attempt, so a second cleanup of the
    /// same context issues no requests.
    pub async fn cleanup(&self, context: &mut IterationContext) -> Vec<String> {
        let mut deleted = Vec::new();

        for node in self.plan.topological_order().rev() {
            let Some(identifier) = context.take_identifier(&node.name) else {
                continue;
            };
            let mut url = match self.endpoint(node.collection()) {
                Ok(url) => url,
                Err(err) => {
                    warn!(node = %node.name, "Delete skipped: {}", err);
                    continue;
                }
            };
            {
                let mut query = url.query_pairs_mut();
                for (key, value) in identifier.query_pairs() {
                    query.append_pair(&key, &display_value(&value));
                }
            }

            let outcome = self
                .send(
                    Some(HttpMethod::Delete.step_key(node.metric_name())),
                    HttpMethod::Delete,
                    &url,
                    None,
                )
                .await;
            if !outcome.is_success() {
                debug!(node = %node.name, status = ?outcome.status, "Cleanup delete failed");
            }
            deleted.push(node.name.clone());
        }

        deleted
    }
}

fn render_failure(node: &NodeSpec, err: impl std::fmt::Display) -> NodeOutcome {
    warn!(node = %node.name, "Node skipped: {}", err);
    NodeOutcome::skipped(SkipReason::Render(err.to_string()))
}

#[async_trait::async_trait]
impl surge_scheduler::IterationRunner for WorkflowRunner {
    async fn run(&self, iteration: u64) {
        let report = self.run_iteration().await;
        trace!(
            iteration = iteration,
            cleaned = report.cleanup_order.len(),
            "Iteration report"
        );
    }
}
