use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use surge_http::testing::{FakeService, Fault};
use surge_http::{HttpMethod, StepExecutor};
use surge_metrics::MetricsRegistry;
use surge_workflow::{
    IterationContext, NodeState, SkipReason, WorkflowPlan, WorkflowRunner, WorkflowSpec,
};

const LINKS: [&str; 6] = [
    "vlastnictvi",
    "bremeno_parcela_parcela",
    "bremeno_parcela_majitel",
    "rizeni_operace",
    "ucast",
    "plomba",
];

const CHAIN: &str = r#"
name: chain
nodes:
  - name: a
    create: { name: "A_${suffix}" }
    match: { field: name, value: "A_${suffix}" }
  - name: b
    parents: [a]
    create: { a_id: "${id.a}", name: "B_${suffix}" }
    match: { field: name, value: "B_${suffix}" }
  - name: c
    parents: [b]
    create: { b_id: "${id.b}", name: "C_${suffix}" }
    match: { field: name, value: "C_${suffix}" }
"#;

fn runner(spec: WorkflowSpec, service: Arc<FakeService>) -> (WorkflowRunner, Arc<MetricsRegistry>) {
    let metrics = Arc::new(MetricsRegistry::new());
    let executor = StepExecutor::new(service, metrics.clone());
    let plan = Arc::new(WorkflowPlan::new(spec).unwrap());
    (WorkflowRunner::new(plan, executor, "http://svc").unwrap(), metrics)
}

fn katastr_service() -> FakeService {
    LINKS
        .iter()
        .fold(FakeService::new(), |service, link| service.keyless(link))
}

fn context() -> IterationContext {
    IterationContext::new("1700000000000_7", BTreeMap::new())
}

#[tokio::test]
async fn test_failed_parent_cascades_and_cleanup_deletes_only_ready() {
    let service = Arc::new(FakeService::with_first_id(10).fail(
        HttpMethod::Post,
        "b",
        Fault::Status(500),
    ));
    let (runner, metrics) = runner(WorkflowSpec::from_yaml_str(CHAIN).unwrap(), service.clone());

    let report = runner.run_with_context(&mut context()).await;

    assert_eq!(report.state("a"), Some(&NodeState::Ready));
    assert_eq!(
        report.state("b"),
        Some(&NodeState::Skipped(SkipReason::Unresolved))
    );
    assert_eq!(
        report.state("c"),
        Some(&NodeState::Skipped(SkipReason::ParentUnavailable("b".into())))
    );
    assert_eq!(report.cleanup_order, vec!["a"]);

    // B was attempted with A's identifier, C never was
    let post_b = service
        .requests()
        .into_iter()
        .find(|r| r.method == HttpMethod::Post && r.url.ends_with("/b"))
        .unwrap();
    assert_eq!(post_b.body.unwrap()["a_id"], json!(10));
    assert_eq!(service.count(HttpMethod::Post, "c"), 0);

    assert_eq!(service.deletes(), vec!["a"]);
    assert!(service.rows("a").is_empty());
    assert!(service.requests().iter().any(|r| r.url == "http://svc/a?id=10"));

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.steps["post_b"].failures, 1);
    assert_eq!(snapshot.steps["get_b"].successes, 1);
    assert!(snapshot.step("post_c").is_none());
}

#[tokio::test]
async fn test_second_cleanup_deletes_nothing() {
    let service = Arc::new(FakeService::new());
    let (runner, _) = runner(WorkflowSpec::from_yaml_str(CHAIN).unwrap(), service.clone());

    let mut ctx = context();
    runner.create(&mut ctx).await;
    let first = runner.cleanup(&mut ctx).await;
    assert_eq!(first, vec!["c", "b", "a"]);

    let sent = service.requests().len();
    let second = runner.cleanup(&mut ctx).await;
    assert!(second.is_empty());
    assert_eq!(service.requests().len(), sent);
}

#[tokio::test]
async fn test_failed_delete_does_not_block_others() {
    let service = Arc::new(FakeService::new().fail(HttpMethod::Delete, "b", Fault::Status(500)));
    let (runner, metrics) = runner(WorkflowSpec::from_yaml_str(CHAIN).unwrap(), service.clone());

    let report = runner.run_with_context(&mut context()).await;

    assert_eq!(report.cleanup_order, vec!["c", "b", "a"]);
    assert_eq!(service.deletes(), vec!["c", "b", "a"]);
    assert!(service.rows("a").is_empty());
    assert_eq!(service.rows("b").len(), 1);
    assert_eq!(metrics.snapshot().steps["del_b"].failures, 1);
}

#[tokio::test]
async fn test_lookup_timeout_leaves_node_unresolved() {
    let service = Arc::new(FakeService::new().fail(HttpMethod::Get, "a", Fault::Timeout));
    let (runner, metrics) = runner(WorkflowSpec::from_yaml_str(CHAIN).unwrap(), service.clone());

    let report = runner.run_with_context(&mut context()).await;

    assert_eq!(
        report.state("a"),
        Some(&NodeState::Skipped(SkipReason::Unresolved))
    );
    assert!(report.cleanup_order.is_empty());
    // Created but never resolved, so never deleted
    assert_eq!(service.rows("a").len(), 1);
    assert_eq!(metrics.snapshot().steps["get_a"].failures, 1);
}

#[tokio::test]
async fn test_katastr_full_iteration() {
    let service = Arc::new(katastr_service());
    let (runner, metrics) = runner(WorkflowSpec::builtin().unwrap(), service.clone());

    let report = runner.run_iteration().await;

    assert_eq!(report.ready_count(), 20);
    assert_eq!(report.skipped_count(), 0);
    assert_eq!(
        report.queries,
        vec!["lv_detail", "parcela_detail", "rizeni_detail"]
    );

    let expected: Vec<String> = runner
        .plan()
        .topological_order()
        .rev()
        .map(|n| n.name.clone())
        .collect();
    assert_eq!(report.cleanup_order, expected);
    assert_eq!(report.cleanup_order.first().map(String::as_str), Some("plomba"));
    assert_eq!(report.cleanup_order.last().map(String::as_str), Some("kraj"));

    let estimate = runner.plan().estimate_requests();
    assert_eq!(service.requests().len(), estimate.total());

    for node in runner.plan().spec().nodes.iter() {
        assert!(
            service.rows(node.collection()).is_empty(),
            "{} not cleaned up",
            node.collection()
        );
    }

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.requests.count as usize, estimate.total());
    assert_eq!(snapshot.requests.failures, 0);
    assert_eq!(snapshot.steps["post_parcela"].count, 2);
    assert_eq!(snapshot.steps["get_parcela"].count, 1);
    assert_eq!(snapshot.steps["del_parcela"].count, 2);
    assert_eq!(snapshot.steps["put_ku"].count, 1);
    assert_eq!(snapshot.steps["del_ucastnik"].count, 1);
    assert_eq!(snapshot.steps["post_bremeno_pp"].count, 1);
    assert_eq!(snapshot.steps["get_rizeni_detail"].count, 1);
    assert!(snapshot.step("put_ucast").is_none());
}

#[tokio::test]
async fn test_katastr_rendered_payloads() {
    let service = Arc::new(katastr_service());
    let (runner, _) = runner(WorkflowSpec::builtin().unwrap(), service.clone());

    let mut ctx = runner.new_context();
    runner.create(&mut ctx).await;

    let bpej = &service.rows("bpej")[0];
    assert_eq!(bpej.get("hodnota"), ctx.variable("bpej_hodnota_u"));

    let parcels = service.rows("parcela_row");
    assert_eq!(parcels.len(), 2);
    let pc1 = parcels[0]["parcelni_cislo"].as_i64().unwrap();
    assert_eq!(parcels[1]["parcelni_cislo"].as_i64().unwrap(), pc1 + 1);

    let ucast = &service.rows("ucast")[0];
    assert!(ucast["rizeni_id"].is_number());
    assert!(ucast["typ_ucastnika_id"].is_number());

    let kraj = &service.rows("kraj")[0];
    assert_eq!(kraj["nazev"], json!(format!("K6_Kraj_{}_U", ctx.suffix())));

    runner.cleanup(&mut ctx).await;
}

#[tokio::test]
async fn test_katastr_area_failure_gates_entities() {
    let service = Arc::new(katastr_service().fail(
        HttpMethod::Post,
        "katastralni_uzemi",
        Fault::Status(500),
    ));
    let (runner, metrics) = runner(WorkflowSpec::builtin().unwrap(), service.clone());

    let report = runner.run_iteration().await;

    assert_eq!(
        report.state("katastralni_uzemi"),
        Some(&NodeState::Skipped(SkipReason::Unresolved))
    );
    for entity in ["lv", "majitel", "rizeni"] {
        assert_eq!(
            report.state(entity),
            Some(&NodeState::Skipped(SkipReason::ParentUnavailable(
                "katastralni_uzemi".into()
            )))
        );
    }
    assert_eq!(
        report.state("plomba"),
        Some(&NodeState::Skipped(SkipReason::ParentUnavailable("parcela".into())))
    );
    assert_eq!(report.state("bpej"), Some(&NodeState::Ready));
    assert!(report.queries.is_empty());
    assert_eq!(
        report.cleanup_order,
        vec![
            "obec",
            "okres",
            "ucastnik_rizeni",
            "typ_ucastnika",
            "typ_operace",
            "typ_rizeni",
            "bpej",
            "kraj"
        ]
    );
    assert_eq!(metrics.snapshot().steps["post_ku"].failures, 1);
}

#[tokio::test]
async fn test_runs_through_iteration_runner() {
    use surge_scheduler::IterationRunner;

    let service = Arc::new(FakeService::new());
    let (runner, _) = runner(WorkflowSpec::from_yaml_str(CHAIN).unwrap(), service.clone());

    runner.run(1).await;
    runner.run(2).await;

    assert_eq!(service.count(HttpMethod::Post, "a"), 2);
    assert_eq!(service.deletes().len(), 6);
}
