use serde_json::json;
use surge_http::testing::{FakeService, Fault};
use surge_http::{HttpMethod, StepRequest, Transport, TransportError};

#[tokio::test]
async fn test_create_list_delete() {
    let service = FakeService::with_first_id(10);

    let created = service
        .send(
            &StepRequest::new(HttpMethod::Post, "http://svc/kraj").with_body(json!({"nazev": "a"})),
        )
        .await
        .unwrap();
    assert_eq!(created.status, 200);

    let listed = service
        .send(&StepRequest::new(HttpMethod::Get, "http://svc/kraj"))
        .await
        .unwrap();
    let rows: serde_json::Value = serde_json::from_str(&listed.body).unwrap();
    assert_eq!(rows, json!([{"nazev": "a", "id": 10}]));

    let deleted = service
        .send(&StepRequest::new(HttpMethod::Delete, "http://svc/kraj?id=10"))
        .await
        .unwrap();
    assert_eq!(deleted.status, 200);
    assert!(service.rows("kraj").is_empty());
    assert_eq!(service.deletes(), vec!["kraj".to_string()]);
}

#[tokio::test]
async fn test_keyless_rows_deleted_by_composite_key() {
    let service = FakeService::new().keyless("plomba");
    service
        .send(
            &StepRequest::new(HttpMethod::Post, "http://svc/plomba")
                .with_body(json!({"rizeni_id": 3, "parcela_id": 7})),
        )
        .await
        .unwrap();
    assert!(service.rows("plomba")[0].get("id").is_none());

    let deleted = service
        .send(&StepRequest::new(
            HttpMethod::Delete,
            "http://svc/plomba?rizeni_id=3&parcela_id=7",
        ))
        .await
        .unwrap();
    assert_eq!(deleted.status, 200);
}

#[tokio::test]
async fn test_faults() {
    let service = FakeService::new()
        .fail(HttpMethod::Post, "okres", Fault::Status(500))
        .fail(HttpMethod::Get, "obec", Fault::Timeout);

    let failed = service
        .send(&StepRequest::new(HttpMethod::Post, "http://svc/okres").with_body(json!({})))
        .await
        .unwrap();
    assert_eq!(failed.status, 500);
    assert!(service.rows("okres").is_empty());

    let err = service
        .send(&StepRequest::new(HttpMethod::Get, "http://svc/obec"))
        .await
        .unwrap_err();
    assert_eq!(err, TransportError::Timeout);
    assert_eq!(service.count(HttpMethod::Get, "obec"), 1);
}
