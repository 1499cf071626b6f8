//! End-to-end lifecycle tests for the object_node resource against an
//! in-memory bosk server.

mod support;

use reqwest::StatusCode;
use serde_json::{json, Value};
use support::FakeBosk;
use terraform_provider_bosk::testing::{
    assert_has_warning, assert_no_errors, assert_plan_changes_attribute, assert_plan_creates,
    assert_plan_replaces, assert_plan_updates_in_place, ProviderTester,
};
use terraform_provider_bosk::{BoskProvider, ProviderError};

const DEFAULTED: &str = "example value when not configured";

async fn configured(bosk: &FakeBosk, extra: Value) -> ProviderTester<BoskProvider> {
    let tester = ProviderTester::new(BoskProvider::new());
    let mut config = json!({"url_prefix": bosk.url_prefix()});
    if let (Some(config), Some(extra)) = (config.as_object_mut(), extra.as_object()) {
        config.extend(extra.clone());
    }
    let warnings = tester.configure(config).await.unwrap();
    assert_no_errors(&warnings);
    tester
}

#[tokio::test]
async fn test_create_update_import_delete() {
    let bosk = FakeBosk::start().await;
    let tester = configured(&bosk, json!({})).await;

    // Create
    let plan = tester
        .plan_create("object_node", json!({"configurable_attribute": "one"}))
        .await
        .unwrap();
    assert_plan_creates(&plan);

    let created = tester
        .lifecycle_create("object_node", json!({"configurable_attribute": "one"}))
        .await
        .unwrap();
    assert!(created.diagnostics.is_empty());
    assert_eq!(
        created.value,
        json!({
            "configurable_attribute": "one",
            "defaulted": DEFAULTED,
            "id": "example-id"
        })
    );
    assert_eq!(
        bosk.node("example-id").await.unwrap(),
        r#"{"configurable_attribute":"one","defaulted":"example value when not configured"}"#
    );

    // Update
    let plan = tester
        .plan_update(
            "object_node",
            created.value.clone(),
            json!({"configurable_attribute": "two"}),
        )
        .await
        .unwrap();
    assert_plan_changes_attribute(&plan, "configurable_attribute");
    assert_plan_updates_in_place(&plan);

    let updated = tester
        .lifecycle_update(
            "object_node",
            created.value.clone(),
            json!({"configurable_attribute": "two"}),
        )
        .await
        .unwrap();
    assert!(updated.diagnostics.is_empty());
    assert_eq!(updated.value["configurable_attribute"], "two");
    assert_eq!(updated.value["defaulted"], DEFAULTED);
    assert_eq!(updated.value["id"], "example-id");

    // Import
    tester
        .import_state_verify(
            "object_node",
            "example-id",
            &updated.value,
            &["configurable_attribute", "defaulted"],
        )
        .await
        .unwrap();

    // Delete
    tester
        .lifecycle_delete("object_node", updated.value.clone())
        .await
        .unwrap();
    assert!(bosk.node("example-id").await.is_none());

    let gone = tester.read("object_node", updated.value).await.unwrap();
    assert!(gone.value.is_null());
    assert!(gone.diagnostics.is_empty());
}

#[tokio::test]
async fn test_crud_with_explicit_id() {
    let bosk = FakeBosk::start().await;
    let tester = configured(&bosk, json!({})).await;

    let outcome = tester
        .lifecycle_crud(
            "object_node",
            json!({"id": "node-7", "defaulted": "set"}),
            json!({"id": "node-7", "defaulted": "set", "configurable_attribute": "x"}),
        )
        .await
        .unwrap();

    assert_eq!(
        outcome.value,
        json!({"configurable_attribute": "x", "defaulted": "set", "id": "node-7"})
    );
    assert!(bosk.node("node-7").await.is_none());
}

#[tokio::test]
async fn test_changing_id_replaces() {
    let bosk = FakeBosk::start().await;
    let tester = configured(&bosk, json!({})).await;

    let created = tester
        .lifecycle_create("object_node", json!({"id": "a"}))
        .await
        .unwrap();
    let plan = tester
        .plan_update("object_node", created.value.clone(), json!({"id": "b"}))
        .await
        .unwrap();
    assert_plan_replaces(&plan);

    let err = tester
        .update("object_node", created.value, plan.planned_state)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Validation(_)));
}

#[tokio::test]
async fn test_import_existing_node() {
    let bosk = FakeBosk::start().await;
    bosk.insert("legacy", r#"{"defaulted": "kept", "configurable_attribute": "old"}"#)
        .await;
    let tester = configured(&bosk, json!({})).await;

    let state = tester
        .import_state_verify(
            "object_node",
            "legacy",
            &json!({"id": "legacy", "configurable_attribute": "old", "defaulted": "kept"}),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(state["id"], "legacy");
}

#[tokio::test]
async fn test_import_missing_node() {
    let bosk = FakeBosk::start().await;
    let tester = configured(&bosk, json!({})).await;

    let err = tester.import_resource("object_node", "absent").await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}

#[tokio::test]
async fn test_read_unexpected_contents_keeps_state() {
    let bosk = FakeBosk::start().await;
    bosk.insert("odd", "42").await;
    let tester = configured(&bosk, json!({})).await;

    let prior = json!({"id": "odd", "configurable_attribute": "one", "defaulted": DEFAULTED});
    let outcome = tester.read("object_node", prior.clone()).await.unwrap();

    assert_eq!(outcome.value, prior);
    assert_has_warning(&outcome.diagnostics, "Unexpected object node contents");
}

#[tokio::test]
async fn test_read_non_json_contents_warns_twice() {
    let bosk = FakeBosk::start().await;
    bosk.insert("text", "plain text").await;
    let tester = configured(&bosk, json!({})).await;

    let outcome = tester
        .read("object_node", json!({"id": "text"}))
        .await
        .unwrap();

    assert_has_warning(&outcome.diagnostics, "Error normalizing JSON response");
    assert_has_warning(&outcome.diagnostics, "Unexpected object node contents");
    assert_no_errors(&outcome.diagnostics);
}

#[tokio::test]
async fn test_basic_auth() {
    // base64("user:pass")
    let bosk = FakeBosk::start_with_auth("Basic dXNlcjpwYXNz").await;

    let tester = configured(&bosk, json!({"username": "user", "password": "pass"})).await;
    let created = tester
        .lifecycle_create("object_node", json!({"configurable_attribute": "secret"}))
        .await
        .unwrap();
    assert_eq!(created.value["configurable_attribute"], "secret");

    let anonymous = configured(&bosk, json!({})).await;
    let err = anonymous
        .read("object_node", created.value)
        .await
        .unwrap_err();
    match err {
        ProviderError::Client(err) => {
            assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
            assert_eq!(err.to_diagnostic().summary, "Client Error");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_unconfigured_provider() {
    let tester = ProviderTester::new(BoskProvider::new());
    let err = tester
        .create("object_node", json!({"configurable_attribute": "one"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Configuration(_)));
}
