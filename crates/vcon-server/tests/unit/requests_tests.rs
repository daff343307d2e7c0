//! Tool argument deserialization and ingress checks.

use serde_json::json;
use vcon_domain::error::Error;
use vcon_domain::validation::{check_analysis_value, check_vcon_value};
use vcon_server::requests::{
    HybridSearchRequest, ManageTagRequest, SearchVconsRequest, SemanticSearchRequest, TagAction,
};

#[test]
fn search_request_flattens_filters() {
    let req: SearchVconsRequest = serde_json::from_value(json!({
        "query": "billing",
        "start_date": "2025-01-01T00:00:00Z",
        "tags": {"department": "sales"},
        "limit": 10,
        "response_format": "ids_only"
    }))
    .unwrap();
    assert_eq!(req.query.as_deref(), Some("billing"));
    let filters = req.filters.into_filters();
    assert!(filters.start_date.is_some());
    assert_eq!(filters.effective_limit(), 10);
    assert_eq!(
        filters.tags.unwrap().get("department").map(String::as_str),
        Some("sales")
    );
}

#[test]
fn search_request_defaults_to_metadata_format() {
    let req: SearchVconsRequest = serde_json::from_value(json!({})).unwrap();
    assert_eq!(
        req.response_format,
        vcon_domain::value_objects::ResponseFormat::Metadata
    );
    assert_eq!(req.filters.into_filters().effective_limit(), 50);
}

#[test]
fn limit_is_capped() {
    let req: SearchVconsRequest = serde_json::from_value(json!({"limit": 100000})).unwrap();
    assert_eq!(req.filters.into_filters().effective_limit(), 500);
}

#[test]
fn semantic_request_accepts_text_or_vector() {
    let by_text: SemanticSearchRequest =
        serde_json::from_value(json!({"query": "refund complaints"})).unwrap();
    assert!(by_text.query_vector.is_none());

    let by_vector: SemanticSearchRequest =
        serde_json::from_value(json!({"query_vector": [0.0, 0.25, 0.5, 0.75]})).unwrap();
    assert_eq!(by_vector.query_vector.unwrap().len(), 4);
}

#[test]
fn hybrid_request_parses_weight() {
    let req: HybridSearchRequest =
        serde_json::from_value(json!({"query": "invoice", "semantic_weight": 0.25})).unwrap();
    assert_eq!(req.semantic_weight, Some(0.25));
}

#[test]
fn manage_tag_actions_parse() {
    let req: ManageTagRequest = serde_json::from_value(json!({
        "uuid": "11111111-1111-4111-8111-111111111111",
        "action": "set",
        "key": "department",
        "value": "sales"
    }))
    .unwrap();
    assert_eq!(req.action, TagAction::Set);
    assert_eq!(req.value, Some(json!("sales")));

    assert!(
        serde_json::from_value::<ManageTagRequest>(json!({
            "uuid": "11111111-1111-4111-8111-111111111111",
            "action": "rename",
            "key": "x"
        }))
        .is_err()
    );
}

#[test]
fn analysis_ingress_rejects_schema_version_before_deserialization() {
    let err = check_analysis_value(&json!({
        "type": "t", "vendor": "V", "schema_version": "1", "body": "x"
    }))
    .unwrap_err();
    match err {
        Error::Validation { field, reason } => {
            assert_eq!(field, "schema_version");
            assert_eq!(reason, "unknown field; use 'schema'");
        }
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn vcon_ingress_scans_nested_analyses() {
    let err = check_vcon_value(&json!({
        "vcon": "0.3.0",
        "uuid": "11111111-1111-4111-8111-111111111111",
        "analysis": [{"type": "sentiment", "schema": "v1", "body": "{}", "encoding": "json"}]
    }))
    .unwrap_err();
    match err {
        Error::Validation { field, .. } => assert_eq!(field, "vendor"),
        other => panic!("expected validation error, got {other}"),
    }
}
