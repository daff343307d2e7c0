//! Wire-shape fidelity of the vCon JSON representation.

use serde_json::{Value, json};
use vcon_domain::entities::{Encoding, Vcon};

#[test]
fn minimal_vcon_round_trips() {
    let doc = json!({
        "vcon": "0.3.0",
        "uuid": "11111111-1111-4111-8111-111111111111",
        "created_at": "2025-01-01T00:00:00Z",
        "parties": [{"name": "Alice"}]
    });
    let vcon: Vcon = serde_json::from_value(doc.clone()).unwrap();
    assert_eq!(vcon.version, "0.3.0");
    assert_eq!(vcon.parties.len(), 1);
    assert_eq!(vcon.parties[0].name.as_deref(), Some("Alice"));

    let back = serde_json::to_value(&vcon).unwrap();
    assert_eq!(back, doc);
}

#[test]
fn absent_encoding_stays_absent() {
    let doc = json!({
        "vcon": "0.3.0",
        "uuid": "22222222-2222-4222-8222-222222222222",
        "dialog": [
            {"type": "text", "body": "hi"},
            {"type": "text", "body": "bye", "encoding": "none"}
        ]
    });
    let vcon: Vcon = serde_json::from_value(doc).unwrap();
    assert_eq!(vcon.dialog[0].encoding, None);
    assert_eq!(vcon.dialog[1].encoding, Some(Encoding::None));

    // NULL vs "none" must survive the serialize side too.
    let back = serde_json::to_value(&vcon).unwrap();
    assert_eq!(back["dialog"][0].get("encoding"), None);
    assert_eq!(back["dialog"][1]["encoding"], Value::String("none".into()));
}

#[test]
fn unknown_dialog_type_is_rejected_at_deserialization() {
    let doc = json!({
        "vcon": "0.3.0",
        "uuid": "33333333-3333-4333-8333-333333333333",
        "dialog": [{"type": "video", "body": "x"}]
    });
    assert!(serde_json::from_value::<Vcon>(doc).is_err());
}

#[test]
fn analysis_uses_schema_not_schema_version() {
    let doc = json!({
        "vcon": "0.3.0",
        "uuid": "44444444-4444-4444-8444-444444444444",
        "analysis": [{"type": "sentiment", "vendor": "acme", "schema": "v1", "body": "pos"}]
    });
    let vcon: Vcon = serde_json::from_value(doc).unwrap();
    assert_eq!(vcon.analysis[0].schema.as_deref(), Some("v1"));

    let back = serde_json::to_value(&vcon).unwrap();
    assert!(back["analysis"][0].get("schema").is_some());
    assert!(back["analysis"][0].get("schema_version").is_none());
}

#[test]
fn empty_child_arrays_are_omitted_on_the_wire() {
    let vcon = Vcon::new();
    let value = serde_json::to_value(&vcon).unwrap();
    assert!(value.get("parties").is_none());
    assert!(value.get("dialog").is_none());
    assert!(value.get("analysis").is_none());
    assert!(value.get("attachments").is_none());
}
