//! Ingress validation behavior.

use rstest::rstest;
use serde_json::json;
use uuid::Uuid;
use vcon_domain::entities::{Analysis, Attachment, Dialog, DialogType, Encoding, Party, Vcon};
use vcon_domain::error::Error;
use vcon_domain::validation::{
    check_analysis_value, check_vcon_value, validate_analysis, validate_attachment,
    validate_dialog, validate_uuid_v4, validate_vcon,
};

fn named_party(name: &str) -> Party {
    Party {
        name: Some(name.to_owned()),
        ..Party::default()
    }
}

fn analysis(vendor: &str) -> Analysis {
    Analysis {
        analysis_type: "summary".to_owned(),
        dialog: None,
        vendor: vendor.to_owned(),
        product: None,
        schema: None,
        body: Some("fine".to_owned()),
        encoding: None,
        url: None,
        content_hash: None,
    }
}

#[test]
fn accepts_minimal_vcon() {
    let mut vcon = Vcon::new();
    vcon.subject = Some("support call".to_owned());
    vcon.parties.push(named_party("Alice"));
    assert!(validate_vcon(&vcon).is_ok());
}

#[test]
fn rejects_empty_vendor() {
    let err = validate_analysis(&analysis("  "), 0).unwrap_err();
    match err {
        Error::Validation { field, .. } => assert_eq!(field, "vendor"),
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn rejects_schema_version_with_pointed_reason() {
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
fn rejects_missing_vendor_on_raw_input() {
    let err = check_analysis_value(&json!({
        "type": "sentiment", "schema": "v1", "body": "{\"s\":\"pos\"}", "encoding": "json"
    }))
    .unwrap_err();
    match err {
        Error::Validation { field, .. } => assert_eq!(field, "vendor"),
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn rejects_non_string_analysis_body() {
    let err = check_analysis_value(&json!({
        "type": "t", "vendor": "V", "body": {"not": "a string"}
    }))
    .unwrap_err();
    match err {
        Error::Validation { field, .. } => assert_eq!(field, "body"),
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn scans_analyses_inside_a_raw_vcon() {
    let doc = json!({
        "vcon": "0.3.0",
        "uuid": "11111111-1111-4111-8111-111111111111",
        "analysis": [
            {"type": "t", "vendor": "V", "body": "ok"},
            {"type": "t", "vendor": "V", "schema_version": "1", "body": "bad"}
        ]
    });
    assert!(check_vcon_value(&doc).is_err());
}

#[test]
fn dialog_party_references_must_resolve() {
    let mut dialog = Dialog::text("hello");
    dialog.parties = Some(vec![0, 2]);
    let err = validate_dialog(&dialog, 2).unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    dialog.parties = Some(vec![0, 1]);
    assert!(validate_dialog(&dialog, 2).is_ok());
}

#[test]
fn analysis_dialog_references_must_resolve() {
    let mut a = analysis("acme");
    a.dialog = Some(vec![1]);
    assert!(validate_analysis(&a, 1).is_err());
    assert!(validate_analysis(&a, 2).is_ok());
}

#[test]
fn tags_attachment_must_be_json_encoded() {
    let attachment = Attachment {
        attachment_type: Some("tags".to_owned()),
        encoding: Some(Encoding::None),
        body: Some(r#"["a:b"]"#.to_owned()),
        ..Attachment::default()
    };
    assert!(validate_attachment(&attachment, 0, 0).is_err());
}

#[test]
fn tags_attachment_body_is_parsed() {
    let attachment = Attachment {
        attachment_type: Some("tags".to_owned()),
        encoding: Some(Encoding::Json),
        body: Some(r#"["a:1","a:2"]"#.to_owned()),
        ..Attachment::default()
    };
    assert!(validate_attachment(&attachment, 0, 0).is_err());
}

#[test]
fn uuid_must_be_version_four() {
    assert!(validate_uuid_v4(&Uuid::new_v4()).is_ok());
    // Nil UUID is version 0.
    assert!(validate_uuid_v4(&Uuid::nil()).is_err());
}

#[test]
fn party_without_identifier_is_rejected() {
    let mut vcon = Vcon::new();
    vcon.parties.push(Party::default());
    let err = validate_vcon(&vcon).unwrap_err();
    match err {
        Error::Validation { field, .. } => assert!(field.starts_with("parties[0]")),
        other => panic!("expected validation error, got {other}"),
    }
}

#[rstest]
#[case("recording", DialogType::Recording)]
#[case("text", DialogType::Text)]
#[case("transfer", DialogType::Transfer)]
#[case("incomplete", DialogType::Incomplete)]
fn dialog_type_parses_all_four_values(#[case] input: &str, #[case] expected: DialogType) {
    assert_eq!(input.parse::<DialogType>().unwrap(), expected);
}

#[test]
fn unknown_dialog_type_fails_to_parse() {
    assert!("video".parse::<DialogType>().is_err());
}
