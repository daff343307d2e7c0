//! Embedding eligibility rules.

use vcon_domain::entities::{
    Analysis, Dialog, EmbeddingContentType, Encoding, Vcon, embedding_candidates,
};

fn dialog_with(body: Option<&str>, encoding: Option<Encoding>) -> Dialog {
    let mut d = Dialog::text(body.unwrap_or_default());
    d.body = body.map(str::to_owned);
    d.encoding = encoding;
    d
}

#[test]
fn subject_is_always_a_candidate() {
    let mut vcon = Vcon::new();
    vcon.subject = Some("quarterly review".to_owned());
    let tasks = embedding_candidates(&vcon);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].content_type, EmbeddingContentType::Subject);
    assert_eq!(tasks[0].content_reference, "subject");
}

#[test]
fn blank_subject_is_skipped() {
    let mut vcon = Vcon::new();
    vcon.subject = Some("   ".to_owned());
    assert!(embedding_candidates(&vcon).is_empty());
}

#[test]
fn textual_dialog_bodies_are_candidates() {
    let mut vcon = Vcon::new();
    vcon.dialog.push(dialog_with(Some("hello there"), None));
    vcon.dialog
        .push(dialog_with(Some("plain text"), Some(Encoding::None)));

    let tasks = embedding_candidates(&vcon);
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].content_reference, "dialog_0");
    assert_eq!(tasks[1].content_reference, "dialog_1");
}

#[test]
fn encoded_bodies_are_excluded() {
    let mut vcon = Vcon::new();
    vcon.dialog
        .push(dialog_with(Some("eyJh=="), Some(Encoding::Base64url)));
    vcon.dialog
        .push(dialog_with(Some(r#"{"k":"v"}"#), Some(Encoding::Json)));
    vcon.analysis.push(Analysis {
        analysis_type: "transcript".to_owned(),
        dialog: None,
        vendor: "acme".to_owned(),
        product: None,
        schema: None,
        body: Some(r#"{"words":[]}"#.to_owned()),
        encoding: Some(Encoding::Json),
        url: None,
        content_hash: None,
    });
    assert!(embedding_candidates(&vcon).is_empty());
}

#[test]
fn references_are_index_stable() {
    let mut vcon = Vcon::new();
    vcon.subject = Some("s".to_owned());
    vcon.dialog.push(dialog_with(None, None)); // url-only, skipped
    vcon.dialog.push(dialog_with(Some("spoken words"), None));
    vcon.analysis.push(Analysis {
        analysis_type: "summary".to_owned(),
        dialog: Some(vec![1]),
        vendor: "acme".to_owned(),
        product: None,
        schema: None,
        body: Some("short summary".to_owned()),
        encoding: Some(Encoding::None),
        url: None,
        content_hash: None,
    });

    let refs: Vec<_> = embedding_candidates(&vcon)
        .into_iter()
        .map(|t| t.content_reference)
        .collect();
    assert_eq!(refs, vec!["subject", "dialog_1", "analysis_0"]);
}
