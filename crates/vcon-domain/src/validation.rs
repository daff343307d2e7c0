//! Ingress validation.
//!
//! Every vCon entering the store passes through these checks. They are
//! structural (required fields present), enumerative (enum values are
//! enforced by the type system at deserialization) and cross-field (index
//! references resolve inside the same container). Nothing is silently
//! coerced: a bad document is rejected with the offending field named.

use serde_json::Value;
use uuid::Uuid;

use crate::constants::TAGS_ATTACHMENT_TYPE;
use crate::entities::{Analysis, Attachment, Dialog, Encoding, Party, Vcon};
use crate::error::{Error, Result};
use crate::tags::parse_tags_body;

/// Validate a whole container before create.
pub fn validate_vcon(vcon: &Vcon) -> Result<()> {
    if vcon.version.trim().is_empty() {
        return Err(Error::validation("vcon", "version string must be non-empty"));
    }
    validate_uuid_v4(&vcon.uuid)?;

    if let (Some(created), Some(updated)) = (vcon.created_at, vcon.updated_at)
        && updated < created
    {
        return Err(Error::validation(
            "updated_at",
            "must not precede created_at",
        ));
    }

    for (i, party) in vcon.parties.iter().enumerate() {
        validate_party(party)
            .map_err(|e| prefix_field(e, &format!("parties[{i}]")))?;
    }
    for (i, dialog) in vcon.dialog.iter().enumerate() {
        validate_dialog(dialog, vcon.parties.len())
            .map_err(|e| prefix_field(e, &format!("dialog[{i}]")))?;
    }
    for (i, analysis) in vcon.analysis.iter().enumerate() {
        validate_analysis(analysis, vcon.dialog.len())
            .map_err(|e| prefix_field(e, &format!("analysis[{i}]")))?;
    }
    for (i, attachment) in vcon.attachments.iter().enumerate() {
        validate_attachment(attachment, vcon.parties.len(), vcon.dialog.len())
            .map_err(|e| prefix_field(e, &format!("attachments[{i}]")))?;
    }
    Ok(())
}

/// Validate one participant.
pub fn validate_party(party: &Party) -> Result<()> {
    if !party.has_identifier() {
        return Err(Error::validation(
            "party",
            "at least one of tel, sip, stir, mailto, name, did, uuid is required",
        ));
    }
    Ok(())
}

/// Validate one dialog segment against the owning container.
pub fn validate_dialog(dialog: &Dialog, party_count: usize) -> Result<()> {
    if let Some(parties) = &dialog.parties {
        for &p in parties {
            check_party_index(p, party_count)?;
        }
    }
    if let Some(originator) = dialog.originator {
        check_party_index(originator, party_count)
            .map_err(|e| prefix_field(e, "originator"))?;
    }
    if let Some(history) = &dialog.party_history {
        for event in history {
            check_party_index(event.party, party_count)
                .map_err(|e| prefix_field(e, "party_history"))?;
        }
    }
    Ok(())
}

/// Validate one analysis against the owning container.
pub fn validate_analysis(analysis: &Analysis, dialog_count: usize) -> Result<()> {
    if analysis.vendor.trim().is_empty() {
        return Err(Error::validation("vendor", "must be non-empty"));
    }
    if let Some(dialogs) = &analysis.dialog {
        for &d in dialogs {
            if d < 0 || d as usize >= dialog_count {
                return Err(Error::validation(
                    "dialog",
                    format!("index {d} does not reference an existing dialog"),
                ));
            }
        }
    }
    Ok(())
}

/// Validate one attachment against the owning container.
pub fn validate_attachment(
    attachment: &Attachment,
    party_count: usize,
    dialog_count: usize,
) -> Result<()> {
    if let Some(p) = attachment.party {
        check_party_index(p, party_count).map_err(|e| prefix_field(e, "party"))?;
    }
    if let Some(d) = attachment.dialog
        && (d < 0 || d as usize >= dialog_count)
    {
        return Err(Error::validation(
            "dialog",
            format!("index {d} does not reference an existing dialog"),
        ));
    }
    if attachment.attachment_type.as_deref() == Some(TAGS_ATTACHMENT_TYPE) {
        if attachment.encoding != Some(Encoding::Json) {
            return Err(Error::validation(
                "encoding",
                "tags attachment must use encoding \"json\"",
            ));
        }
        let body = attachment
            .body
            .as_deref()
            .ok_or_else(|| Error::validation("body", "tags attachment must carry a body"))?;
        parse_tags_body(body)?;
    }
    Ok(())
}

/// Reject the legacy `schema_version` field on raw analysis input.
///
/// The check runs on the JSON value before typed deserialization so the
/// caller gets a precise message instead of serde's generic one.
pub fn check_analysis_value(value: &Value) -> Result<()> {
    if value.get("schema_version").is_some() {
        return Err(Error::validation(
            "schema_version",
            "unknown field; use 'schema'",
        ));
    }
    if value.get("vendor").is_none() {
        return Err(Error::validation("vendor", "required field is missing"));
    }
    if let Some(body) = value.get("body")
        && !body.is_string()
    {
        return Err(Error::validation("body", "must be a string"));
    }
    Ok(())
}

/// Scan a raw vCon document for per-analysis input mistakes before typed
/// deserialization.
pub fn check_vcon_value(value: &Value) -> Result<()> {
    if let Some(Value::Array(analyses)) = value.get("analysis") {
        for analysis in analyses {
            check_analysis_value(analysis)?;
        }
    }
    Ok(())
}

/// Enforce the RFC 4122 v4 shape on an externally-chosen UUID.
pub fn validate_uuid_v4(uuid: &Uuid) -> Result<()> {
    if uuid.get_version_num() != 4 {
        return Err(Error::validation(
            "uuid",
            format!("'{uuid}' is not a version-4 UUID"),
        ));
    }
    Ok(())
}

fn check_party_index(index: i32, party_count: usize) -> Result<()> {
    if index < 0 || index as usize >= party_count {
        return Err(Error::validation(
            "parties",
            format!("index {index} does not reference an existing party"),
        ));
    }
    Ok(())
}

fn prefix_field(error: Error, prefix: &str) -> Error {
    match error {
        Error::Validation { field, reason } => Error::Validation {
            field: if field.is_empty() {
                prefix.to_owned()
            } else {
                format!("{prefix}.{field}")
            },
            reason,
        },
        other => other,
    }
}
