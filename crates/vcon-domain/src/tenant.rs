//! Tenant identifier extraction.
//!
//! Tenant ownership is derived from document content, not supplied by the
//! caller: a reserved attachment (default type `tenant`) carries a JSON body
//! and a configured path (default `id`) points at the identifier inside it.
//! A vCon with no such attachment has no tenant and is visible to everyone.

use serde_json::Value;

use crate::constants::{TENANT_ATTACHMENT_TYPE, TENANT_JSON_PATH};
use crate::entities::Vcon;
use crate::error::{Error, Result};

/// How to locate the tenant identifier inside a vCon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantExtraction {
    /// Attachment type that carries the tenant document.
    pub attachment_type: String,
    /// Dot-separated path into the attachment's JSON body.
    pub json_path: String,
}

impl Default for TenantExtraction {
    fn default() -> Self {
        Self {
            attachment_type: TENANT_ATTACHMENT_TYPE.to_owned(),
            json_path: TENANT_JSON_PATH.to_owned(),
        }
    }
}

/// Extract the tenant id of a vCon, `None` when no tenant attachment exists.
///
/// A present attachment with an unparsable body or a missing path is a
/// validation error rather than a silent `None`: the document claims a
/// tenant but the claim cannot be read.
pub fn extract_tenant_id(vcon: &Vcon, extraction: &TenantExtraction) -> Result<Option<String>> {
    let Some(attachment) = vcon.attachment_of_type(&extraction.attachment_type) else {
        return Ok(None);
    };

    let body = attachment.body.as_deref().ok_or_else(|| {
        Error::validation(
            "attachments",
            format!("'{}' attachment has no body", extraction.attachment_type),
        )
    })?;

    let parsed: Value = serde_json::from_str(body).map_err(|e| {
        Error::validation(
            "attachments",
            format!(
                "'{}' attachment body is not valid JSON: {e}",
                extraction.attachment_type
            ),
        )
    })?;

    let mut cursor = &parsed;
    for segment in extraction.json_path.split('.') {
        cursor = cursor.get(segment).ok_or_else(|| {
            Error::validation(
                "attachments",
                format!(
                    "tenant path '{}' not found in '{}' attachment",
                    extraction.json_path, extraction.attachment_type
                ),
            )
        })?;
    }

    match cursor {
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(Error::validation(
            "attachments",
            format!("tenant id must be a string or number, got {other}"),
        )),
    }
}
