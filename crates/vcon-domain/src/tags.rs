//! Tag attachment parsing and serialization.
//!
//! Tags live inside the vCon itself as a reserved attachment with
//! `type = "tags"`, `encoding = "json"` and a body that is exactly a JSON
//! array of `"key:value"` strings with unique keys. The attachment is the
//! source of truth; the materialized view over it exists only for query
//! speed.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::constants::TAGS_ATTACHMENT_TYPE;
use crate::entities::{Attachment, Encoding, Vcon};
use crate::error::{Error, Result};

/// Parse a tags attachment body into a unique-key map.
///
/// Accepts `"k:v"` strings whose values may themselves contain colons
/// (only the first colon splits). Numeric and boolean array entries are
/// rejected; values arrive stringified by the writer.
pub fn parse_tags_body(body: &str) -> Result<BTreeMap<String, String>> {
    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| Error::validation("tags", format!("body is not valid JSON: {e}")))?;

    let Value::Array(entries) = parsed else {
        return Err(Error::validation("tags", "body must be a JSON array"));
    };

    let mut tags = BTreeMap::new();
    for entry in &entries {
        let Value::String(pair) = entry else {
            return Err(Error::validation(
                "tags",
                format!("array entries must be \"key:value\" strings, got {entry}"),
            ));
        };
        let Some((key, value)) = pair.split_once(':') else {
            return Err(Error::validation(
                "tags",
                format!("entry '{pair}' is missing the ':' separator"),
            ));
        };
        if key.is_empty() {
            return Err(Error::validation("tags", "tag keys must be non-empty"));
        }
        if tags.insert(key.to_owned(), value.to_owned()).is_some() {
            return Err(Error::validation(
                "tags",
                format!("duplicate tag key '{key}'"),
            ));
        }
    }
    Ok(tags)
}

/// Serialize a tag map back into the canonical attachment body.
#[must_use]
pub fn serialize_tags(tags: &BTreeMap<String, String>) -> String {
    let entries: Vec<String> = tags.iter().map(|(k, v)| format!("{k}:{v}")).collect();
    // A flat Vec<String> cannot fail to serialize.
    serde_json::to_string(&entries).unwrap_or_else(|_| "[]".to_owned())
}

/// Stringify a caller-supplied tag value (numbers and booleans are allowed
/// on write, readers always get strings).
pub fn stringify_tag_value(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(Error::validation(
            "value",
            format!("tag values must be strings, numbers or booleans, got {other}"),
        )),
    }
}

/// Build the reserved attachment carrying the given tag set.
#[must_use]
pub fn tags_attachment(tags: &BTreeMap<String, String>) -> Attachment {
    Attachment {
        attachment_type: Some(TAGS_ATTACHMENT_TYPE.to_owned()),
        encoding: Some(Encoding::Json),
        body: Some(serialize_tags(tags)),
        mimetype: Some("application/json".to_owned()),
        ..Attachment::default()
    }
}

/// Read the tag map of a vCon, empty when no tags attachment exists.
pub fn tags_of(vcon: &Vcon) -> Result<BTreeMap<String, String>> {
    match vcon.attachment_of_type(TAGS_ATTACHMENT_TYPE) {
        Some(attachment) => {
            let body = attachment.body.as_deref().unwrap_or("[]");
            parse_tags_body(body)
        }
        None => Ok(BTreeMap::new()),
    }
}
