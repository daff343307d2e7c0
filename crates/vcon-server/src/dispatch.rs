//! Error payload mapping and result conversion.
//!
//! Clients see `{"error": {"kind", "message", "retryable"}}` and never raw
//! database text; the sqlx source chain stays in the server logs. Transient
//! storage errors were already retried by the application layer before they
//! get here.

use rmcp::ErrorData;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use serde_json::json;

use vcon_domain::error::Error;

/// The stable client-facing error payload.
pub fn error_payload(error: &Error) -> serde_json::Value {
    json!({
        "error": {
            "kind": error.kind(),
            "message": error.to_string(),
            "retryable": error.is_retryable(),
        }
    })
}

/// Serialize a service result into a tool result.
///
/// Domain failures become tool-level errors (the protocol call itself
/// succeeded); only serialization bugs surface as protocol errors.
pub fn tool_result<T: Serialize>(
    result: vcon_domain::error::Result<T>,
) -> Result<CallToolResult, ErrorData> {
    match result {
        Ok(value) => {
            let json = serde_json::to_string_pretty(&value)
                .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;
            Ok(CallToolResult::success(vec![Content::text(json)]))
        }
        Err(error) => Ok(CallToolResult::error(vec![Content::text(
            error_payload(&error).to_string(),
        )])),
    }
}
