//! Per-request context threaded through services and plugin hooks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller metadata carried alongside every operation.
///
/// Plugins receive this in each hook; the dispatcher stamps `timestamp` when
/// the request enters the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Deadline after which the operation should be abandoned.
    #[serde(skip)]
    pub deadline: Option<DateTime<Utc>>,
}

impl RequestContext {
    /// Context stamped with the current time and no caller metadata.
    #[must_use]
    pub fn now() -> Self {
        Self {
            user_id: None,
            purpose: None,
            ip_address: None,
            timestamp: Utc::now(),
            metadata: None,
            deadline: None,
        }
    }

    /// Attach a caller identity.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Attach a purpose string (audit trail).
    #[must_use]
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::now()
    }
}
