//! Update patches and batch-operation reports.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::entities::{Analysis, Attachment, Dialog, Group, Party};

/// Patch applied by `update`.
///
/// Scalar metadata is replaced when present; children are append-only and
/// receive the next dense index in their array. Replacing an existing child
/// is expressed as delete + re-create of the vCon, never in-place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VconUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_support: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redacted: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appended: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_parties: Vec<Party>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_dialogs: Vec<Dialog>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_analyses: Vec<Analysis>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub new_groups: Vec<Group>,
}

impl VconUpdate {
    /// Whether the patch carries no changes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subject.is_none()
            && self.extensions.is_none()
            && self.must_support.is_none()
            && self.redacted.is_none()
            && self.appended.is_none()
            && self.new_parties.is_empty()
            && self.new_dialogs.is_empty()
            && self.new_analyses.is_empty()
            && self.new_attachments.is_empty()
            && self.new_groups.is_empty()
    }
}

/// Outcome of one item inside a best-effort batch create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemOutcome {
    pub uuid: Uuid,
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Report for `create_batch`: prior successes are kept on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<BatchItemOutcome>,
}
