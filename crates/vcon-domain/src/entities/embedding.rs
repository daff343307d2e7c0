//! Embedding records and the asynchronous generation queue.
//!
//! Embeddings are produced out of the write path: every eligible content
//! item of a written vCon becomes a queue task, and a worker drains the
//! queue. Only plain-text content is eligible: the subject string, and
//! dialog/analysis bodies whose encoding is absent or `none`. base64url and
//! JSON bodies are excluded from semantic indexing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::vcon::{Encoding, Vcon};

/// Kind of content a vector was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingContentType {
    Subject,
    Dialog,
    Analysis,
}

impl EmbeddingContentType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Dialog => "dialog",
            Self::Analysis => "analysis",
        }
    }
}

impl std::str::FromStr for EmbeddingContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "subject" => Ok(Self::Subject),
            "dialog" => Ok(Self::Dialog),
            "analysis" => Ok(Self::Analysis),
            _ => Err(format!("Unknown embedding content type: {s}")),
        }
    }
}

/// Lifecycle status of a queue task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown task status: {s}")),
        }
    }
}

/// A stored content vector, unique per (vcon, content type, reference).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub vcon_uuid: Uuid,
    pub content_type: EmbeddingContentType,
    /// Which item the vector covers, e.g. "subject" or "dialog_3".
    pub content_reference: String,
    pub content_text: String,
    pub vector: Vec<f32>,
    pub model: String,
    pub dimension: usize,
}

/// Work item for the embedding queue before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEmbeddingTask {
    pub vcon_uuid: Uuid,
    pub content_type: EmbeddingContentType,
    pub content_reference: String,
    pub content_text: String,
}

/// A claimed or persisted queue task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingTask {
    pub id: i64,
    pub vcon_uuid: Uuid,
    pub content_type: EmbeddingContentType,
    pub content_reference: String,
    pub content_text: String,
    pub status: TaskStatus,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Whether a body with this encoding is eligible for semantic indexing.
#[must_use]
pub fn encoding_is_textual(encoding: Option<Encoding>) -> bool {
    matches!(encoding, None | Some(Encoding::None))
}

/// Enumerate the embedding tasks a vCon's current content calls for.
///
/// One task per eligible item: the subject, each dialog with a textual
/// body, each analysis with a textual body. References are stable
/// (`subject`, `dialog_{i}`, `analysis_{i}`) so re-enqueueing the same
/// content upserts rather than duplicates.
#[must_use]
pub fn embedding_candidates(vcon: &Vcon) -> Vec<NewEmbeddingTask> {
    let mut tasks = Vec::new();

    if let Some(subject) = vcon.subject.as_deref()
        && !subject.trim().is_empty()
    {
        tasks.push(NewEmbeddingTask {
            vcon_uuid: vcon.uuid,
            content_type: EmbeddingContentType::Subject,
            content_reference: "subject".to_owned(),
            content_text: subject.to_owned(),
        });
    }

    for (i, dialog) in vcon.dialog.iter().enumerate() {
        if let Some(body) = dialog.body.as_deref()
            && encoding_is_textual(dialog.encoding)
            && !body.trim().is_empty()
        {
            tasks.push(NewEmbeddingTask {
                vcon_uuid: vcon.uuid,
                content_type: EmbeddingContentType::Dialog,
                content_reference: format!("dialog_{i}"),
                content_text: body.to_owned(),
            });
        }
    }

    for (i, analysis) in vcon.analysis.iter().enumerate() {
        if let Some(body) = analysis.body.as_deref()
            && encoding_is_textual(analysis.encoding)
            && !body.trim().is_empty()
        {
            tasks.push(NewEmbeddingTask {
                vcon_uuid: vcon.uuid,
                content_type: EmbeddingContentType::Analysis,
                content_reference: format!("analysis_{i}"),
                content_text: body.to_owned(),
            });
        }
    }

    tasks
}
