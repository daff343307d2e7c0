//! Core vCon entities.

/// Embedding records and queue tasks
pub mod embedding;
/// The vCon container and its child entities
pub mod vcon;

pub use embedding::{
    EmbeddingContentType, EmbeddingRecord, EmbeddingTask, NewEmbeddingTask, TaskStatus,
    embedding_candidates, encoding_is_textual,
};
pub use vcon::{
    Analysis, Attachment, Dialog, DialogType, Disposition, Encoding, Group, Party, PartyEvent,
    PartyHistory, Vcon,
};
