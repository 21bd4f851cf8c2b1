//! Message store port.
//!
//! Append-only transcript per session. Messages come back in the order
//! they were appended.

use async_trait::async_trait;

use super::StoreError;
use crate::domain::consultation::{MessageRole, TranscriptMessage};
use crate::domain::foundation::{SessionId, StageId};

/// Persistence port for transcript messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appends a message and returns the stored record.
    async fn append(
        &self,
        session_id: &SessionId,
        role: MessageRole,
        content: &str,
        stage_id: Option<&StageId>,
    ) -> Result<TranscriptMessage, StoreError>;

    /// The last `limit` messages of the session, oldest first.
    async fn recent(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<TranscriptMessage>, StoreError>;

    /// The last `limit` messages tagged with `stage_id`, oldest first.
    async fn recent_for_stage(
        &self,
        session_id: &SessionId,
        stage_id: &StageId,
        limit: usize,
    ) -> Result<Vec<TranscriptMessage>, StoreError>;

    /// The full transcript, oldest first.
    async fn transcript(&self, session_id: &SessionId) -> Result<Vec<TranscriptMessage>, StoreError>;
}
