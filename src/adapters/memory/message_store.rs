//! In-memory transcript store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::consultation::{MessageRole, TranscriptMessage};
use crate::domain::foundation::{SessionId, StageId};
use crate::ports::{MessageStore, StoreError};

/// Append-only transcript per session.
///
/// Timestamps within a session never decrease, so append order and
/// timestamp order agree.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageStore {
    transcripts: Arc<RwLock<HashMap<SessionId, Vec<TranscriptMessage>>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn tail<I>(messages: I, limit: usize) -> Vec<TranscriptMessage>
where
    I: DoubleEndedIterator<Item = TranscriptMessage>,
{
    let mut newest_first: Vec<_> = messages.rev().take(limit).collect();
    newest_first.reverse();
    newest_first
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(
        &self,
        session_id: &SessionId,
        role: MessageRole,
        content: &str,
        stage_id: Option<&StageId>,
    ) -> Result<TranscriptMessage, StoreError> {
        let mut transcripts = self.transcripts.write().await;
        let transcript = transcripts.entry(*session_id).or_default();

        let mut message = TranscriptMessage::new(*session_id, role, content, stage_id.cloned());
        if let Some(last) = transcript.last() {
            message.created_at = last.created_at.advanced_to_now();
        }
        transcript.push(message.clone());
        Ok(message)
    }

    async fn recent(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<Vec<TranscriptMessage>, StoreError> {
        let transcripts = self.transcripts.read().await;
        Ok(transcripts
            .get(session_id)
            .map(|t| tail(t.iter().cloned(), limit))
            .unwrap_or_default())
    }

    async fn recent_for_stage(
        &self,
        session_id: &SessionId,
        stage_id: &StageId,
        limit: usize,
    ) -> Result<Vec<TranscriptMessage>, StoreError> {
        let transcripts = self.transcripts.read().await;
        Ok(transcripts
            .get(session_id)
            .map(|t| {
                let in_stage: Vec<_> = t.iter().filter(|m| m.belongs_to(stage_id)).cloned().collect();
                tail(in_stage.into_iter(), limit)
            })
            .unwrap_or_default())
    }

    async fn transcript(&self, session_id: &SessionId) -> Result<Vec<TranscriptMessage>, StoreError> {
        Ok(self
            .transcripts
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(id: &str) -> StageId {
        StageId::new(id).unwrap()
    }

    #[tokio::test]
    async fn recent_returns_newest_messages_oldest_first() {
        let store = InMemoryMessageStore::new();
        let sid = SessionId::new();
        for text in ["one", "two", "three"] {
            store.append(&sid, MessageRole::User, text, None).await.unwrap();
        }

        let recent = store.recent(&sid, 2).await.unwrap();
        let texts: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, vec!["two", "three"]);
        assert!(recent[0].created_at <= recent[1].created_at);
    }

    #[tokio::test]
    async fn stage_filter_keeps_only_tagged_messages() {
        let store = InMemoryMessageStore::new();
        let sid = SessionId::new();
        let a = stage("a");
        let b = stage("b");
        store.append(&sid, MessageRole::User, "a1", Some(&a)).await.unwrap();
        store.append(&sid, MessageRole::Assistant, "a2", Some(&a)).await.unwrap();
        store.append(&sid, MessageRole::User, "b1", Some(&b)).await.unwrap();

        let in_a = store.recent_for_stage(&sid, &a, 10).await.unwrap();
        assert_eq!(in_a.len(), 2);
        assert!(in_a.iter().all(|m| m.belongs_to(&a)));
    }

    #[tokio::test]
    async fn unknown_session_has_empty_transcript() {
        let store = InMemoryMessageStore::new();
        assert!(store.transcript(&SessionId::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = InMemoryMessageStore::new();
        let first = SessionId::new();
        let second = SessionId::new();
        store.append(&first, MessageRole::User, "hi", None).await.unwrap();

        assert_eq!(store.transcript(&first).await.unwrap().len(), 1);
        assert!(store.transcript(&second).await.unwrap().is_empty());
    }
}
