//! In-memory session store with optimistic versioning.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::consultation::ConsultationSession;
use crate::domain::foundation::{SessionId, UserId};
use crate::ports::{SessionStore, StoreError};

/// Session store backed by a shared map.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, ConsultationSession>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<ConsultationSession>, StoreError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn create(&self, session: &mut ConsultationSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(session.id()) {
            return Err(StoreError::Conflict {
                expected: 0,
                actual: existing.version(),
            });
        }
        session.mark_persisted(1);
        sessions.insert(*session.id(), session.clone());
        Ok(())
    }

    async fn save(&self, session: &mut ConsultationSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let stored = sessions
            .get(session.id())
            .ok_or_else(|| StoreError::NotFound(format!("session {}", session.id())))?;

        if stored.version() != session.version() {
            return Err(StoreError::Conflict {
                expected: session.version(),
                actual: stored.version(),
            });
        }

        session.mark_persisted(session.version() + 1);
        sessions.insert(*session.id(), session.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<ConsultationSession>, StoreError> {
        let sessions = self.sessions.read().await;
        let mut owned: Vec<_> = sessions
            .values()
            .filter(|s| s.user_id() == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.updated_at().cmp(a.updated_at()));
        Ok(owned)
    }
}
