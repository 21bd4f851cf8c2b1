//! Session store port.
//!
//! Durable mapping from session id to session state. Writes are guarded by
//! an optimistic version so two turns racing on one session cannot both
//! commit a stage advancement.

use async_trait::async_trait;

use crate::domain::consultation::ConsultationSession;
use crate::domain::foundation::{SessionId, UserId};

/// Persistence port for consultation sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Find a session by its ID.
    ///
    /// Returns `None` if not found.
    async fn get(&self, id: &SessionId) -> Result<Option<ConsultationSession>, StoreError>;

    /// Persist a brand new session.
    ///
    /// On success the session's version is set to the stored version.
    ///
    /// # Errors
    ///
    /// - `Conflict` if a session with the same id already exists
    async fn create(&self, session: &mut ConsultationSession) -> Result<(), StoreError>;

    /// Persist changes to an existing session.
    ///
    /// The write succeeds only if the stored version equals
    /// `session.version()`; on success the version is incremented both in
    /// the store and on `session`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the session was never created
    /// - `Conflict` if another writer saved first
    async fn save(&self, session: &mut ConsultationSession) -> Result<(), StoreError>;

    /// All sessions owned by a user, most recently updated first.
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<ConsultationSession>, StoreError>;
}

/// Storage failures shared by the session and message stores.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("version conflict: expected {expected}, found {actual}")]
    Conflict { expected: u64, actual: u64 },

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn SessionStore) {}
    }

    #[test]
    fn conflict_reports_both_versions() {
        let err = StoreError::Conflict { expected: 2, actual: 3 };
        assert_eq!(err.to_string(), "version conflict: expected 2, found 3");
    }
}
