//! Errors surfaced by consultation operations.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, SessionId, TemplateId};
use crate::ports::StoreError;

/// Errors that can occur while handling a consultation request.
///
/// Generation failures never appear here: a failed model call ends the turn
/// with a neutral reply instead.
#[derive(Debug, Clone, Error)]
pub enum ConsultationError {
    /// The caller named a session that does not exist.
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// The session references a template the repository does not have.
    #[error("Template not found: {0}")]
    TemplateNotFound(TemplateId),

    /// The operation needs a template-guided session.
    #[error("Session is not template-guided")]
    NotTemplateGuided,

    /// The session's stage pointer is unset.
    #[error("Session has no current stage")]
    NoCurrentStage,

    /// The stage pointer names a stage missing from the template.
    #[error("Stage '{stage_id}' not found in template '{template_id}'")]
    StageNotFound {
        stage_id: String,
        template_id: String,
    },

    /// Message content is empty or whitespace only.
    #[error("Validation error: message content cannot be empty")]
    EmptyMessage,

    /// The user does not own the session.
    #[error("Forbidden: user does not own this session")]
    Forbidden,

    /// A store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Any other internal inconsistency.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConsultationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ConsultationError::SessionNotFound(_) => ErrorCode::SessionNotFound,
            ConsultationError::TemplateNotFound(_) => ErrorCode::TemplateNotFound,
            ConsultationError::NotTemplateGuided => ErrorCode::NotTemplateGuided,
            ConsultationError::NoCurrentStage => ErrorCode::NoCurrentStage,
            ConsultationError::StageNotFound { .. } => ErrorCode::StageNotFound,
            ConsultationError::EmptyMessage => ErrorCode::EmptyField,
            ConsultationError::Forbidden => ErrorCode::Forbidden,
            ConsultationError::Storage(_) => ErrorCode::StorageError,
            ConsultationError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl From<DomainError> for ConsultationError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::Forbidden => ConsultationError::Forbidden,
            ErrorCode::NotTemplateGuided => ConsultationError::NotTemplateGuided,
            ErrorCode::NoCurrentStage => ConsultationError::NoCurrentStage,
            ErrorCode::StageNotFound => ConsultationError::StageNotFound {
                stage_id: err.details.get("stage_id").cloned().unwrap_or_default(),
                template_id: err.details.get("template_id").cloned().unwrap_or_default(),
            },
            ErrorCode::EmptyField => ConsultationError::EmptyMessage,
            _ => ConsultationError::Internal(err.to_string()),
        }
    }
}

impl From<StoreError> for ConsultationError {
    fn from(err: StoreError) -> Self {
        ConsultationError::Storage(err.to_string())
    }
}
