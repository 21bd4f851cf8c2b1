//! HTTP DTOs for consultation endpoints.
//!
//! These types decouple the HTTP API from domain types, allowing independent evolution.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::application::TurnOutcome;
use crate::domain::consultation::{ConsultationSession, StageProgress, Template, TranscriptMessage};
use crate::domain::foundation::SessionStatus;
use crate::ports::SourceRef;

// ════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════

/// One chat message from the client.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    pub user_id: String,
}

/// `?user_id=` on session operations.
#[derive(Debug, Clone, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

/// `?user_id=&stage_id=` on the transcript listing.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesQuery {
    pub user_id: String,
    #[serde(default)]
    pub stage_id: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub session_id: String,
    /// Always a list, empty when no reference context was used.
    pub sources: Vec<SourceRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_progress: Option<StageProgress>,
    pub updated_context: Map<String, Value>,
}

impl From<TurnOutcome> for ChatResponse {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            message: outcome.message,
            session_id: outcome.session_id.to_string(),
            sources: outcome.sources,
            template_progress: outcome.progress,
            updated_context: outcome.context,
        }
    }
}

/// One transcript entry.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<String>,
    pub created_at: String,
}

impl From<TranscriptMessage> for MessageResponse {
    fn from(message: TranscriptMessage) -> Self {
        Self {
            id: message.id.to_string(),
            role: message.role.as_str().to_string(),
            content: message.content,
            stage_id: message.stage_id.map(|s| s.to_string()),
            created_at: message.created_at.as_datetime().to_rfc3339(),
        }
    }
}

/// One row of a user's session listing.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummaryResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<String>,
    pub completed_stages: Vec<String>,
    pub progress_percentage: u8,
    pub status: SessionStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&ConsultationSession> for SessionSummaryResponse {
    fn from(session: &ConsultationSession) -> Self {
        Self {
            id: session.id().to_string(),
            template_id: session.template_id().map(|t| t.to_string()),
            current_stage: session.current_stage().map(|s| s.to_string()),
            completed_stages: session
                .completed_stages()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            progress_percentage: session.progress().value(),
            status: session.status(),
            created_at: session.created_at().as_datetime().to_rfc3339(),
            updated_at: session.updated_at().as_datetime().to_rfc3339(),
        }
    }
}

/// A stage as listed in a template summary.
#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub id: String,
    pub name: String,
    pub stage_type: String,
}

/// A template a consultation can be started with.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateSummaryResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub domain: String,
    pub version: String,
    pub stages: Vec<StageSummary>,
}

impl From<&Template> for TemplateSummaryResponse {
    fn from(template: &Template) -> Self {
        Self {
            id: template.id().to_string(),
            name: template.name().to_string(),
            description: template.description().to_string(),
            domain: template.domain().to_string(),
            version: template.version().to_string(),
            stages: template
                .stages()
                .iter()
                .map(|stage| StageSummary {
                    id: stage.id.to_string(),
                    name: stage.name.clone(),
                    stage_type: stage.stage_type.as_str().to_string(),
                })
                .collect(),
        }
    }
}

/// Language model reachability.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub provider: String,
    pub model: String,
}

/// Standard error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl ToString, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn not_found(resource_type: &str, id: &str) -> Self {
        Self::new("NOT_FOUND", format!("{} not found: {}", resource_type, id))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn internal() -> Self {
        Self::new("INTERNAL_ERROR", "An internal error occurred")
    }
}
