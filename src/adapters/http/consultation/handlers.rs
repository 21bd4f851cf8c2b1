//! HTTP handlers for consultation endpoints.
//!
//! Thin translation between JSON and the orchestrator. Authentication is
//! out of scope: the caller names the user, and ownership is checked by the
//! orchestrator.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::application::{ConsultationError, ConsultationOrchestrator, HandleTurnCommand};
use crate::domain::foundation::{SessionId, StageId, TemplateId, UserId};
use crate::ports::LanguageModel;

use super::dto::{
    ChatRequest, ChatResponse, ErrorResponse, HealthResponse, MessageResponse, MessagesQuery,
    SessionSummaryResponse, TemplateSummaryResponse, UserQuery,
};

// ════════════════════════════════════════════════════════════════════════════
// Application state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct ConsultationAppState {
    pub orchestrator: Arc<ConsultationOrchestrator>,
    /// The same model the orchestrator uses, probed by `/health`.
    pub model: Arc<dyn LanguageModel>,
}

impl ConsultationAppState {
    pub fn new(orchestrator: Arc<ConsultationOrchestrator>, model: Arc<dyn LanguageModel>) -> Self {
        Self { orchestrator, model }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// POST /api/consultation/chat - Handle one user message
pub async fn chat(
    State(state): State<ConsultationAppState>,
    Json(req): Json<ChatRequest>,
) -> Response {
    let user_id = match parse_user_id(req.user_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let mut cmd = HandleTurnCommand::new(user_id, req.message);
    if let Some(raw) = req.session_id.filter(|s| !s.trim().is_empty()) {
        match parse_session_id(&raw) {
            Ok(id) => cmd = cmd.in_session(id),
            Err(response) => return response,
        }
    }
    if let Some(raw) = req.template_id.filter(|s| !s.trim().is_empty()) {
        match TemplateId::new(raw) {
            Ok(id) => cmd = cmd.with_template(id),
            Err(_) => return bad_request("Invalid template ID"),
        }
    }

    match state.orchestrator.handle_turn(cmd).await {
        Ok(outcome) => (StatusCode::OK, Json(ChatResponse::from(outcome))).into_response(),
        Err(e) => handle_consultation_error(e),
    }
}

/// POST /api/consultation/sessions/:id/advance - Force the current stage complete
pub async fn advance_stage(
    State(state): State<ConsultationAppState>,
    Path(session_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Response {
    let (session_id, user_id) = match parse_session_and_user(&session_id, query.user_id) {
        Ok(ids) => ids,
        Err(response) => return response,
    };

    match state.orchestrator.force_advance(&session_id, &user_id).await {
        Ok(progress) => (StatusCode::OK, Json(progress)).into_response(),
        Err(e) => handle_consultation_error(e),
    }
}

/// GET /api/consultation/sessions/:id/completion - Evaluate without advancing
pub async fn check_completion(
    State(state): State<ConsultationAppState>,
    Path(session_id): Path<String>,
    Query(query): Query<UserQuery>,
) -> Response {
    let (session_id, user_id) = match parse_session_and_user(&session_id, query.user_id) {
        Ok(ids) => ids,
        Err(response) => return response,
    };

    match state.orchestrator.check_completion(&session_id, &user_id).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => handle_consultation_error(e),
    }
}

/// GET /api/consultation/sessions/:id/messages - Session transcript
pub async fn list_messages(
    State(state): State<ConsultationAppState>,
    Path(session_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Response {
    let (session_id, user_id) = match parse_session_and_user(&session_id, query.user_id) {
        Ok(ids) => ids,
        Err(response) => return response,
    };
    let stage_id = match query.stage_id.map(StageId::new).transpose() {
        Ok(stage) => stage,
        Err(_) => return bad_request("Invalid stage ID"),
    };

    match state
        .orchestrator
        .transcript(&session_id, &user_id, stage_id.as_ref())
        .await
    {
        Ok(messages) => {
            let body: Vec<MessageResponse> = messages.into_iter().map(Into::into).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => handle_consultation_error(e),
    }
}

/// GET /api/consultation/sessions - The caller's sessions
pub async fn list_sessions(
    State(state): State<ConsultationAppState>,
    Query(query): Query<UserQuery>,
) -> Response {
    let user_id = match parse_user_id(query.user_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.orchestrator.sessions_for_user(&user_id).await {
        Ok(sessions) => {
            let body: Vec<SessionSummaryResponse> = sessions.iter().map(Into::into).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => handle_consultation_error(e),
    }
}

/// GET /api/consultation/templates - Templates available for new sessions
pub async fn list_templates(State(state): State<ConsultationAppState>) -> Response {
    match state.orchestrator.templates().await {
        Ok(templates) => {
            let body: Vec<TemplateSummaryResponse> = templates.iter().map(Into::into).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => handle_consultation_error(e),
    }
}

/// GET /health - Language model reachability
pub async fn health(State(state): State<ConsultationAppState>) -> Response {
    let info = state.model.provider_info();
    let (status, label) = match state.model.health_check().await {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(err) => {
            tracing::warn!(provider = %info.name, error = %err, "Language model health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
    };

    let body = HealthResponse {
        status: label.to_string(),
        provider: info.name,
        model: info.model,
    };
    (status, Json(body)).into_response()
}

// ════════════════════════════════════════════════════════════════════════════
// Extraction helpers
// ════════════════════════════════════════════════════════════════════════════

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::bad_request(message))).into_response()
}

fn parse_session_id(raw: &str) -> Result<SessionId, Response> {
    raw.parse::<SessionId>()
        .map_err(|_| bad_request("Invalid session ID"))
}

fn parse_user_id(raw: String) -> Result<UserId, Response> {
    UserId::new(raw).map_err(|_| bad_request("Invalid user ID"))
}

fn parse_session_and_user(
    raw_session: &str,
    raw_user: String,
) -> Result<(SessionId, UserId), Response> {
    Ok((parse_session_id(raw_session)?, parse_user_id(raw_user)?))
}

// ════════════════════════════════════════════════════════════════════════════
// Error handling
// ════════════════════════════════════════════════════════════════════════════

fn handle_consultation_error(error: ConsultationError) -> Response {
    match error {
        ConsultationError::SessionNotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found("Session", &id.to_string())),
        )
            .into_response(),
        ConsultationError::TemplateNotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found("Template", id.as_str())),
        )
            .into_response(),
        ConsultationError::EmptyMessage => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                error.code(),
                "Message content cannot be empty",
            )),
        )
            .into_response(),
        ConsultationError::NotTemplateGuided => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                error.code(),
                "Session is not template-guided",
            )),
        )
            .into_response(),
        ConsultationError::Forbidden => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::forbidden("Permission denied")),
        )
            .into_response(),
        ConsultationError::NoCurrentStage
        | ConsultationError::StageNotFound { .. }
        | ConsultationError::Storage(_)
        | ConsultationError::Internal(_) => {
            tracing::error!(code = %error.code(), error = %error, "Consultation request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::internal()),
            )
                .into_response()
        }
    }
}
