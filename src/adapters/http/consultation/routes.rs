//! Route configuration for consultation endpoints.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    advance_stage, chat, check_completion, health, list_messages, list_sessions, list_templates,
    ConsultationAppState,
};

/// Creates the consultation router with all endpoints.
///
/// Routes:
/// - `POST /api/consultation/chat` - Handle one user message
/// - `POST /api/consultation/sessions/:id/advance?user_id=` - Force stage advancement
/// - `GET /api/consultation/sessions/:id/completion?user_id=` - Evaluate the current stage
/// - `GET /api/consultation/sessions?user_id=` - The user's sessions
/// - `GET /api/consultation/sessions/:id/messages?user_id=&stage_id=` - Session transcript
/// - `GET /api/consultation/templates` - Available templates
/// - `GET /health` - Language model health
pub fn consultation_router() -> Router<ConsultationAppState> {
    Router::new()
        .route("/api/consultation/chat", post(chat))
        .route("/api/consultation/templates", get(list_templates))
        .route("/api/consultation/sessions", get(list_sessions))
        .route("/api/consultation/sessions/:id/advance", post(advance_stage))
        .route(
            "/api/consultation/sessions/:id/completion",
            get(check_completion),
        )
        .route("/api/consultation/sessions/:id/messages", get(list_messages))
        .route("/health", get(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockLanguageModel;
    use crate::adapters::memory::{
        InMemoryMessageStore, InMemorySessionStore, InMemoryTemplateRepository,
    };
    use crate::application::ConsultationOrchestrator;
    use crate::config::ConsultationConfig;
    use crate::domain::consultation::{ExpectedOutput, Stage, Template};
    use crate::domain::foundation::{StageId, TemplateId};
    use crate::ports::LanguageModel;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    // ───────────────────────────────────────────────────────────────
    // Fixtures
    // ───────────────────────────────────────────────────────────────

    fn template() -> Template {
        let stages = vec![
            Stage::new(StageId::new("scope").unwrap(), "Scope", "What service is covered?")
                .with_expected_output(ExpectedOutput::new("service", "Service in scope")),
            Stage::new(StageId::new("targets").unwrap(), "Targets", "What uptime do you need?")
                .with_expected_output(ExpectedOutput::new("uptime", "Uptime target")),
        ];
        Template::new(
            TemplateId::new("sla").unwrap(),
            "SLA Discovery",
            "sla",
            "You are an SLA consultant.",
            stages,
        )
        .unwrap()
    }

    fn app(model: MockLanguageModel) -> Router {
        let model: Arc<dyn LanguageModel> = Arc::new(model);
        let orchestrator = ConsultationOrchestrator::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(InMemoryMessageStore::new()),
            Arc::new(InMemoryTemplateRepository::with_templates([template()])),
            Arc::clone(&model),
            ConsultationConfig::default(),
        );
        consultation_router().with_state(ConsultationAppState::new(Arc::new(orchestrator), model))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // ───────────────────────────────────────────────────────────────
    // Tests
    // ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn chat_starts_a_guided_session() {
        let app = app(
            MockLanguageModel::new()
                .with_response("Which service should the SLA cover?")
                .with_response("NO - nothing yet"),
        );

        let response = app
            .oneshot(post_json(
                "/api/consultation/chat",
                json!({"message": "Hi", "template_id": "sla", "user_id": "u-1"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Which service should the SLA cover?");
        assert_eq!(body["sources"], json!([]));
        assert_eq!(body["template_progress"]["current_stage"], "scope");
        assert_eq!(body["template_progress"]["stage_completed"], false);
    }

    #[tokio::test]
    async fn blank_message_is_a_bad_request() {
        let response = app(MockLanguageModel::new())
            .oneshot(post_json(
                "/api/consultation/chat",
                json!({"message": "  ", "user_id": "u-1"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let uri = format!(
            "/api/consultation/sessions/{}/advance?user_id=u-1",
            crate::domain::foundation::SessionId::new()
        );
        let response = app(MockLanguageModel::new())
            .oneshot(post_json(&uri, json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn advance_then_list_messages() {
        let app = app(MockLanguageModel::new().with_default_response("NO"));

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/consultation/chat",
                json!({"message": "Hi", "template_id": "sla", "user_id": "u-1"}),
            ))
            .await
            .unwrap();
        let session_id = json_body(response).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/consultation/sessions/{}/advance?user_id=u-1", session_id),
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let progress = json_body(response).await;
        assert_eq!(progress["stage_completed"], true);
        assert_eq!(progress["progress_percentage"], 50);
        assert_eq!(progress["next_stage"]["id"], "targets");

        let response = app
            .oneshot(get_request(&format!(
                "/api/consultation/sessions/{}/messages?user_id=u-1&stage_id=scope",
                session_id
            )))
            .await
            .unwrap();
        let messages = json_body(response).await;
        assert_eq!(messages.as_array().unwrap().len(), 2);
        assert_eq!(messages[0]["role"], "user");
    }

    #[tokio::test]
    async fn completion_check_rejects_other_users() {
        let app = app(MockLanguageModel::new().with_default_response("NO"));
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/consultation/chat",
                json!({"message": "Hi", "template_id": "sla", "user_id": "owner"}),
            ))
            .await
            .unwrap();
        let session_id = json_body(response).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .oneshot(get_request(&format!(
                "/api/consultation/sessions/{}/completion?user_id=intruder",
                session_id
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn transcript_is_forbidden_to_other_users() {
        let app = app(
            MockLanguageModel::new()
                .with_response("reply")
                .with_default_response("NO"),
        );
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/consultation/chat",
                json!({"message": "my secret SLA", "template_id": "sla", "user_id": "owner"}),
            ))
            .await
            .unwrap();
        let session_id = json_body(response).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(get_request(&format!(
                "/api/consultation/sessions/{}/messages?user_id=intruder",
                session_id
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json_body(response).await;
        assert!(!body.to_string().contains("my secret SLA"));

        let response = app
            .oneshot(get_request(&format!(
                "/api/consultation/sessions/{}/messages",
                session_id
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stale_session_id_starts_a_new_session() {
        let stale = crate::domain::foundation::SessionId::new().to_string();
        let response = app(MockLanguageModel::new().with_default_response("NO"))
            .oneshot(post_json(
                "/api/consultation/chat",
                json!({"message": "Hi", "session_id": stale, "template_id": "sla", "user_id": "u-1"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_ne!(body["session_id"], stale.as_str());
        assert_eq!(body["template_progress"]["current_stage"], "scope");
    }

    #[tokio::test]
    async fn lists_templates_and_own_sessions() {
        let app = app(MockLanguageModel::new().with_default_response("NO"));
        app.clone()
            .oneshot(post_json(
                "/api/consultation/chat",
                json!({"message": "Hi", "template_id": "sla", "user_id": "u-1"}),
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(get_request("/api/consultation/templates"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let templates = json_body(response).await;
        assert_eq!(templates[0]["id"], "sla");
        assert_eq!(templates[0]["stages"][1]["id"], "targets");

        let response = app
            .clone()
            .oneshot(get_request("/api/consultation/sessions?user_id=u-1"))
            .await
            .unwrap();
        let sessions = json_body(response).await;
        assert_eq!(sessions.as_array().unwrap().len(), 1);
        assert_eq!(sessions[0]["template_id"], "sla");
        assert_eq!(sessions[0]["current_stage"], "scope");

        let response = app
            .oneshot(get_request("/api/consultation/sessions?user_id=u-2"))
            .await
            .unwrap();
        assert_eq!(json_body(response).await, json!([]));
    }

    #[tokio::test]
    async fn health_reports_provider() {
        let response = app(MockLanguageModel::new())
            .oneshot(get_request("/health"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["provider"], "mock");
    }

    #[tokio::test]
    async fn unhealthy_model_is_503() {
        let response = app(MockLanguageModel::new().unhealthy())
            .oneshot(get_request("/health"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
