//! End-to-end consultation flows.
//!
//! Drives the orchestrator against the in-memory adapters and a scripted
//! language model. For each turn the model is called for the reply first and,
//! when the cascade reaches it, for the stage judgment second.

use std::sync::Arc;
use std::time::Duration;

use sla_consultant::adapters::ai::{MockError, MockLanguageModel};
use sla_consultant::adapters::{InMemoryMessageStore, InMemorySessionStore, InMemoryTemplateRepository};
use sla_consultant::application::consultation::{
    ConsultationOrchestrator, HandleTurnCommand, RetryPolicy, StageCompletionEvaluator,
};
use sla_consultant::config::ConsultationConfig;
use sla_consultant::domain::consultation::{CompletionBasis, ExpectedOutput, Stage, Template};
use sla_consultant::domain::foundation::{SessionId, SessionStatus, StageId, TemplateId, UserId};
use sla_consultant::ports::{MessageStore, SessionStore};

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Fixture {
    sessions: InMemorySessionStore,
    messages: InMemoryMessageStore,
    orchestrator: Arc<ConsultationOrchestrator>,
}

fn stage(id: &str, outputs: usize) -> Stage {
    let mut stage = Stage::new(
        StageId::new(id).unwrap(),
        format!("Stage {}", id),
        format!("Let's talk about {}.", id),
    );
    for n in 0..outputs {
        stage = stage.with_expected_output(ExpectedOutput::new(
            format!("{}_output_{}", id, n),
            "Something the stage must capture",
        ));
    }
    stage
}

fn sla_template() -> Template {
    Template::new(
        TemplateId::new("sla-two-stage").unwrap(),
        "SLA Requirements",
        "sla",
        "You are an SLA consultant.",
        vec![stage("availability", 1), stage("support", 1)],
    )
    .unwrap()
}

fn health_template() -> Template {
    Template::new(
        TemplateId::new("symptoms").unwrap(),
        "Symptom Check",
        "healthcare",
        "You are a careful health assistant.",
        vec![stage("symptoms", 1), stage("advice", 1)],
    )
    .unwrap()
}

fn open_ended_template() -> Template {
    Template::new(
        TemplateId::new("open-ended").unwrap(),
        "Open Discussion",
        "sla",
        "You are an SLA consultant.",
        vec![stage("explore", 0), stage("wrap-up", 1)],
    )
    .unwrap()
}

fn fixture(model: MockLanguageModel) -> Fixture {
    let sessions = InMemorySessionStore::new();
    let messages = InMemoryMessageStore::new();
    let templates = InMemoryTemplateRepository::with_templates([
        sla_template(),
        health_template(),
        open_ended_template(),
    ]);

    let orchestrator = ConsultationOrchestrator::new(
        Arc::new(sessions.clone()),
        Arc::new(messages.clone()),
        Arc::new(templates),
        Arc::new(model),
        ConsultationConfig::default(),
    )
    .with_retry(RetryPolicy::single_attempt(Duration::from_secs(5)));

    Fixture {
        sessions,
        messages,
        orchestrator: Arc::new(orchestrator),
    }
}

fn user() -> UserId {
    UserId::new("client-42").unwrap()
}

fn start(template: &str, text: &str) -> HandleTurnCommand {
    HandleTurnCommand::new(user(), text).with_template(TemplateId::new(template).unwrap())
}

fn reply(session_id: SessionId, text: &str) -> HandleTurnCommand {
    HandleTurnCommand::new(user(), text).in_session(session_id)
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn positive_judgment_advances_to_next_stage() {
    let f = fixture(
        MockLanguageModel::new()
            .with_response("Great, 99.9% uptime noted. What support hours do you need?")
            .with_response("YES - the availability target is captured"),
    );

    let outcome = f
        .orchestrator
        .handle_turn(start("sla-two-stage", "We need 99.9% uptime for the checkout API"))
        .await
        .unwrap();

    let progress = outcome.progress.unwrap();
    assert!(progress.stage_completed);
    assert!(!progress.is_complete);
    assert_eq!(progress.progress_percentage.value(), 50);
    assert_eq!(progress.current_stage.as_str(), "availability");
    assert_eq!(progress.next_stage.unwrap().id.as_str(), "support");

    let session = f.sessions.get(&outcome.session_id).await.unwrap().unwrap();
    assert_eq!(session.current_stage().unwrap().as_str(), "support");
}

#[tokio::test]
async fn three_user_messages_complete_a_stage_by_volume() {
    let f = fixture(MockLanguageModel::new().with_default_response("NO - nothing relevant yet"));

    let first = f
        .orchestrator
        .handle_turn(start("sla-two-stage", "hello"))
        .await
        .unwrap();
    assert!(!first.progress.unwrap().stage_completed);

    let second = f
        .orchestrator
        .handle_turn(reply(first.session_id, "the weather is nice"))
        .await
        .unwrap();
    assert!(!second.progress.unwrap().stage_completed);

    let third = f
        .orchestrator
        .handle_turn(reply(first.session_id, "what time is it"))
        .await
        .unwrap();
    let progress = third.progress.unwrap();
    assert!(progress.stage_completed);
    assert_eq!(progress.next_stage.unwrap().id.as_str(), "support");
}

#[tokio::test]
async fn volume_verdict_reports_message_count() {
    let f = fixture(MockLanguageModel::new().with_default_response("NO"));
    let first = f
        .orchestrator
        .handle_turn(start("sla-two-stage", "one"))
        .await
        .unwrap();
    f.orchestrator
        .handle_turn(reply(first.session_id, "two"))
        .await
        .unwrap();
    f.orchestrator
        .handle_turn(reply(first.session_id, "three"))
        .await
        .unwrap();

    let session = f.sessions.get(&first.session_id).await.unwrap().unwrap();
    assert_eq!(session.current_stage().unwrap().as_str(), "support");

    // Re-evaluate the finished stage's window to read the verdict
    let availability = f
        .messages
        .recent_for_stage(&first.session_id, &StageId::new("availability").unwrap(), 10)
        .await
        .unwrap();
    let evaluator = StageCompletionEvaluator::new(
        Arc::new(MockLanguageModel::new()),
        ConsultationConfig::default(),
    );
    let template = sla_template();
    let result = evaluator
        .evaluate(&template, &template.stages()[0], &availability)
        .await;
    assert!(result.is_complete);
    assert_eq!(result.basis, CompletionBasis::MessageVolume);
    assert!(result.reason.contains("message count"));
}

#[tokio::test]
async fn health_assessment_completes_on_first_exchange() {
    let f = fixture(
        MockLanguageModel::new()
            .with_response("Based on your symptoms, my assessment is a mild seasonal allergy."),
    );

    let outcome = f
        .orchestrator
        .handle_turn(start("symptoms", "I have a runny nose and itchy eyes"))
        .await
        .unwrap();

    let progress = outcome.progress.unwrap();
    assert!(progress.stage_completed);
    assert_eq!(progress.progress_percentage.value(), 50);
}

#[tokio::test]
async fn completing_the_last_stage_finishes_the_consultation() {
    let f = fixture(
        MockLanguageModel::new()
            .with_response("Noted. Any support requirements?")
            .with_response("NO")
            .with_response("24/7 support it is.")
            .with_response("YES - support hours captured"),
    );

    let first = f
        .orchestrator
        .handle_turn(start("sla-two-stage", "99.9% uptime"))
        .await
        .unwrap();
    f.orchestrator
        .force_advance(&first.session_id, &user())
        .await
        .unwrap();

    let last = f
        .orchestrator
        .handle_turn(reply(first.session_id, "We need 24/7 phone support"))
        .await
        .unwrap();
    let terminal = last.progress.unwrap();
    assert!(terminal.is_complete);
    assert!(terminal.stage_completed);
    assert_eq!(terminal.progress_percentage.value(), 100);
    assert!(terminal.next_stage.is_none());

    let stored = f.sessions.get(&first.session_id).await.unwrap().unwrap();
    assert_eq!(stored.status(), SessionStatus::Completed);

    let again = f
        .orchestrator
        .force_advance(&first.session_id, &user())
        .await
        .unwrap();
    assert_eq!(again, terminal);

    let unchanged = f.sessions.get(&first.session_id).await.unwrap().unwrap();
    assert_eq!(unchanged.version(), stored.version());
    assert_eq!(unchanged.completed_stages().len(), 2);
}

#[tokio::test]
async fn gateway_failure_returns_safe_reply_and_keeps_user_message() {
    let f = fixture(MockLanguageModel::new().with_error(MockError::Network {
        message: "connection refused".into(),
    }));

    let outcome = f
        .orchestrator
        .handle_turn(start("sla-two-stage", "Our API must be up 99.95% of the time"))
        .await
        .unwrap();

    assert!(outcome.generation_failed);
    assert!(outcome.progress.is_none());
    assert!(!outcome.message.contains("connection refused"));

    let recent = f.messages.recent(&outcome.session_id, 10).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].content, "Our API must be up 99.95% of the time");

    let session = f.sessions.get(&outcome.session_id).await.unwrap().unwrap();
    assert!(session.completed_stages().is_empty());
}

#[tokio::test]
async fn stage_without_expected_outputs_waits_for_force_advance() {
    let f = fixture(MockLanguageModel::new().with_default_response("YES - clearly done"));

    let first = f
        .orchestrator
        .handle_turn(start("open-ended", "first thought"))
        .await
        .unwrap();
    for text in ["second thought", "third thought", "fourth thought"] {
        let outcome = f
            .orchestrator
            .handle_turn(reply(first.session_id, text))
            .await
            .unwrap();
        assert!(!outcome.progress.unwrap().stage_completed);
    }

    let check = f
        .orchestrator
        .check_completion(&first.session_id, &user())
        .await
        .unwrap();
    assert!(!check.is_complete);
    assert_eq!(check.confidence.value(), 0);
    assert_eq!(check.basis, CompletionBasis::NoExpectedOutputs);

    let progress = f
        .orchestrator
        .force_advance(&first.session_id, &user())
        .await
        .unwrap();
    assert!(progress.stage_completed);
    assert_eq!(progress.next_stage.unwrap().id.as_str(), "wrap-up");
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn concurrent_force_advances_complete_distinct_stages() {
    let f = fixture(MockLanguageModel::new().with_default_response("NO"));
    let first = f
        .orchestrator
        .handle_turn(start("sla-two-stage", "hello"))
        .await
        .unwrap();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let orchestrator = Arc::clone(&f.orchestrator);
            let session_id = first.session_id;
            tokio::spawn(async move { orchestrator.force_advance(&session_id, &user()).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let session = f.sessions.get(&first.session_id).await.unwrap().unwrap();
    let completed: Vec<&str> = session.completed_stages().iter().map(|s| s.as_str()).collect();
    assert_eq!(completed, vec!["availability", "support"]);
    assert!(session.is_complete());
}

#[tokio::test]
async fn concurrent_turns_are_recorded_in_order_per_turn() {
    let f = fixture(MockLanguageModel::new().with_default_response("NO"));
    let first = f
        .orchestrator
        .handle_turn(start("sla-two-stage", "hello"))
        .await
        .unwrap();

    let tasks: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|text| {
            let orchestrator = Arc::clone(&f.orchestrator);
            let session_id = first.session_id;
            tokio::spawn(async move { orchestrator.handle_turn(reply(session_id, text)).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    // Turns never interleave: every user message is directly followed by its reply
    let transcript = f.messages.transcript(&first.session_id).await.unwrap();
    assert_eq!(transcript.len(), 6);
    for pair in transcript.chunks(2) {
        assert!(pair[0].is_user());
        assert!(pair[1].is_assistant());
    }

    // The third user message in the stage triggered exactly one advancement
    let session = f.sessions.get(&first.session_id).await.unwrap().unwrap();
    assert_eq!(session.completed_stages().len(), 1);
}
