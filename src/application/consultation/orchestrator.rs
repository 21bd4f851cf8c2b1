//! Consultation orchestrator.
//!
//! Drives one conversational turn end to end and owns every stage pointer
//! mutation: binding a template, recording the exchange, invoking the
//! evaluator and advancing or finishing the session.
//!
//! Mutations of one session are serialized by [`SessionLocks`]; the session
//! store's version check catches writers outside this process. At most one
//! advancement is committed per stage.

use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::time::{timeout, timeout_at, Instant};

use crate::config::{ConsultationConfig, RetrievalConfig};
use crate::domain::consultation::{
    CompletionBasis, CompletionResult, ConsultationSession, MessageRole, Stage, StageAdvance,
    StageProgress, Template, TranscriptMessage,
};
use crate::domain::foundation::{SessionId, StageId, TemplateId, UserId};
use crate::ports::{
    AIError, ContextRetriever, LanguageModel, MessageStore, MetadataFilter, RetrievedContext,
    SessionStore, SourceRef, StoreError, TemplateRepository,
};

use super::errors::ConsultationError;
use super::evaluator::StageCompletionEvaluator;
use super::prompt_builder::{PromptBuilder, TurnPrompt};
use super::retry::RetryPolicy;
use super::session_locks::SessionLocks;

const GENERIC_APOLOGY: &str =
    "I'm sorry, I encountered an issue while processing your request. Please try again.";
const TIMEOUT_APOLOGY: &str =
    "I'm sorry, the response is taking longer than expected. Please try again in a moment.";
const BUSY_APOLOGY: &str =
    "I'm receiving a lot of requests right now. Please wait a moment and try again.";

/// One inbound user message.
#[derive(Debug, Clone)]
pub struct HandleTurnCommand {
    /// Absent for the first message of a new consultation.
    pub session_id: Option<SessionId>,
    /// Only read when a new session is created.
    pub template_id: Option<TemplateId>,
    pub user_id: UserId,
    pub message: String,
}

impl HandleTurnCommand {
    pub fn new(user_id: UserId, message: impl Into<String>) -> Self {
        Self {
            session_id: None,
            template_id: None,
            user_id,
            message: message.into(),
        }
    }

    pub fn in_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_template(mut self, template_id: TemplateId) -> Self {
        self.template_id = Some(template_id);
        self
    }
}

/// What the caller gets back from a turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Assistant reply, or a neutral apology if generation failed.
    pub message: String,
    pub session_id: SessionId,
    /// Provenance of retrieved context used for the reply; may be empty.
    pub sources: Vec<SourceRef>,
    /// Present for template-guided turns that reached evaluation.
    pub progress: Option<StageProgress>,
    /// The session's context bag after this turn.
    pub context: Map<String, Value>,
    /// True when the reply is the fallback apology.
    pub generation_failed: bool,
}

/// Owns the consultation state machine.
pub struct ConsultationOrchestrator {
    sessions: Arc<dyn SessionStore>,
    messages: Arc<dyn MessageStore>,
    templates: Arc<dyn TemplateRepository>,
    model: Arc<dyn LanguageModel>,
    retriever: Option<Arc<dyn ContextRetriever>>,
    evaluator: StageCompletionEvaluator,
    prompts: PromptBuilder,
    retry: RetryPolicy,
    locks: SessionLocks,
    config: ConsultationConfig,
    retrieval: RetrievalConfig,
}

impl ConsultationOrchestrator {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        messages: Arc<dyn MessageStore>,
        templates: Arc<dyn TemplateRepository>,
        model: Arc<dyn LanguageModel>,
        config: ConsultationConfig,
    ) -> Self {
        let retry = RetryPolicy::default();
        Self {
            evaluator: StageCompletionEvaluator::new(Arc::clone(&model), config.clone())
                .with_retry(retry.clone()),
            sessions,
            messages,
            templates,
            model,
            retriever: None,
            prompts: PromptBuilder::default(),
            retry,
            locks: SessionLocks::new(),
            config,
            retrieval: RetrievalConfig::default(),
        }
    }

    /// Enables retrieval-augmented prompts.
    pub fn with_retriever(
        mut self,
        retriever: Arc<dyn ContextRetriever>,
        config: RetrievalConfig,
    ) -> Self {
        self.prompts = self.prompts.with_max_context_chars(config.max_context_chars);
        self.retriever = Some(retriever);
        self.retrieval = config;
        self
    }

    /// Sets the retry policy for generation and judgment calls.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.evaluator = StageCompletionEvaluator::new(Arc::clone(&self.model), self.config.clone())
            .with_retry(retry.clone());
        self.retry = retry;
        self
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts.with_max_context_chars(self.retrieval.max_context_chars);
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Handles one user message.
    ///
    /// Generation failures do not produce an error: the turn ends with a
    /// neutral reply, the user message stays recorded and no stage
    /// advancement is attempted. All model calls of the turn share the
    /// `turn_timeout_secs` budget; running out of it counts as a timeout.
    ///
    /// A `session_id` naming no stored session starts a new consultation.
    ///
    /// # Errors
    ///
    /// - `EmptyMessage` if the message is blank
    /// - `Forbidden` if the session belongs to another user
    /// - `TemplateNotFound` if the session's template is missing
    /// - `StageNotFound` if the stage pointer is not in the template
    /// - `Storage` if a store fails
    pub async fn handle_turn(
        &self,
        cmd: HandleTurnCommand,
    ) -> Result<TurnOutcome, ConsultationError> {
        let text = cmd.message.trim();
        if text.is_empty() {
            return Err(ConsultationError::EmptyMessage);
        }

        let deadline = Instant::now() + self.config.turn_timeout();

        let existing = match cmd.session_id {
            Some(id) => {
                let Ok(guard) = timeout_at(deadline, self.locks.acquire(&id)).await else {
                    return self.busy_session_outcome(&id, &cmd.user_id).await;
                };
                match self.sessions.get(&id).await? {
                    Some(session) => {
                        session.authorize(&cmd.user_id)?;
                        Some((session, guard))
                    }
                    None => {
                        tracing::warn!(
                            session_id = %id,
                            user_id = %cmd.user_id,
                            "Unknown session id, starting a new consultation"
                        );
                        None
                    }
                }
            }
            None => None,
        };
        let (mut session, _guard) = match existing {
            Some(found) => found,
            None => {
                let session = ConsultationSession::new(cmd.user_id.clone(), cmd.template_id.clone());
                let guard = self.locks.acquire(session.id()).await;
                (session, guard)
            }
        };
        let is_new = session.version() == 0;

        let template = match session.template_id() {
            Some(id) => Some(self.load_template(id).await?),
            None => None,
        };

        let mut changed = false;
        if let Some(template) = &template {
            changed |= session.bind_template(template)?;
        }
        if session.is_discovery() {
            changed |= session.observe_user_message(text);
        }

        if is_new {
            self.sessions.create(&mut session).await?;
            tracing::info!(
                session_id = %session.id(),
                user_id = %session.user_id(),
                template_id = session.template_id().map(|t| t.as_str()),
                "Consultation session created"
            );
        } else if changed {
            self.persist(&mut session).await?;
        }

        let stage = match &template {
            Some(template) => session.current_stage_in(template)?.cloned(),
            None => None,
        };
        let stage_id = stage.as_ref().map(|s| &s.id);

        let history = self.messages.transcript(session.id()).await?;
        self.messages
            .append(session.id(), MessageRole::User, text, stage_id)
            .await?;

        let context = self
            .retrieve_context(&session, template.as_ref(), history.len() + 1, text)
            .await;
        let healthcare = is_healthcare(&session, template.as_ref());

        let request = self.prompts.build(&TurnPrompt {
            session_id: *session.id(),
            template: template.as_ref(),
            stage: stage.as_ref(),
            industry: session.industry(),
            history: &history,
            user_message: text,
            context: context.as_ref(),
            healthcare,
        });

        let reply = match self
            .retry
            .run_until(Some(deadline), "generate_reply", || self.model.generate(request.clone()))
            .await
        {
            Ok(response) => response.content,
            Err(err) => {
                tracing::error!(
                    session_id = %session.id(),
                    stage_id = stage_id.map(|s| s.as_str()),
                    provider = %self.model.provider_info().name,
                    error = %err,
                    "Language model call failed"
                );
                return Ok(TurnOutcome {
                    message: self.apology(&err),
                    session_id: *session.id(),
                    sources: Vec::new(),
                    progress: None,
                    context: session.context().clone(),
                    generation_failed: true,
                });
            }
        };

        self.messages
            .append(session.id(), MessageRole::Assistant, &reply, stage_id)
            .await?;

        let progress = match (&template, &stage) {
            (Some(template), Some(stage)) => {
                Some(
                    self.evaluate_and_advance(&mut session, template, stage, deadline)
                        .await?,
                )
            }
            _ => None,
        };

        Ok(TurnOutcome {
            message: reply,
            session_id: *session.id(),
            sources: context.map(|c| c.sources).unwrap_or_default(),
            progress,
            context: session.context().clone(),
            generation_failed: false,
        })
    }

    /// Completes the current stage without consulting the evaluator.
    ///
    /// On an already completed session this is a no-op returning the
    /// terminal progress.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound`, `Forbidden`, `TemplateNotFound`
    /// - `NotTemplateGuided` for discovery sessions
    /// - `NoCurrentStage` / `StageNotFound` if the pointer is unusable
    pub async fn force_advance(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<StageProgress, ConsultationError> {
        let _guard = self.locks.acquire(session_id).await;
        let mut session = self.load_session(session_id, user_id).await?;
        let template = self.template_of(&session).await?;

        if session.bind_template(&template)? {
            self.persist(&mut session).await?;
        }
        let stage = session
            .current_stage_in(&template)?
            .cloned()
            .ok_or(ConsultationError::NoCurrentStage)?;

        if session.is_complete() {
            return Ok(progress_of(&template, &stage, &session));
        }

        tracing::info!(
            session_id = %session.id(),
            stage_id = %stage.id,
            "Forcing stage advancement"
        );
        let advance = session.complete_current_stage(&template, Map::new())?;
        self.commit_advance(&mut session, &template, &stage, &advance)
            .await
    }

    /// Evaluates the current stage without changing anything.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound`, `Forbidden`, `TemplateNotFound`
    /// - `NotTemplateGuided` for discovery sessions
    /// - `NoCurrentStage` if no stage is active
    /// - `StageNotFound` if the pointer is not in the template
    pub async fn check_completion(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
    ) -> Result<CompletionResult, ConsultationError> {
        let session = self.load_session(session_id, user_id).await?;
        let template = self.template_of(&session).await?;

        if session.is_complete() {
            return Ok(CompletionResult::complete(
                100,
                "Consultation already complete",
                CompletionBasis::ConsultationComplete,
            ));
        }

        let stage = session
            .current_stage_in(&template)?
            .ok_or(ConsultationError::NoCurrentStage)?;
        let window = self
            .messages
            .recent_for_stage(session.id(), &stage.id, self.config.evaluation_window)
            .await?;
        if window.is_empty() {
            return Ok(CompletionResult::incomplete(
                0,
                "No messages in current stage",
                CompletionBasis::NoStageMessages,
            ));
        }

        Ok(self.evaluator.evaluate(&template, stage, &window).await)
    }

    /// The session's transcript oldest first, optionally one stage only.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if the session does not exist
    /// - `Forbidden` if the session belongs to another user
    pub async fn transcript(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
        stage_id: Option<&StageId>,
    ) -> Result<Vec<TranscriptMessage>, ConsultationError> {
        self.load_session(session_id, user_id).await?;
        let transcript = self.messages.transcript(session_id).await?;
        Ok(match stage_id {
            Some(stage) => transcript.into_iter().filter(|m| m.belongs_to(stage)).collect(),
            None => transcript,
        })
    }

    /// The user's sessions, most recently updated first.
    pub async fn sessions_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ConsultationSession>, ConsultationError> {
        Ok(self.sessions.list_for_user(user_id).await?)
    }

    /// Every template a new consultation can be started with.
    pub async fn templates(&self) -> Result<Vec<Template>, ConsultationError> {
        let mut templates = self.templates.list().await?;
        templates.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        Ok(templates)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn load_session(
        &self,
        id: &SessionId,
        user_id: &UserId,
    ) -> Result<ConsultationSession, ConsultationError> {
        let session = self
            .sessions
            .get(id)
            .await?
            .ok_or(ConsultationError::SessionNotFound(*id))?;
        session.authorize(user_id)?;
        Ok(session)
    }

    /// Another turn held the session lock for the whole budget. Nothing is
    /// recorded; the caller gets the timeout reply.
    async fn busy_session_outcome(
        &self,
        id: &SessionId,
        user_id: &UserId,
    ) -> Result<TurnOutcome, ConsultationError> {
        let session = self.load_session(id, user_id).await?;
        tracing::warn!(
            session_id = %id,
            turn_timeout_secs = self.config.turn_timeout_secs,
            "Session busy for the whole turn budget"
        );
        Ok(TurnOutcome {
            message: self.apology(&AIError::timeout(self.config.turn_timeout_secs)),
            session_id: *id,
            sources: Vec::new(),
            progress: None,
            context: session.context().clone(),
            generation_failed: true,
        })
    }

    async fn load_template(&self, id: &TemplateId) -> Result<Template, ConsultationError> {
        self.templates
            .get(id)
            .await?
            .ok_or_else(|| ConsultationError::TemplateNotFound(id.clone()))
    }

    async fn template_of(
        &self,
        session: &ConsultationSession,
    ) -> Result<Template, ConsultationError> {
        let id = session
            .template_id()
            .ok_or(ConsultationError::NotTemplateGuided)?;
        self.load_template(id).await
    }

    async fn persist(&self, session: &mut ConsultationSession) -> Result<(), ConsultationError> {
        self.sessions.save(session).await.map_err(Into::into)
    }

    async fn evaluate_and_advance(
        &self,
        session: &mut ConsultationSession,
        template: &Template,
        stage: &Stage,
        deadline: Instant,
    ) -> Result<StageProgress, ConsultationError> {
        if session.is_complete() {
            return Ok(progress_of(template, stage, session));
        }

        let window = self
            .messages
            .recent_for_stage(session.id(), &stage.id, self.config.evaluation_window)
            .await?;
        let result = self
            .evaluator
            .evaluate_until(template, stage, &window, Some(deadline))
            .await;

        tracing::debug!(
            session_id = %session.id(),
            stage_id = %stage.id,
            complete = result.is_complete,
            confidence = result.confidence.value(),
            basis = ?result.basis,
            reason = %result.reason,
            "Stage evaluated"
        );

        if !result.is_complete {
            return Ok(progress_of(template, stage, session));
        }

        let advance = session.complete_current_stage(template, result.extracted_data)?;
        self.commit_advance(session, template, stage, &advance).await
    }

    /// Saves an advanced session. On a version conflict nothing is
    /// re-applied: the stored state is reloaded and reported.
    async fn commit_advance(
        &self,
        session: &mut ConsultationSession,
        template: &Template,
        stage: &Stage,
        advance: &StageAdvance,
    ) -> Result<StageProgress, ConsultationError> {
        if advance.changed_state() {
            match self.sessions.save(session).await {
                Ok(()) => log_advance(session, template, advance),
                Err(StoreError::Conflict { expected, actual }) => {
                    tracing::warn!(
                        session_id = %session.id(),
                        stage_id = %stage.id,
                        expected,
                        actual,
                        "Concurrent session update, reporting stored progress"
                    );
                    *session = self
                        .sessions
                        .get(session.id())
                        .await?
                        .ok_or(ConsultationError::SessionNotFound(*session.id()))?;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(progress_of(template, stage, session))
    }

    async fn retrieve_context(
        &self,
        session: &ConsultationSession,
        template: Option<&Template>,
        transcript_len: usize,
        query: &str,
    ) -> Option<RetrievedContext> {
        let retriever = self.retriever.as_ref()?;
        let wanted = template.map_or(session.is_discovery(), Template::wants_retrieval);
        if !self.retrieval.enabled
            || !wanted
            || transcript_len < self.retrieval.min_transcript_messages
        {
            return None;
        }

        let filter = is_healthcare(session, template).then(|| {
            let mut filter = MetadataFilter::new();
            filter.insert("industry".to_string(), "healthcare".to_string());
            filter
        });

        let lookup = retriever.relevant_context(query, self.retrieval.top_k, filter.as_ref());
        match timeout(self.retrieval.timeout(), lookup).await {
            Ok(Ok(context)) if !context.is_empty() => {
                tracing::debug!(
                    session_id = %session.id(),
                    sources = context.sources.len(),
                    "Retrieved reference context"
                );
                Some(context)
            }
            Ok(Ok(_)) => None,
            Ok(Err(err)) => {
                tracing::warn!(session_id = %session.id(), error = %err, "Context retrieval failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    session_id = %session.id(),
                    timeout_secs = self.retrieval.timeout_secs,
                    "Context retrieval timed out"
                );
                None
            }
        }
    }

    fn apology(&self, err: &AIError) -> String {
        let base = match err {
            AIError::Timeout { .. } => TIMEOUT_APOLOGY,
            AIError::RateLimited { .. } => BUSY_APOLOGY,
            _ => GENERIC_APOLOGY,
        };
        if self.config.expose_error_details {
            format!("{} (details: {})", base, err)
        } else {
            base.to_string()
        }
    }
}

fn is_healthcare(session: &ConsultationSession, template: Option<&Template>) -> bool {
    match template {
        Some(template) => template.is_healthcare(),
        None => session.industry() == Some("healthcare"),
    }
}

fn progress_of(template: &Template, stage: &Stage, session: &ConsultationSession) -> StageProgress {
    StageProgress::for_stage(
        template,
        stage,
        session.progress(),
        session.completed_stages().contains(&stage.id),
        session.is_complete(),
        session.completed_stages(),
        session.current_stage(),
    )
}

fn log_advance(session: &ConsultationSession, template: &Template, advance: &StageAdvance) {
    match advance {
        StageAdvance::Advanced {
            completed,
            next,
            progress,
        } => tracing::info!(
            session_id = %session.id(),
            template_id = %template.id(),
            completed_stage = %completed,
            next_stage = %next,
            progress = progress.value(),
            "Stage completed, advancing"
        ),
        StageAdvance::Finished { completed } => tracing::info!(
            session_id = %session.id(),
            template_id = %template.id(),
            completed_stage = %completed,
            "Consultation completed"
        ),
        StageAdvance::AlreadyComplete => {}
    }
}
