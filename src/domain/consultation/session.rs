//! Consultation session aggregate.
//!
//! A session is either a free-form discovery conversation or a run through
//! a template. For template-guided sessions it owns the stage pointer and
//! enforces the progression rules:
//!
//! - the pointer is unset or names a stage of the bound template
//! - the pointer only moves forward in sequence order
//! - `completed_stages` never holds the same id twice
//! - once completed, the pointer rests on the last stage and never moves again

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::industry;
use super::template::{Stage, Template};
use crate::domain::foundation::{
    DomainError, ErrorCode, Percentage, SessionId, SessionStatus, StageId, TemplateId, Timestamp,
    UserId,
};

/// How a session is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// No template; industry-matched prompts steer the conversation.
    Discovery,
    /// Bound to a template's ordered stages.
    TemplateGuided,
}

/// Result of completing the current stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageAdvance {
    /// The stage was completed and the pointer moved to `next`.
    Advanced {
        completed: StageId,
        next: StageId,
        progress: Percentage,
    },
    /// The last stage was completed; the consultation is finished.
    Finished { completed: StageId },
    /// The consultation was already finished; nothing changed.
    AlreadyComplete,
}

impl StageAdvance {
    pub fn changed_state(&self) -> bool {
        !matches!(self, StageAdvance::AlreadyComplete)
    }
}

/// Consultation session aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationSession {
    id: SessionId,
    user_id: UserId,
    kind: SessionKind,
    template_id: Option<TemplateId>,
    current_stage: Option<StageId>,
    completed_stages: Vec<StageId>,
    progress: Percentage,
    status: SessionStatus,
    /// Free-form context bag (detected industry and similar).
    context: Map<String, Value>,
    extracted_data: Map<String, Value>,
    /// Optimistic concurrency version, owned by the session store.
    version: u64,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl ConsultationSession {
    /// Starts a new session, template-guided if `template_id` is given.
    pub fn new(user_id: UserId, template_id: Option<TemplateId>) -> Self {
        let now = Timestamp::now();
        let kind = if template_id.is_some() {
            SessionKind::TemplateGuided
        } else {
            SessionKind::Discovery
        };
        Self {
            id: SessionId::new(),
            user_id,
            kind,
            template_id,
            current_stage: None,
            completed_stages: Vec::new(),
            progress: Percentage::ZERO,
            status: SessionStatus::InProgress,
            context: Map::new(),
            extracted_data: Map::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn is_discovery(&self) -> bool {
        self.kind == SessionKind::Discovery
    }

    pub fn template_id(&self) -> Option<&TemplateId> {
        self.template_id.as_ref()
    }

    pub fn current_stage(&self) -> Option<&StageId> {
        self.current_stage.as_ref()
    }

    pub fn completed_stages(&self) -> &[StageId] {
        &self.completed_stages
    }

    pub fn progress(&self) -> Percentage {
        self.progress
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    pub fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    pub fn extracted_data(&self) -> &Map<String, Value> {
        &self.extracted_data
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    /// The industry detected for this session, if any.
    pub fn industry(&self) -> Option<&str> {
        self.context.get(industry::INDUSTRY_KEY).and_then(Value::as_str)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authorization
    // ─────────────────────────────────────────────────────────────────────────

    /// Validates that the user can access this session.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if user is not the owner
    pub fn authorize(&self, user_id: &UserId) -> Result<(), DomainError> {
        if &self.user_id == user_id {
            Ok(())
        } else {
            Err(DomainError::new(
                ErrorCode::Forbidden,
                "User is not authorized to access this session",
            ))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stage machine
    // ─────────────────────────────────────────────────────────────────────────

    /// Points an unbound template-guided session at the template's first stage.
    ///
    /// Returns true if the pointer was set by this call.
    ///
    /// # Errors
    ///
    /// - `NotTemplateGuided` for discovery sessions
    /// - `TemplateMismatch` if `template` is not the one this session references
    pub fn bind_template(&mut self, template: &Template) -> Result<bool, DomainError> {
        let bound = self.template_id.as_ref().ok_or_else(|| {
            DomainError::new(ErrorCode::NotTemplateGuided, "Session has no template")
        })?;
        if bound != template.id() {
            return Err(DomainError::new(
                ErrorCode::TemplateMismatch,
                format!("Session is bound to template '{}'", bound),
            )
            .with_detail("template_id", template.id().as_str()));
        }
        if self.current_stage.is_some() {
            return Ok(false);
        }

        self.current_stage = Some(template.first_stage().id.clone());
        self.completed_stages.clear();
        self.extracted_data.clear();
        self.progress = Percentage::ZERO;
        self.touch();
        Ok(true)
    }

    /// Resolves the stage pointer against the bound template.
    ///
    /// # Errors
    ///
    /// - `StageNotFound` if the pointer names a stage the template lacks.
    ///   This is a consistency failure, never a user error.
    pub fn current_stage_in<'t>(
        &self,
        template: &'t Template,
    ) -> Result<Option<&'t Stage>, DomainError> {
        match &self.current_stage {
            None => Ok(None),
            Some(id) => template.stage(id).map(Some).ok_or_else(|| {
                DomainError::new(
                    ErrorCode::StageNotFound,
                    format!("Stage '{}' not found in template '{}'", id, template.id()),
                )
                .with_detail("stage_id", id.as_str())
                .with_detail("template_id", template.id().as_str())
            }),
        }
    }

    /// Marks the current stage completed and moves the pointer forward.
    ///
    /// Idempotent at the terminal state: a finished session returns
    /// `AlreadyComplete` and is left untouched.
    ///
    /// # Errors
    ///
    /// - `NoCurrentStage` if the pointer is unset
    /// - `StageNotFound` if the pointer is not in `template`
    pub fn complete_current_stage(
        &mut self,
        template: &Template,
        extracted: Map<String, Value>,
    ) -> Result<StageAdvance, DomainError> {
        if self.is_complete() {
            return Ok(StageAdvance::AlreadyComplete);
        }

        let current = self.current_stage.clone().ok_or_else(|| {
            DomainError::new(ErrorCode::NoCurrentStage, "Session has no current stage")
        })?;
        let index = template.position_of(&current).ok_or_else(|| {
            DomainError::new(
                ErrorCode::StageNotFound,
                format!("Stage '{}' not found in template '{}'", current, template.id()),
            )
            .with_detail("stage_id", current.as_str())
        })?;

        if !self.completed_stages.contains(&current) {
            self.completed_stages.push(current.clone());
        }
        self.extracted_data.extend(extracted);
        self.touch();

        match template.stages().get(index + 1) {
            Some(next) => {
                let progress = Percentage::of_ratio(index + 1, template.stage_count());
                self.current_stage = Some(next.id.clone());
                self.progress = self.progress.max(progress);
                Ok(StageAdvance::Advanced {
                    completed: current,
                    next: next.id.clone(),
                    progress: self.progress,
                })
            }
            None => {
                self.progress = Percentage::HUNDRED;
                self.status = SessionStatus::Completed;
                Ok(StageAdvance::Finished { completed: current })
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Context
    // ─────────────────────────────────────────────────────────────────────────

    /// Folds industry mentions from a user message into the context bag.
    pub fn observe_user_message(&mut self, text: &str) -> bool {
        let changed = industry::record_industries(&mut self.context, text);
        if changed {
            self.touch();
        }
        changed
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence support
    // ─────────────────────────────────────────────────────────────────────────

    /// Records the version assigned by the store after a successful write.
    pub fn mark_persisted(&mut self, version: u64) {
        self.version = version;
    }

    fn touch(&mut self) {
        self.updated_at = self.updated_at.advanced_to_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::consultation::template::ExpectedOutput;

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn sid(id: &str) -> StageId {
        StageId::new(id).unwrap()
    }

    fn template(ids: &[&str]) -> Template {
        let stages = ids
            .iter()
            .map(|id| {
                Stage::new(sid(id), id.to_string(), "Q?")
                    .with_expected_output(ExpectedOutput::new("x", "x"))
            })
            .collect();
        Template::new(TemplateId::new("tpl").unwrap(), "T", "", "", stages).unwrap()
    }

    fn bound_session(t: &Template) -> ConsultationSession {
        let mut s = ConsultationSession::new(user(), Some(t.id().clone()));
        s.bind_template(t).unwrap();
        s
    }

    #[test]
    fn new_session_kind_follows_template_presence() {
        assert!(ConsultationSession::new(user(), None).is_discovery());
        let guided = ConsultationSession::new(user(), Some(TemplateId::new("t").unwrap()));
        assert_eq!(guided.kind(), SessionKind::TemplateGuided);
        assert!(guided.current_stage().is_none());
    }

    #[test]
    fn bind_sets_first_stage_once() {
        let t = template(&["a", "b"]);
        let mut s = ConsultationSession::new(user(), Some(t.id().clone()));

        assert!(s.bind_template(&t).unwrap());
        assert_eq!(s.current_stage(), Some(&sid("a")));

        s.complete_current_stage(&t, Map::new()).unwrap();
        assert!(!s.bind_template(&t).unwrap());
        assert_eq!(s.current_stage(), Some(&sid("b")));
    }

    #[test]
    fn bind_rejects_discovery_and_foreign_templates() {
        let t = template(&["a"]);
        let mut discovery = ConsultationSession::new(user(), None);
        assert_eq!(
            discovery.bind_template(&t).unwrap_err().code(),
            ErrorCode::NotTemplateGuided
        );

        let mut other = ConsultationSession::new(user(), Some(TemplateId::new("other").unwrap()));
        assert_eq!(other.bind_template(&t).unwrap_err().code(), ErrorCode::TemplateMismatch);
    }

    #[test]
    fn unknown_pointer_is_a_consistency_error() {
        let t = template(&["a", "b"]);
        let s = bound_session(&t);
        let shrunk = Template::new(t.id().clone(), "T", "", "", vec![t.stages()[1].clone()]).unwrap();

        let err = s.current_stage_in(&shrunk).unwrap_err();
        assert_eq!(err.code(), ErrorCode::StageNotFound);
    }

    #[test]
    fn completing_advances_and_scales_progress() {
        let t = template(&["a", "b", "c"]);
        let mut s = bound_session(&t);

        let step = s.complete_current_stage(&t, Map::new()).unwrap();
        assert_eq!(
            step,
            StageAdvance::Advanced {
                completed: sid("a"),
                next: sid("b"),
                progress: Percentage::new(33),
            }
        );

        s.complete_current_stage(&t, Map::new()).unwrap();
        assert_eq!(s.progress().value(), 67);
        assert_eq!(s.current_stage(), Some(&sid("c")));
    }

    #[test]
    fn completing_last_stage_finishes_consultation() {
        let t = template(&["a", "b"]);
        let mut s = bound_session(&t);
        s.complete_current_stage(&t, Map::new()).unwrap();

        let step = s.complete_current_stage(&t, Map::new()).unwrap();
        assert_eq!(step, StageAdvance::Finished { completed: sid("b") });
        assert!(s.is_complete());
        assert_eq!(s.progress(), Percentage::HUNDRED);
        assert_eq!(s.current_stage(), Some(&sid("b")));
        assert_eq!(s.completed_stages(), &[sid("a"), sid("b")]);
    }

    #[test]
    fn completing_after_finish_is_a_no_op() {
        let t = template(&["only"]);
        let mut s = bound_session(&t);
        s.complete_current_stage(&t, Map::new()).unwrap();
        let snapshot = s.clone();

        let step = s.complete_current_stage(&t, Map::new()).unwrap();
        assert_eq!(step, StageAdvance::AlreadyComplete);
        assert!(!step.changed_state());
        assert_eq!(s, snapshot);
    }

    #[test]
    fn completing_without_pointer_fails() {
        let t = template(&["a"]);
        let mut s = ConsultationSession::new(user(), Some(t.id().clone()));
        let err = s.complete_current_stage(&t, Map::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoCurrentStage);
    }

    #[test]
    fn extracted_data_is_merged() {
        let t = template(&["a", "b"]);
        let mut s = bound_session(&t);
        let mut extracted = Map::new();
        extracted.insert("uptime".into(), Value::from(99.9));
        s.complete_current_stage(&t, extracted).unwrap();
        assert_eq!(s.extracted_data()["uptime"], 99.9);
    }

    #[test]
    fn observing_messages_records_industry() {
        let mut s = ConsultationSession::new(user(), None);
        assert!(s.observe_user_message("We run a clinic"));
        assert_eq!(s.industry(), Some("healthcare"));
    }

    #[test]
    fn only_owner_is_authorized() {
        let s = ConsultationSession::new(user(), None);
        assert!(s.authorize(&user()).is_ok());
        let err = s.authorize(&UserId::new("intruder").unwrap()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }
}
