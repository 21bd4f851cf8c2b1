//! Stage completion evaluator.
//!
//! A cascade ordered cheapest and most certain first:
//!
//! 1. operator override
//! 2. stage declares no expected outputs (never complete)
//! 3. health-domain assessment indicators in the latest assistant reply
//! 4. user message volume
//! 5. model YES/NO judgment
//! 6. if the judgment call fails, a lower volume threshold
//!
//! The evaluator never returns an error. A stage with expected outputs
//! always completes once enough user messages accumulate.

use std::sync::Arc;
use tokio::time::Instant;

use crate::config::ConsultationConfig;
use crate::domain::consultation::{
    find_health_indicator, judgment_prompt, last_assistant_message, parse_judgment,
    user_message_count, CompletionBasis, CompletionResult, Judgment, Stage, Template,
    TranscriptMessage, JUDGE_SYSTEM_PROMPT,
};
use crate::ports::{AIError, CompletionRequest, LanguageModel, MessageRole};

use super::retry::RetryPolicy;

const JUDGMENT_MAX_TOKENS: u32 = 100;
const JUDGMENT_TEMPERATURE: f32 = 0.0;

/// Decides whether a stage's information-gathering goal is met.
pub struct StageCompletionEvaluator {
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
    config: ConsultationConfig,
}

impl StageCompletionEvaluator {
    pub fn new(model: Arc<dyn LanguageModel>, config: ConsultationConfig) -> Self {
        Self {
            model,
            retry: RetryPolicy::default(),
            config,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Evaluates `stage` against `window`, the most recent messages of that stage.
    pub async fn evaluate(
        &self,
        template: &Template,
        stage: &Stage,
        window: &[TranscriptMessage],
    ) -> CompletionResult {
        self.evaluate_until(template, stage, window, None).await
    }

    /// Same as [`evaluate`](Self::evaluate); a judgment call still running at
    /// `deadline` counts as a failed judgment.
    pub async fn evaluate_until(
        &self,
        template: &Template,
        stage: &Stage,
        window: &[TranscriptMessage],
        deadline: Option<Instant>,
    ) -> CompletionResult {
        if self.config.force_completion {
            tracing::debug!(stage_id = %stage.id, "Stage completion forced by operator override");
            return CompletionResult::complete(
                100,
                "Operator override: stage completion forced",
                CompletionBasis::OperatorOverride,
            );
        }

        if stage.expected_outputs.is_empty() {
            return CompletionResult::incomplete(
                0,
                "Stage declares no expected outputs",
                CompletionBasis::NoExpectedOutputs,
            );
        }

        if template.is_health_domain() && window.len() >= 2 {
            if let Some(indicator) = last_assistant_message(window)
                .and_then(|m| find_health_indicator(&m.content))
            {
                tracing::debug!(stage_id = %stage.id, indicator, "Health assessment indicator found");
                return CompletionResult::complete(
                    95,
                    "Health assessment indicators detected",
                    CompletionBasis::DomainIndicators,
                );
            }
        }

        let user_messages = user_message_count(window);
        if user_messages >= self.config.volume_threshold {
            return CompletionResult::complete(
                85,
                format!("Sufficient messages provided (message count: {})", user_messages),
                CompletionBasis::MessageVolume,
            );
        }

        match self.judge(stage, window, deadline).await {
            Ok(judgment) if judgment.is_complete => CompletionResult::complete(
                90,
                judgment.rationale,
                CompletionBasis::ModelJudgment,
            ),
            Ok(judgment) => CompletionResult::incomplete(
                50,
                judgment.rationale,
                CompletionBasis::ModelJudgment,
            ),
            Err(err) => {
                tracing::warn!(
                    stage_id = %stage.id,
                    error = %err,
                    user_messages,
                    "Completion judgment failed, using message count"
                );
                if user_messages >= self.config.degraded_volume_threshold {
                    CompletionResult::complete(
                        70,
                        format!(
                            "Fallback: sufficient messages (message count: {})",
                            user_messages
                        ),
                        CompletionBasis::DegradedVolume,
                    )
                } else {
                    CompletionResult::incomplete(
                        0,
                        format!("Error: {}", err),
                        CompletionBasis::EvaluationFailed,
                    )
                }
            }
        }
    }

    async fn judge(
        &self,
        stage: &Stage,
        window: &[TranscriptMessage],
        deadline: Option<Instant>,
    ) -> Result<Judgment, AIError> {
        let request = CompletionRequest::new()
            .with_system_prompt(JUDGE_SYSTEM_PROMPT)
            .with_message(MessageRole::User, judgment_prompt(stage, window))
            .with_temperature(JUDGMENT_TEMPERATURE)
            .with_max_tokens(JUDGMENT_MAX_TOKENS);

        let response = self
            .retry
            .run_until(deadline, "stage_judgment", || self.model.generate(request.clone()))
            .await?;

        Ok(parse_judgment(&response.content, self.config.judgment_prefix_len))
    }
}
