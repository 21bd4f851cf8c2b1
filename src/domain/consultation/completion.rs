//! Stage completion verdicts and the pure parts of the evaluation cascade.
//!
//! Everything here is deterministic; the model call lives in the
//! application layer's evaluator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::template::Stage;
use super::transcript::TranscriptMessage;
use crate::domain::foundation::Percentage;

/// System prompt used for the YES/NO judgment call.
pub const JUDGE_SYSTEM_PROMPT: &str =
    "You are a specialized AI for analyzing conversation completeness.";

/// Terms whose presence in an assistant reply signals a conclusive health assessment.
pub const HEALTH_INDICATORS: &[&str] = &[
    "assessment",
    "diagnosis",
    "symptoms",
    "condition",
    "recommend",
    "analysis",
    "based on your",
    "medical history",
    "health condition",
    "further tests",
    "treatment",
    "medication",
    "therapy",
    "health plan",
    "prognosis",
    "risk factors",
    "health record",
];

/// Which rule of the cascade produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionBasis {
    OperatorOverride,
    NoExpectedOutputs,
    DomainIndicators,
    MessageVolume,
    ModelJudgment,
    DegradedVolume,
    EvaluationFailed,
    NoStageMessages,
    ConsultationComplete,
}

/// Outcome of evaluating one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub is_complete: bool,
    pub confidence: Percentage,
    pub reason: String,
    /// Structured fields captured from the conversation. Currently always empty.
    pub extracted_data: Map<String, Value>,
    pub basis: CompletionBasis,
}

impl CompletionResult {
    pub fn complete(confidence: u8, reason: impl Into<String>, basis: CompletionBasis) -> Self {
        Self {
            is_complete: true,
            confidence: Percentage::new(confidence),
            reason: reason.into(),
            extracted_data: Map::new(),
            basis,
        }
    }

    pub fn incomplete(confidence: u8, reason: impl Into<String>, basis: CompletionBasis) -> Self {
        Self {
            is_complete: false,
            confidence: Percentage::new(confidence),
            reason: reason.into(),
            extracted_data: Map::new(),
            basis,
        }
    }
}

/// Returns the first health indicator found in `text`, case-insensitively.
pub fn find_health_indicator(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    HEALTH_INDICATORS
        .iter()
        .copied()
        .find(|indicator| lower.contains(indicator))
}

/// Builds the judgment question for `stage` over the recent `window`.
pub fn judgment_prompt(stage: &Stage, window: &[TranscriptMessage]) -> String {
    let outputs = stage
        .expected_outputs
        .iter()
        .map(|o| {
            format!(
                "- {}: {} (Required: {}, Type: {})",
                o.name, o.description, o.required, o.data_type
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let conversation = window
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str().to_uppercase(), m.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are analyzing a consultation to determine if the current stage is complete.\n\n\
         STAGE: {}\n\
         DESCRIPTION: {}\n\n\
         EXPECTED OUTPUTS:\n{}\n\n\
         RECENT CONVERSATION:\n{}\n\n\
         HAS THE USER PROVIDED ALL REQUIRED INFORMATION FOR THIS STAGE?\n\
         Answer with ONLY \"YES\" or \"NO\" first, then provide a brief explanation.",
        stage.name, stage.description, outputs, conversation
    )
}

/// Parsed YES/NO answer from the judge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgment {
    pub is_complete: bool,
    pub rationale: String,
}

const MAX_RATIONALE_CHARS: usize = 90;

/// Interprets a judge reply: complete iff the first `prefix_len` characters
/// contain "YES" in any case. The rationale is the text that follows.
pub fn parse_judgment(response: &str, prefix_len: usize) -> Judgment {
    let prefix: String = response.chars().take(prefix_len).collect();
    let is_complete = prefix.to_uppercase().contains("YES");

    let rationale: String = response
        .chars()
        .skip(prefix_len)
        .take(MAX_RATIONALE_CHARS)
        .collect();
    let rationale = rationale.trim();

    let rationale = if !rationale.is_empty() {
        rationale.to_string()
    } else if is_complete {
        "Stage requirements met".to_string()
    } else {
        "Stage requirements not yet met".to_string()
    };

    Judgment {
        is_complete,
        rationale,
    }
}
