//! Consultation module - templates, sessions and stage progression.
//!
//! # Module Organization
//!
//! - `template` - Template, Stage and ExpectedOutput definitions
//! - `session` - ConsultationSession aggregate owning the stage pointer
//! - `transcript` - Recorded messages tagged with the active stage
//! - `progress` - Progress block returned to callers
//! - `completion` - Completion verdicts and the deterministic evaluation rules
//! - `industry` - Industry detection for discovery sessions
//! - `prompts` - Industry-specific system prompts

mod completion;
mod industry;
mod progress;
mod prompts;
mod session;
mod template;
mod transcript;

pub use completion::{
    find_health_indicator, judgment_prompt, parse_judgment, CompletionBasis, CompletionResult,
    Judgment, HEALTH_INDICATORS, JUDGE_SYSTEM_PROMPT,
};
pub use industry::{detect_industries, record_industries, Industry, DETECTED_INDUSTRIES_KEY, INDUSTRY_KEY};
pub use progress::{NextStageInfo, StageProgress};
pub use prompts::{industry_prompt, BASE_SLA_PROMPT};
pub use session::{ConsultationSession, SessionKind, StageAdvance};
pub use template::{
    ExpectedOutput, OutputDataType, Stage, StageType, Template, TemplateDefinition,
};
pub use transcript::{last_assistant_message, user_message_count, MessageRole, TranscriptMessage};
