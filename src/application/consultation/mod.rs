//! Consultation use cases.
//!
//! [`ConsultationOrchestrator`] runs conversational turns and owns every
//! stage pointer mutation. [`StageCompletionEvaluator`] decides whether the
//! current stage has gathered enough; it never mutates anything.

mod errors;
mod evaluator;
mod orchestrator;
mod prompt_builder;
mod retry;
mod session_locks;

pub use errors::ConsultationError;
pub use evaluator::StageCompletionEvaluator;
pub use orchestrator::{ConsultationOrchestrator, HandleTurnCommand, TurnOutcome};
pub use prompt_builder::{PromptBuilder, TurnPrompt};
pub use retry::RetryPolicy;
pub use session_locks::SessionLocks;
