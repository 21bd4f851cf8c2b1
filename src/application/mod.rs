//! Application layer - use cases coordinating the domain and the ports.

pub mod consultation;

pub use consultation::{
    ConsultationError, ConsultationOrchestrator, HandleTurnCommand, RetryPolicy,
    StageCompletionEvaluator, TurnOutcome,
};
