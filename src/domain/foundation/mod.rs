//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, enums, and error types
//! that form the vocabulary of the consultation domain.

mod ids;
mod timestamp;
mod percentage;
mod session_status;
mod errors;

pub use ids::{MessageId, SessionId, StageId, TemplateId, UserId};
pub use timestamp::Timestamp;
pub use percentage::Percentage;
pub use session_status::SessionStatus;
pub use errors::{DomainError, ErrorCode, ValidationError};
