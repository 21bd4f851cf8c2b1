//! SessionStatus enum for tracking lifecycle of consultation sessions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a consultation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    InProgress,
    Completed,
}

impl SessionStatus {
    /// Returns true if the stage pointer may still move.
    pub fn is_mutable(&self) -> bool {
        matches!(self, SessionStatus::InProgress)
    }

    /// Validates a transition from this status to another.
    ///
    /// Valid transitions:
    /// - InProgress -> Completed
    pub fn can_transition_to(&self, target: &SessionStatus) -> bool {
        use SessionStatus::*;
        matches!((self, target), (InProgress, Completed))
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}
