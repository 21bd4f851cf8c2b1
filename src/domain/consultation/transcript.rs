//! Transcript messages exchanged within a consultation session.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{MessageId, SessionId, StageId, Timestamp};

/// Role of the message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions (guides model behavior).
    System,
    /// End-user input.
    User,
    /// Model response.
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single recorded message.
///
/// `stage_id` records which stage was active when the message was
/// exchanged, so a stage's slice of the transcript can be recovered later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub id: MessageId,
    pub session_id: SessionId,
    pub role: MessageRole,
    pub content: String,
    pub stage_id: Option<StageId>,
    pub created_at: Timestamp,
}

impl TranscriptMessage {
    pub fn new(
        session_id: SessionId,
        role: MessageRole,
        content: impl Into<String>,
        stage_id: Option<StageId>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            session_id,
            role,
            content: content.into(),
            stage_id,
            created_at: Timestamp::now(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }

    pub fn belongs_to(&self, stage: &StageId) -> bool {
        self.stage_id.as_ref() == Some(stage)
    }
}

/// Counts user-authored messages in a window.
pub fn user_message_count(messages: &[TranscriptMessage]) -> usize {
    messages.iter().filter(|m| m.is_user()).count()
}

/// Returns the most recent assistant message in a window, if any.
pub fn last_assistant_message(messages: &[TranscriptMessage]) -> Option<&TranscriptMessage> {
    messages.iter().rev().find(|m| m.is_assistant())
}
