//! Stage completion and turn handling settings

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Consultation behaviour configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConsultationConfig {
    /// Operator override: every evaluated stage counts as complete
    #[serde(default)]
    pub force_completion: bool,

    /// User messages in a stage that complete it without a model judgment
    #[serde(default = "default_volume_threshold")]
    pub volume_threshold: usize,

    /// Lower threshold used when the model judgment itself fails
    #[serde(default = "default_degraded_volume_threshold")]
    pub degraded_volume_threshold: usize,

    /// Number of stage messages handed to the evaluator
    #[serde(default = "default_evaluation_window")]
    pub evaluation_window: usize,

    /// Leading characters of a judgment response searched for "YES"
    #[serde(default = "default_judgment_prefix_len")]
    pub judgment_prefix_len: usize,

    /// Wall-clock budget for all model calls of one turn, in seconds
    #[serde(default = "default_turn_timeout")]
    pub turn_timeout_secs: u64,

    /// Include internal error text in apology messages (admin/debug only)
    #[serde(default)]
    pub expose_error_details: bool,
}

impl ConsultationConfig {
    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.volume_threshold == 0 || self.degraded_volume_threshold == 0 {
            return Err(ValidationError::InvalidThresholds(
                "volume thresholds must be at least 1",
            ));
        }
        if self.degraded_volume_threshold > self.volume_threshold {
            return Err(ValidationError::InvalidThresholds(
                "degraded threshold must not exceed the volume threshold",
            ));
        }
        if self.evaluation_window == 0 {
            return Err(ValidationError::InvalidThresholds(
                "evaluation window must be at least 1",
            ));
        }
        if self.turn_timeout_secs == 0 {
            return Err(ValidationError::InvalidTurnTimeout);
        }
        if self.judgment_prefix_len < 3 {
            return Err(ValidationError::InvalidThresholds(
                "judgment prefix must fit the word YES",
            ));
        }
        Ok(())
    }
}

impl Default for ConsultationConfig {
    fn default() -> Self {
        Self {
            force_completion: false,
            volume_threshold: default_volume_threshold(),
            degraded_volume_threshold: default_degraded_volume_threshold(),
            evaluation_window: default_evaluation_window(),
            judgment_prefix_len: default_judgment_prefix_len(),
            turn_timeout_secs: default_turn_timeout(),
            expose_error_details: false,
        }
    }
}

fn default_volume_threshold() -> usize {
    3
}

fn default_degraded_volume_threshold() -> usize {
    2
}

fn default_evaluation_window() -> usize {
    10
}

fn default_judgment_prefix_len() -> usize {
    10
}

fn default_turn_timeout() -> u64 {
    100
}
