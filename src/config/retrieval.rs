//! Retrieval and template source configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::error::ValidationError;

/// Context retrieval configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Transcript length required before retrieval kicks in
    #[serde(default = "default_min_transcript_messages")]
    pub min_transcript_messages: usize,

    /// Upper bound on injected context text
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Directory of `.md` / `.txt` reference documents
    pub documents_dir: Option<PathBuf>,
}

impl RetrievalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.top_k == 0 {
            return Err(ValidationError::InvalidTopK);
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            top_k: default_top_k(),
            timeout_secs: default_timeout(),
            min_transcript_messages: default_min_transcript_messages(),
            max_context_chars: default_max_context_chars(),
            documents_dir: None,
        }
    }
}

/// Where templates come from at startup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplatesConfig {
    /// Directory of YAML template files
    pub directory: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

fn default_top_k() -> usize {
    5
}

fn default_timeout() -> u64 {
    10
}

fn default_min_transcript_messages() -> usize {
    3
}

fn default_max_context_chars() -> usize {
    2000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_defaults() {
        let config = RetrievalConfig::default();
        assert!(config.enabled);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.min_transcript_messages, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_top_k_rejected() {
        let config = RetrievalConfig {
            top_k: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidTopK));
    }
}
