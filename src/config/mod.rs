//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `SLA_CONSULTANT` prefix
//! and `__` between nested sections.
//!
//! # Example
//!
//! ```no_run
//! use sla_consultant::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod ai;
mod consultation;
mod error;
mod retrieval;
mod server;

pub use ai::{AiConfig, AiProvider};
pub use consultation::ConsultationConfig;
pub use error::{ConfigError, ValidationError};
pub use retrieval::{RetrievalConfig, TemplatesConfig};
pub use server::{CorsPolicy, Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Every section has defaults; only the OpenAI key is required, and only
/// when OpenAI is the selected provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub consultation: ConsultationConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub templates: TemplatesConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with the `SLA_CONSULTANT` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `SLA_CONSULTANT__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `SLA_CONSULTANT__AI__PROVIDER=ollama` -> `ai.provider = ollama`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SLA_CONSULTANT")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.ai.validate()?;
        self.consultation.validate()?;
        self.retrieval.validate()?;

        // The HTTP timeout has to outlast the turn budget, or a slow model
        // surfaces as a bare 408 instead of a reply.
        if self.server.request_timeout_secs <= self.consultation.turn_timeout_secs {
            return Err(ValidationError::RequestTimeoutTooShort {
                request_secs: self.server.request_timeout_secs,
                turn_secs: self.consultation.turn_timeout_secs,
            });
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "SLA_CONSULTANT__AI__OPENAI_API_KEY",
        "SLA_CONSULTANT__AI__PROVIDER",
        "SLA_CONSULTANT__SERVER__PORT",
        "SLA_CONSULTANT__SERVER__ENVIRONMENT",
        "SLA_CONSULTANT__CONSULTATION__FORCE_COMPLETION",
        "SLA_CONSULTANT__RETRIEVAL__TOP_K",
    ];

    fn set_minimal_env() {
        env::set_var("SLA_CONSULTANT__AI__OPENAI_API_KEY", "sk-test-xxx");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.expect("config should load");
        assert_eq!(
            config.ai.openai_api_key.unwrap().expose_secret(),
            "sk-test-xxx"
        );
    }

    #[test]
    fn test_validate_full_config() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().validate().is_ok());
    }

    #[test]
    fn test_defaults_without_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let config = AppConfig::load().unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
        assert_eq!(config.consultation.volume_threshold, 3);
        assert!(config.retrieval.enabled);
        assert!(config.templates.directory.is_none());
    }

    #[test]
    fn test_ollama_selection_and_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("SLA_CONSULTANT__AI__PROVIDER", "ollama");
        env::set_var("SLA_CONSULTANT__CONSULTATION__FORCE_COMPLETION", "true");
        env::set_var("SLA_CONSULTANT__RETRIEVAL__TOP_K", "3");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.ai.provider, AiProvider::Ollama);
        assert!(config.consultation.force_completion);
        assert_eq!(config.retrieval.top_k, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_request_timeout_must_outlast_turn_budget() {
        let mut config = AppConfig::default();
        config.ai.provider = AiProvider::Ollama;
        assert!(config.validate().is_ok());
        assert!(config.server.request_timeout() > config.consultation.turn_timeout());

        config.consultation.turn_timeout_secs = config.server.request_timeout_secs;
        assert_eq!(
            config.validate(),
            Err(ValidationError::RequestTimeoutTooShort {
                request_secs: 120,
                turn_secs: 120,
            })
        );
    }

    #[test]
    fn test_is_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("SLA_CONSULTANT__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        assert!(result.unwrap().is_production());
    }
}
