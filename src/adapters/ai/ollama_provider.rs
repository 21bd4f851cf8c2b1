//! Ollama Provider - LanguageModel backed by a local Ollama server.
//!
//! Uses the non-streaming `/api/generate` endpoint, flattening the chat
//! transcript into a single prompt in the instruction format the model
//! family expects. Health is probed with `/api/tags`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::transport::{map_send_error, map_status};
use crate::ports::{
    AIError, CompletionRequest, CompletionResponse, FinishReason, LanguageModel, Message,
    MessageRole, ProviderInfo, TokenUsage,
};

const DEFAULT_NUM_PREDICT: u32 = 800;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Configuration for the Ollama provider.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Server URL without trailing slash (default: http://localhost:11434).
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub health_timeout: Duration,
}

impl OllamaConfig {
    /// Creates a configuration, adding `http://` when the URL has no scheme.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            model: "mistral".to_string(),
            timeout: Duration::from_secs(90),
            health_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self::new("http://localhost:11434")
    }
}

fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

/// Prompt layout per model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptStyle {
    Llama2,
    Mistral,
    Generic,
}

impl PromptStyle {
    fn for_model(model: &str) -> Self {
        let model = model.to_lowercase();
        if model.contains("llama") {
            PromptStyle::Llama2
        } else if model.contains("mistral") {
            PromptStyle::Mistral
        } else {
            PromptStyle::Generic
        }
    }
}

/// Flattens a transcript into one prompt string, preserving message order.
fn format_prompt(style: PromptStyle, messages: &[Message]) -> String {
    let system = messages
        .iter()
        .filter(|m| m.role == MessageRole::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let turns = messages.iter().filter(|m| m.role != MessageRole::System);

    if style == PromptStyle::Generic {
        let mut out = String::new();
        if !system.is_empty() {
            out.push_str(&format!("System: {}\n\n", system));
        }
        for m in turns {
            let label = if m.role == MessageRole::User { "User" } else { "Assistant" };
            out.push_str(&format!("{}: {}\n", label, m.content));
        }
        out.push_str("Assistant: ");
        return out;
    }

    // Assistant turns before the first user turn are folded into the preamble.
    let mut preamble = match (style, system.is_empty()) {
        (_, true) => String::new(),
        (PromptStyle::Llama2, false) => format!("<<SYS>>\n{}\n<</SYS>>\n\n", system),
        (_, false) => format!("{}\n\n", system),
    };
    let mut out = String::new();
    let mut opened = false;
    let mut awaiting_reply = false;

    for m in turns {
        match (m.role, opened) {
            (MessageRole::User, false) => {
                out.push_str(&format!("<s>[INST] {}{} [/INST]", preamble, m.content));
                opened = true;
                awaiting_reply = true;
            }
            (MessageRole::User, true) => {
                out.push_str(&format!("</s><s>[INST] {} [/INST]", m.content));
                awaiting_reply = true;
            }
            (_, false) => {
                preamble.push_str(&format!("Assistant: {}\n\n", m.content));
            }
            (_, true) => {
                out.push_str(&format!(" {}", m.content));
                awaiting_reply = false;
            }
        }
    }

    if !opened {
        out.push_str(&format!("<s>[INST] {}[/INST]", preamble));
        awaiting_reply = true;
    }
    if awaiting_reply {
        out.push(' ');
    }
    out
}

/// Ollama API provider implementation.
pub struct OllamaProvider {
    config: OllamaConfig,
    client: Client,
    style: PromptStyle,
}

impl OllamaProvider {
    /// # Errors
    ///
    /// - `InvalidRequest` if the HTTP client cannot be built
    pub fn new(config: OllamaConfig) -> Result<Self, AIError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AIError::InvalidRequest(format!("Failed to create HTTP client: {}", e)))?;
        let style = PromptStyle::for_model(&config.model);

        tracing::info!(url = %config.base_url, model = %config.model, "Initialized Ollama provider");
        Ok(Self {
            config,
            client,
            style,
        })
    }

    fn to_generate_request(&self, request: &CompletionRequest) -> GenerateRequest {
        GenerateRequest {
            model: self.config.model.clone(),
            prompt: format_prompt(self.style, &request.full_transcript()),
            stream: false,
            options: GenerateOptions {
                num_predict: request.max_tokens.unwrap_or(DEFAULT_NUM_PREDICT),
                temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            },
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaProvider {
    async fn generate(&self, request: CompletionRequest) -> Result<CompletionResponse, AIError> {
        let body = self.to_generate_request(&request);

        let response = self
            .client
            .post(format!("{}/api/generate", self.config.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_status(status, &text));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AIError::parse(format!("Failed to parse Ollama response: {}", e)))?;

        let content = parsed
            .response
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| AIError::parse("Ollama returned no response text"))?;

        Ok(CompletionResponse {
            content,
            usage: TokenUsage::new(
                parsed.prompt_eval_count.unwrap_or(0),
                parsed.eval_count.unwrap_or(0),
            ),
            model: parsed.model.unwrap_or_else(|| self.config.model.clone()),
            finish_reason: FinishReason::from_provider(parsed.done_reason.as_deref()),
        })
    }

    async fn health_check(&self) -> Result<(), AIError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.config.base_url))
            .timeout(self.config.health_timeout)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.config.health_timeout))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(map_status(status, &text))
        }
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo::new("ollama", &self.config.model)
    }
}

// ----- Ollama API Types -----

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    model: Option<String>,
    response: Option<String>,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn base_url_gets_scheme_and_loses_trailing_slash() {
        assert_eq!(OllamaConfig::new("ollama:11434/").base_url, "http://ollama:11434");
        assert_eq!(OllamaConfig::new("https://llm.internal").base_url, "https://llm.internal");
    }

    #[test]
    fn style_follows_model_family() {
        assert_eq!(PromptStyle::for_model("llama2:13b"), PromptStyle::Llama2);
        assert_eq!(PromptStyle::for_model("mistral"), PromptStyle::Mistral);
        assert_eq!(PromptStyle::for_model("phi3"), PromptStyle::Generic);
    }

    #[test]
    fn generic_prompt_preserves_order() {
        let prompt = format_prompt(
            PromptStyle::Generic,
            &[
                Message::system("Be brief."),
                Message::assistant("What service?"),
                Message::user("Email hosting"),
            ],
        );
        assert_eq!(
            prompt,
            "System: Be brief.\n\nAssistant: What service?\nUser: Email hosting\nAssistant: "
        );
    }

    #[test]
    fn mistral_prompt_wraps_turns_in_inst_blocks() {
        let prompt = format_prompt(
            PromptStyle::Mistral,
            &[
                Message::system("sys"),
                Message::user("one"),
                Message::assistant("reply"),
                Message::user("two"),
            ],
        );
        assert_eq!(prompt, "<s>[INST] sys\n\none [/INST] reply</s><s>[INST] two [/INST] ");
    }

    #[test]
    fn llama_prompt_uses_sys_markers_and_folds_seed_question() {
        let prompt = format_prompt(
            PromptStyle::Llama2,
            &[
                Message::system("sys"),
                Message::assistant("Seed?"),
                Message::user("answer"),
            ],
        );
        assert_eq!(
            prompt,
            "<s>[INST] <<SYS>>\nsys\n<</SYS>>\n\nAssistant: Seed?\n\nanswer [/INST] "
        );
    }

    #[tokio::test]
    async fn generate_posts_flattened_prompt() {
        let seen = Arc::new(Mutex::new(Value::Null));
        let captured = seen.clone();
        let router = Router::new().route(
            "/api/generate",
            post(move |Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = body;
                    Json(json!({"model": "mistral", "response": "Hi from Ollama", "done": true}))
                }
            }),
        );
        let base = serve(router).await;
        let provider = OllamaProvider::new(OllamaConfig::new(base)).unwrap();

        let reply = provider
            .generate(
                CompletionRequest::new()
                    .with_message(MessageRole::User, "hello")
                    .with_max_tokens(50),
            )
            .await
            .unwrap();

        assert_eq!(reply.content, "Hi from Ollama");
        let body = seen.lock().unwrap().clone();
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 50);
        assert!(body["prompt"].as_str().unwrap().contains("hello"));
    }

    #[tokio::test]
    async fn empty_response_text_is_a_parse_error() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async { Json(json!({"response": ""})) }),
        );
        let base = serve(router).await;
        let provider = OllamaProvider::new(OllamaConfig::new(base)).unwrap();

        let err = provider.generate(CompletionRequest::new()).await.unwrap_err();
        assert!(matches!(err, AIError::Parse(_)));
    }

    #[tokio::test]
    async fn health_check_probes_tags() {
        let router = Router::new().route("/api/tags", get(|| async { Json(json!({"models": []})) }));
        let base = serve(router).await;
        let provider = OllamaProvider::new(OllamaConfig::new(base)).unwrap();
        assert!(provider.health_check().await.is_ok());

        let down = Router::new().route(
            "/api/tags",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let base = serve(down).await;
        let provider = OllamaProvider::new(OllamaConfig::new(base)).unwrap();
        assert!(provider.health_check().await.is_err());
    }
}
