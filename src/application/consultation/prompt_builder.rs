//! Composes the generation request for one turn.
//!
//! Order of the system portion: base prompt, stage guidance, retrieved
//! context. Messages follow as the prior transcript oldest-first, the
//! stage's seed question when the stage has not started yet, then the new
//! user message.

use crate::domain::consultation::{industry_prompt, Stage, Template, TranscriptMessage};
use crate::domain::foundation::SessionId;
use crate::ports::{CompletionRequest, Message, RetrievedContext};

const CITATION_REQUEST: &str = "Include source citations like [Source 1], [Source 2], etc. \
     when referencing specific information.";

/// Inputs for composing one turn's prompt.
#[derive(Debug, Clone, Copy)]
pub struct TurnPrompt<'a> {
    pub session_id: SessionId,
    pub template: Option<&'a Template>,
    pub stage: Option<&'a Stage>,
    /// Industry detected for discovery sessions.
    pub industry: Option<&'a str>,
    /// Transcript before the new user message, oldest first.
    pub history: &'a [TranscriptMessage],
    pub user_message: &'a str,
    pub context: Option<&'a RetrievedContext>,
    /// Healthcare/HIPAA consultation: changes the context preamble.
    pub healthcare: bool,
}

/// Builds `CompletionRequest`s with fixed sampling settings.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    temperature: f32,
    max_tokens: u32,
    max_context_chars: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 800,
            max_context_chars: 2000,
        }
    }
}

impl PromptBuilder {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
            ..Self::default()
        }
    }

    pub fn with_max_context_chars(mut self, max: usize) -> Self {
        self.max_context_chars = max;
        self
    }

    pub fn build(&self, turn: &TurnPrompt<'_>) -> CompletionRequest {
        let mut messages: Vec<Message> = turn
            .history
            .iter()
            .map(|m| Message::new(m.role, m.content.clone()))
            .collect();

        if let Some(stage) = turn.stage {
            let stage_started = turn.history.iter().any(|m| m.belongs_to(&stage.id));
            if !stage_started && !stage.prompt_template.trim().is_empty() {
                messages.push(Message::assistant(stage.prompt_template.trim()));
            }
        }
        messages.push(Message::user(turn.user_message));

        CompletionRequest::new()
            .with_system_prompt(self.system_prompt(turn))
            .with_messages(messages)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .for_session(turn.session_id)
    }

    pub fn system_prompt(&self, turn: &TurnPrompt<'_>) -> String {
        let base = turn
            .template
            .map(Template::initial_system_prompt)
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| industry_prompt(turn.industry));
        let mut prompt = base.trim().to_string();

        if let Some(stage) = turn.stage {
            prompt.push_str(&stage_guidance(stage));
        }

        if let Some(context) = turn.context.filter(|c| !c.is_empty()) {
            let text = truncate_chars(context.text.trim(), self.max_context_chars);
            let preamble = if turn.healthcare {
                "Use the following healthcare information:"
            } else {
                "Use the following reference information:"
            };
            prompt.push_str(&format!("\n\n{}\n\n{}\n\n{}", preamble, text, CITATION_REQUEST));
        }

        prompt
    }
}

fn stage_guidance(stage: &Stage) -> String {
    let mut out = format!("\n\nCURRENT STAGE: {}", stage.name);
    if !stage.description.trim().is_empty() {
        out.push_str(&format!("\n{}", stage.description.trim()));
    }
    if !stage.system_instructions.trim().is_empty() {
        out.push_str(&format!("\n\n{}", stage.system_instructions.trim()));
    }
    if !stage.expected_outputs.is_empty() {
        out.push_str("\n\nInformation to collect in this stage:");
        for output in &stage.expected_outputs {
            let flag = if output.required { "required" } else { "optional" };
            out.push_str(&format!(
                "\n- {} ({}, {}): {}",
                output.name, output.data_type, flag, output.description
            ));
        }
    }
    out
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
