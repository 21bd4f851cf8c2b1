//! Consultation templates: ordered stages and their expected outputs.
//!
//! A template is read-only for the lifetime of every session that references
//! it. Stage order is the order of `stages`; routing is strictly sequential.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::domain::foundation::{DomainError, ErrorCode, StageId, TemplateId};

/// Kind of work a stage performs in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum StageType {
    #[default]
    InformationGathering,
    ProblemAnalysis,
    Recommendation,
    FollowUp,
    Summary,
}

impl StageType {
    /// Maps a free-form stage type onto the closed set.
    ///
    /// Accepts the legacy spellings `analysis` and `conclusion`; anything
    /// unrecognised becomes `InformationGathering`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "information_gathering" => StageType::InformationGathering,
            "problem_analysis" | "analysis" => StageType::ProblemAnalysis,
            "recommendation" => StageType::Recommendation,
            "follow_up" => StageType::FollowUp,
            "summary" | "conclusion" => StageType::Summary,
            _ => StageType::InformationGathering,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageType::InformationGathering => "information_gathering",
            StageType::ProblemAnalysis => "problem_analysis",
            StageType::Recommendation => "recommendation",
            StageType::FollowUp => "follow_up",
            StageType::Summary => "summary",
        }
    }
}

impl From<String> for StageType {
    fn from(raw: String) -> Self {
        StageType::normalize(&raw)
    }
}

impl From<StageType> for String {
    fn from(t: StageType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared shape of an expected output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputDataType {
    #[default]
    Text,
    Number,
    Boolean,
    List,
    Object,
}

impl fmt::Display for OutputDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputDataType::Text => "text",
            OutputDataType::Number => "number",
            OutputDataType::Boolean => "boolean",
            OutputDataType::List => "list",
            OutputDataType::Object => "object",
        };
        f.write_str(s)
    }
}

fn default_required() -> bool {
    true
}

/// A piece of information a stage aims to collect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedOutput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "type")]
    pub data_type: OutputDataType,
    #[serde(default = "default_required")]
    pub required: bool,
}

impl ExpectedOutput {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            data_type: OutputDataType::Text,
            required: true,
        }
    }

    pub fn with_data_type(mut self, data_type: OutputDataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// One step of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub stage_type: StageType,
    /// Seed question shown to the user when the stage opens.
    pub prompt_template: String,
    #[serde(default)]
    pub system_instructions: String,
    #[serde(default)]
    pub expected_outputs: Vec<ExpectedOutput>,
    /// Kept for template authors; advancement is always to the next stage in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_stage_conditions: Option<serde_json::Value>,
}

impl Stage {
    pub fn new(id: StageId, name: impl Into<String>, prompt_template: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            stage_type: StageType::default(),
            prompt_template: prompt_template.into(),
            system_instructions: String::new(),
            expected_outputs: Vec::new(),
            next_stage_conditions: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_stage_type(mut self, stage_type: StageType) -> Self {
        self.stage_type = stage_type;
        self
    }

    pub fn with_system_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.system_instructions = instructions.into();
        self
    }

    pub fn with_expected_output(mut self, output: ExpectedOutput) -> Self {
        self.expected_outputs.push(output);
        self
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Unvalidated template document, as authored in YAML or JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDefinition {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub initial_system_prompt: String,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

/// A validated, ordered consultation flow.
///
/// # Invariants
///
/// - at least one stage
/// - stage ids are unique within the template
/// - every stage has a non-empty seed question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TemplateDefinition")]
pub struct Template {
    id: TemplateId,
    name: String,
    description: String,
    domain: String,
    version: String,
    tags: Vec<String>,
    initial_system_prompt: String,
    stages: Vec<Stage>,
}

impl Template {
    /// Builds a template with the given stages.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if any invariant is violated
    pub fn new(
        id: TemplateId,
        name: impl Into<String>,
        domain: impl Into<String>,
        initial_system_prompt: impl Into<String>,
        stages: Vec<Stage>,
    ) -> Result<Self, DomainError> {
        Self::try_from(TemplateDefinition {
            id,
            name: name.into(),
            description: String::new(),
            domain: domain.into(),
            version: default_version(),
            tags: Vec::new(),
            initial_system_prompt: initial_system_prompt.into(),
            stages,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &TemplateId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn initial_system_prompt(&self) -> &str {
        &self.initial_system_prompt
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sequence navigation
    // ─────────────────────────────────────────────────────────────────────────

    /// The stage every new session starts on.
    pub fn first_stage(&self) -> &Stage {
        // Non-empty by construction.
        &self.stages[0]
    }

    pub fn stage(&self, id: &StageId) -> Option<&Stage> {
        self.stages.iter().find(|s| &s.id == id)
    }

    /// Zero-based position of a stage in the sequence.
    pub fn position_of(&self, id: &StageId) -> Option<usize> {
        self.stages.iter().position(|s| &s.id == id)
    }

    /// The stage following `id`, or `None` if `id` is last or unknown.
    pub fn next_stage_after(&self, id: &StageId) -> Option<&Stage> {
        self.position_of(id).and_then(|idx| self.stages.get(idx + 1))
    }

    pub fn is_last_stage(&self, id: &StageId) -> bool {
        self.position_of(id) == Some(self.stages.len() - 1)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Domain classification
    // ─────────────────────────────────────────────────────────────────────────

    /// True for health, medical and symptom-checker templates.
    pub fn is_health_domain(&self) -> bool {
        let domain = self.domain.to_lowercase();
        ["health", "medical", "symptom"]
            .iter()
            .any(|marker| domain.contains(marker))
    }

    /// True when the template is about healthcare or HIPAA compliance.
    pub fn is_healthcare(&self) -> bool {
        let haystacks = [
            self.name.to_lowercase(),
            self.domain.to_lowercase(),
            self.initial_system_prompt.to_lowercase(),
        ];
        haystacks
            .iter()
            .any(|h| h.contains("healthcare") || h.contains("hipaa"))
    }

    /// True when the template is SLA or healthcare tagged and so grounded
    /// against reference documents.
    pub fn wants_retrieval(&self) -> bool {
        let tagged = |s: &str| {
            let s = s.to_lowercase();
            s.contains("sla") || s.contains("healthcare")
        };
        tagged(&self.name) || tagged(&self.domain) || self.tags.iter().any(|t| tagged(t))
    }
}

impl TryFrom<TemplateDefinition> for Template {
    type Error = DomainError;

    fn try_from(def: TemplateDefinition) -> Result<Self, Self::Error> {
        if def.name.trim().is_empty() {
            return Err(DomainError::validation("name", "Template name cannot be empty"));
        }
        if def.stages.is_empty() {
            return Err(DomainError::validation(
                "stages",
                format!("Template '{}' must define at least one stage", def.id),
            ));
        }

        let mut seen = HashSet::new();
        for stage in &def.stages {
            if !seen.insert(&stage.id) {
                return Err(DomainError::new(
                    ErrorCode::ValidationFailed,
                    format!("Duplicate stage id '{}' in template '{}'", stage.id, def.id),
                )
                .with_detail("stage_id", stage.id.as_str()));
            }
            if stage.prompt_template.trim().is_empty() {
                return Err(DomainError::validation(
                    "prompt_template",
                    format!("Stage '{}' has an empty prompt template", stage.id),
                )
                .with_detail("stage_id", stage.id.as_str()));
            }
        }

        Ok(Self {
            id: def.id,
            name: def.name,
            description: def.description,
            domain: def.domain,
            version: def.version,
            tags: def.tags,
            initial_system_prompt: def.initial_system_prompt,
            stages: def.stages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(id: &str) -> Stage {
        Stage::new(StageId::new(id).unwrap(), id.to_uppercase(), format!("Tell me about {}", id))
            .with_expected_output(ExpectedOutput::new("detail", "Some detail"))
    }

    fn template(domain: &str, stage_ids: &[&str]) -> Template {
        Template::new(
            TemplateId::new("tpl").unwrap(),
            "Service Review",
            domain,
            "You are a consultant.",
            stage_ids.iter().map(|id| stage(id)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn stage_type_normalizes_legacy_names() {
        assert_eq!(StageType::normalize("analysis"), StageType::ProblemAnalysis);
        assert_eq!(StageType::normalize("conclusion"), StageType::Summary);
        assert_eq!(StageType::normalize("Follow-Up"), StageType::FollowUp);
        assert_eq!(StageType::normalize("brainstorm"), StageType::InformationGathering);
    }

    #[test]
    fn stage_type_deserializes_through_normalization() {
        let t: StageType = serde_json::from_str("\"conclusion\"").unwrap();
        assert_eq!(t, StageType::Summary);
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"summary\"");
    }

    #[test]
    fn expected_output_accepts_type_alias_and_defaults_required() {
        let out: ExpectedOutput =
            serde_json::from_str(r#"{"name":"uptime","type":"number"}"#).unwrap();
        assert_eq!(out.data_type, OutputDataType::Number);
        assert!(out.required);
    }

    #[test]
    fn rejects_template_without_stages() {
        let result = Template::new(TemplateId::new("t").unwrap(), "Empty", "", "", vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_duplicate_stage_ids() {
        let result = Template::new(
            TemplateId::new("t").unwrap(),
            "Dup",
            "",
            "",
            vec![stage("a"), stage("a")],
        );
        let err = result.unwrap_err();
        assert_eq!(err.details.get("stage_id"), Some(&"a".to_string()));
    }

    #[test]
    fn rejects_blank_seed_question() {
        let blank = Stage::new(StageId::new("a").unwrap(), "A", "  ");
        let result = Template::new(TemplateId::new("t").unwrap(), "Blank", "", "", vec![blank]);
        assert!(result.is_err());
    }

    #[test]
    fn navigates_sequence_in_order() {
        let t = template("it", &["intake", "analysis", "wrap"]);
        let intake = StageId::new("intake").unwrap();
        let wrap = StageId::new("wrap").unwrap();

        assert_eq!(t.first_stage().id, intake);
        assert_eq!(t.position_of(&wrap), Some(2));
        assert_eq!(t.next_stage_after(&intake).unwrap().id.as_str(), "analysis");
        assert!(t.next_stage_after(&wrap).is_none());
        assert!(t.is_last_stage(&wrap));
        assert!(!t.is_last_stage(&intake));
    }

    #[test]
    fn unknown_stage_has_no_position() {
        let t = template("it", &["intake"]);
        let ghost = StageId::new("ghost").unwrap();
        assert!(t.stage(&ghost).is_none());
        assert!(t.next_stage_after(&ghost).is_none());
        assert!(!t.is_last_stage(&ghost));
    }

    #[test]
    fn classifies_health_domains() {
        assert!(template("Healthcare", &["a"]).is_health_domain());
        assert!(template("medical triage", &["a"]).is_health_domain());
        assert!(template("symptom-checker", &["a"]).is_health_domain());
        assert!(!template("retail", &["a"]).is_health_domain());
    }

    #[test]
    fn retrieval_is_wanted_for_sla_templates() {
        let t = Template::new(
            TemplateId::new("t").unwrap(),
            "Cloud SLA Builder",
            "it",
            "",
            vec![stage("a")],
        )
        .unwrap();
        assert!(t.wants_retrieval());
        assert!(!template("retail", &["a"]).wants_retrieval());
    }

    #[test]
    fn deserializing_a_template_validates_it() {
        let json = r#"{"id":"t","name":"T","stages":[]}"#;
        assert!(serde_json::from_str::<Template>(json).is_err());

        let json = r#"{
            "id":"t","name":"T",
            "stages":[{"id":"s1","name":"S1","stage_type":"analysis","prompt_template":"Q?"}]
        }"#;
        let t: Template = serde_json::from_str(json).unwrap();
        assert_eq!(t.version(), "1.0");
        assert_eq!(t.first_stage().stage_type, StageType::ProblemAnalysis);
    }
}
