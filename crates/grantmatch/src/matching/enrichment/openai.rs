use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::EnrichmentConfig;

use super::super::domain::{Applicant, Opportunity};
use super::generator::{
    strip_code_blocks, truncate_to_char_boundary, EnrichmentGenerator, GeneratorError,
    RawEnrichment,
};

const SUMMARY_PROMPT_BYTES: usize = 600;

/// Chat-completions client for any OpenAI-compatible backend. One request
/// covers one batch; the response contract is a bare JSON array of
/// enrichment records.
pub struct OpenAiGenerator {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }

    pub fn from_config(config: &EnrichmentConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(
            Self::new(api_key)
                .with_base_url(&config.base_url)
                .with_model(&config.model),
        )
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap, GeneratorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|err| GeneratorError::Transport(err.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn build_prompt(applicant: &Applicant, batch: &[&Opportunity]) -> String {
        let focus: Vec<&str> = applicant.focus_areas.iter().map(String::as_str).collect();
        let mut prompt = format!(
            "Applicant profile:\n- entity type: {}\n- region: {}\n- focus areas: {}\n- goals: {}\n\nOpportunities:\n",
            applicant
                .entity_type
                .map(|entity| entity.label())
                .unwrap_or("undeclared"),
            applicant.region.as_deref().unwrap_or("unspecified"),
            if focus.is_empty() { "none".to_string() } else { focus.join(", ") },
            if applicant.goals.is_empty() {
                "none".to_string()
            } else {
                applicant.goals.join(", ")
            },
        );

        for opportunity in batch {
            prompt.push_str(&format!(
                "- id: {}\n  title: {}\n  sponsor: {}\n  funding: {:?}-{:?}\n  deadline: {:?}\n  summary: {}\n",
                opportunity.id.as_str(),
                opportunity.title,
                opportunity.sponsor,
                opportunity.funding_min,
                opportunity.funding_max,
                opportunity.deadline,
                truncate_to_char_boundary(&opportunity.summary, SUMMARY_PROMPT_BYTES),
            ));
        }

        prompt.push_str(
            "\nFor every opportunity id above, return one JSON object with fields: \
             opportunity_id, match_score (0-100), confidence (low|medium|high), \
             fit_summary (one line), reasons, concerns, next_steps, fundable_uses \
             (string arrays), urgency (low|medium|high). Respond with a JSON array \
             only, no prose.",
        );
        prompt
    }
}

#[async_trait]
impl EnrichmentGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        applicant: &Applicant,
        batch: &[&Opportunity],
    ) -> Result<Vec<RawEnrichment>, GeneratorError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You assess how well funding opportunities fit a grant applicant. \
                              You respond with strict JSON."
                        .to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::build_prompt(applicant, batch),
                },
            ],
            temperature: 0.2,
        };

        debug!(model = %self.model, batch = batch.len(), "enrichment chat request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await
            .map_err(|err| GeneratorError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Transport(format!(
                "chat completion failed ({status}): {body}"
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|err| GeneratorError::Malformed(err.to_string()))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GeneratorError::Empty)?;

        let stripped = strip_code_blocks(&content);
        if stripped.is_empty() {
            return Err(GeneratorError::Empty);
        }

        let values: Vec<Value> = serde_json::from_str(stripped)
            .map_err(|err| GeneratorError::Malformed(err.to_string()))?;

        // Per-record leniency: a single mangled object costs one fallback,
        // not the whole batch.
        let mut records = Vec::with_capacity(values.len());
        for value in values {
            match serde_json::from_value::<RawEnrichment>(value) {
                Ok(record) => records.push(record),
                Err(err) => warn!(error = %err, "dropping malformed enrichment record"),
            }
        }
        Ok(records)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
