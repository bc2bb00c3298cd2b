use async_trait::async_trait;
use serde::Deserialize;

use super::super::domain::{Applicant, Opportunity};

/// Seam to the external text-generation collaborator. One call covers one
/// bounded batch of opportunities plus the applicant context and returns
/// best-effort, loosely-shaped records; the fetcher validates and repairs
/// them. Implementations must never be relied on for availability.
#[async_trait]
pub trait EnrichmentGenerator: Send + Sync {
    async fn generate(
        &self,
        applicant: &Applicant,
        batch: &[&Opportunity],
    ) -> Result<Vec<RawEnrichment>, GeneratorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("generation backend disabled: {0}")]
    Disabled(String),
    #[error("generation transport failure: {0}")]
    Transport(String),
    #[error("generation returned an empty response")]
    Empty,
    #[error("generation response unparsable: {0}")]
    Malformed(String),
}

impl GeneratorError {
    /// Whether a retry with backoff could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, GeneratorError::Disabled(_))
    }
}

/// Unvalidated per-opportunity record as returned by the collaborator.
/// Every field is optional or defaulted; [`EnrichmentRecord::validate`]
/// decides what is usable.
///
/// [`EnrichmentRecord::validate`]: super::EnrichmentRecord::validate
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEnrichment {
    #[serde(default, alias = "opportunityId", alias = "id")]
    pub opportunity_id: Option<String>,
    #[serde(default, alias = "matchScore", alias = "score")]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default, alias = "fitSummary", alias = "summary")]
    pub fit_summary: Option<String>,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default, alias = "nextSteps")]
    pub next_steps: Vec<String>,
    #[serde(default, alias = "fundableUses")]
    pub fundable_uses: Vec<String>,
    #[serde(default)]
    pub urgency: Option<String>,
}

/// Strip markdown code fences from a model response.
pub(crate) fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Truncate to at most `max_bytes` at a character boundary, for prompt
/// assembly over long summaries.
pub(crate) fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &s[..end]
}
