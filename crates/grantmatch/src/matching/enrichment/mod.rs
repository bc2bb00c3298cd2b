mod cache;
mod fetcher;
mod generator;
mod openai;

pub use cache::{CachedEnrichment, EnrichmentCache, EnrichmentStore, StoreError, DEFAULT_TTL_DAYS};
pub use fetcher::{EnrichmentFetcher, FetchOutcome, RetryPolicy, DEFAULT_BATCH_SIZE};
pub use generator::{EnrichmentGenerator, GeneratorError, RawEnrichment};
pub use openai::OpenAiGenerator;

use serde::{Deserialize, Serialize};

use super::domain::OpportunityId;

/// Confidence the generation collaborator assigns to its own assessment.
/// Low-confidence records are excluded from score fusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    fn from_str(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Confidence::Low),
            "medium" => Some(Confidence::Medium),
            "high" => Some(Confidence::High),
            _ => None,
        }
    }
}

/// How urgently the applicant should act on the opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Urgency {
    fn from_str(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Urgency::Low),
            "medium" | "normal" => Some(Urgency::Medium),
            "high" | "urgent" => Some(Urgency::High),
            _ => None,
        }
    }
}

/// AI-generated explanatory content layered on top of the deterministic
/// score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    pub match_score: u8,
    pub confidence: Confidence,
    pub fit_summary: String,
    pub reasons: Vec<String>,
    pub concerns: Vec<String>,
    pub next_steps: Vec<String>,
    pub fundable_uses: Vec<String>,
    pub urgency: Urgency,
}

impl EnrichmentRecord {
    /// Deterministic substitute used whenever generation fails or returns an
    /// unusable record. Neutral score, low confidence (so fusion ignores it),
    /// generic next steps. Fallback records are never cached, so a later run
    /// gets another chance at real enrichment.
    pub fn fallback() -> Self {
        Self {
            match_score: 50,
            confidence: Confidence::Low,
            fit_summary: "Automated fit analysis was unavailable for this opportunity."
                .to_string(),
            reasons: Vec::new(),
            concerns: Vec::new(),
            next_steps: vec![
                "Review the opportunity listing directly".to_string(),
                "Confirm eligibility requirements with the sponsor".to_string(),
            ],
            fundable_uses: Vec::new(),
            urgency: Urgency::Medium,
        }
    }

    /// Validate a loosely-shaped generator record. Records without a usable
    /// id, an in-range score, or a recognizable confidence are rejected and
    /// the caller substitutes a fallback.
    pub fn validate(raw: RawEnrichment) -> Option<(OpportunityId, Self)> {
        let id = raw.opportunity_id?.trim().to_string();
        if id.is_empty() {
            return None;
        }
        let score = raw.match_score?;
        if !(0.0..=100.0).contains(&score) {
            return None;
        }
        let confidence = match raw.confidence {
            Some(ref raw_confidence) => Confidence::from_str(raw_confidence)?,
            None => Confidence::Medium,
        };
        let urgency = raw
            .urgency
            .as_deref()
            .and_then(Urgency::from_str)
            .unwrap_or(Urgency::Medium);

        Some((
            OpportunityId(id),
            Self {
                match_score: score.round() as u8,
                confidence,
                fit_summary: raw.fit_summary.unwrap_or_default(),
                reasons: raw.reasons,
                concerns: raw.concerns,
                next_steps: raw.next_steps,
                fundable_uses: raw.fundable_uses,
                urgency,
            },
        ))
    }
}
