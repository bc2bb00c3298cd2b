mod rules;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{Applicant, Opportunity};
use super::lexicon::MatchLexicon;

/// Stateless deterministic scorer. Pure function of the applicant snapshot
/// and opportunity record; called only on opportunities that already passed
/// the eligibility gate.
pub struct RelevanceScorer<'a> {
    lexicon: &'a MatchLexicon,
}

impl<'a> RelevanceScorer<'a> {
    pub fn new(lexicon: &'a MatchLexicon) -> Self {
        Self { lexicon }
    }

    /// Score an opportunity on the seven weighted factors. The factor caps
    /// (20/25/15/10/15/10/5) sum to 100, so the total is in [0, 100] by
    /// construction with no cross-factor normalization.
    pub fn score(
        &self,
        applicant: &Applicant,
        opportunity: &Opportunity,
        today: NaiveDate,
    ) -> RelevanceAssessment {
        let entity = rules::entity_score(self.lexicon, applicant, opportunity);
        let industry = rules::industry_score(self.lexicon, applicant, opportunity);
        let geography = rules::geography_score(applicant, opportunity);
        let size = rules::size_score(self.lexicon, applicant, opportunity);
        let purpose = rules::purpose_score(self.lexicon, applicant, opportunity);
        let preferences = rules::preferences_score(applicant, opportunity, today);
        let quality = rules::quality_score(opportunity);

        let breakdown = ScoreBreakdown {
            entity: entity.points,
            industry: industry.points,
            geography: geography.points,
            size: size.points,
            purpose: purpose.points,
            preferences: preferences.points,
            quality: quality.points,
        };

        // Reasons surface in factor order; preferences and quality never
        // produce one.
        let mut reasons = Vec::new();
        let mut warnings = Vec::new();
        for factor in [entity, industry, geography, size, purpose, preferences, quality] {
            if let Some(reason) = factor.reason {
                reasons.push(reason);
            }
            if let Some(warning) = factor.warning {
                warnings.push(warning);
            }
        }

        RelevanceAssessment {
            total: breakdown.total(),
            breakdown,
            reasons,
            warnings,
        }
    }
}

/// Per-factor sub-scores. Each is bounded by its factor cap and the seven
/// always sum to the reported total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub entity: u8,
    pub industry: u8,
    pub geography: u8,
    pub size: u8,
    pub purpose: u8,
    pub preferences: u8,
    pub quality: u8,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u8 {
        self.entity
            + self.industry
            + self.geography
            + self.size
            + self.purpose
            + self.preferences
            + self.quality
    }
}

/// Scoring output: total, breakdown, ordered match reasons, and warnings.
/// Derived fresh on every call and never persisted; only enrichment is
/// cached, because deterministic scores are cheap and must always reflect
/// the current profile and opportunity state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceAssessment {
    pub total: u8,
    pub breakdown: ScoreBreakdown,
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
}
