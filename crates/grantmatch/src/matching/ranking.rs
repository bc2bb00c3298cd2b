use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{Opportunity, SortOrder};
use super::enrichment::{Confidence, EnrichmentRecord, Urgency};
use super::scoring::ScoreBreakdown;

/// Quality band derived from the combined score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Excellent,
    Good,
    Fair,
    LongShot,
}

impl Tier {
    pub fn for_score(combined: u8) -> Self {
        match combined {
            80.. => Tier::Excellent,
            60..=79 => Tier::Good,
            40..=59 => Tier::Fair,
            _ => Tier::LongShot,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Tier::Excellent => "excellent",
            Tier::Good => "good",
            Tier::Fair => "fair",
            Tier::LongShot => "long_shot",
        }
    }
}

/// Final display row. Constructed once per pipeline run and never persisted;
/// a view, not a record of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub opportunity_id: String,
    pub title: String,
    pub sponsor: String,
    pub application_url: String,
    pub deadline: Option<NaiveDate>,
    pub funding_min: Option<u64>,
    pub funding_max: Option<u64>,
    pub deterministic_score: u8,
    pub enrichment_score: Option<u8>,
    pub combined_score: u8,
    pub tier: Tier,
    pub from_cache: bool,
    pub breakdown: ScoreBreakdown,
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
    pub fit_summary: Option<String>,
    pub concerns: Vec<String>,
    pub next_steps: Vec<String>,
    pub fundable_uses: Vec<String>,
    pub urgency: Option<Urgency>,
    pub confidence: Option<Confidence>,
}

/// Enrichment term entering the fusion. Low-confidence enrichment is
/// replaced by the deterministic score, so an unreliable AI score can
/// neither drag down nor inflate the ranking.
pub(crate) fn effective_enrichment(deterministic: u8, enrichment: &EnrichmentRecord) -> u8 {
    if enrichment.confidence == Confidence::Low {
        deterministic
    } else {
        enrichment.match_score
    }
}

/// Fixed-weight fusion: 0.6 deterministic, 0.4 enrichment, rounded.
pub(crate) fn combine(deterministic: u8, effective: u8) -> u8 {
    (f64::from(deterministic) * 0.6 + f64::from(effective) * 0.4).round() as u8
}

/// Build the display row for one scored-and-enriched opportunity.
pub(crate) fn build_result(
    opportunity: &Opportunity,
    deterministic: u8,
    breakdown: ScoreBreakdown,
    reasons: Vec<String>,
    warnings: Vec<String>,
    enrichment: Option<&EnrichmentRecord>,
    from_cache: bool,
) -> RankedResult {
    let combined = match enrichment {
        Some(record) => combine(deterministic, effective_enrichment(deterministic, record)),
        None => deterministic,
    };

    RankedResult {
        opportunity_id: opportunity.id.as_str().to_string(),
        title: opportunity.title.clone(),
        sponsor: opportunity.sponsor.clone(),
        application_url: opportunity.application_url.clone(),
        deadline: opportunity.deadline,
        funding_min: opportunity.funding_min,
        funding_max: opportunity.funding_max,
        deterministic_score: deterministic,
        enrichment_score: enrichment.map(|record| record.match_score),
        combined_score: combined,
        tier: Tier::for_score(combined),
        from_cache,
        breakdown,
        reasons,
        warnings,
        fit_summary: enrichment
            .map(|record| record.fit_summary.clone())
            .filter(|summary| !summary.is_empty()),
        concerns: enrichment.map(|record| record.concerns.clone()).unwrap_or_default(),
        next_steps: enrichment
            .map(|record| record.next_steps.clone())
            .unwrap_or_default(),
        fundable_uses: enrichment
            .map(|record| record.fundable_uses.clone())
            .unwrap_or_default(),
        urgency: enrichment.map(|record| record.urgency),
        confidence: enrichment.map(|record| record.confidence),
    }
}

/// Sort by the selected criterion and truncate to the caller's limit after
/// sorting. All sorts are stable, so ties keep insertion order.
pub(crate) fn rank(mut rows: Vec<RankedResult>, sort: SortOrder, limit: usize) -> Vec<RankedResult> {
    match sort {
        SortOrder::BestMatch => {
            rows.sort_by(|a, b| b.combined_score.cmp(&a.combined_score));
        }
        SortOrder::DeadlineSoon => {
            // Missing deadlines sort as infinitely far away.
            rows.sort_by(|a, b| match (a.deadline, b.deadline) {
                (Some(a_date), Some(b_date)) => a_date.cmp(&b_date),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
        }
        SortOrder::HighestFunding => {
            rows.sort_by(|a, b| {
                b.funding_max
                    .unwrap_or(0)
                    .cmp(&a.funding_max.unwrap_or(0))
            });
        }
    }
    rows.truncate(limit);
    rows
}

/// Decadal score-distribution histogram for observability; the 90 bucket
/// also holds the perfect 100.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreHistogram {
    pub buckets: [u32; 10],
}

impl ScoreHistogram {
    pub fn record(&mut self, score: u8) {
        let bucket = usize::from(score / 10).min(9);
        self.buckets[bucket] += 1;
    }
}
