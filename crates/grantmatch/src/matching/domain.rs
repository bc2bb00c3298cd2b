use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for funding opportunities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpportunityId(pub String);

impl OpportunityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Legal form of the applying organization or person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Individual,
    Nonprofit,
    SmallBusiness,
    ForProfit,
    Educational,
    Government,
    Tribal,
}

impl EntityType {
    pub const fn label(self) -> &'static str {
        match self {
            EntityType::Individual => "individual",
            EntityType::Nonprofit => "nonprofit",
            EntityType::SmallBusiness => "small_business",
            EntityType::ForProfit => "for_profit",
            EntityType::Educational => "educational",
            EntityType::Government => "government",
            EntityType::Tribal => "tribal",
        }
    }
}

/// Organization head-count band captured during profile intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgSize {
    Solo,
    Small,
    Medium,
    Large,
}

/// Annual operating budget band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetBand {
    Micro,
    Small,
    Medium,
    Large,
}

/// Preferred award size, carrying a fixed numeric range for overlap checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingPreference {
    Any,
    Micro,
    Small,
    Medium,
    Large,
}

impl FundingPreference {
    /// Inclusive dollar range the preference maps to. `Any` has no range.
    pub fn range(self) -> Option<(u64, u64)> {
        match self {
            FundingPreference::Any => None,
            FundingPreference::Micro => Some((0, 10_000)),
            FundingPreference::Small => Some((10_000, 50_000)),
            FundingPreference::Medium => Some((50_000, 250_000)),
            FundingPreference::Large => Some((250_000, u64::MAX)),
        }
    }
}

/// How soon the applicant intends to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelinePreference {
    Immediate,
    Quarter,
    Flexible,
}

/// Applicant profile snapshot, immutable for the duration of one pipeline
/// run. The profile collaborator bumps `profile_version` on any edit that
/// could affect eligibility or scoring, which implicitly invalidates every
/// cached enrichment generated under an older version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub id: String,
    pub entity_type: Option<EntityType>,
    pub region: Option<String>,
    pub focus_areas: BTreeSet<String>,
    pub org_size: Option<OrgSize>,
    pub budget_band: Option<BudgetBand>,
    pub funding_preference: Option<FundingPreference>,
    pub timeline: Option<TimelinePreference>,
    pub goals: Vec<String>,
    pub profile_version: u64,
}

/// Geographic reach of a location constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    National,
    State,
    Local,
}

/// A single location constraint carried by an opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationConstraint {
    pub kind: LocationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// Normalized funding-program record. Read-only input to the pipeline; owned
/// and mutated by the upstream ingestion collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: OpportunityId,
    pub title: String,
    pub sponsor: String,
    pub summary: String,
    pub categories: Vec<String>,
    pub eligibility_tags: Vec<String>,
    pub locations: Vec<LocationConstraint>,
    pub funding_min: Option<u64>,
    pub funding_max: Option<u64>,
    pub deadline: Option<NaiveDate>,
    pub purpose_tags: Vec<String>,
    /// Data-quality score in [0, 1] assigned by the ingestion collaborator.
    pub quality_score: Option<f32>,
    pub application_url: String,
    pub updated_at: DateTime<Utc>,
}

impl Opportunity {
    /// Midpoint of the declared funding range, when any bound is known.
    pub fn funding_midpoint(&self) -> Option<u64> {
        match (self.funding_min, self.funding_max) {
            (Some(min), Some(max)) => Some(min / 2 + max / 2 + (min % 2 + max % 2) / 2),
            (Some(min), None) => Some(min),
            (None, Some(max)) => Some(max),
            (None, None) => None,
        }
    }
}

/// Pass/fail outcome of the eligibility gate. The first failing check wins;
/// reasons are never accumulated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityVerdict {
    pub passes: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EligibilityVerdict {
    pub fn pass() -> Self {
        Self {
            passes: true,
            reason: None,
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            passes: false,
            reason: Some(reason.into()),
        }
    }
}

/// Final ordering applied by the ranker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    BestMatch,
    DeadlineSoon,
    HighestFunding,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::BestMatch
    }
}

/// Caller-facing options for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct MatchOptions {
    /// Maximum rows returned after sorting.
    pub limit: usize,
    /// Deterministic-score floor applied after scoring; 0 disables it.
    pub min_score: u8,
    pub sort: SortOrder,
    pub use_cache: bool,
    pub use_ai: bool,
    /// When false, the application-URL eligibility check is skipped.
    pub require_application_url: bool,
    /// Run-scoped deadline for the enrichment stage. Exceeding it degrades
    /// unresolved opportunities to fallback records; it never fails the run.
    pub run_deadline: Option<Duration>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            min_score: 40,
            sort: SortOrder::BestMatch,
            use_cache: true,
            use_ai: true,
            require_application_url: true,
            run_deadline: None,
        }
    }
}
