//! The relevance/discovery pipeline: eligibility filtering, deterministic
//! scoring, enrichment caching and generation, and score fusion into a
//! ranked result set.

pub mod domain;
pub(crate) mod eligibility;
pub mod enrichment;
pub mod lexicon;
pub mod normalize;
pub mod pipeline;
pub mod ranking;
pub mod router;
pub mod scoring;

#[cfg(test)]
mod tests;

pub use domain::{
    Applicant, BudgetBand, EligibilityVerdict, EntityType, FundingPreference, LocationConstraint,
    LocationKind, MatchOptions, Opportunity, OpportunityId, OrgSize, SortOrder,
    TimelinePreference,
};
pub use eligibility::EligibilityFilter;
pub use enrichment::{
    CachedEnrichment, Confidence, EnrichmentCache, EnrichmentFetcher, EnrichmentGenerator,
    EnrichmentRecord, EnrichmentStore, GeneratorError, OpenAiGenerator, RawEnrichment,
    RetryPolicy, StoreError, Urgency,
};
pub use lexicon::MatchLexicon;
pub use normalize::{normalize_applicant, normalize_opportunities, NormalizeWarning};
pub use pipeline::{DiscoveryPipeline, DiscoveryReport, PipelineError, StageStats, StageTimings};
pub use ranking::{RankedResult, ScoreHistogram, Tier};
pub use router::{discovery_router, MatchOptionsPayload, MatchRequest, MatchResponse};
pub use scoring::{RelevanceAssessment, RelevanceScorer, ScoreBreakdown};
