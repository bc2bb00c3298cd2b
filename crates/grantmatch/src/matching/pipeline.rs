use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{Applicant, MatchOptions, Opportunity};
use super::eligibility::EligibilityFilter;
use super::enrichment::{
    EnrichmentCache, EnrichmentFetcher, EnrichmentGenerator, EnrichmentRecord, EnrichmentStore,
    RetryPolicy,
};
use super::lexicon::MatchLexicon;
use super::ranking::{self, RankedResult, ScoreHistogram};
use super::scoring::{RelevanceAssessment, RelevanceScorer};

/// Deterministic scores are cheap, generation is not: after the min-score
/// filter the survivor set is capped to this many top-scored opportunities
/// before the enrichment stage (or to the caller's limit, if larger).
const SCORED_POOL_CAP: usize = 50;

/// Signaled only for invocation-level misuse. Collaborator failures are
/// absorbed by the stages and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

/// Per-stage counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStats {
    pub fetched: usize,
    pub skipped_records: usize,
    pub survived_eligibility: usize,
    pub survived_scoring: usize,
    pub served_from_cache: usize,
    pub served_from_generation: usize,
    pub fallbacks: usize,
    pub prefiltered: usize,
    pub generation_degraded: bool,
}

/// Per-stage elapsed milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    pub eligibility_ms: u64,
    pub scoring_ms: u64,
    pub enrichment_ms: u64,
    pub ranking_ms: u64,
    pub total_ms: u64,
}

/// Output of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub results: Vec<RankedResult>,
    pub stats: StageStats,
    pub timings: StageTimings,
    pub histogram: ScoreHistogram,
}

impl DiscoveryReport {
    fn empty(stats: StageStats, timings: StageTimings) -> Self {
        Self {
            results: Vec::new(),
            stats,
            timings,
            histogram: ScoreHistogram::default(),
        }
    }
}

/// Sequences the discovery stages: eligibility, deterministic scoring, cache
/// lookup, enrichment fetch, fusion, and ranking. All collaborators are
/// injected so the pipeline can run against fakes.
pub struct DiscoveryPipeline<S: ?Sized, G: ?Sized> {
    lexicon: MatchLexicon,
    cache: EnrichmentCache<S>,
    fetcher: EnrichmentFetcher<G>,
}

impl<S, G> DiscoveryPipeline<S, G>
where
    S: EnrichmentStore + ?Sized,
    G: EnrichmentGenerator + ?Sized,
{
    pub fn new(store: Arc<S>, generator: Arc<G>) -> Self {
        Self {
            lexicon: MatchLexicon::standard(),
            cache: EnrichmentCache::new(store),
            fetcher: EnrichmentFetcher::new(generator),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.fetcher = self.fetcher.with_retry(retry);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.fetcher = self.fetcher.with_batch_size(batch_size);
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.fetcher = self.fetcher.with_attempt_timeout(timeout);
        self
    }

    /// Cache handle for maintenance callers (invalidate, sweep).
    pub fn cache(&self) -> &EnrichmentCache<S> {
        &self.cache
    }

    pub async fn run(
        &self,
        applicant: &Applicant,
        opportunities: Vec<Opportunity>,
        options: &MatchOptions,
    ) -> Result<DiscoveryReport, PipelineError> {
        if options.limit == 0 {
            return Err(PipelineError::InvalidOptions(
                "limit must be at least 1".to_string(),
            ));
        }
        if options.min_score > 100 {
            return Err(PipelineError::InvalidOptions(
                "min_score cannot exceed 100".to_string(),
            ));
        }

        let run_start = Instant::now();
        let deadline = options.run_deadline.map(|budget| run_start + budget);
        let mut stats = StageStats {
            fetched: opportunities.len(),
            ..StageStats::default()
        };
        let mut timings = StageTimings::default();

        // Stage 1: eligibility gate.
        let stage_start = Instant::now();
        let filter = EligibilityFilter::new(&self.lexicon, options.require_application_url);
        let eligible: Vec<Opportunity> = opportunities
            .into_iter()
            .filter(|opportunity| filter.evaluate(applicant, opportunity).passes)
            .collect();
        stats.survived_eligibility = eligible.len();
        timings.eligibility_ms = stage_start.elapsed().as_millis() as u64;

        if eligible.is_empty() {
            info!(
                applicant_id = %applicant.id,
                fetched = stats.fetched,
                "no opportunities survived eligibility"
            );
            timings.total_ms = run_start.elapsed().as_millis() as u64;
            return Ok(DiscoveryReport::empty(stats, timings));
        }

        // Stage 2: deterministic scoring, min-score floor, pool cap.
        let stage_start = Instant::now();
        let scorer = RelevanceScorer::new(&self.lexicon);
        let today = Utc::now().date_naive();
        let mut scored: Vec<(Opportunity, RelevanceAssessment)> = eligible
            .into_iter()
            .filter_map(|opportunity| {
                let assessment = scorer.score(applicant, &opportunity, today);
                (assessment.total >= options.min_score).then_some((opportunity, assessment))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total.cmp(&a.1.total));
        scored.truncate(options.limit.max(SCORED_POOL_CAP));
        stats.survived_scoring = scored.len();
        timings.scoring_ms = stage_start.elapsed().as_millis() as u64;

        if scored.is_empty() {
            info!(
                applicant_id = %applicant.id,
                min_score = options.min_score,
                "no opportunities survived the minimum score"
            );
            timings.total_ms = run_start.elapsed().as_millis() as u64;
            return Ok(DiscoveryReport::empty(stats, timings));
        }

        // Stages 3-4: cache lookup, then generation for the misses.
        let stage_start = Instant::now();
        let now = Utc::now();
        let mut cached: HashMap<_, EnrichmentRecord> = HashMap::new();
        let mut fetched: HashMap<_, EnrichmentRecord> = HashMap::new();

        if options.use_ai {
            let survivors: Vec<&Opportunity> =
                scored.iter().map(|(opportunity, _)| opportunity).collect();

            if options.use_cache {
                cached = self.cache.lookup(
                    &applicant.id,
                    &survivors,
                    applicant.profile_version,
                    now,
                );
            }
            stats.served_from_cache = cached.len();

            let uncached: Vec<&Opportunity> = survivors
                .iter()
                .copied()
                .filter(|opportunity| !cached.contains_key(&opportunity.id))
                .collect();

            if !uncached.is_empty() {
                let outcome = self
                    .fetcher
                    .fetch(&self.lexicon, applicant, &uncached, deadline)
                    .await;
                stats.served_from_generation = outcome.generated.len();
                stats.fallbacks = outcome.fallbacks + outcome.prefiltered;
                stats.prefiltered = outcome.prefiltered;
                stats.generation_degraded = outcome.degraded;

                if options.use_cache {
                    self.cache.store(
                        &applicant.id,
                        applicant.profile_version,
                        outcome.generated,
                        now,
                    );
                }
                fetched = outcome.records;
            }
        }
        timings.enrichment_ms = stage_start.elapsed().as_millis() as u64;

        // Stage 5: fusion and ranking.
        let stage_start = Instant::now();
        let mut histogram = ScoreHistogram::default();
        let rows: Vec<RankedResult> = scored
            .into_iter()
            .map(|(opportunity, assessment)| {
                let (enrichment, from_cache) = match cached.get(&opportunity.id) {
                    Some(record) => (Some(record), true),
                    None => (fetched.get(&opportunity.id), false),
                };
                let row = ranking::build_result(
                    &opportunity,
                    assessment.total,
                    assessment.breakdown,
                    assessment.reasons,
                    assessment.warnings,
                    enrichment,
                    from_cache,
                );
                histogram.record(row.combined_score);
                row
            })
            .collect();

        let results = ranking::rank(rows, options.sort, options.limit);
        timings.ranking_ms = stage_start.elapsed().as_millis() as u64;
        timings.total_ms = run_start.elapsed().as_millis() as u64;

        debug!(
            applicant_id = %applicant.id,
            results = results.len(),
            total_ms = timings.total_ms,
            "discovery run complete"
        );

        Ok(DiscoveryReport {
            results,
            stats,
            timings,
            histogram,
        })
    }
}
