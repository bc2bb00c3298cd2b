use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::super::domain::{Applicant, Opportunity, OpportunityId};
use super::super::lexicon::{contains_ci, MatchLexicon};
use super::generator::{EnrichmentGenerator, GeneratorError, RawEnrichment};
use super::EnrichmentRecord;

/// Opportunities per generation call.
pub const DEFAULT_BATCH_SIZE: usize = 30;
/// Opportunities whose maximum award is below this are not worth an AI call.
const FUNDING_FLOOR: u64 = 1_000;
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounded-retry policy with exponential backoff. Kept as an explicit object
/// so the schedule is testable without a live generator.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retrying after `attempt` (zero-based): base * 2^attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Result of one fetch stage. Every requested opportunity has a record in
/// `records`; only validated generator output appears in `generated` (the
/// cacheable subset).
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: HashMap<OpportunityId, EnrichmentRecord>,
    pub generated: Vec<(OpportunityId, DateTime<Utc>, EnrichmentRecord)>,
    pub prefiltered: usize,
    pub fallbacks: usize,
    pub degraded: bool,
}

/// Requests enrichment for cache misses in sequential bounded batches,
/// validating and repairing the collaborator's output. Generation failures
/// never propagate: after retries are exhausted, every unresolved
/// opportunity gets a fallback record.
pub struct EnrichmentFetcher<G: ?Sized> {
    generator: Arc<G>,
    retry: RetryPolicy,
    batch_size: usize,
    attempt_timeout: Duration,
}

impl<G: EnrichmentGenerator + ?Sized> EnrichmentFetcher<G> {
    pub fn new(generator: Arc<G>) -> Self {
        Self {
            generator,
            retry: RetryPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Whether an opportunity is worth a generation call at all.
    fn usable(&self, lexicon: &MatchLexicon, opportunity: &Opportunity) -> bool {
        if let Some(max) = opportunity.funding_max {
            if max < FUNDING_FLOOR {
                return false;
            }
        }
        let text = format!(
            "{} {} {}",
            opportunity.title, opportunity.sponsor, opportunity.summary
        );
        !lexicon
            .reject_keywords()
            .iter()
            .any(|keyword| contains_ci(&text, keyword))
    }

    /// Fetch enrichment for the given cache misses. `deadline`, when set, is
    /// the run-scoped cutoff: once passed, outstanding work is abandoned and
    /// the remaining opportunities fall back instead of failing the run.
    pub async fn fetch(
        &self,
        lexicon: &MatchLexicon,
        applicant: &Applicant,
        uncached: &[&Opportunity],
        deadline: Option<Instant>,
    ) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();

        let mut candidates: Vec<&Opportunity> = Vec::with_capacity(uncached.len());
        for opportunity in uncached {
            if self.usable(lexicon, opportunity) {
                candidates.push(opportunity);
            } else {
                outcome.prefiltered += 1;
                outcome
                    .records
                    .insert(opportunity.id.clone(), EnrichmentRecord::fallback());
            }
        }
        if outcome.prefiltered > 0 {
            debug!(
                prefiltered = outcome.prefiltered,
                "opportunities excluded from generation by prefilter"
            );
        }

        let updated_at: HashMap<&OpportunityId, DateTime<Utc>> = candidates
            .iter()
            .map(|opportunity| (&opportunity.id, opportunity.updated_at))
            .collect();

        for batch in candidates.chunks(self.batch_size) {
            if deadline.is_some_and(|cutoff| Instant::now() >= cutoff) {
                warn!(
                    remaining = batch.len(),
                    "run deadline reached, falling back for unresolved opportunities"
                );
                outcome.degraded = true;
                self.fall_back(batch, &mut outcome);
                continue;
            }

            if !self.fetch_batch(applicant, batch, deadline, &updated_at, &mut outcome).await {
                outcome.degraded = true;
                self.fall_back(batch, &mut outcome);
            }
        }

        info!(
            requested = uncached.len(),
            generated = outcome.generated.len(),
            fallbacks = outcome.fallbacks,
            prefiltered = outcome.prefiltered,
            degraded = outcome.degraded,
            "enrichment fetch complete"
        );
        outcome
    }

    /// Run one batch through the retry loop. Returns false when the batch
    /// could not be resolved at all and must fall back wholesale.
    async fn fetch_batch(
        &self,
        applicant: &Applicant,
        batch: &[&Opportunity],
        deadline: Option<Instant>,
        updated_at: &HashMap<&OpportunityId, DateTime<Utc>>,
        outcome: &mut FetchOutcome,
    ) -> bool {
        for attempt in 0..self.retry.max_attempts {
            let mut timeout = self.attempt_timeout;
            if let Some(cutoff) = deadline {
                let remaining = cutoff.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return false;
                }
                timeout = timeout.min(remaining);
            }

            let result =
                tokio::time::timeout(timeout, self.generator.generate(applicant, batch)).await;

            let error = match result {
                Ok(Ok(raws)) => {
                    self.absorb(batch, raws, updated_at, outcome);
                    return true;
                }
                Ok(Err(err)) => err,
                Err(_elapsed) => GeneratorError::Transport("attempt timed out".to_string()),
            };

            let retryable = error.is_transient() && attempt + 1 < self.retry.max_attempts;
            warn!(
                attempt = attempt + 1,
                max_attempts = self.retry.max_attempts,
                error = %error,
                retrying = retryable,
                "enrichment generation attempt failed"
            );
            if !retryable {
                return false;
            }
            tokio::time::sleep(self.retry.delay(attempt)).await;
        }
        false
    }

    /// Validate a batch response. Requested opportunities missing from the
    /// response, and records failing validation, are replaced by fallbacks;
    /// only validated records become cacheable.
    fn absorb(
        &self,
        batch: &[&Opportunity],
        raws: Vec<RawEnrichment>,
        updated_at: &HashMap<&OpportunityId, DateTime<Utc>>,
        outcome: &mut FetchOutcome,
    ) {
        let mut validated: HashMap<OpportunityId, EnrichmentRecord> = HashMap::new();
        for raw in raws {
            if let Some((id, record)) = EnrichmentRecord::validate(raw) {
                if updated_at.contains_key(&id) {
                    validated.insert(id, record);
                }
            }
        }

        for opportunity in batch {
            match validated.remove(&opportunity.id) {
                Some(record) => {
                    outcome.generated.push((
                        opportunity.id.clone(),
                        updated_at[&opportunity.id],
                        record.clone(),
                    ));
                    outcome.records.insert(opportunity.id.clone(), record);
                }
                None => {
                    outcome.fallbacks += 1;
                    outcome
                        .records
                        .insert(opportunity.id.clone(), EnrichmentRecord::fallback());
                }
            }
        }
    }

    fn fall_back(&self, batch: &[&Opportunity], outcome: &mut FetchOutcome) {
        for opportunity in batch {
            outcome.fallbacks += 1;
            outcome
                .records
                .insert(opportunity.id.clone(), EnrichmentRecord::fallback());
        }
    }
}
