use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::super::domain::{Opportunity, OpportunityId};
use super::EnrichmentRecord;

/// Default time-to-live for a cached enrichment.
pub const DEFAULT_TTL_DAYS: i64 = 7;

/// One persisted cache row, keyed uniquely by (applicant, opportunity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEnrichment {
    pub applicant_id: String,
    pub opportunity_id: OpportunityId,
    pub profile_version: u64,
    /// Opportunity `updated_at` at generation time; a drift is a miss.
    pub opportunity_updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub record: EnrichmentRecord,
}

/// Keyed persistence boundary for enrichment rows. Implementations must make
/// a single upsert atomic and last-write-wins per (applicant, opportunity)
/// key; no cross-row transaction is required.
pub trait EnrichmentStore: Send + Sync {
    fn fetch(
        &self,
        applicant_id: &str,
        opportunity_ids: &[OpportunityId],
    ) -> Result<Vec<CachedEnrichment>, StoreError>;
    fn upsert(&self, rows: Vec<CachedEnrichment>) -> Result<(), StoreError>;
    /// Hard-delete every row for an applicant (account resets, deletion).
    fn invalidate(&self, applicant_id: &str) -> Result<u64, StoreError>;
    /// Hard-delete expired rows across all applicants. Maintenance path.
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("enrichment store unavailable: {0}")]
    Unavailable(String),
}

/// Versioned, TTL-bound cache over an [`EnrichmentStore`]. A row is served
/// only if it is unexpired, was generated under the applicant's current
/// profile version, and the opportunity has not been modified since. A store
/// failure degrades to "everything is a miss" rather than surfacing.
pub struct EnrichmentCache<S: ?Sized> {
    store: Arc<S>,
    ttl: Duration,
}

impl<S: EnrichmentStore + ?Sized> EnrichmentCache<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            ttl: Duration::days(DEFAULT_TTL_DAYS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Return valid entries for the given opportunities. Version mismatches
    /// are misses, never stale hits: a profile change invalidates every
    /// cached enrichment for the applicant without a bulk delete.
    pub fn lookup(
        &self,
        applicant_id: &str,
        opportunities: &[&Opportunity],
        profile_version: u64,
        now: DateTime<Utc>,
    ) -> HashMap<OpportunityId, EnrichmentRecord> {
        let ids: Vec<OpportunityId> = opportunities
            .iter()
            .map(|opportunity| opportunity.id.clone())
            .collect();

        let rows = match self.store.fetch(applicant_id, &ids) {
            Ok(rows) => rows,
            Err(err) => {
                warn!(applicant_id, error = %err, "enrichment cache fetch failed, treating all as misses");
                return HashMap::new();
            }
        };

        let timestamps: HashMap<&OpportunityId, DateTime<Utc>> = opportunities
            .iter()
            .map(|opportunity| (&opportunity.id, opportunity.updated_at))
            .collect();

        let mut hits = HashMap::new();
        for row in rows {
            if row.expires_at <= now {
                continue;
            }
            if row.profile_version != profile_version {
                continue;
            }
            match timestamps.get(&row.opportunity_id) {
                Some(current) if *current == row.opportunity_updated_at => {
                    hits.insert(row.opportunity_id, row.record);
                }
                _ => {}
            }
        }
        debug!(
            applicant_id,
            requested = ids.len(),
            hits = hits.len(),
            "enrichment cache lookup"
        );
        hits
    }

    /// Upsert freshly generated records. Expiry is reset to `now + ttl` on
    /// every store, including overwrites. Failures are logged and swallowed;
    /// losing a write-back only costs a regeneration later.
    pub fn store(
        &self,
        applicant_id: &str,
        profile_version: u64,
        entries: Vec<(OpportunityId, DateTime<Utc>, EnrichmentRecord)>,
        now: DateTime<Utc>,
    ) {
        if entries.is_empty() {
            return;
        }
        let rows: Vec<CachedEnrichment> = entries
            .into_iter()
            .map(
                |(opportunity_id, opportunity_updated_at, record)| CachedEnrichment {
                    applicant_id: applicant_id.to_string(),
                    opportunity_id,
                    profile_version,
                    opportunity_updated_at,
                    expires_at: now + self.ttl,
                    record,
                },
            )
            .collect();

        if let Err(err) = self.store.upsert(rows) {
            warn!(applicant_id, error = %err, "enrichment cache write-back failed");
        }
    }

    /// Hard-delete every row for an applicant.
    pub fn invalidate(&self, applicant_id: &str) -> Result<u64, StoreError> {
        self.store.invalidate(applicant_id)
    }

    /// Delete expired rows everywhere. Not on the request path.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.store.purge_expired(now)
    }
}
