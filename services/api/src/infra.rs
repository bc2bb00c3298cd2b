use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grantmatch::matching::{
    Applicant, CachedEnrichment, EnrichmentGenerator, EnrichmentStore, GeneratorError,
    Opportunity, OpportunityId, RawEnrichment, SortOrder, StoreError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local enrichment store keyed by (applicant, opportunity).
/// A durable deployment swaps this for a database-backed implementation of
/// the same trait.
#[derive(Default)]
pub(crate) struct InMemoryEnrichmentStore {
    rows: Mutex<HashMap<(String, String), CachedEnrichment>>,
}

impl EnrichmentStore for InMemoryEnrichmentStore {
    fn fetch(
        &self,
        applicant_id: &str,
        opportunity_ids: &[OpportunityId],
    ) -> Result<Vec<CachedEnrichment>, StoreError> {
        let rows = self.rows.lock().expect("store mutex poisoned");
        Ok(opportunity_ids
            .iter()
            .filter_map(|id| {
                rows.get(&(applicant_id.to_string(), id.as_str().to_string()))
                    .cloned()
            })
            .collect())
    }

    fn upsert(&self, new_rows: Vec<CachedEnrichment>) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().expect("store mutex poisoned");
        for row in new_rows {
            rows.insert(
                (
                    row.applicant_id.clone(),
                    row.opportunity_id.as_str().to_string(),
                ),
                row,
            );
        }
        Ok(())
    }

    fn invalidate(&self, applicant_id: &str) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock().expect("store mutex poisoned");
        let before = rows.len();
        rows.retain(|(owner, _), _| owner != applicant_id);
        Ok((before - rows.len()) as u64)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock().expect("store mutex poisoned");
        let before = rows.len();
        rows.retain(|_, row| row.expires_at > now);
        Ok((before - rows.len()) as u64)
    }
}

/// Generator used when no API key is configured. Every batch fails with a
/// non-retryable error, so the pipeline serves fallback records immediately.
pub(crate) struct DisabledGenerator;

#[async_trait]
impl EnrichmentGenerator for DisabledGenerator {
    async fn generate(
        &self,
        _applicant: &Applicant,
        _batch: &[&Opportunity],
    ) -> Result<Vec<RawEnrichment>, GeneratorError> {
        Err(GeneratorError::Disabled(
            "no generation API key configured".to_string(),
        ))
    }
}

pub(crate) fn parse_sort(raw: &str) -> Result<SortOrder, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "best_match" | "best-match" => Ok(SortOrder::BestMatch),
        "deadline_soon" | "deadline-soon" => Ok(SortOrder::DeadlineSoon),
        "highest_funding" | "highest-funding" => Ok(SortOrder::HighestFunding),
        other => Err(format!(
            "unknown sort order '{other}' (expected best_match, deadline_soon, or highest_funding)"
        )),
    }
}
