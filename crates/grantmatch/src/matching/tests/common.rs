use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};

use crate::matching::domain::{
    Applicant, EntityType, LocationConstraint, LocationKind, Opportunity, OpportunityId,
};
use crate::matching::enrichment::{
    CachedEnrichment, Confidence, EnrichmentGenerator, EnrichmentRecord, EnrichmentStore,
    GeneratorError, RawEnrichment, StoreError, Urgency,
};
use async_trait::async_trait;

pub(super) fn timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).single().expect("valid timestamp")
}

pub(super) fn applicant() -> Applicant {
    let mut focus_areas = BTreeSet::new();
    focus_areas.insert("education".to_string());
    focus_areas.insert("health".to_string());
    Applicant {
        id: "applicant-1".to_string(),
        entity_type: Some(EntityType::Nonprofit),
        region: Some("NY".to_string()),
        focus_areas,
        org_size: None,
        budget_band: None,
        funding_preference: None,
        timeline: None,
        goals: vec!["expand_programs".to_string()],
        profile_version: 3,
    }
}

/// Applicant with nothing declared: no entity type, region, tags, or goals.
pub(super) fn blank_applicant() -> Applicant {
    Applicant {
        id: "applicant-blank".to_string(),
        entity_type: None,
        region: None,
        focus_areas: BTreeSet::new(),
        org_size: None,
        budget_band: None,
        funding_preference: None,
        timeline: None,
        goals: Vec::new(),
        profile_version: 1,
    }
}

/// Open opportunity with no constraints of any kind.
pub(super) fn opportunity(id: &str) -> Opportunity {
    Opportunity {
        id: OpportunityId(id.to_string()),
        title: format!("Grant {id}"),
        sponsor: "Test Foundation".to_string(),
        summary: "General support funding.".to_string(),
        categories: Vec::new(),
        eligibility_tags: Vec::new(),
        locations: Vec::new(),
        funding_min: None,
        funding_max: None,
        deadline: None,
        purpose_tags: Vec::new(),
        quality_score: Some(0.8),
        application_url: "https://grants.example.org/apply".to_string(),
        updated_at: timestamp(),
    }
}

pub(super) fn state_constraint(region: &str) -> LocationConstraint {
    LocationConstraint {
        kind: LocationKind::State,
        region: Some(region.to_string()),
    }
}

pub(super) fn record(score: u8, confidence: Confidence) -> EnrichmentRecord {
    EnrichmentRecord {
        match_score: score,
        confidence,
        fit_summary: "Looks like a plausible fit.".to_string(),
        reasons: vec!["aligned mission".to_string()],
        concerns: Vec::new(),
        next_steps: vec!["prepare a budget".to_string()],
        fundable_uses: Vec::new(),
        urgency: Urgency::Medium,
    }
}

pub(super) fn raw(id: &str, score: f64, confidence: &str) -> RawEnrichment {
    RawEnrichment {
        opportunity_id: Some(id.to_string()),
        match_score: Some(score),
        confidence: Some(confidence.to_string()),
        fit_summary: Some("Generated assessment.".to_string()),
        ..RawEnrichment::default()
    }
}

/// In-memory store keyed by (applicant, opportunity) with a failure toggle
/// so degradation paths can be exercised.
#[derive(Default)]
pub(super) struct MemoryStore {
    rows: Mutex<HashMap<(String, String), CachedEnrichment>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub(super) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(super) fn row_count(&self) -> usize {
        self.rows.lock().expect("store mutex poisoned").len()
    }

    pub(super) fn row(&self, applicant_id: &str, opportunity_id: &str) -> Option<CachedEnrichment> {
        self.rows
            .lock()
            .expect("store mutex poisoned")
            .get(&(applicant_id.to_string(), opportunity_id.to_string()))
            .cloned()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }
}

impl EnrichmentStore for MemoryStore {
    fn fetch(
        &self,
        applicant_id: &str,
        opportunity_ids: &[OpportunityId],
    ) -> Result<Vec<CachedEnrichment>, StoreError> {
        self.check()?;
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
        self.check()?;
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
        self.check()?;
        let mut rows = self.rows.lock().expect("store mutex poisoned");
        let before = rows.len();
        rows.retain(|(owner, _), _| owner != applicant_id);
        Ok((before - rows.len()) as u64)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.check()?;
        let mut rows = self.rows.lock().expect("store mutex poisoned");
        let before = rows.len();
        rows.retain(|_, row| row.expires_at > now);
        Ok((before - rows.len()) as u64)
    }
}

/// Generator returning a scripted sequence of responses; once the script is
/// exhausted every further call errors.
#[derive(Default)]
pub(super) struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<Vec<RawEnrichment>, GeneratorError>>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub(super) fn push(&self, response: Result<Vec<RawEnrichment>, GeneratorError>) {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .push_back(response);
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EnrichmentGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _applicant: &Applicant,
        _batch: &[&Opportunity],
    ) -> Result<Vec<RawEnrichment>, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(GeneratorError::Empty))
    }
}
