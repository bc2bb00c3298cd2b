//! End-to-end exercises of the discovery endpoint over the public API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use grantmatch::matching::{
    discovery_router, Applicant, CachedEnrichment, DiscoveryPipeline, EnrichmentGenerator,
    EnrichmentStore, GeneratorError, Opportunity, OpportunityId, RawEnrichment, StoreError,
};

#[derive(Default)]
struct MapStore {
    rows: Mutex<HashMap<(String, String), CachedEnrichment>>,
}

impl EnrichmentStore for MapStore {
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

/// Answers every batch with a fixed high-confidence record per opportunity.
#[derive(Default)]
struct EchoGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl EnrichmentGenerator for EchoGenerator {
    async fn generate(
        &self,
        _applicant: &Applicant,
        batch: &[&Opportunity],
    ) -> Result<Vec<RawEnrichment>, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(batch
            .iter()
            .map(|opportunity| RawEnrichment {
                opportunity_id: Some(opportunity.id.as_str().to_string()),
                match_score: Some(88.0),
                confidence: Some("high".to_string()),
                fit_summary: Some("Strong programmatic alignment.".to_string()),
                ..RawEnrichment::default()
            })
            .collect())
    }
}

fn request_body() -> Value {
    json!({
        "applicant": {
            "id": "applicant-1",
            "entityType": "nonprofit",
            "region": "NY",
            "focusAreas": ["education"],
            "goals": ["expand_programs"],
            "profileVersion": 2
        },
        "opportunities": [
            {
                "id": "opp-1",
                "title": "Youth Literacy Fund",
                "sponsor": "Reading Trust",
                "categories": ["education"],
                "eligibilityTags": ["nonprofit"],
                "locations": [{"kind": "state", "region": "NY"}],
                "applicationUrl": "https://grants.example.org/literacy",
                "updated_at": "2026-08-01T12:00:00Z"
            },
            {
                "id": "opp-2",
                "title": "California Teacher Grants",
                "sponsor": "West Coast Fund",
                "categories": ["education"],
                "locations": [{"kind": "state", "region": "CA"}],
                "applicationUrl": "https://grants.example.org/ca",
                "updated_at": "2026-08-01T12:00:00Z"
            },
            {
                "title": "record with no id"
            }
        ],
        "options": {"limit": 10, "min_score": 0}
    })
}

fn post(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/discovery/match")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    serde_json::from_slice(&bytes).expect("body is JSON")
}

#[tokio::test]
async fn match_endpoint_filters_scores_and_enriches() {
    let pipeline = Arc::new(DiscoveryPipeline::new(
        Arc::new(MapStore::default()),
        Arc::new(EchoGenerator::default()),
    ));
    let app = discovery_router(Arc::clone(&pipeline));

    let response = app.oneshot(post(&request_body())).await.expect("request runs");
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["stats"]["fetched"], 2);
    assert_eq!(body["stats"]["skipped_records"], 1);
    assert_eq!(body["stats"]["survived_eligibility"], 1);
    assert_eq!(body["stats"]["served_from_generation"], 1);

    let results = body["results"].as_array().expect("results array");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["opportunity_id"], "opp-1");
    assert_eq!(results[0]["enrichment_score"], 88);
    assert_eq!(results[0]["confidence"], "high");
    assert_eq!(results[0]["from_cache"], false);

    let warnings = body["normalize_warnings"].as_array().expect("warnings array");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["field"], "id");
}

#[tokio::test]
async fn repeat_request_is_served_from_cache() {
    let store = Arc::new(MapStore::default());
    let generator = Arc::new(EchoGenerator::default());
    let pipeline = Arc::new(DiscoveryPipeline::new(
        Arc::clone(&store),
        Arc::clone(&generator),
    ));

    let body = request_body();
    let first = discovery_router(Arc::clone(&pipeline))
        .oneshot(post(&body))
        .await
        .expect("first request runs");
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

    let second = discovery_router(Arc::clone(&pipeline))
        .oneshot(post(&body))
        .await
        .expect("second request runs");
    let parsed = json_body(second).await;

    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(parsed["stats"]["served_from_cache"], 1);
    assert_eq!(parsed["results"][0]["from_cache"], true);
}

#[tokio::test]
async fn malformed_applicant_is_rejected_with_422() {
    let pipeline = Arc::new(DiscoveryPipeline::new(
        Arc::new(MapStore::default()),
        Arc::new(EchoGenerator::default()),
    ));
    let app = discovery_router(pipeline);

    let body = json!({"applicant": {"region": "NY"}, "opportunities": []});
    let response = app.oneshot(post(&body)).await.expect("request runs");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn zero_limit_is_rejected_with_400() {
    let pipeline = Arc::new(DiscoveryPipeline::new(
        Arc::new(MapStore::default()),
        Arc::new(EchoGenerator::default()),
    ));
    let app = discovery_router(pipeline);

    let mut body = request_body();
    body["options"] = json!({"limit": 0});
    let response = app.oneshot(post(&body)).await.expect("request runs");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
