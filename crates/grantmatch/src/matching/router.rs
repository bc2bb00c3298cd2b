use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::domain::{MatchOptions, SortOrder};
use super::enrichment::{EnrichmentGenerator, EnrichmentStore};
use super::normalize::{normalize_applicant, normalize_opportunities, NormalizeWarning};
use super::pipeline::{DiscoveryPipeline, DiscoveryReport, PipelineError};

/// Wire shape for caller options; absent fields take pipeline defaults.
#[derive(Debug, Default, Deserialize)]
pub struct MatchOptionsPayload {
    pub limit: Option<usize>,
    pub min_score: Option<u8>,
    pub sort: Option<SortOrder>,
    pub use_cache: Option<bool>,
    pub use_ai: Option<bool>,
    pub require_application_url: Option<bool>,
    pub deadline_ms: Option<u64>,
}

impl MatchOptionsPayload {
    pub fn into_options(self) -> MatchOptions {
        let defaults = MatchOptions::default();
        MatchOptions {
            limit: self.limit.unwrap_or(defaults.limit),
            min_score: self.min_score.unwrap_or(defaults.min_score),
            sort: self.sort.unwrap_or(defaults.sort),
            use_cache: self.use_cache.unwrap_or(defaults.use_cache),
            use_ai: self.use_ai.unwrap_or(defaults.use_ai),
            require_application_url: self
                .require_application_url
                .unwrap_or(defaults.require_application_url),
            run_deadline: self.deadline_ms.map(std::time::Duration::from_millis),
        }
    }
}

/// Request envelope: loosely-shaped records straight from upstream sources.
/// The normalization boundary lives here, so the pipeline itself only ever
/// sees closed domain types.
#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub applicant: Value,
    pub opportunities: Vec<Value>,
    #[serde(default)]
    pub options: MatchOptionsPayload,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    #[serde(flatten)]
    pub report: DiscoveryReport,
    pub normalize_warnings: Vec<NormalizeWarning>,
}

/// Router builder exposing the discovery endpoint over an injected pipeline.
pub fn discovery_router<S, G>(pipeline: Arc<DiscoveryPipeline<S, G>>) -> Router
where
    S: EnrichmentStore + ?Sized + 'static,
    G: EnrichmentGenerator + ?Sized + 'static,
{
    Router::new()
        .route("/api/v1/discovery/match", post(match_handler::<S, G>))
        .with_state(pipeline)
}

pub(crate) async fn match_handler<S, G>(
    State(pipeline): State<Arc<DiscoveryPipeline<S, G>>>,
    Json(request): Json<MatchRequest>,
) -> Response
where
    S: EnrichmentStore + ?Sized + 'static,
    G: EnrichmentGenerator + ?Sized + 'static,
{
    let mut warnings = Vec::new();
    let applicant = match normalize_applicant(&request.applicant, &mut warnings) {
        Ok(applicant) => applicant,
        Err(err) => {
            let payload = json!({ "error": format!("invalid applicant record: {err}") });
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
        }
    };
    let (opportunities, mut opportunity_warnings) =
        normalize_opportunities(&request.opportunities);
    warnings.append(&mut opportunity_warnings);
    let skipped_records = request.opportunities.len() - opportunities.len();

    let options = request.options.into_options();
    match pipeline.run(&applicant, opportunities, &options).await {
        Ok(mut report) => {
            report.stats.skipped_records = skipped_records;
            (
                StatusCode::OK,
                Json(MatchResponse {
                    report,
                    normalize_warnings: warnings,
                }),
            )
                .into_response()
        }
        Err(err @ PipelineError::InvalidOptions(_)) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::BAD_REQUEST, Json(payload)).into_response()
        }
    }
}
