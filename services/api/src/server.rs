use crate::cli::ServeArgs;
use crate::infra::{AppState, DisabledGenerator, InMemoryEnrichmentStore};
use crate::routes::with_discovery_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use grantmatch::config::AppConfig;
use grantmatch::error::AppError;
use grantmatch::matching::{DiscoveryPipeline, OpenAiGenerator};
use grantmatch::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryEnrichmentStore::default());
    let router = match OpenAiGenerator::from_config(&config.enrichment) {
        Some(generator) => {
            info!(model = %config.enrichment.model, "enrichment generation enabled");
            let pipeline = Arc::new(
                DiscoveryPipeline::new(store, Arc::new(generator))
                    .with_attempt_timeout(config.enrichment.request_timeout),
            );
            with_discovery_routes(pipeline)
        }
        None => {
            warn!("no generation API key configured, enrichment will serve fallback records");
            let pipeline = Arc::new(DiscoveryPipeline::new(store, Arc::new(DisabledGenerator)));
            with_discovery_routes(pipeline)
        }
    };

    let app = router.layer(Extension(app_state)).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "grant discovery service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
