use crate::config::TelemetryConfig;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Directives appended whenever the filter is built from the configured
/// level, so a plain `debug` does not drown the pipeline logs in HTTP
/// client internals.
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "reqwest=warn", "tower=warn"];

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{directive}'")]
    Filter {
        directive: String,
        #[source]
        source: ParseError,
    },
    #[error("failed to install tracing subscriber: {0}")]
    Install(Box<dyn std::error::Error + Send + Sync>),
}

/// Install the global subscriber. An explicit `RUST_LOG` wins outright;
/// otherwise the configured level applies with noisy dependencies capped
/// at `warn`.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(&config.log_level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Install)
}

fn level_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    let directive = level.trim();
    let mut spec = directive.to_string();
    for quiet in QUIET_DEPENDENCIES {
        spec.push(',');
        spec.push_str(quiet);
    }
    EnvFilter::try_new(&spec).map_err(|source| TelemetryError::Filter {
        directive: directive.to_string(),
        source,
    })
}
