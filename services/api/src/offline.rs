use crate::infra::{parse_sort, DisabledGenerator, InMemoryEnrichmentStore};
use clap::Args;
use grantmatch::error::AppError;
use grantmatch::matching::{
    normalize_applicant, normalize_opportunities, DiscoveryPipeline, MatchOptions, RankedResult,
    SortOrder,
};
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct MatchArgs {
    /// Path to the applicant profile JSON file
    #[arg(long)]
    pub(crate) applicant: PathBuf,
    /// Path to a JSON array of opportunity records
    #[arg(long)]
    pub(crate) opportunities: PathBuf,
    /// Maximum number of results to print
    #[arg(long)]
    pub(crate) limit: Option<usize>,
    /// Deterministic-score floor (0 disables it)
    #[arg(long)]
    pub(crate) min_score: Option<u8>,
    /// Result ordering: best_match, deadline_soon, or highest_funding
    #[arg(long, value_parser = parse_sort)]
    pub(crate) sort: Option<SortOrder>,
}

fn read_json(path: &Path) -> Result<Value, AppError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|err| {
        AppError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} is not valid JSON: {err}", path.display()),
        ))
    })
}

/// Offline counterpart of the HTTP endpoint: same normalization and
/// pipeline, but enrichment disabled, so the output is purely deterministic
/// and reproducible.
pub(crate) async fn run_match(args: MatchArgs) -> Result<(), AppError> {
    let mut warnings = Vec::new();
    let applicant_value = read_json(&args.applicant)?;
    let applicant = normalize_applicant(&applicant_value, &mut warnings)?;

    let opportunities_value = read_json(&args.opportunities)?;
    let records = opportunities_value.as_array().ok_or_else(|| {
        AppError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "{} must contain a JSON array of opportunity records",
                args.opportunities.display()
            ),
        ))
    })?;
    let (opportunities, mut record_warnings) = normalize_opportunities(records);
    warnings.append(&mut record_warnings);
    let skipped_records = records.len() - opportunities.len();

    let defaults = MatchOptions::default();
    let options = MatchOptions {
        limit: args.limit.unwrap_or(defaults.limit),
        min_score: args.min_score.unwrap_or(defaults.min_score),
        sort: args.sort.unwrap_or(defaults.sort),
        use_ai: false,
        ..defaults
    };

    let pipeline = DiscoveryPipeline::new(
        Arc::new(InMemoryEnrichmentStore::default()),
        Arc::new(DisabledGenerator),
    );
    let mut report = pipeline.run(&applicant, opportunities, &options).await?;
    report.stats.skipped_records = skipped_records;

    for warning in &warnings {
        println!("note: {} [{}]: {}", warning.record_id, warning.field, warning.message);
    }
    if !warnings.is_empty() {
        println!();
    }

    println!(
        "{} of {} opportunities matched for {} (eligible: {}, above floor: {}, skipped: {})",
        report.results.len(),
        report.stats.fetched,
        applicant.id,
        report.stats.survived_eligibility,
        report.stats.survived_scoring,
        report.stats.skipped_records,
    );
    println!();

    for (rank, row) in report.results.iter().enumerate() {
        render_row(rank + 1, row);
    }

    Ok(())
}

fn render_row(rank: usize, row: &RankedResult) {
    println!(
        "{rank:>3}. [{score:>3} {tier:<9}] {title}",
        score = row.combined_score,
        tier = row.tier.label(),
        title = row.title,
    );
    println!(
        "     {sponsor} | deadline: {deadline} | funding: {funding}",
        sponsor = if row.sponsor.is_empty() { "unknown sponsor" } else { &row.sponsor },
        deadline = row
            .deadline
            .map(|date| date.to_string())
            .unwrap_or_else(|| "none listed".to_string()),
        funding = funding_label(row.funding_min, row.funding_max),
    );
    for reason in &row.reasons {
        println!("     + {reason}");
    }
    for warning in &row.warnings {
        println!("     ! {warning}");
    }
    println!();
}

fn funding_label(min: Option<u64>, max: Option<u64>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("${min} - ${max}"),
        (Some(min), None) => format!("${min}+"),
        (None, Some(max)) => format!("up to ${max}"),
        (None, None) => "unspecified".to_string(),
    }
}
