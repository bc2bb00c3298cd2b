//! Normalization boundary between loosely-shaped upstream records and the
//! closed domain types the pipeline consumes. Individual bad fields are
//! defaulted and individually bad records skipped with a warning; a batch is
//! never aborted for one malformed row.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tracing::debug;

use super::domain::{
    Applicant, BudgetBand, EntityType, FundingPreference, LocationConstraint, LocationKind,
    Opportunity, OpportunityId, OrgSize, TimelinePreference,
};

/// Raised only for records that cannot be represented at all (e.g. a missing
/// identifier on an applicant). Field-level problems default instead.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("applicant record is not a JSON object")]
    NotAnObject,
    #[error("applicant record has no id")]
    MissingId,
}

/// Field-level normalization note attached to a skipped or defaulted value.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct NormalizeWarning {
    pub record_id: String,
    pub field: &'static str,
    pub message: String,
}

/// Read a field under its snake_case name, falling back to camelCase; the
/// upstream sources are inconsistent about casing.
fn get<'v>(value: &'v Value, snake: &str, camel: &str) -> Option<&'v Value> {
    value.get(snake).or_else(|| value.get(camel))
}

fn string_field(value: &Value, snake: &str, camel: &str) -> Option<String> {
    get(value, snake, camel)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

/// Accepts an array of strings or a single string; anything else is empty.
fn string_list(value: &Value, snake: &str, camel: &str) -> Vec<String> {
    match get(value, snake, camel) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(ToOwned::to_owned)
            .collect(),
        Some(Value::String(single)) => {
            let trimmed = single.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            }
        }
        _ => Vec::new(),
    }
}

/// Accepts a JSON number or a numeric string.
fn amount_field(value: &Value, snake: &str, camel: &str) -> Option<u64> {
    match get(value, snake, camel)? {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|amount| *amount >= 0.0)
                .map(|amount| amount as u64)
        }),
        Value::String(text) => text.trim().replace([',', '$'], "").parse::<u64>().ok(),
        _ => None,
    }
}

fn date_field(value: &Value, snake: &str, camel: &str) -> Option<NaiveDate> {
    let raw = get(value, snake, camel)?.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

fn timestamp_field(value: &Value, snake: &str, camel: &str) -> Option<DateTime<Utc>> {
    let raw = get(value, snake, camel)?.as_str()?.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .ok()
}

fn entity_type_from(raw: &str) -> Option<EntityType> {
    match raw.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
        "individual" | "person" => Some(EntityType::Individual),
        "nonprofit" | "non_profit" | "501c3" => Some(EntityType::Nonprofit),
        "small_business" => Some(EntityType::SmallBusiness),
        "for_profit" | "business" => Some(EntityType::ForProfit),
        "educational" | "education" => Some(EntityType::Educational),
        "government" => Some(EntityType::Government),
        "tribal" => Some(EntityType::Tribal),
        _ => None,
    }
}

fn band_from(raw: &str) -> Option<BudgetBand> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "micro" => Some(BudgetBand::Micro),
        "small" => Some(BudgetBand::Small),
        "medium" => Some(BudgetBand::Medium),
        "large" => Some(BudgetBand::Large),
        _ => None,
    }
}

fn org_size_from(raw: &str) -> Option<OrgSize> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "solo" => Some(OrgSize::Solo),
        "small" => Some(OrgSize::Small),
        "medium" => Some(OrgSize::Medium),
        "large" => Some(OrgSize::Large),
        _ => None,
    }
}

fn preference_from(raw: &str) -> Option<FundingPreference> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "any" => Some(FundingPreference::Any),
        "micro" => Some(FundingPreference::Micro),
        "small" => Some(FundingPreference::Small),
        "medium" => Some(FundingPreference::Medium),
        "large" => Some(FundingPreference::Large),
        _ => None,
    }
}

fn timeline_from(raw: &str) -> Option<TimelinePreference> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "immediate" => Some(TimelinePreference::Immediate),
        "quarter" => Some(TimelinePreference::Quarter),
        "flexible" => Some(TimelinePreference::Flexible),
        _ => None,
    }
}

fn location_kind_from(raw: &str) -> Option<LocationKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "national" => Some(LocationKind::National),
        "state" => Some(LocationKind::State),
        "local" => Some(LocationKind::Local),
        _ => None,
    }
}

/// Map a loosely-shaped applicant record onto the canonical snapshot.
/// Unknown enum values default to "undeclared" with a warning.
pub fn normalize_applicant(
    value: &Value,
    warnings: &mut Vec<NormalizeWarning>,
) -> Result<Applicant, NormalizeError> {
    if !value.is_object() {
        return Err(NormalizeError::NotAnObject);
    }
    let id = string_field(value, "id", "applicantId").ok_or(NormalizeError::MissingId)?;

    let parse_enum = |field: &'static str, camel: &'static str| -> Option<String> {
        string_field(value, field, camel)
    };

    let entity_type = parse_enum("entity_type", "entityType").and_then(|raw| {
        let parsed = entity_type_from(&raw);
        if parsed.is_none() {
            warnings.push(NormalizeWarning {
                record_id: id.clone(),
                field: "entity_type",
                message: format!("unknown entity type '{raw}', treating as undeclared"),
            });
        }
        parsed
    });

    let budget_band = parse_enum("budget_band", "budgetBand").and_then(|raw| band_from(&raw));
    let org_size = parse_enum("org_size", "orgSize").and_then(|raw| org_size_from(&raw));
    let funding_preference =
        parse_enum("funding_preference", "fundingPreference").and_then(|raw| preference_from(&raw));
    let timeline = parse_enum("timeline", "timelinePreference").and_then(|raw| timeline_from(&raw));

    let focus_areas: BTreeSet<String> = string_list(value, "focus_areas", "focusAreas")
        .into_iter()
        .map(|tag| tag.to_ascii_lowercase())
        .collect();

    let profile_version = get(value, "profile_version", "profileVersion")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    Ok(Applicant {
        id,
        entity_type,
        region: string_field(value, "region", "homeRegion"),
        focus_areas,
        org_size,
        budget_band,
        funding_preference,
        timeline,
        goals: string_list(value, "goals", "goalTags"),
        profile_version,
    })
}

/// Map one loosely-shaped opportunity record. Returns `None` (with a
/// warning) for records missing an id or title; every other field defaults.
pub fn normalize_opportunity(
    value: &Value,
    warnings: &mut Vec<NormalizeWarning>,
) -> Option<Opportunity> {
    let id = match string_field(value, "id", "opportunityId") {
        Some(id) => id,
        None => {
            warnings.push(NormalizeWarning {
                record_id: "<unknown>".to_string(),
                field: "id",
                message: "record skipped: no identifier".to_string(),
            });
            return None;
        }
    };
    let title = match string_field(value, "title", "name") {
        Some(title) => title,
        None => {
            warnings.push(NormalizeWarning {
                record_id: id,
                field: "title",
                message: "record skipped: no title".to_string(),
            });
            return None;
        }
    };

    let funding_min = amount_field(value, "funding_min", "fundingMin");
    let funding_max = amount_field(value, "funding_max", "fundingMax");
    let (funding_min, funding_max) = match (funding_min, funding_max) {
        (Some(min), Some(max)) if min > max => {
            warnings.push(NormalizeWarning {
                record_id: id.clone(),
                field: "funding_min",
                message: format!("funding range inverted ({min} > {max}), swapping"),
            });
            (Some(max), Some(min))
        }
        other => other,
    };

    let locations = match get(value, "locations", "locationConstraints") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let kind = item
                    .get("kind")
                    .or_else(|| item.get("type"))
                    .and_then(Value::as_str)
                    .and_then(location_kind_from)?;
                let region = item
                    .get("region")
                    .or_else(|| item.get("value"))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .map(ToOwned::to_owned);
                Some(LocationConstraint { kind, region })
            })
            .collect(),
        _ => Vec::new(),
    };

    let quality_score = get(value, "quality_score", "qualityScore")
        .and_then(Value::as_f64)
        .map(|score| score.clamp(0.0, 1.0) as f32);

    let updated_at = match timestamp_field(value, "updated_at", "lastModified") {
        Some(stamp) => stamp,
        None => {
            warnings.push(NormalizeWarning {
                record_id: id.clone(),
                field: "updated_at",
                message: "missing last-modified timestamp, defaulting to now".to_string(),
            });
            Utc::now()
        }
    };

    Some(Opportunity {
        id: OpportunityId(id),
        title,
        sponsor: string_field(value, "sponsor", "funder").unwrap_or_default(),
        summary: string_field(value, "summary", "description").unwrap_or_default(),
        categories: string_list(value, "categories", "categoryTags"),
        eligibility_tags: string_list(value, "eligibility_tags", "eligibilityTags"),
        locations,
        funding_min,
        funding_max,
        deadline: date_field(value, "deadline", "applicationDeadline"),
        purpose_tags: string_list(value, "purpose_tags", "fundingPurposes"),
        quality_score,
        application_url: string_field(value, "application_url", "applicationUrl")
            .unwrap_or_default(),
        updated_at,
    })
}

/// Normalize a whole batch, collecting warnings instead of failing.
pub fn normalize_opportunities(
    values: &[Value],
) -> (Vec<Opportunity>, Vec<NormalizeWarning>) {
    let mut warnings = Vec::new();
    let mut opportunities = Vec::with_capacity(values.len());
    for value in values {
        if let Some(opportunity) = normalize_opportunity(value, &mut warnings) {
            opportunities.push(opportunity);
        }
    }
    if !warnings.is_empty() {
        debug!(
            skipped_or_defaulted = warnings.len(),
            normalized = opportunities.len(),
            "opportunity normalization produced warnings"
        );
    }
    (opportunities, warnings)
}
