use chrono::NaiveDate;

use super::super::domain::{
    Applicant, BudgetBand, FundingPreference, LocationKind, Opportunity, TimelinePreference,
};
use super::super::eligibility::title_keyword_hit;
use super::super::lexicon::{contains_ci, matches_either_way, AwardSize, MatchLexicon};

/// One factor's contribution: points within the factor cap, an optional
/// human-readable match reason, and an optional warning.
pub(crate) struct FactorScore {
    pub points: u8,
    pub reason: Option<String>,
    pub warning: Option<String>,
}

impl FactorScore {
    fn points(points: u8) -> Self {
        Self {
            points,
            reason: None,
            warning: None,
        }
    }

    fn with_reason(points: u8, reason: impl Into<String>) -> Self {
        Self {
            points,
            reason: Some(reason.into()),
            warning: None,
        }
    }

    fn with_warning(points: u8, warning: impl Into<String>) -> Self {
        Self {
            points,
            reason: None,
            warning: Some(warning.into()),
        }
    }
}

/// Entity-type factor, 0-20.
pub(crate) fn entity_score(
    lexicon: &MatchLexicon,
    applicant: &Applicant,
    opportunity: &Opportunity,
) -> FactorScore {
    let Some(entity) = applicant.entity_type else {
        return FactorScore::points(10);
    };
    if opportunity.eligibility_tags.is_empty() {
        return FactorScore::points(16);
    }

    let synonyms = lexicon.entity_synonyms(entity);
    let exact = opportunity.eligibility_tags.iter().any(|tag| {
        synonyms
            .iter()
            .any(|synonym| tag.trim().eq_ignore_ascii_case(synonym))
    });
    if exact {
        return FactorScore::with_reason(
            20,
            format!("explicitly open to {} applicants", entity.label()),
        );
    }

    let partial = opportunity.eligibility_tags.iter().any(|tag| {
        synonyms
            .iter()
            .any(|synonym| matches_either_way(tag, synonym))
    });
    if partial {
        FactorScore::with_reason(15, format!("eligibility includes {} entities", entity.label()))
    } else {
        FactorScore::points(4)
    }
}

/// Industry/category factor, 0-25.
pub(crate) fn industry_score(
    lexicon: &MatchLexicon,
    applicant: &Applicant,
    opportunity: &Opportunity,
) -> FactorScore {
    if applicant.focus_areas.is_empty() {
        return FactorScore::points(12);
    }

    if opportunity.categories.is_empty() {
        // Uncategorized records only have the title signal; a miss still
        // passes the filter but ranks near the bottom of survivors.
        return if title_keyword_hit(lexicon, applicant, opportunity) {
            FactorScore::with_reason(17, "title matches your focus areas")
        } else {
            FactorScore::points(6)
        };
    }

    let title_text = format!("{} {}", opportunity.title, opportunity.sponsor);
    let mut matched_tags: Vec<&str> = Vec::new();
    for tag in &applicant.focus_areas {
        let aliases = lexicon.focus_aliases(tag);
        let category_hit = opportunity.categories.iter().any(|category| {
            aliases
                .iter()
                .any(|alias| matches_either_way(category, alias))
        });
        let title_hit = aliases.iter().any(|alias| contains_ci(&title_text, alias));
        if category_hit || title_hit {
            matched_tags.push(tag);
        }
    }

    match matched_tags.len() {
        0 => FactorScore::points(2),
        1 => FactorScore::with_reason(15, format!("matches your {} focus", matched_tags[0])),
        2 => FactorScore::with_reason(
            21,
            format!("matches your {} focus areas", matched_tags.join(" and ")),
        ),
        _ => FactorScore::with_reason(
            25,
            format!("strong overlap across {} focus areas", matched_tags.len()),
        ),
    }
}

/// Geography factor, 0-15.
pub(crate) fn geography_score(applicant: &Applicant, opportunity: &Opportunity) -> FactorScore {
    if opportunity.locations.is_empty() {
        return FactorScore::points(12);
    }
    if opportunity
        .locations
        .iter()
        .any(|constraint| constraint.kind == LocationKind::National)
    {
        return FactorScore::with_reason(13, "available nationwide");
    }

    let Some(region) = applicant.region.as_deref() else {
        return FactorScore::points(8);
    };

    let states: Vec<&str> = opportunity
        .locations
        .iter()
        .filter(|constraint| constraint.kind == LocationKind::State)
        .filter_map(|constraint| constraint.region.as_deref())
        .collect();

    if states.is_empty() {
        return FactorScore::points(8);
    }
    if states.iter().any(|state| state.eq_ignore_ascii_case(region)) {
        FactorScore::with_reason(15, format!("targeted at {region} applicants"))
    } else {
        // Rare post-filter; kept for direct scorer callers.
        FactorScore::points(6)
    }
}

/// Funding-size factor, 0-10. Contributes warnings only, never reasons.
pub(crate) fn size_score(
    lexicon: &MatchLexicon,
    applicant: &Applicant,
    opportunity: &Opportunity,
) -> FactorScore {
    let preference = applicant
        .funding_preference
        .filter(|preference| *preference != FundingPreference::Any);

    if let Some((pref_min, pref_max)) = preference.and_then(|preference| preference.range()) {
        let opp_min = opportunity.funding_min.unwrap_or(0);
        let opp_max = opportunity.funding_max.unwrap_or(u64::MAX);
        return if opp_min <= pref_max && opp_max >= pref_min {
            FactorScore::points(10)
        } else {
            FactorScore::with_warning(
                3,
                "award size falls outside your preferred funding range",
            )
        };
    }

    if let Some(band) = applicant.budget_band {
        let Some(midpoint) = opportunity.funding_midpoint() else {
            return FactorScore::points(5);
        };
        let award = AwardSize::from_midpoint(midpoint);
        if lexicon.appropriate_sizes(band).contains(&award) {
            return FactorScore::points(8);
        }
        if award == AwardSize::Large && matches!(band, BudgetBand::Micro | BudgetBand::Small) {
            return FactorScore::with_warning(
                4,
                "large awards are highly competitive for organizations of your budget size",
            );
        }
        return FactorScore::points(5);
    }

    FactorScore::points(5)
}

/// Funding-purpose factor, 0-15.
pub(crate) fn purpose_score(
    lexicon: &MatchLexicon,
    applicant: &Applicant,
    opportunity: &Opportunity,
) -> FactorScore {
    if opportunity.purpose_tags.is_empty() || applicant.goals.is_empty() {
        return FactorScore::points(8);
    }

    let mut matches = 0usize;
    for goal in &applicant.goals {
        let keywords = lexicon.goal_purposes(goal);
        let hit = opportunity.purpose_tags.iter().any(|tag| {
            keywords
                .iter()
                .any(|keyword| matches_either_way(tag, keyword))
        });
        if hit {
            matches += 1;
        }
    }

    match matches {
        0 => FactorScore::points(4),
        1 => FactorScore::with_reason(12, "funds one of your stated goals"),
        _ => FactorScore::with_reason(15, "funds several of your stated goals"),
    }
}

/// Timeline-preference factor, 0-10 (base 5, capped bonus).
pub(crate) fn preferences_score(
    applicant: &Applicant,
    opportunity: &Opportunity,
    today: NaiveDate,
) -> FactorScore {
    let mut points: u8 = 5;
    if let (Some(timeline), Some(deadline)) = (applicant.timeline, opportunity.deadline) {
        let days_until = (deadline - today).num_days();
        let bonus = match timeline {
            TimelinePreference::Immediate if days_until >= 0 && days_until <= 60 => 3,
            TimelinePreference::Quarter if days_until >= 0 && days_until <= 180 => 2,
            TimelinePreference::Flexible => 2,
            _ => 0,
        };
        points = (points + bonus).min(10);
    }
    FactorScore::points(points)
}

/// Data-quality factor, 0-5.
pub(crate) fn quality_score(opportunity: &Opportunity) -> FactorScore {
    let quality = opportunity.quality_score.unwrap_or(0.5).clamp(0.0, 1.0);
    FactorScore::points((quality * 5.0).round() as u8)
}
