use super::domain::{Applicant, EligibilityVerdict, LocationKind, Opportunity};
use super::lexicon::{contains_ci, matches_either_way, MatchLexicon};

/// Deterministic pass/fail gate run before scoring. Checks run in a fixed
/// order and the first failure short-circuits with its reason; reasons are
/// mutually exclusive in the UI, so they are never accumulated.
pub struct EligibilityFilter<'a> {
    lexicon: &'a MatchLexicon,
    require_application_url: bool,
}

impl<'a> EligibilityFilter<'a> {
    pub fn new(lexicon: &'a MatchLexicon, require_application_url: bool) -> Self {
        Self {
            lexicon,
            require_application_url,
        }
    }

    pub fn evaluate(&self, applicant: &Applicant, opportunity: &Opportunity) -> EligibilityVerdict {
        if self.require_application_url && opportunity.application_url.trim().is_empty() {
            return EligibilityVerdict::fail("no application URL available");
        }

        if let Some(verdict) = self.check_entity(applicant, opportunity) {
            return verdict;
        }

        if let Some(verdict) = self.check_geography(applicant, opportunity) {
            return verdict;
        }

        if let Some(verdict) = self.check_industry(applicant, opportunity) {
            return verdict;
        }

        EligibilityVerdict::pass()
    }

    /// Entity-type gate. An undeclared entity type or an opportunity with no
    /// eligibility tags is treated as open to all.
    fn check_entity(
        &self,
        applicant: &Applicant,
        opportunity: &Opportunity,
    ) -> Option<EligibilityVerdict> {
        let entity = applicant.entity_type?;
        if opportunity.eligibility_tags.is_empty() {
            return None;
        }

        let synonyms = self.lexicon.entity_synonyms(entity);
        let matched = opportunity.eligibility_tags.iter().any(|tag| {
            synonyms
                .iter()
                .any(|synonym| matches_either_way(tag, synonym))
        });

        if matched {
            None
        } else {
            Some(EligibilityVerdict::fail(format!(
                "restricted to {}; not open to {} applicants",
                opportunity.eligibility_tags.join(", "),
                entity.label()
            )))
        }
    }

    /// Geography gate. No constraints or any national constraint passes; an
    /// applicant with no declared region is treated as open. Otherwise the
    /// region must exactly (case-insensitively) match a state constraint.
    fn check_geography(
        &self,
        applicant: &Applicant,
        opportunity: &Opportunity,
    ) -> Option<EligibilityVerdict> {
        if opportunity.locations.is_empty() {
            return None;
        }
        if opportunity
            .locations
            .iter()
            .any(|constraint| constraint.kind == LocationKind::National)
        {
            return None;
        }

        let region = applicant.region.as_deref()?;

        let states: Vec<&str> = opportunity
            .locations
            .iter()
            .filter(|constraint| constraint.kind == LocationKind::State)
            .filter_map(|constraint| constraint.region.as_deref())
            .collect();

        if states.is_empty() {
            return None;
        }
        if states.iter().any(|state| state.eq_ignore_ascii_case(region)) {
            return None;
        }

        Some(EligibilityVerdict::fail(format!(
            "limited to applicants in {}",
            states.join(", ")
        )))
    }

    /// Industry gate. Uncategorized opportunities always pass: the title
    /// keyword signal is too weak to disqualify on and is left to the scorer
    /// to demote. Categorized opportunities need at least one focus-area
    /// overlap through the alias table.
    fn check_industry(
        &self,
        applicant: &Applicant,
        opportunity: &Opportunity,
    ) -> Option<EligibilityVerdict> {
        if applicant.focus_areas.is_empty() {
            return None;
        }
        if opportunity.categories.is_empty() {
            return None;
        }

        let overlap = applicant.focus_areas.iter().any(|tag| {
            let aliases = self.lexicon.focus_aliases(tag);
            opportunity.categories.iter().any(|category| {
                aliases
                    .iter()
                    .any(|alias| matches_either_way(category, alias))
            })
        });

        if overlap {
            None
        } else {
            let focus: Vec<&str> = applicant
                .focus_areas
                .iter()
                .take(3)
                .map(String::as_str)
                .collect();
            let categories: Vec<&str> = opportunity
                .categories
                .iter()
                .take(3)
                .map(String::as_str)
                .collect();
            Some(EligibilityVerdict::fail(format!(
                "focus areas ({}) do not overlap opportunity categories ({})",
                focus.join(", "),
                categories.join(", ")
            )))
        }
    }
}

/// Title/sponsor keyword scan used when an opportunity carries no category
/// tags. Shared with the scorer so both read the same lexicon.
pub(crate) fn title_keyword_hit(
    lexicon: &MatchLexicon,
    applicant: &Applicant,
    opportunity: &Opportunity,
) -> bool {
    let text = format!("{} {}", opportunity.title, opportunity.sponsor);
    applicant.focus_areas.iter().any(|tag| {
        lexicon
            .focus_aliases(tag)
            .iter()
            .any(|alias| contains_ci(&text, alias))
    })
}
