use super::common::{applicant, blank_applicant, opportunity, state_constraint};
use crate::matching::domain::{LocationConstraint, LocationKind};
use crate::matching::eligibility::EligibilityFilter;
use crate::matching::lexicon::MatchLexicon;

#[test]
fn unconstrained_opportunity_passes_for_blank_applicant() {
    let lexicon = MatchLexicon::standard();
    let filter = EligibilityFilter::new(&lexicon, true);

    let verdict = filter.evaluate(&blank_applicant(), &opportunity("open"));

    assert!(verdict.passes);
    assert!(verdict.reason.is_none());
}

#[test]
fn missing_application_url_fails_first() {
    let lexicon = MatchLexicon::standard();
    let filter = EligibilityFilter::new(&lexicon, true);
    let mut opp = opportunity("no-url");
    opp.application_url = "   ".to_string();
    // Even with a disqualifying location the URL reason must win.
    opp.locations = vec![state_constraint("CA")];

    let verdict = filter.evaluate(&applicant(), &opp);

    assert!(!verdict.passes);
    assert_eq!(verdict.reason.as_deref(), Some("no application URL available"));
}

#[test]
fn url_check_is_skippable() {
    let lexicon = MatchLexicon::standard();
    let filter = EligibilityFilter::new(&lexicon, false);
    let mut opp = opportunity("no-url");
    opp.application_url = String::new();

    assert!(filter.evaluate(&applicant(), &opp).passes);
}

#[test]
fn entity_synonym_matches_bidirectionally() {
    let lexicon = MatchLexicon::standard();
    let filter = EligibilityFilter::new(&lexicon, true);
    let mut opp = opportunity("entity");
    opp.eligibility_tags = vec!["Nonprofit 501(c)(3) organizations".to_string()];

    assert!(filter.evaluate(&applicant(), &opp).passes);
}

#[test]
fn entity_mismatch_fails_with_tag_list() {
    let lexicon = MatchLexicon::standard();
    let filter = EligibilityFilter::new(&lexicon, true);
    let mut opp = opportunity("entity-miss");
    opp.eligibility_tags = vec!["Federally recognized tribes".to_string()];

    let verdict = filter.evaluate(&applicant(), &opp);

    assert!(!verdict.passes);
    let reason = verdict.reason.expect("entity reason");
    assert!(reason.contains("Federally recognized tribes"));
    assert!(reason.contains("nonprofit"));
}

#[test]
fn undeclared_entity_type_is_open_to_all() {
    let lexicon = MatchLexicon::standard();
    let filter = EligibilityFilter::new(&lexicon, true);
    let mut opp = opportunity("entity-open");
    opp.eligibility_tags = vec!["Federally recognized tribes".to_string()];

    assert!(filter.evaluate(&blank_applicant(), &opp).passes);
}

#[test]
fn wrong_state_fails_and_cites_eligible_states() {
    let lexicon = MatchLexicon::standard();
    let filter = EligibilityFilter::new(&lexicon, true);
    let mut opp = opportunity("geo");
    opp.locations = vec![state_constraint("CA")];

    let verdict = filter.evaluate(&applicant(), &opp);

    assert!(!verdict.passes);
    assert!(verdict.reason.expect("geo reason").contains("CA"));
}

#[test]
fn national_constraint_always_passes() {
    let lexicon = MatchLexicon::standard();
    let filter = EligibilityFilter::new(&lexicon, true);
    let mut opp = opportunity("geo-national");
    opp.locations = vec![
        state_constraint("CA"),
        LocationConstraint {
            kind: LocationKind::National,
            region: None,
        },
    ];

    assert!(filter.evaluate(&applicant(), &opp).passes);
}

#[test]
fn state_match_is_case_insensitive() {
    let lexicon = MatchLexicon::standard();
    let filter = EligibilityFilter::new(&lexicon, true);
    let mut opp = opportunity("geo-case");
    opp.locations = vec![state_constraint("ny")];

    assert!(filter.evaluate(&applicant(), &opp).passes);
}

#[test]
fn category_overlap_through_aliases_passes() {
    let lexicon = MatchLexicon::standard();
    let filter = EligibilityFilter::new(&lexicon, true);
    let mut opp = opportunity("industry");
    // "stem" is an alias of the applicant's "education" focus.
    opp.categories = vec!["STEM initiatives".to_string()];

    assert!(filter.evaluate(&applicant(), &opp).passes);
}

#[test]
fn zero_category_overlap_fails_with_both_sides() {
    let lexicon = MatchLexicon::standard();
    let filter = EligibilityFilter::new(&lexicon, true);
    let mut opp = opportunity("industry-miss");
    opp.categories = vec!["Maritime heritage".to_string()];

    let verdict = filter.evaluate(&applicant(), &opp);

    assert!(!verdict.passes);
    let reason = verdict.reason.expect("industry reason");
    assert!(reason.contains("education"));
    assert!(reason.contains("Maritime heritage"));
}

#[test]
fn uncategorized_opportunity_never_fails_industry_check() {
    // The title keyword signal is too weak to disqualify on; the scorer
    // demotes instead.
    let lexicon = MatchLexicon::standard();
    let filter = EligibilityFilter::new(&lexicon, true);
    let mut opp = opportunity("industry-uncat");
    opp.title = "Completely unrelated widget subsidy".to_string();
    opp.sponsor = "Widget Bureau".to_string();

    assert!(filter.evaluate(&applicant(), &opp).passes);
}
