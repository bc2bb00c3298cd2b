use std::collections::BTreeMap;

use super::domain::{BudgetBand, EntityType};

/// One shared lookup table for everything the filter, scorer, and fetcher
/// agree on: entity-tag synonyms, focus-area aliases (doubling as the title
/// keyword lexicon), goal-to-purpose expansion, and the enrichment
/// prefilter's reject keywords. Injecting a single instance into all three
/// components guarantees they can never disagree on what counts as an alias.
#[derive(Debug)]
pub struct MatchLexicon {
    focus_aliases: BTreeMap<&'static str, &'static [&'static str]>,
    goal_purposes: BTreeMap<&'static str, &'static [&'static str]>,
    reject_keywords: &'static [&'static str],
}

impl MatchLexicon {
    /// The fixed production lexicon. Constructed once and borrowed by every
    /// pipeline component.
    pub fn standard() -> Self {
        let mut focus_aliases: BTreeMap<&'static str, &'static [&'static str]> = BTreeMap::new();
        focus_aliases.insert(
            "education",
            &["education", "literacy", "stem", "youth", "school", "teaching"],
        );
        focus_aliases.insert(
            "health",
            &["health", "healthcare", "medical", "wellness", "public health", "mental health"],
        );
        focus_aliases.insert(
            "environment",
            &[
                "environment",
                "climate",
                "conservation",
                "sustainability",
                "clean energy",
                "water",
            ],
        );
        focus_aliases.insert(
            "arts",
            &["arts", "culture", "music", "humanities", "creative", "museum"],
        );
        focus_aliases.insert(
            "community",
            &["community", "civic", "neighborhood", "housing", "economic development"],
        );
        focus_aliases.insert(
            "technology",
            &["technology", "tech", "innovation", "digital", "broadband", "software"],
        );
        focus_aliases.insert(
            "agriculture",
            &["agriculture", "farm", "rural", "food", "nutrition"],
        );
        focus_aliases.insert(
            "research",
            &["research", "science", "scientific", "study", "development"],
        );
        focus_aliases.insert(
            "social_services",
            &["social services", "human services", "poverty", "homeless", "veterans"],
        );

        let mut goal_purposes: BTreeMap<&'static str, &'static [&'static str]> = BTreeMap::new();
        goal_purposes.insert(
            "expand_programs",
            &["program", "expansion", "capacity", "growth"],
        );
        goal_purposes.insert("hire_staff", &["staffing", "personnel", "capacity", "salary"]);
        goal_purposes.insert(
            "buy_equipment",
            &["equipment", "capital", "infrastructure", "facilities"],
        );
        goal_purposes.insert(
            "general_operating",
            &["operating", "general support", "unrestricted", "overhead"],
        );
        goal_purposes.insert("launch_project", &["project", "pilot", "seed", "startup"]);
        goal_purposes.insert("research", &["research", "study", "evaluation", "data"]);
        goal_purposes.insert(
            "training",
            &["training", "education", "professional development", "workshop"],
        );

        Self {
            focus_aliases,
            goal_purposes,
            reject_keywords: &[
                "invitation only",
                "by invitation",
                "invited applicants only",
                "employees only",
                "members only",
                "renewal applicants only",
                "not accepting applications",
            ],
        }
    }

    /// Synonyms an opportunity's eligibility tags may use for an entity type.
    pub fn entity_synonyms(&self, entity: EntityType) -> &'static [&'static str] {
        match entity {
            EntityType::Individual => &["individual", "person", "sole proprietor", "artist"],
            EntityType::Nonprofit => {
                &["nonprofit", "non-profit", "501(c)", "charitable", "ngo", "charity"]
            }
            EntityType::SmallBusiness => {
                &["small business", "sme", "entrepreneur", "startup", "microbusiness"]
            }
            EntityType::ForProfit => &["for-profit", "for profit", "business", "corporation", "commercial"],
            EntityType::Educational => {
                &["education", "school", "university", "college", "academic", "district"]
            }
            EntityType::Government => {
                &["government", "municipal", "state agency", "public sector", "county"]
            }
            EntityType::Tribal => &["tribal", "native american", "indigenous", "tribe"],
        }
    }

    /// A focus tag expanded through the alias table. The tag itself is always
    /// included, so unknown tags still match literally. The same expansion
    /// serves as the title-keyword lexicon for uncategorized opportunities.
    pub fn focus_aliases(&self, tag: &str) -> Vec<String> {
        let key = tag.trim().to_ascii_lowercase();
        let mut aliases = vec![key.clone()];
        if let Some(extra) = self.focus_aliases.get(key.as_str()) {
            for alias in *extra {
                if *alias != key {
                    aliases.push((*alias).to_string());
                }
            }
        }
        aliases
    }

    /// Purpose-tag keywords a stated goal expands to. Unknown goals expand to
    /// themselves so free-text goals still get a literal chance to match.
    pub fn goal_purposes(&self, goal: &str) -> Vec<String> {
        let key = goal.trim().to_ascii_lowercase();
        let mut keywords = vec![key.replace('_', " ")];
        if let Some(extra) = self.goal_purposes.get(key.as_str()) {
            for keyword in *extra {
                keywords.push((*keyword).to_string());
            }
        }
        keywords
    }

    /// Phrases that mark an opportunity as unusable for open applicants.
    pub fn reject_keywords(&self) -> &'static [&'static str] {
        self.reject_keywords
    }

    /// Award-size categories considered appropriate for a budget band.
    pub fn appropriate_sizes(&self, band: BudgetBand) -> &'static [AwardSize] {
        match band {
            BudgetBand::Micro => &[AwardSize::Micro, AwardSize::Small],
            BudgetBand::Small => &[AwardSize::Micro, AwardSize::Small, AwardSize::Medium],
            BudgetBand::Medium => &[AwardSize::Small, AwardSize::Medium, AwardSize::Large],
            BudgetBand::Large => &[AwardSize::Medium, AwardSize::Large],
        }
    }
}

/// Award-size bucket derived from the midpoint of an opportunity's funding
/// range at the 10k/50k/250k thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardSize {
    Micro,
    Small,
    Medium,
    Large,
}

impl AwardSize {
    pub fn from_midpoint(midpoint: u64) -> Self {
        if midpoint < 10_000 {
            AwardSize::Micro
        } else if midpoint < 50_000 {
            AwardSize::Small
        } else if midpoint < 250_000 {
            AwardSize::Medium
        } else {
            AwardSize::Large
        }
    }
}

/// Case-insensitive substring containment.
pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
}

/// Substring match in either direction, used for tag comparisons where
/// "nonprofit" should match "Nonprofit 501(c)(3)" and vice versa.
pub(crate) fn matches_either_way(a: &str, b: &str) -> bool {
    contains_ci(a, b) || contains_ci(b, a)
}
