use std::collections::BTreeSet;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::models::{Category, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    #[default]
    Contains,
    StartsWith,
    Regex,
}

impl MatchType {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::Regex => "regex",
        }
    }
}

/// A rule as written in the rules file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub pattern: String,
    pub category: String,
    #[serde(default)]
    pub match_type: MatchType,
    /// Higher runs first. Equal priorities keep file order.
    #[serde(default)]
    pub priority: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesFile {
    /// Allowed category labels. Empty means any label is accepted.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone)]
enum Matcher {
    Contains(String),
    StartsWith(String),
    Regex(Regex),
}

impl Matcher {
    fn matches(&self, description: &str) -> bool {
        match self {
            Self::Contains(upper) => description.to_uppercase().contains(upper.as_str()),
            Self::StartsWith(upper) => description.to_uppercase().starts_with(upper.as_str()),
            Self::Regex(re) => re.is_match(description),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    /// Position in the rules file, 1-based.
    pub index: usize,
    pub spec: RuleSpec,
    pub category: Category,
    matcher: Matcher,
}

impl Rule {
    pub fn matches(&self, description: &str) -> bool {
        self.matcher.matches(description)
    }
}

/// Validated, ordered rules. Construction fails on anything that would make
/// precedence ambiguous or a rule unusable.
#[derive(Debug, Clone, Default)]
pub struct Ruleset {
    rules: Vec<Rule>,
    categories: BTreeSet<Category>,
}

pub struct CategorizeResult {
    pub categorized: usize,
    pub uncategorized: usize,
    /// Matches per rule, in evaluation order.
    pub hits: Vec<usize>,
    /// Preset labels outside the declared category set, dropped before
    /// the rules ran.
    pub unknown_presets: usize,
}

fn dedup_key(spec: &RuleSpec) -> (MatchType, String) {
    let pattern = match spec.match_type {
        MatchType::Regex => spec.pattern.clone(),
        _ => spec.pattern.trim().to_uppercase(),
    };
    (spec.match_type, pattern)
}

impl Ruleset {
    pub fn new(categories: &[String], specs: Vec<RuleSpec>) -> std::result::Result<Self, ConfigError> {
        let allowed: BTreeSet<Category> = categories
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(Category::new)
            .collect();

        let mut rules: Vec<Rule> = Vec::with_capacity(specs.len());
        for (i, spec) in specs.into_iter().enumerate() {
            let index = i + 1;
            if spec.pattern.trim().is_empty() {
                return Err(ConfigError::EmptyPattern { index });
            }
            let label = spec.category.trim();
            if label.is_empty() {
                return Err(ConfigError::EmptyCategory { index });
            }
            let category = Category::new(label);
            if !allowed.is_empty() && !allowed.contains(&category) && !category.is_uncategorized() {
                return Err(ConfigError::UnknownCategory {
                    index,
                    category: label.to_string(),
                });
            }

            let key = dedup_key(&spec);
            if let Some(first) = rules.iter().find(|r| dedup_key(&r.spec) == key) {
                return Err(ConfigError::DuplicateRule {
                    index,
                    first: first.index,
                    pattern: spec.pattern.clone(),
                });
            }

            let matcher = match spec.match_type {
                MatchType::Contains => Matcher::Contains(spec.pattern.trim().to_uppercase()),
                MatchType::StartsWith => Matcher::StartsWith(spec.pattern.trim().to_uppercase()),
                MatchType::Regex => Matcher::Regex(Regex::new(&spec.pattern).map_err(|e| {
                    ConfigError::InvalidPattern {
                        index,
                        pattern: spec.pattern.clone(),
                        message: e.to_string(),
                    }
                })?),
            };

            rules.push(Rule {
                index,
                spec,
                category,
                matcher,
            });
        }

        // Stable sort: equal priorities stay in file order.
        rules.sort_by(|a, b| b.spec.priority.cmp(&a.spec.priority));

        Ok(Self {
            rules,
            categories: allowed,
        })
    }

    pub fn from_file(file: RulesFile) -> std::result::Result<Self, ConfigError> {
        Self::new(&file.categories, file.rules)
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn categories(&self) -> &BTreeSet<Category> {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn first_match(&self, description: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.matches(description))
    }

    pub fn categorize(&self, description: &str) -> Category {
        self.first_match(description)
            .map(|i| self.rules[i].category.clone())
            .unwrap_or_else(Category::uncategorized)
    }

    /// Whether `category` may be used. Anything goes when no set is declared.
    pub fn allows(&self, category: &Category) -> bool {
        self.categories.is_empty() || category.is_uncategorized() || self.categories.contains(category)
    }

    /// Assigns a category to every transaction that has none yet.
    /// Transactions that already carry one are left as they are, unless the
    /// label is outside the declared set: those are cleared and go through
    /// the rules like any other row.
    pub fn apply(&self, transactions: &mut [Transaction]) -> CategorizeResult {
        let mut hits = vec![0usize; self.rules.len()];
        let mut categorized = 0usize;
        let mut uncategorized = 0usize;
        let mut unknown_presets = 0usize;

        for txn in transactions.iter_mut() {
            if let Some(cat) = txn.category.as_ref().filter(|c| !self.allows(c)) {
                log::info!("line {}: unknown category '{cat}', categorizing by rules", txn.line);
                txn.category = None;
                unknown_presets += 1;
            }
        }

        for txn in transactions.iter_mut().filter(|t| t.category.is_none()) {
            match self.first_match(&txn.description) {
                Some(i) => {
                    hits[i] += 1;
                    categorized += 1;
                    txn.category = Some(self.rules[i].category.clone());
                }
                None => {
                    uncategorized += 1;
                    txn.category = Some(Category::uncategorized());
                }
            }
        }

        log::debug!("categorized {categorized}, {uncategorized} left uncategorized");
        CategorizeResult {
            categorized,
            uncategorized,
            hits,
            unknown_presets,
        }
    }
}

/// Load and validate a JSON rules file.
pub fn load_ruleset(path: &Path) -> Result<Ruleset> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let file: RulesFile = serde_json::from_str(&content).map_err(|e| ConfigError::Unreadable {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let ruleset = Ruleset::from_file(file)?;
    log::info!("loaded {} rule(s) from {}", ruleset.len(), path.display());
    Ok(ruleset)
}

/// Rules written by `tally init`.
pub fn starter_rules() -> RulesFile {
    let rule = |pattern: &str, category: &str| RuleSpec {
        pattern: pattern.to_string(),
        category: category.to_string(),
        match_type: MatchType::Contains,
        priority: 0,
    };
    RulesFile {
        categories: ["Dining", "Groceries", "Housing", "Income", "Subscriptions", "Transport"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        rules: vec![
            RuleSpec {
                pattern: "^(PAYROLL|SALARY)".to_string(),
                category: "Income".to_string(),
                match_type: MatchType::Regex,
                priority: 10,
            },
            rule("coffee", "Dining"),
            rule("restaurant", "Dining"),
            rule("grocery", "Groceries"),
            rule("rent", "Housing"),
            rule("netflix", "Subscriptions"),
            rule("spotify", "Subscriptions"),
            rule("uber", "Transport"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn spec(pattern: &str, category: &str, match_type: MatchType, priority: i64) -> RuleSpec {
        RuleSpec {
            pattern: pattern.to_string(),
            category: category.to_string(),
            match_type,
            priority,
        }
    }

    fn txn(description: &str) -> Transaction {
        Transaction {
            date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            description: description.to_string(),
            amount: Decimal::new(-5000, 2),
            category: None,
            line: 2,
        }
    }

    #[test]
    fn test_contains_rule_is_case_insensitive() {
        let rs = Ruleset::new(&[], vec![spec("adobe", "Software", MatchType::Contains, 0)]).unwrap();
        assert_eq!(rs.categorize("ADOBE CREATIVE CLOUD"), Category::new("Software"));
    }

    #[test]
    fn test_starts_with_rule() {
        let rs = Ruleset::new(&[], vec![spec("STRIPE", "Fees", MatchType::StartsWith, 0)]).unwrap();
        assert_eq!(rs.categorize("stripe payment"), Category::new("Fees"));
        assert!(rs.categorize("PAY STRIPE FEE").is_uncategorized());
    }

    #[test]
    fn test_regex_rule() {
        let rs = Ruleset::new(&[], vec![spec(r"^AWS.*\d+$", "Hosting", MatchType::Regex, 0)]).unwrap();
        assert_eq!(rs.categorize("AWS Services 12345"), Category::new("Hosting"));
        assert!(rs.categorize("aws services").is_uncategorized());
    }

    #[test]
    fn test_first_match_wins_in_file_order() {
        let rs = Ruleset::new(
            &[],
            vec![
                spec("Coffee", "Dining", MatchType::Contains, 0),
                spec("Shop", "Shopping", MatchType::Contains, 0),
            ],
        )
        .unwrap();
        assert_eq!(rs.categorize("Coffee Shop"), Category::new("Dining"));
    }

    #[test]
    fn test_higher_priority_wins() {
        let rs = Ruleset::new(
            &[],
            vec![
                spec("PAYMENT", "Fees", MatchType::Contains, 5),
                spec("RECEIVED", "Income", MatchType::Contains, 10),
            ],
        )
        .unwrap();
        assert_eq!(rs.categorize("PAYMENT RECEIVED"), Category::new("Income"));
        assert_eq!(rs.rules()[0].index, 2);
    }

    #[test]
    fn test_no_match_is_uncategorized() {
        let rs = Ruleset::new(&[], vec![spec("Coffee", "Dining", MatchType::Contains, 0)]).unwrap();
        assert!(rs.categorize("RANDOM VENDOR XYZ").is_uncategorized());
        assert!(Ruleset::default().categorize("anything").is_uncategorized());
    }

    #[test]
    fn test_categorize_is_deterministic() {
        let rs = Ruleset::from_file(starter_rules()).unwrap();
        let first = rs.categorize("Corner Coffee Roasters");
        for _ in 0..10 {
            assert_eq!(rs.categorize("Corner Coffee Roasters"), first);
        }
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let err = Ruleset::new(
            &[],
            vec![
                spec("coffee", "Dining", MatchType::Contains, 0),
                spec(" COFFEE ", "Snacks", MatchType::Contains, 3),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateRule {
                index: 2,
                first: 1,
                pattern: " COFFEE ".to_string()
            }
        );
    }

    #[test]
    fn test_same_pattern_different_match_type_is_allowed() {
        let rs = Ruleset::new(
            &[],
            vec![
                spec("UBER", "Transport", MatchType::StartsWith, 0),
                spec("UBER", "Dining", MatchType::Contains, 0),
            ],
        );
        assert!(rs.is_ok());
    }

    #[test]
    fn test_invalid_rules_rejected_at_load() {
        assert_eq!(
            Ruleset::new(&[], vec![spec("  ", "Dining", MatchType::Contains, 0)]).unwrap_err(),
            ConfigError::EmptyPattern { index: 1 }
        );
        assert_eq!(
            Ruleset::new(&[], vec![spec("x", "", MatchType::Contains, 0)]).unwrap_err(),
            ConfigError::EmptyCategory { index: 1 }
        );
        assert!(matches!(
            Ruleset::new(&[], vec![spec("(unclosed", "Dining", MatchType::Regex, 0)]).unwrap_err(),
            ConfigError::InvalidPattern { index: 1, .. }
        ));
    }

    #[test]
    fn test_unknown_category_rejected_when_set_declared() {
        let cats = vec!["Dining".to_string()];
        let err = Ruleset::new(&cats, vec![spec("uber", "Transport", MatchType::Contains, 0)]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownCategory {
                index: 1,
                category: "Transport".to_string()
            }
        );
        assert!(Ruleset::new(&cats, vec![spec("coffee", "Dining", MatchType::Contains, 0)]).is_ok());
    }

    #[test]
    fn test_apply_fills_only_missing_categories() {
        let rs = Ruleset::new(&[], vec![spec("ADOBE", "Software", MatchType::Contains, 0)]).unwrap();
        let mut txns = vec![txn("ADOBE PHOTOSHOP"), txn("ADOBE ILLUSTRATOR"), txn("MYSTERY"), txn("ADOBE STOCK")];
        txns[3].category = Some(Category::new("Stock Photos"));
        let result = rs.apply(&mut txns);
        assert_eq!(result.categorized, 2);
        assert_eq!(result.uncategorized, 1);
        assert_eq!(result.hits, vec![2]);
        assert_eq!(txns[0].category, Some(Category::new("Software")));
        assert_eq!(txns[2].category, Some(Category::uncategorized()));
        assert_eq!(txns[3].category, Some(Category::new("Stock Photos")));
    }

    #[test]
    fn test_apply_clears_presets_outside_declared_set() {
        let cats = vec!["Dining".to_string(), "Software".to_string()];
        let rs = Ruleset::new(&cats, vec![spec("coffee", "Dining", MatchType::Contains, 0)]).unwrap();
        let mut txns = vec![txn("Coffee"), txn("Coffee"), txn("Adobe"), txn("Lunch")];
        txns[0].category = Some(Category::new("Bogus"));
        txns[1].category = Some(Category::uncategorized());
        txns[2].category = Some(Category::new("Software"));
        txns[3].category = Some(Category::new("Bogus"));

        let result = rs.apply(&mut txns);
        assert_eq!(result.unknown_presets, 2);
        assert_eq!(txns[0].category, Some(Category::new("Dining")));
        assert_eq!(txns[1].category, Some(Category::uncategorized()));
        assert_eq!(txns[2].category, Some(Category::new("Software")));
        assert_eq!(txns[3].category, Some(Category::uncategorized()));
        assert_eq!(result.categorized, 1);
        assert_eq!(result.uncategorized, 1);
    }

    #[test]
    fn test_apply_keeps_any_preset_without_declared_set() {
        let rs = Ruleset::new(&[], vec![spec("coffee", "Dining", MatchType::Contains, 0)]).unwrap();
        let mut txns = vec![txn("Coffee")];
        txns[0].category = Some(Category::new("Bogus"));
        let result = rs.apply(&mut txns);
        assert_eq!(result.unknown_presets, 0);
        assert_eq!(txns[0].category, Some(Category::new("Bogus")));
    }

    #[test]
    fn test_load_ruleset_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(
            &path,
            r#"{"rules": [{"pattern": "Coffee", "category": "Dining"},
                          {"pattern": "^RENT", "category": "Housing", "match_type": "regex", "priority": 2}]}"#,
        )
        .unwrap();
        let rs = load_ruleset(&path).unwrap();
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.rules()[0].spec.match_type, MatchType::Regex);
        assert_eq!(rs.categorize("Coffee Shop"), Category::new("Dining"));
    }

    #[test]
    fn test_load_ruleset_errors_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            load_ruleset(&missing),
            Err(crate::error::TallyError::Config(ConfigError::Unreadable { .. }))
        ));
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(
            load_ruleset(&bad),
            Err(crate::error::TallyError::Config(ConfigError::Unreadable { .. }))
        ));
    }

    #[test]
    fn test_starter_rules_are_valid() {
        let rs = Ruleset::from_file(starter_rules()).unwrap();
        assert_eq!(rs.categorize("PAYROLL ACME INC"), Category::new("Income"));
        assert_eq!(rs.categorize("Monthly rent"), Category::new("Housing"));
    }
}
