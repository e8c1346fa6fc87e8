use pfin_core::ParsedRecord;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{ImportError, Result};

/// Label returned when no rule matches.
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// Built-in heuristics. Order matters: the first matching rule wins.
const BUILTIN_RULES: &[(&str, &[&str])] = &[
    (
        "Food",
        &["supermarket", "grocery", "groceries", "aldi", "lidl", "tesco", "spar"],
    ),
    ("Coffee", &["coffee", "cafe", "starbucks", "espresso"]),
    ("Income", &["salary", "payroll", "pay"]),
    (
        "Utilities",
        &["electricity", "water bill", "gas bill", "utility", "utilities"],
    ),
    ("Rent", &["rent", "landlord"]),
    ("Transport", &["uber", "taxi", "lyft", "cab", "transport"]),
    ("Dining", &["restaurant", "dinner", "lunch", "breakfast", "bar"]),
    ("Insurance", &["insurance"]),
];

/// A category rule as written in configuration.
///
/// `keywords` are whole-word alternatives, matched case-insensitively.
/// `pattern` is a raw regex run against the lowercased description. A rule
/// carries exactly one of the two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl CategoryRule {
    pub fn keywords(category: &str, keywords: &[&str]) -> Self {
        CategoryRule {
            category: category.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            pattern: None,
        }
    }

    pub fn regex(category: &str, pattern: &str) -> Self {
        CategoryRule {
            category: category.to_string(),
            keywords: Vec::new(),
            pattern: Some(pattern.to_string()),
        }
    }

    fn compile(&self) -> Result<CompiledRule> {
        let invalid = |reason: String| ImportError::InvalidRule {
            category: self.category.clone(),
            reason,
        };

        if self.category.trim().is_empty() {
            return Err(invalid("category label is empty".to_string()));
        }

        let source = match (&self.pattern, self.keywords.is_empty()) {
            (Some(pattern), true) => pattern.clone(),
            (None, false) => whole_word_pattern(&self.keywords)
                .ok_or_else(|| invalid("every keyword is blank".to_string()))?,
            (Some(_), false) => {
                return Err(invalid("set either keywords or pattern, not both".to_string()))
            }
            (None, true) => return Err(invalid("needs keywords or a pattern".to_string())),
        };

        let regex = Regex::new(&source).map_err(|e| invalid(e.to_string()))?;
        Ok(CompiledRule {
            category: self.category.trim().to_string(),
            regex,
        })
    }
}

fn whole_word_pattern(keywords: &[String]) -> Option<String> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .map(|k| regex::escape(&k))
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    Some(format!(r"\b(?:{})\b", alternatives.join("|")))
}

#[derive(Debug, Clone)]
struct CompiledRule {
    category: String,
    regex: Regex,
}

/// Ordered, immutable rule list mapping descriptions to categories.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<CompiledRule>,
}

impl Classifier {
    /// Compiles `rules`, keeping their order.
    pub fn new(rules: &[CategoryRule]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(CategoryRule::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// The process-wide built-in rule list, compiled on first use.
    pub fn builtin() -> &'static Classifier {
        static BUILTIN: OnceLock<Classifier> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            Classifier::new(&builtin_rules()).expect("built-in category rules are valid")
        })
    }

    /// Category of the first rule matching `description`, if any.
    pub fn matching_category(&self, description: &str) -> Option<&str> {
        let text = description.to_lowercase();
        self.rules
            .iter()
            .find(|r| r.regex.is_match(&text))
            .map(|r| r.category.as_str())
    }

    pub fn classify(&self, description: &str) -> &str {
        self.matching_category(description).unwrap_or(DEFAULT_CATEGORY)
    }

    /// Fills the category of every unclassified record. Returns how many were filled.
    pub fn fill_missing(&self, records: &mut [ParsedRecord]) -> usize {
        let mut filled = 0;
        for record in records.iter_mut().filter(|r| !r.is_categorized()) {
            record.category = self.classify(&record.description).to_string();
            filled += 1;
        }
        filled
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Classifier::builtin().clone()
    }
}

pub fn builtin_rules() -> Vec<CategoryRule> {
    BUILTIN_RULES
        .iter()
        .map(|(category, keywords)| CategoryRule::keywords(category, keywords))
        .collect()
}
