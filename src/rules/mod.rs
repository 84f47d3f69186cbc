use std::fmt;
use regex::Regex;
use serde::Deserialize;
use crate::transaction::Transaction;

/// Reserved category for transactions no rule matched
pub(crate) const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum MatcherKind {
    Exact,
    Substring,
    Regex,
    AmountRange,
}

/// One rule as written in the rule file, before compilation
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RuleRecord {
    pub(crate) matcher: MatcherKind,
    pub(crate) pattern: String,
    pub(crate) category: String,
    #[serde(default)]
    pub(crate) priority: Option<u32>,
}

enum CompiledMatcher {
    /// Lowercased pattern, compared against the lowercased description
    Exact(String),
    Substring(String),
    Regex(Regex),
    /// Inclusive bounds in minor units
    AmountRange { min: i64, max: i64 },
}

pub(crate) struct CategoryRule {
    matcher: CompiledMatcher,
    pub(crate) category: String,
}

impl CategoryRule {
    fn matches(&self, transaction: &Transaction) -> bool {
        match &self.matcher {
            CompiledMatcher::Exact(pattern) => transaction.description.to_lowercase() == *pattern,
            CompiledMatcher::Substring(pattern) => transaction.description.to_lowercase().contains(pattern),
            CompiledMatcher::Regex(regex) => regex.is_match(&transaction.description),
            CompiledMatcher::AmountRange { min, max } => {
                transaction.amount >= *min && transaction.amount <= *max
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RuleError {
    InvalidRegex { index: usize, pattern: String, message: String },
    InvalidRange { index: usize, pattern: String },
    DuplicatePriority { priority: u32 },
    /// Some rules carry an explicit priority and some do not
    PartialPriority { index: usize },
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RuleError::InvalidRegex { index, pattern, message } =>
                write!(f, "rule {index}: invalid regex '{pattern}': {message}"),
            RuleError::InvalidRange { index, pattern } =>
                write!(f, "rule {index}: invalid amount range '{pattern}', expected 'min..max' in minor units"),
            RuleError::DuplicatePriority { priority } =>
                write!(f, "duplicate rule priority {priority}"),
            RuleError::PartialPriority { index } =>
                write!(f, "rule {index} has no priority while other rules do; use explicit priorities for all rules or none"),
        }
    }
}

impl std::error::Error for RuleError {}

/// The ordered rule set. Order is the evaluation order and part of the
/// user-visible contract: the first rule whose matcher succeeds wins.
pub(crate) struct RuleSet {
    rules: Vec<CategoryRule>,
}

impl RuleSet {
    pub(crate) fn empty() -> RuleSet {
        RuleSet { rules: vec![] }
    }

    /// Compile the full rule set up front. Any invalid regex or range pattern
    /// aborts the whole load; a partially validated rule set is never applied.
    pub(crate) fn load(records: Vec<RuleRecord>) -> Result<RuleSet, RuleError> {
        let records = order_by_priority(records)?;

        let mut rules = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            let matcher = match record.matcher {
                MatcherKind::Exact => CompiledMatcher::Exact(record.pattern.to_lowercase()),
                MatcherKind::Substring => CompiledMatcher::Substring(record.pattern.to_lowercase()),
                MatcherKind::Regex => {
                    let regex = Regex::new(&("(?i)".to_owned() + record.pattern.as_str()))
                        .map_err(|e| RuleError::InvalidRegex {
                            index,
                            pattern: record.pattern.clone(),
                            message: e.to_string(),
                        })?;
                    CompiledMatcher::Regex(regex)
                }
                MatcherKind::AmountRange => {
                    let (min, max) = parse_range(&record.pattern).ok_or(RuleError::InvalidRange {
                        index,
                        pattern: record.pattern.clone(),
                    })?;
                    CompiledMatcher::AmountRange { min, max }
                }
            };
            rules.push(CategoryRule {
                matcher,
                category: record.category,
            });
        }

        Ok(RuleSet { rules })
    }

    /// First-match-wins category assignment. Pure function of the transaction
    /// and the rule set; no state is carried between calls.
    pub(crate) fn categorize(&self, transaction: &Transaction) -> (&str, Option<usize>) {
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.matches(transaction) {
                return (rule.category.as_str(), Some(index));
            }
        }
        (UNCATEGORIZED, None)
    }

    pub(crate) fn len(&self) -> usize {
        self.rules.len()
    }
}

/// Explicit priorities are all-or-none. When present they define the order;
/// otherwise the position in the file does.
fn order_by_priority(records: Vec<RuleRecord>) -> Result<Vec<RuleRecord>, RuleError> {
    let with_priority = records.iter().filter(|r| r.priority.is_some()).count();
    if with_priority == 0 {
        return Ok(records);
    }
    if let Some(index) = records.iter().position(|r| r.priority.is_none()) {
        return Err(RuleError::PartialPriority { index });
    }

    let mut seen = std::collections::HashSet::new();
    for record in &records {
        let priority = record.priority.unwrap();
        if !seen.insert(priority) {
            return Err(RuleError::DuplicatePriority { priority });
        }
    }

    let mut records = records;
    records.sort_by_key(|r| r.priority.unwrap());
    Ok(records)
}

/// Parse "min..max" with inclusive bounds, either side optional
fn parse_range(pattern: &str) -> Option<(i64, i64)> {
    let (min_str, max_str) = pattern.split_once("..")?;
    let min = if min_str.trim().is_empty() {
        i64::MIN
    } else {
        min_str.trim().parse::<i64>().ok()?
    };
    let max = if max_str.trim().is_empty() {
        i64::MAX
    } else {
        max_str.trim().parse::<i64>().ok()?
    };
    if min > max {
        return None;
    }
    Some((min, max))
}
