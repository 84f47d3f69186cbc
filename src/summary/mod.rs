use std::collections::BTreeMap;
use std::fmt;
use chrono::{Datelike, NaiveDate};
use crate::transaction::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Granularity {
    Month,
    Year,
}

/// A transaction's date truncated to the requested granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Period {
    Month { year: i32, month: u32 },
    Year { year: i32 },
}

impl Period {
    pub(crate) fn of(date: NaiveDate, granularity: Granularity) -> Period {
        match granularity {
            Granularity::Month => Period::Month { year: date.year(), month: date.month() },
            Granularity::Year => Period::Year { year: date.year() },
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Period::Month { year, month } => write!(f, "{year}-{month:02}"),
            Period::Year { year } => write!(f, "{year}"),
        }
    }
}

/// A transaction with its resolved category. Derived on every run, never
/// persisted.
#[derive(Debug, Clone)]
pub(crate) struct CategorizedTransaction {
    pub(crate) transaction: Transaction,
    pub(crate) category: String,
    /// Index of the rule that matched, None for "Uncategorized"
    pub(crate) rule_index: Option<usize>,
}

/// The finished summary handed to the report layer
pub(crate) struct Summary {
    /// (category, period) -> signed total in minor units
    pub(crate) buckets: BTreeMap<(String, Period), i64>,
    pub(crate) period_totals: BTreeMap<Period, i64>,
    pub(crate) grand_total: i64,
    /// Categories that actually received transactions, sorted
    pub(crate) categories: Vec<String>,
}

/// The aggregator's totals cannot be trusted. This is an internal defect, not
/// a user error; the run fails and no report is emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReconcileError {
    Mismatch {
        period: String,
        bucket_total: i64,
        transaction_total: i64,
    },
    /// A total exceeded i64; wrapped sums would reconcile by accident, so
    /// overflow is surfaced as its own invariant failure
    Overflow { period: String },
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReconcileError::Mismatch { period, bucket_total, transaction_total } => write!(
                f,
                "reconciliation failed for period {period}: bucket total {bucket_total} != transaction total {transaction_total}"
            ),
            ReconcileError::Overflow { period } =>
                write!(f, "amount total overflowed for period {period}"),
        }
    }
}

impl std::error::Error for ReconcileError {}

/// Group categorized transactions into (category, period) buckets of integer
/// minor-unit totals, then verify the reconciliation invariant: per period,
/// the bucket totals must sum to the deduplicated transaction amounts.
pub(crate) fn aggregate(
    categorized: &[CategorizedTransaction],
    granularity: Granularity,
) -> Result<Summary, ReconcileError> {
    let mut buckets: BTreeMap<(String, Period), i64> = BTreeMap::new();
    let mut expected: BTreeMap<Period, i64> = BTreeMap::new();

    for ct in categorized {
        let period = Period::of(ct.transaction.date, granularity);

        let bucket = buckets.entry((ct.category.clone(), period)).or_insert(0);
        *bucket = bucket
            .checked_add(ct.transaction.amount)
            .ok_or_else(|| ReconcileError::Overflow { period: period.to_string() })?;
        let period_sum = expected.entry(period).or_insert(0);
        *period_sum = period_sum
            .checked_add(ct.transaction.amount)
            .ok_or_else(|| ReconcileError::Overflow { period: period.to_string() })?;
    }

    let mut period_totals: BTreeMap<Period, i64> = BTreeMap::new();
    for ((_, period), total) in &buckets {
        let running = period_totals.entry(*period).or_insert(0);
        *running = running
            .checked_add(*total)
            .ok_or_else(|| ReconcileError::Overflow { period: period.to_string() })?;
    }

    for (period, expected_total) in &expected {
        let bucket_total = period_totals.get(period).copied().unwrap_or(0);
        if bucket_total != *expected_total {
            return Err(ReconcileError::Mismatch {
                period: period.to_string(),
                bucket_total,
                transaction_total: *expected_total,
            });
        }
    }

    let grand_total = period_totals
        .values()
        .try_fold(0i64, |acc, total| acc.checked_add(*total))
        .ok_or_else(|| ReconcileError::Overflow { period: "all".to_string() })?;
    let mut categories: Vec<String> = buckets.keys().map(|(category, _)| category.clone()).collect();
    categories.dedup();

    Ok(Summary {
        buckets,
        period_totals,
        grand_total,
        categories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::tests::transaction;

    fn categorized(date: &str, amount: i64, category: &str) -> CategorizedTransaction {
        CategorizedTransaction {
            transaction: transaction(date, "TEST", amount, "amex"),
            category: category.to_string(),
            rule_index: if category == "Uncategorized" { None } else { Some(0) },
        }
    }

    #[test]
    fn test_monthly_buckets() {
        let input = vec![
            categorized("2024-03-01", -450, "Dining"),
            categorized("2024-03-20", -1200, "Dining"),
            categorized("2024-04-02", -7000, "Transport"),
        ];

        let summary = aggregate(&input, Granularity::Month).unwrap();
        let march = Period::Month { year: 2024, month: 3 };
        let april = Period::Month { year: 2024, month: 4 };
        assert_eq!(summary.buckets[&("Dining".to_string(), march)], -1650);
        assert_eq!(summary.buckets[&("Transport".to_string(), april)], -7000);
        assert_eq!(summary.period_totals[&march], -1650);
        assert_eq!(summary.grand_total, -8650);
    }

    #[test]
    fn test_yearly_buckets() {
        let input = vec![
            categorized("2024-03-01", -450, "Dining"),
            categorized("2024-11-20", -1200, "Dining"),
            categorized("2025-01-02", -100, "Dining"),
        ];

        let summary = aggregate(&input, Granularity::Year).unwrap();
        assert_eq!(summary.buckets[&("Dining".to_string(), Period::Year { year: 2024 })], -1650);
        assert_eq!(summary.buckets[&("Dining".to_string(), Period::Year { year: 2025 })], -100);
    }

    #[test]
    fn test_reconciliation_includes_uncategorized() {
        let input = vec![
            categorized("2024-03-01", -450, "Dining"),
            categorized("2024-03-05", -999, "Uncategorized"),
            categorized("2024-03-09", 300000, "Income"),
        ];

        let summary = aggregate(&input, Granularity::Month).unwrap();
        let march = Period::Month { year: 2024, month: 3 };
        assert_eq!(summary.period_totals[&march], -450 - 999 + 300000);
        assert!(summary.categories.contains(&"Uncategorized".to_string()));
    }

    #[test]
    fn test_aggregation_is_order_independent() {
        let mut input = vec![
            categorized("2024-03-01", -450, "Dining"),
            categorized("2024-03-05", -999, "Groceries"),
            categorized("2024-04-09", 300000, "Income"),
        ];
        let forward = aggregate(&input, Granularity::Month).unwrap();
        input.reverse();
        let backward = aggregate(&input, Granularity::Month).unwrap();

        assert_eq!(forward.buckets, backward.buckets);
        assert_eq!(forward.grand_total, backward.grand_total);
    }

    #[test]
    fn test_overflowing_total_is_an_invariant_failure() {
        let input = vec![
            categorized("2024-03-01", i64::MAX, "Dining"),
            categorized("2024-03-02", 1, "Dining"),
        ];

        let result = aggregate(&input, Granularity::Month);
        assert!(matches!(result, Err(ReconcileError::Overflow { .. })));
    }

    #[test]
    fn test_empty_input() {
        let summary = aggregate(&[], Granularity::Month).unwrap();
        assert!(summary.buckets.is_empty());
        assert_eq!(summary.grand_total, 0);
    }

    #[test]
    fn test_period_display() {
        assert_eq!(Period::Month { year: 2024, month: 3 }.to_string(), "2024-03");
        assert_eq!(Period::Year { year: 2024 }.to_string(), "2024");
    }
}
