use std::path::PathBuf;
use chrono::NaiveDate;
use crate::csv_reader::{parse_amount, read_header_line, read_statement};
use crate::dialect::{ColumnMap, DialectDescriptor, SignConvention};

#[test]
fn test_read_header_line() {
    let line = read_header_line(&fixture_filename("westpac.csv")).unwrap();
    assert_eq!(line, "Date,Narrative,Amount,Type,Bank Account");
}

#[test]
fn test_read_statement_positive_debit() {
    let result = read_statement(&fixture_filename("amex.csv"), &amex_dialect(), "amex").unwrap();
    assert_eq!(result.transactions.len(), 3);
    assert_eq!(result.bad_dates + result.bad_amounts + result.malformed_rows, 0);

    let first = &result.transactions[0];
    assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    assert_eq!(first.description, "COFFEE SHOP");
    // positive_debit: statement shows 4.50, internally spending is negative
    assert_eq!(first.amount, -450);
    assert_eq!(first.account_id, "amex");
    assert_eq!(first.row_number, 1);
    assert_eq!(first.raw_fields.get("Amount").map(String::as_str), Some("4.50"));

    // a negative amount in a positive_debit file is money coming in
    assert_eq!(result.transactions[2].amount, 10000);
}

#[test]
fn test_read_statement_type_column_overrides_sign() {
    let result = read_statement(&fixture_filename("westpac.csv"), &westpac_dialect(), "westpac").unwrap();
    assert_eq!(result.transactions.len(), 2);

    assert_eq!(result.transactions[0].description, "COFFEE SHOP");
    assert_eq!(result.transactions[0].amount, -450);
    assert_eq!(result.transactions[1].description, "SALARY");
    assert_eq!(result.transactions[1].amount, 300000);
}

#[test]
fn test_unmarked_rows_keep_their_own_sign() {
    // A row whose type column matches no debit marker falls back to the
    // dialect's sign convention; a signed refund stays a refund
    let result = read_statement(&fixture_filename("refunds.csv"), &westpac_dialect(), "westpac").unwrap();
    assert_eq!(result.transactions.len(), 2);
    assert_eq!(result.transactions[0].description, "REFUND REVERSAL");
    assert_eq!(result.transactions[0].amount, -450);
    assert_eq!(result.transactions[1].amount, -450);
}

#[test]
fn test_type_column_without_markers_is_inert() {
    let mut dialect = westpac_dialect();
    dialect.debit_markers = vec![];

    let result = read_statement(&fixture_filename("refunds.csv"), &dialect, "westpac").unwrap();
    assert_eq!(result.transactions[0].amount, -450);
    assert_eq!(result.transactions[1].amount, 450);
}

#[test]
fn test_bad_rows_are_skipped_and_counted() {
    let result = read_statement(&fixture_filename("badrows.csv"), &amex_dialect(), "amex").unwrap();
    assert_eq!(result.transactions.len(), 2);
    assert_eq!(result.bad_dates, 1);
    assert_eq!(result.bad_amounts, 1);
    assert_eq!(result.transactions[1].row_number, 4);
}

#[test]
fn test_rereading_is_idempotent() {
    let first = read_statement(&fixture_filename("amex.csv"), &amex_dialect(), "amex").unwrap();
    let second = read_statement(&fixture_filename("amex.csv"), &amex_dialect(), "amex").unwrap();
    assert_eq!(first.transactions.len(), second.transactions.len());
    for (a, b) in first.transactions.iter().zip(second.transactions.iter()) {
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}

#[test]
fn test_missing_file() {
    let result = read_statement(&fixture_filename("no-such-file.csv"), &amex_dialect(), "amex");
    assert!(result.is_err());
}

#[test]
fn test_parse_amount_minor_units() {
    assert_eq!(parse_amount("4.50", '.'), Some(450));
    assert_eq!(parse_amount("-4.50", '.'), Some(-450));
    assert_eq!(parse_amount("4.5", '.'), Some(450));
    assert_eq!(parse_amount("4", '.'), Some(400));
    assert_eq!(parse_amount("$1,234.56", '.'), Some(123456));
    assert_eq!(parse_amount("1.234,56", ','), Some(123456));
    assert_eq!(parse_amount("+12.00", '.'), Some(1200));
    assert_eq!(parse_amount("", '.'), None);
    assert_eq!(parse_amount("abc", '.'), None);
    // three fraction digits is excess precision, not silently rounded
    assert_eq!(parse_amount("4.505", '.'), None);
}

fn amex_dialect() -> DialectDescriptor {
    DialectDescriptor {
        name: "amex".to_string(),
        required_headers: vec!["Date".to_string(), "Description".to_string(), "Amount".to_string()],
        columns: ColumnMap {
            date: "Date".to_string(),
            description: "Description".to_string(),
            amount: "Amount".to_string(),
            account: None,
            kind: None,
        },
        date_format: "%d/%m/%Y".to_string(),
        decimal_separator: '.',
        sign: SignConvention::PositiveDebit,
        debit_markers: vec![],
        delimiter: b',',
    }
}

fn westpac_dialect() -> DialectDescriptor {
    DialectDescriptor {
        name: "westpac".to_string(),
        required_headers: vec![
            "Date".to_string(),
            "Narrative".to_string(),
            "Amount".to_string(),
            "Type".to_string(),
        ],
        columns: ColumnMap {
            date: "Date".to_string(),
            description: "Narrative".to_string(),
            amount: "Amount".to_string(),
            account: Some("Bank Account".to_string()),
            kind: Some("Type".to_string()),
        },
        date_format: "%Y-%m-%d".to_string(),
        decimal_separator: '.',
        sign: SignConvention::NegativeDebit,
        debit_markers: vec!["DR".to_string()],
        delimiter: b',',
    }
}

/// Return the path to a file within the test data directory
pub(crate) fn fixture_filename(filename: &str) -> PathBuf {
    let mut dir = fixture_dir();
    dir.push(filename);
    dir
}

pub(crate) fn fixture_dir() -> PathBuf {
    let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    dir.push("fixture");
    dir
}
