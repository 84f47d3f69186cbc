use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use chrono::NaiveDate;
use csv::StringRecord;
use log::{debug, info};
use crate::dialect::{DialectDescriptor, SignConvention};
use crate::transaction::Transaction;

#[cfg(test)]
pub(crate) mod tests;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvError {
    FileNotFoundError(String),
    InvalidFileError(String),
}

impl fmt::Display for CsvError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "csv reading error: {}",
            match self {
                CsvError::FileNotFoundError(s) => s,
                CsvError::InvalidFileError(s) => s,
            }
        )
    }
}

impl std::error::Error for CsvError {}

/// Result of reading one statement file
pub(crate) struct StatementRead {
    pub(crate) transactions: Vec<Transaction>,
    /// Rows skipped because the date did not parse with the dialect's format
    pub(crate) bad_dates: usize,
    /// Rows skipped because the amount was not a valid monetary value
    pub(crate) bad_amounts: usize,
    /// Rows the csv reader itself could not decode
    pub(crate) malformed_rows: usize,
}

/// Resolved 0-based column indexes for one file
struct ColumnIndex {
    date: usize,
    description: usize,
    amount: usize,
    account: Option<usize>,
    kind: Option<usize>,
}

/// Read the raw first line of a file, used for dialect selection. The dialect
/// is not known yet at that point, so no delimiter is assumed.
pub(crate) fn read_header_line(file_path: &Path) -> Result<String, CsvError> {
    if !file_path.exists() {
        return Err(CsvError::FileNotFoundError(format!("File not found: {}", file_path.display())));
    }
    let file = File::open(file_path)
        .map_err(|e| CsvError::InvalidFileError(format!("{}: {e}", file_path.display())))?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|e| CsvError::InvalidFileError(format!("{}: {e}", file_path.display())))?;
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return Err(CsvError::InvalidFileError(format!("{} is empty", file_path.display())));
    }
    Ok(line.to_string())
}

/// Parse one statement file into canonical transactions using its dialect
/// descriptor. Rows with a malformed date or amount are skipped and counted,
/// never fatal. The file is left untouched and can be re-read on every run.
pub(crate) fn read_statement(
    file_path: &Path,
    dialect: &DialectDescriptor,
    fallback_account: &str,
) -> Result<StatementRead, CsvError> {
    if !file_path.exists() {
        return Err(CsvError::FileNotFoundError(format!("File not found: {}", file_path.display())));
    }

    info!("Reading {} as dialect '{}'", file_path.display(), dialect.name);
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(dialect.delimiter)
        .flexible(true)
        .has_headers(true)
        .from_path(file_path)
        .map_err(|e| CsvError::InvalidFileError(format!("{}: {e}", file_path.display())))?;

    let headers = rdr
        .headers()
        .map_err(|e| CsvError::InvalidFileError(format!("{}: {e}", file_path.display())))?
        .clone();
    let columns = resolve_columns(&headers, dialect)?;

    let source_file = file_path.display().to_string();
    let mut read = StatementRead {
        transactions: vec![],
        bad_dates: 0,
        bad_amounts: 0,
        malformed_rows: 0,
    };

    for (i, record) in rdr.records().enumerate() {
        let row_number = i + 1;
        let row = match record {
            Ok(row) => row,
            Err(e) => {
                debug!("{source_file} row {row_number}: unreadable record: {e}");
                read.malformed_rows += 1;
                continue;
            }
        };

        let date_value = row.get(columns.date).unwrap_or("");
        let date = match NaiveDate::parse_from_str(date_value.trim(), &dialect.date_format) {
            Ok(date) => date,
            Err(_) => {
                debug!("{source_file} row {row_number}: bad date '{date_value}'");
                read.bad_dates += 1;
                continue;
            }
        };

        let amount_value = row.get(columns.amount).unwrap_or("");
        let amount = match parse_amount(amount_value, dialect.decimal_separator) {
            Some(amount) => amount,
            None => {
                debug!("{source_file} row {row_number}: bad amount '{amount_value}'");
                read.bad_amounts += 1;
                continue;
            }
        };
        let amount = apply_sign(amount, &row, &columns, dialect);

        let description = row.get(columns.description).unwrap_or("").to_string();
        let account_id = match columns.account {
            Some(i) => row.get(i).unwrap_or(fallback_account).to_string(),
            None => fallback_account.to_string(),
        };

        let mut raw_fields = BTreeMap::new();
        for (header, value) in headers.iter().zip(row.iter()) {
            raw_fields.insert(header.to_string(), value.to_string());
        }

        read.transactions.push(Transaction {
            date,
            description,
            amount,
            account_id,
            raw_fields,
            source_file: source_file.clone(),
            row_number,
        });
    }

    info!(
        "{}: {} transactions, {} rows skipped",
        source_file,
        read.transactions.len(),
        read.bad_dates + read.bad_amounts + read.malformed_rows
    );
    Ok(read)
}

fn resolve_columns(headers: &StringRecord, dialect: &DialectDescriptor) -> Result<ColumnIndex, CsvError> {
    let find = |header: &str| -> Option<usize> {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(header.trim()))
    };
    let find_required = |header: &str| -> Result<usize, CsvError> {
        find(header).ok_or_else(|| {
            CsvError::InvalidFileError(format!("Unable to locate '{header}' column"))
        })
    };

    Ok(ColumnIndex {
        date: find_required(&dialect.columns.date)?,
        description: find_required(&dialect.columns.description)?,
        amount: find_required(&dialect.columns.amount)?,
        account: dialect.columns.account.as_deref().and_then(find),
        kind: dialect.columns.kind.as_deref().and_then(find),
    })
}

/// Parse a monetary value into signed minor units without going through
/// floating point. Currency symbols, spaces and grouping separators are
/// stripped; the fraction is taken from the dialect's decimal separator and
/// must have at most two digits.
fn parse_amount(value: &str, decimal_separator: char) -> Option<i64> {
    let mut s = value.trim().replace(['$', '€', '£', ' ', '\u{a0}'], "");
    let grouping = if decimal_separator == ',' { '.' } else { ',' };
    s = s.replace(grouping, "");

    let negative = s.starts_with('-');
    let s = s.trim_start_matches(['-', '+']);
    if s.is_empty() {
        return None;
    }

    let (int_part, fraction_part) = match s.split_once(decimal_separator) {
        Some((int_part, fraction_part)) => (int_part, fraction_part),
        None => (s, ""),
    };
    if !int_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if !fraction_part.chars().all(|c| c.is_ascii_digit()) || fraction_part.len() > 2 {
        return None;
    }

    let whole = if int_part.is_empty() { 0 } else { int_part.parse::<i64>().ok()? };
    let mut fraction = if fraction_part.is_empty() { 0 } else { fraction_part.parse::<i64>().ok()? };
    if fraction_part.len() == 1 {
        fraction *= 10;
    }

    let minor = whole.checked_mul(100)?.checked_add(fraction)?;
    Some(if negative { -minor } else { minor })
}

/// Apply the dialect's sign convention. A row whose type column carries a
/// debit marker is spending no matter what; any other row keeps the sign the
/// convention gives it, so a file's own signs are never destroyed.
fn apply_sign(amount: i64, row: &StringRecord, columns: &ColumnIndex, dialect: &DialectDescriptor) -> i64 {
    if let Some(kind_column) = columns.kind {
        let kind = row.get(kind_column).unwrap_or("").trim();
        let is_debit = dialect
            .debit_markers
            .iter()
            .any(|marker| marker.eq_ignore_ascii_case(kind));
        if is_debit {
            return -amount.abs();
        }
    }

    match dialect.sign {
        SignConvention::NegativeDebit => amount,
        SignConvention::PositiveDebit => -amount,
    }
}
