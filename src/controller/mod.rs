use std::path::PathBuf;
use anyhow::bail;
use log::{info, warn};
use crate::csv_reader;
use crate::dedup::dedupe;
use crate::dialect::{DialectError, DialectRegistry};
use crate::rules::RuleSet;
use crate::summary::{aggregate, CategorizedTransaction, Granularity, Summary};

/// One statement file resolved by the caller, with the account name the file
/// falls back to when its dialect has no account column
pub(crate) struct StatementFile {
    pub(crate) path: PathBuf,
    pub(crate) account: String,
}

/// A file the run had to leave out, and why. The summary still covers every
/// other file; the report flags the exclusion.
#[derive(Debug, Clone)]
pub(crate) struct ExcludedFile {
    pub(crate) path: String,
    pub(crate) reason: String,
}

/// Per-run counters handed to the report alongside the summary
#[derive(Debug, Clone, Default)]
pub(crate) struct Diagnostics {
    pub(crate) bad_dates: usize,
    pub(crate) bad_amounts: usize,
    pub(crate) malformed_rows: usize,
    pub(crate) duplicates_removed: usize,
    pub(crate) excluded_files: Vec<ExcludedFile>,
}

impl Diagnostics {
    pub(crate) fn rows_skipped(&self) -> usize {
        self.bad_dates + self.bad_amounts + self.malformed_rows
    }
}

pub(crate) struct RunOutput {
    pub(crate) summary: Summary,
    pub(crate) diagnostics: Diagnostics,
}

/// Run the whole pipeline over a resolved list of statement files: select a
/// dialect and parse each file, merge cross-file duplicates, categorize, then
/// aggregate. A file whose dialect is unknown or that cannot be read is
/// excluded and the run continues; the summary is only produced once the
/// reconciliation check has passed.
pub(crate) fn run(
    files: &[StatementFile],
    registry: &DialectRegistry,
    rules: &RuleSet,
    granularity: Granularity,
) -> anyhow::Result<RunOutput> {
    let mut transactions = vec![];
    let mut diagnostics = Diagnostics::default();

    for file in files {
        let path = file.path.display().to_string();
        let header_line = match csv_reader::read_header_line(&file.path) {
            Ok(line) => line,
            Err(e) => {
                warn!("Skipping {path}: {e}");
                diagnostics.excluded_files.push(ExcludedFile { path, reason: e.to_string() });
                continue;
            }
        };

        let dialect = match registry.select(&header_line) {
            Ok(dialect) => dialect,
            Err(e @ DialectError::Ambiguous { .. }) => {
                // A tie between dialects is a configuration error, never
                // silently resolved
                bail!("{path}: {e}");
            }
            Err(e) => {
                warn!("Skipping {path}: {e}");
                diagnostics.excluded_files.push(ExcludedFile { path, reason: e.to_string() });
                continue;
            }
        };

        match csv_reader::read_statement(&file.path, dialect, &file.account) {
            Ok(read) => {
                diagnostics.bad_dates += read.bad_dates;
                diagnostics.bad_amounts += read.bad_amounts;
                diagnostics.malformed_rows += read.malformed_rows;
                transactions.extend(read.transactions);
            }
            Err(e) => {
                warn!("Skipping {path}: {e}");
                diagnostics.excluded_files.push(ExcludedFile { path, reason: e.to_string() });
            }
        }
    }

    // The single point where state is shared across files
    let (deduped, removed) = dedupe(transactions);
    diagnostics.duplicates_removed = removed;

    let categorized: Vec<CategorizedTransaction> = deduped
        .into_iter()
        .map(|transaction| {
            let (category, rule_index) = rules.categorize(&transaction);
            CategorizedTransaction {
                category: category.to_string(),
                rule_index,
                transaction,
            }
        })
        .collect();

    let matched = categorized.iter().filter(|ct| ct.rule_index.is_some()).count();
    info!("Categorized {matched} of {} transactions by rule", categorized.len());

    let summary = aggregate(&categorized, granularity)?;
    Ok(RunOutput { summary, diagnostics })
}
