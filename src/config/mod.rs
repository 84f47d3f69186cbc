use std::fs;
use std::path::Path;
use anyhow::{bail, Context};
use serde::Deserialize;
use crate::dialect::{ColumnMap, DialectDescriptor, DialectRegistry, SignConvention};
use crate::rules::{RuleRecord, RuleSet};

/// On-disk shape of the dialect descriptor file
#[derive(Deserialize, Debug)]
struct DialectsFile {
    #[serde(default, rename = "dialect")]
    dialects: Vec<DialectEntry>,
}

#[derive(Deserialize, Debug)]
struct DialectEntry {
    name: String,
    required_headers: Vec<String>,
    date_format: String,
    #[serde(default = "default_decimal_separator")]
    decimal_separator: String,
    #[serde(default)]
    sign: SignEntry,
    #[serde(default)]
    debit_markers: Vec<String>,
    #[serde(default = "default_delimiter")]
    delimiter: String,
    columns: ColumnsEntry,
}

#[derive(Deserialize, Debug, Default, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum SignEntry {
    #[default]
    NegativeDebit,
    PositiveDebit,
}

#[derive(Deserialize, Debug)]
struct ColumnsEntry {
    date: String,
    description: String,
    amount: String,
    #[serde(default)]
    account: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

fn default_decimal_separator() -> String {
    ".".to_string()
}

fn default_delimiter() -> String {
    ",".to_string()
}

/// Load dialect descriptors and build the validated registry. Any problem here
/// is fatal before a single statement file is touched.
pub(crate) fn load_dialects(file_path: &Path) -> anyhow::Result<DialectRegistry> {
    let content = fs::read_to_string(file_path)
        .with_context(|| format!("Unable to read dialect file {}", file_path.display()))?;
    let file: DialectsFile = toml::from_str(&content)
        .with_context(|| format!("Invalid dialect file {}", file_path.display()))?;
    if file.dialects.is_empty() {
        bail!("Dialect file {} declares no dialects", file_path.display());
    }

    let mut descriptors = Vec::with_capacity(file.dialects.len());
    for entry in file.dialects {
        descriptors.push(to_descriptor(entry)?);
    }
    Ok(DialectRegistry::new(descriptors)?)
}

fn to_descriptor(entry: DialectEntry) -> anyhow::Result<DialectDescriptor> {
    let decimal_separator = single_char(&entry.decimal_separator)
        .with_context(|| format!("dialect '{}': decimal_separator must be one character", entry.name))?;
    let delimiter = single_char(&entry.delimiter)
        .with_context(|| format!("dialect '{}': delimiter must be one character", entry.name))?;
    if !delimiter.is_ascii() {
        bail!("dialect '{}': delimiter must be ASCII", entry.name);
    }
    if !entry.debit_markers.is_empty() && entry.columns.kind.is_none() {
        bail!("dialect '{}': debit_markers given without a 'type' column mapping", entry.name);
    }

    Ok(DialectDescriptor {
        name: entry.name,
        required_headers: entry.required_headers,
        columns: ColumnMap {
            date: entry.columns.date,
            description: entry.columns.description,
            amount: entry.columns.amount,
            account: entry.columns.account,
            kind: entry.columns.kind,
        },
        date_format: entry.date_format,
        decimal_separator,
        sign: match entry.sign {
            SignEntry::NegativeDebit => SignConvention::NegativeDebit,
            SignEntry::PositiveDebit => SignConvention::PositiveDebit,
        },
        debit_markers: entry.debit_markers,
        delimiter: delimiter as u8,
    })
}

fn single_char(value: &str) -> anyhow::Result<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => bail!("expected exactly one character, got '{value}'"),
    }
}

/// On-disk shape of the rule file. Order in the file is the evaluation order.
#[derive(Deserialize, Debug)]
struct RulesFile {
    #[serde(default, rename = "rule")]
    rules: Vec<RuleRecord>,
}

/// Load and compile the rule set. Every regex and range pattern is validated
/// eagerly; a bad pattern aborts the load before any transaction is processed.
pub(crate) fn load_rules(file_path: &Path) -> anyhow::Result<RuleSet> {
    let content = fs::read_to_string(file_path)
        .with_context(|| format!("Unable to read rule file {}", file_path.display()))?;
    let file: RulesFile = toml::from_str(&content)
        .with_context(|| format!("Invalid rule file {}", file_path.display()))?;
    Ok(RuleSet::load(file.rules)?)
}
