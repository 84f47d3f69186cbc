use std::collections::BTreeMap;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

/// A canonical transaction derived from one statement row. Never mutated after
/// construction; re-derived from the source files on every run.
#[derive(Debug, Clone)]
pub(crate) struct Transaction {
    pub(crate) date: NaiveDate,
    /// Description text exactly as printed by the institution
    pub(crate) description: String,
    /// Signed amount in minor currency units (cents)
    pub(crate) amount: i64,
    pub(crate) account_id: String,
    /// Original column header -> original cell value, verbatim
    pub(crate) raw_fields: BTreeMap<String, String>,
    /// Provenance, used only for duplicate tie-breaking and diagnostics
    pub(crate) source_file: String,
    /// 1-based data row within the source file, excluding the header row
    pub(crate) row_number: usize,
}

/// Identity of the underlying real-world event. Two transactions with equal
/// fingerprints are the same event, no matter which export produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct Fingerprint([u8; 16]);

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

impl Transaction {
    pub(crate) fn fingerprint(&self) -> Fingerprint {
        let key = format!(
            "{}|{}|{}|{}",
            self.date,
            self.account_id,
            normalise_description(&self.description),
            self.amount
        );
        Fingerprint(md5::compute(key.as_bytes()).0)
    }

    /// Ordering key that decides which copy of a duplicated transaction is kept
    pub(crate) fn provenance_key(&self) -> (&str, &str, usize) {
        (self.account_id.as_str(), self.source_file.as_str(), self.row_number)
    }
}

/// Lowercase and collapse whitespace runs, so reformatting between two exports
/// of the same statement does not defeat duplicate detection
fn normalise_description(description: &str) -> String {
    WHITESPACE.replace_all(description.trim(), " ").to_lowercase()
}
