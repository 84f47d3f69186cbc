use std::collections::BTreeSet;
use std::fmt;
use csv::StringRecord;

/// What a signed amount means in a statement file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SignConvention {
    /// Negative amounts are spending, positive are income. Stored as-is.
    NegativeDebit,
    /// Positive amounts are spending (common in credit card exports). The sign
    /// is flipped so that spending is always negative internally.
    PositiveDebit,
}

/// Logical field -> source column header
#[derive(Debug, Clone)]
pub(crate) struct ColumnMap {
    pub(crate) date: String,
    pub(crate) description: String,
    pub(crate) amount: String,
    pub(crate) account: Option<String>,
    /// Optional transaction-type column, e.g. "DR"/"CR". When present its value
    /// overrides the sign convention, see `debit_markers`.
    pub(crate) kind: Option<String>,
}

/// Column layout, date format and amount convention of one institution's CSV
/// export. Loaded once per run, immutable, shared across all files of that
/// dialect.
#[derive(Debug, Clone)]
pub(crate) struct DialectDescriptor {
    pub(crate) name: String,
    /// Headers that must all be present for a file to match this dialect.
    /// Matching is order-independent, trimmed and case-insensitive.
    pub(crate) required_headers: Vec<String>,
    pub(crate) columns: ColumnMap,
    /// chrono format string, e.g. "%d/%m/%Y"
    pub(crate) date_format: String,
    pub(crate) decimal_separator: char,
    pub(crate) sign: SignConvention,
    /// Values of the type column that mark a row as a debit
    pub(crate) debit_markers: Vec<String>,
    pub(crate) delimiter: u8,
}

impl DialectDescriptor {
    fn signature(&self) -> BTreeSet<String> {
        self.required_headers.iter().map(|h| normalise_header(h)).collect()
    }

    /// Split a raw header line using this dialect's delimiter, with proper
    /// quote handling so a header like "Description, Notes" stays one column
    pub(crate) fn split_header(&self, header_line: &str) -> Vec<String> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .from_reader(header_line.as_bytes());
        let mut record = StringRecord::new();
        match rdr.read_record(&mut record) {
            Ok(true) => record.iter().map(|h| h.trim().to_string()).collect(),
            _ => vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DialectError {
    /// No registered dialect matches the file's header row
    NotRecognized { header_row: String },
    /// Two dialects of equal specificity both match the file
    Ambiguous { first: String, second: String },
    /// Two registered dialects declare the same required-header set
    DuplicateSignature { first: String, second: String },
    EmptySignature { name: String },
}

impl fmt::Display for DialectError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DialectError::NotRecognized { header_row } =>
                write!(f, "no dialect matches header row: {header_row}"),
            DialectError::Ambiguous { first, second } =>
                write!(f, "dialects '{first}' and '{second}' match the same file with equal specificity"),
            DialectError::DuplicateSignature { first, second } =>
                write!(f, "dialects '{first}' and '{second}' declare the same required headers"),
            DialectError::EmptySignature { name } =>
                write!(f, "dialect '{name}' declares no required headers"),
        }
    }
}

impl std::error::Error for DialectError {}

/// Holds all registered dialect descriptors and picks the matching one for a
/// given file by structural signature.
pub(crate) struct DialectRegistry {
    descriptors: Vec<DialectDescriptor>,
}

impl DialectRegistry {
    /// Validates the descriptor set up front: duplicate or empty required-header
    /// sets are configuration errors, reported before any file is touched.
    pub(crate) fn new(descriptors: Vec<DialectDescriptor>) -> Result<DialectRegistry, DialectError> {
        for d in &descriptors {
            if d.required_headers.is_empty() {
                return Err(DialectError::EmptySignature { name: d.name.clone() });
            }
        }
        for (i, a) in descriptors.iter().enumerate() {
            for b in descriptors.iter().skip(i + 1) {
                if a.signature() == b.signature() {
                    return Err(DialectError::DuplicateSignature {
                        first: a.name.clone(),
                        second: b.name.clone(),
                    });
                }
            }
        }
        Ok(DialectRegistry { descriptors })
    }

    /// Select the dialect for a file from its raw header line. Each candidate
    /// splits the line with its own delimiter; a dialect matches when its
    /// required headers form a subset of the headers found. The most specific
    /// match (largest required set) wins.
    pub(crate) fn select(&self, header_line: &str) -> Result<&DialectDescriptor, DialectError> {
        let mut best: Option<(&DialectDescriptor, usize)> = None;
        let mut tied: Option<&DialectDescriptor> = None;

        for d in &self.descriptors {
            let signature = d.signature();
            let file_headers: BTreeSet<String> = d
                .split_header(header_line)
                .iter()
                .map(|h| normalise_header(h))
                .collect();
            if !signature.is_subset(&file_headers) {
                continue;
            }
            // Specificity is the size of the normalized set, so a repeated
            // header name in the descriptor does not inflate it
            let specificity = signature.len();
            match best {
                None => best = Some((d, specificity)),
                Some((_, best_specificity)) => {
                    if specificity > best_specificity {
                        best = Some((d, specificity));
                        tied = None;
                    } else if specificity == best_specificity {
                        tied = Some(d);
                    }
                }
            }
        }

        match (best, tied) {
            (Some((b, _)), Some(t)) => Err(DialectError::Ambiguous {
                first: b.name.clone(),
                second: t.name.clone(),
            }),
            (Some((b, _)), None) => Ok(b),
            (None, _) => Err(DialectError::NotRecognized {
                header_row: header_line.to_string(),
            }),
        }
    }
}

fn normalise_header(header: &str) -> String {
    header.trim().to_ascii_lowercase()
}
