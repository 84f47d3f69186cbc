use std::path::{Path, PathBuf};
use anyhow::bail;
use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::info;
use walkdir::{DirEntry, WalkDir};

use crate::controller::StatementFile;
use crate::rules::RuleSet;
use crate::summary::Granularity;

mod config;
mod controller;
mod csv_reader;
mod dedup;
mod dialect;
mod report;
mod rules;
mod summary;
mod transaction;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// Statement file or directory of statement files
    input: PathBuf,

    /// Dialect descriptor file
    #[clap(long)]
    dialects: PathBuf,

    /// Category rule file. Without it every transaction is Uncategorized
    #[clap(long)]
    rules: Option<PathBuf>,

    /// Aggregation granularity
    #[clap(long, value_enum, default_value_t = GranularityArg::Month)]
    granularity: GranularityArg,

    /// Print the summary as JSON instead of a table
    #[clap(long)]
    json: bool,

    /// Also export the summary buckets to a CSV file
    #[clap(long)]
    export: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GranularityArg {
    Month,
    Year,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli: Cli = Cli::parse();

    let registry = config::load_dialects(&cli.dialects)?;
    let rule_set = match &cli.rules {
        Some(path) => config::load_rules(path)?,
        None => RuleSet::empty(),
    };
    let granularity = match cli.granularity {
        GranularityArg::Month => Granularity::Month,
        GranularityArg::Year => Granularity::Year,
    };

    let files = resolve_input(&cli.input)?;
    if files.is_empty() {
        bail!("No statement files found under {}", cli.input.display());
    }
    info!("Summarising {} statement file(s)", files.len());

    let output = controller::run(&files, &registry, &rule_set, granularity)?;

    if cli.json {
        report::print_json(&output)?;
    } else {
        report::print_summary(&output);
    }
    if let Some(path) = &cli.export {
        report::export_csv(&output, path)?;
        info!("Summary exported to {}", path.display());
    }

    Ok(())
}

/// Resolve the input argument into a sorted list of statement files. A single
/// file is taken as-is; a directory is scanned recursively for csv files.
fn resolve_input(input: &Path) -> anyhow::Result<Vec<StatementFile>> {
    if input.is_file() {
        return Ok(vec![StatementFile {
            path: input.to_path_buf(),
            account: "default".to_string(),
        }]);
    }
    if !input.is_dir() {
        bail!("{} is neither a file nor a directory", input.display());
    }

    info!("Scanning files in {}", input.display());
    let mut files = vec![];
    let walker = WalkDir::new(input).sort_by_file_name().into_iter();
    for entry in walker.filter_entry(|e| !is_hidden(e)) {
        let dir_entry = match entry {
            Ok(dir_entry) => dir_entry,
            Err(_) => continue,
        };
        // Ignore symlinks
        if dir_entry.path_is_symlink() {
            continue;
        }
        let path = dir_entry.path();
        if path.is_dir() {
            continue;
        }
        if path.extension().map(|e| e == "csv").unwrap_or(false) {
            files.push(StatementFile {
                account: account_name(input, path),
                path: path.to_path_buf(),
            });
        }
    }

    Ok(files)
}

/// Derive the fallback account name from the first path segment under the scan
/// root. E.g. for amex/2023-01.csv the account name will be 'amex'.
fn account_name(root: &Path, path: &Path) -> String {
    let relative = match path.strip_prefix(root) {
        Ok(relative) => relative,
        Err(_) => return "default".to_string(),
    };
    let mut segments = relative.iter();
    match (segments.next(), segments.next()) {
        // amex/2023-01.csv -> amex; a file directly under the root has no
        // directory segment to name the account after
        (Some(first), Some(_)) => first.to_string_lossy().to_string(),
        _ => "default".to_string(),
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}
