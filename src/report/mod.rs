use std::path::Path;
use comfy_table::{Cell, CellAlignment, Table, TableComponent};
use csv::WriterBuilder;
use serde_json::json;
use crate::controller::RunOutput;
use crate::rules::UNCATEGORIZED;
use crate::summary::Period;

/// Print the summary as a text table, one section per period, with an
/// explicit Uncategorized row, per-period totals and a grand total.
pub(crate) fn print_summary(output: &RunOutput) {
    let mut table = Table::new();
    table.set_header(vec!["Period", "Category", "Amount"]);
    table.remove_style(TableComponent::HorizontalLines);
    table.remove_style(TableComponent::MiddleIntersections);
    table.remove_style(TableComponent::LeftBorderIntersections);
    table.remove_style(TableComponent::RightBorderIntersections);

    for (period, period_total) in &output.summary.period_totals {
        for (category, total) in categories_for(output, *period) {
            table.add_row(vec![
                Cell::new(period.to_string()),
                Cell::new(category),
                Cell::new(format_amount(total)).set_alignment(CellAlignment::Right),
            ]);
        }
        table.add_row(vec![
            Cell::new(period.to_string()),
            Cell::new("TOTAL"),
            Cell::new(format_amount(*period_total)).set_alignment(CellAlignment::Right),
        ]);
    }
    table.add_row(vec![
        Cell::new(""),
        Cell::new("GRAND TOTAL"),
        Cell::new(format_amount(output.summary.grand_total)).set_alignment(CellAlignment::Right),
    ]);

    println!("{table}");
    print_diagnostics(output);
}

/// Categories of one period with their totals, Uncategorized last
fn categories_for(output: &RunOutput, period: Period) -> Vec<(String, i64)> {
    let mut rows: Vec<(String, i64)> = output
        .summary
        .buckets
        .iter()
        .filter(|((_, p), _)| *p == period)
        .map(|((category, _), total)| (category.clone(), *total))
        .collect();
    rows.sort_by(|a, b| {
        (a.0 == UNCATEGORIZED)
            .cmp(&(b.0 == UNCATEGORIZED))
            .then_with(|| a.0.cmp(&b.0))
    });
    rows
}

fn print_diagnostics(output: &RunOutput) {
    let d = &output.diagnostics;
    println!(
        "Rows skipped: {} (bad date: {}, bad amount: {}, unreadable: {}). Duplicates removed: {}.",
        d.rows_skipped(),
        d.bad_dates,
        d.bad_amounts,
        d.malformed_rows,
        d.duplicates_removed
    );
    if !d.excluded_files.is_empty() {
        println!("WARNING: {} file(s) excluded from this summary:", d.excluded_files.len());
        for excluded in &d.excluded_files {
            println!("  {}: {}", excluded.path, excluded.reason);
        }
    }
}

/// Print the summary plus diagnostics as JSON
pub(crate) fn print_json(output: &RunOutput) -> anyhow::Result<()> {
    let buckets: Vec<_> = output
        .summary
        .buckets
        .iter()
        .map(|((category, period), total)| {
            json!({
                "category": category,
                "period": period.to_string(),
                "total_minor": total,
            })
        })
        .collect();
    let period_totals: Vec<_> = output
        .summary
        .period_totals
        .iter()
        .map(|(period, total)| json!({ "period": period.to_string(), "total_minor": total }))
        .collect();
    let excluded: Vec<_> = output
        .diagnostics
        .excluded_files
        .iter()
        .map(|e| json!({ "path": e.path, "reason": e.reason }))
        .collect();

    let document = json!({
        "buckets": buckets,
        "period_totals": period_totals,
        "grand_total_minor": output.summary.grand_total,
        "categories": output.summary.categories,
        "diagnostics": {
            "rows_skipped": output.diagnostics.rows_skipped(),
            "bad_dates": output.diagnostics.bad_dates,
            "bad_amounts": output.diagnostics.bad_amounts,
            "malformed_rows": output.diagnostics.malformed_rows,
            "duplicates_removed": output.diagnostics.duplicates_removed,
            "excluded_files": excluded,
        },
    });
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}

/// Export the buckets to a CSV file
pub(crate) fn export_csv(output: &RunOutput, file_path: &Path) -> anyhow::Result<()> {
    let mut csv_writer = WriterBuilder::new().has_headers(true).from_path(file_path)?;
    csv_writer.write_record(["category", "period", "total_minor"])?;
    for ((category, period), total) in &output.summary.buckets {
        csv_writer.write_record([category.as_str(), &period.to_string(), &total.to_string()])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Format minor units as a decimal amount, e.g. -5510 -> "-55.10"
fn format_amount(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
