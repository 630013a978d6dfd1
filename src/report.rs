//! Tabular and text output for engine results
//!
//! CSV writers for the grid and standards tables, plus plain-text renderings
//! used by the CLI. Column names follow the analysis spreadsheets the tables
//! replace (`Pred_Mean`, `Predicted_Speed`, ...).

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::engine::PointAssessment;
use crate::types::{GridOrder, GridTable, ParamRecord, StandardsTable};

/// Grid output columns after the axis columns.
pub const GRID_VALUE_COLUMNS: [&str; 4] = ["Pred_Mean", "Pred_Std", "Target_Error", "Score"];

/// Standards output columns between the category axis and the parameters.
pub const STANDARDS_VALUE_COLUMNS: [&str; 2] = ["Predicted_Speed", "Predicted_Sigma"];

/// Quote a CSV field when it contains a delimiter, quote or line break.
fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn write_record<W: Write, I, S>(out: &mut W, fields: I) -> io::Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let line = fields
        .into_iter()
        .map(|f| csv_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(out, "{line}")
}

// ============================================================================
// Grid
// ============================================================================

/// Write a grid table as CSV, best score first.
pub fn write_grid_csv<W: Write>(table: &GridTable, mut out: W) -> io::Result<()> {
    write_record(
        &mut out,
        table
            .axes
            .iter()
            .map(String::as_str)
            .chain(GRID_VALUE_COLUMNS),
    )?;
    for row in table.ordered(GridOrder::ScoreAscending) {
        write_record(
            &mut out,
            row.values
                .iter()
                .chain([&row.mean, &row.dispersion, &row.target_error, &row.score])
                .map(ToString::to_string),
        )?;
    }
    out.flush()
}

/// Write a grid table to a CSV file.
pub fn save_grid_csv(table: &GridTable, path: &Path) -> io::Result<()> {
    write_grid_csv(table, BufWriter::new(File::create(path)?))
}

/// Text summary: the most stable points and the points closest to target.
pub fn render_grid_summary(table: &GridTable, rows: usize) -> String {
    let mut s = String::new();
    let _ = writeln!(
        s,
        "{} grid points over [{}], target {}",
        table.len(),
        table.axes.join(", "),
        table.target
    );
    for (title, order) in [
        ("Most stable", GridOrder::DispersionAscending),
        ("Closest to target", GridOrder::ScoreAscending),
    ] {
        let _ = writeln!(s, "\n{title}:");
        for row in table.top(rows, order) {
            let point = table
                .axes
                .iter()
                .zip(&row.values)
                .map(|(axis, v)| format!("{axis}={v:.3}"))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(
                s,
                "  {point}  mean={:.3} std={:.3} score={:.3}",
                row.mean, row.dispersion, row.score
            );
        }
    }
    s
}

// ============================================================================
// Standards
// ============================================================================

/// Write a standards table as CSV, highest predicted speed first.
///
/// Parameters missing from a row (not optimized for it) are left blank.
pub fn write_standards_csv<W: Write>(table: &StandardsTable, mut out: W) -> io::Result<()> {
    write_record(
        &mut out,
        std::iter::once(table.category_axis.as_str())
            .chain(STANDARDS_VALUE_COLUMNS)
            .chain(table.parameter_columns.iter().map(String::as_str)),
    )?;
    for row in table.by_mean_descending() {
        let mut fields = vec![
            row.category.clone(),
            row.predicted_mean.to_string(),
            row.predicted_dispersion.to_string(),
        ];
        fields.extend(
            table
                .parameter_columns
                .iter()
                .map(|c| row.params.get(c).map(ToString::to_string).unwrap_or_default()),
        );
        write_record(&mut out, fields)?;
    }
    out.flush()
}

/// Write a standards table to a CSV file.
pub fn save_standards_csv(table: &StandardsTable, path: &Path) -> io::Result<()> {
    write_standards_csv(table, BufWriter::new(File::create(path)?))
}

// ============================================================================
// Point assessment
// ============================================================================

/// Human-readable prediction with its `top_k` largest contributions.
///
/// Each contribution line shows the setting taken from `record`, or
/// `(not given)` for an optional parameter left out.
pub fn render_assessment(
    assessment: &PointAssessment,
    record: &ParamRecord,
    top_k: usize,
) -> String {
    let p = &assessment.prediction;
    let e = &assessment.explanation;
    let mut s = String::new();
    let _ = writeln!(s, "Predicted: {:.3} (std {:.3})", p.mean, p.dispersion);
    let _ = writeln!(s, "Baseline:  {:.3}", e.baseline);
    let top = e.top(top_k);
    if !top.is_empty() {
        let _ = writeln!(s, "Top contributions:");
        for c in top {
            let setting = record
                .get(&c.parameter)
                .map_or_else(|| "(not given)".to_string(), ToString::to_string);
            let sign = if c.value < 0.0 { '-' } else { '+' };
            let _ = writeln!(
                s,
                "  {sign} {:.4} : {} == {setting}",
                c.value.abs(),
                c.parameter
            );
        }
    }
    s
}
