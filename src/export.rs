//! CSV export of simulated paths
//!
//! One file per path: a header row, then one row per trade with equity and
//! PnL at two decimals. Rows are `\n`-separated with no trailing newline.

use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::SimulationResult;

pub const CSV_HEADER: [&str; 3] = ["Trade Number", "Equity ($)", "Trade PnL ($)"];

const FILE_SUFFIX: &str = "_simulation.csv";

/// File name for a path label: every character outside `[A-Za-z0-9]`
/// becomes `_` (one per UTF-16 unit, so astral characters give two)
pub fn csv_file_name(label: &str) -> String {
    let mut name = String::with_capacity(label.len() + FILE_SUFFIX.len());
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c);
        } else {
            for _ in 0..c.len_utf16() {
                name.push('_');
            }
        }
    }
    name.push_str(FILE_SUFFIX);
    name
}

/// Format with exactly two decimals, rounding exact ties away from zero
/// and never printing a negative zero
pub fn format_currency(value: f64) -> String {
    let value = if value == 0.0 { 0.0 } else { value };
    let abs = value.abs();

    // A two-decimal tie must be a multiple of 1/8, where abs * 100 is exact
    if (abs * 8.0).fract() == 0.0 && (abs * 100.0).fract() == 0.5 {
        let cents = (abs * 100.0).ceil().copysign(value);
        return format!("{:.2}", cents / 100.0);
    }

    format!("{:.2}", value)
}

/// Render one result as CSV text
pub fn to_csv_string(result: &SimulationResult) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for record in &result.data {
        writer.write_record([
            record.trade_number.to_string(),
            format_currency(record.equity),
            format_currency(record.pnl),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV writer: {}", e.error()))?;
    let mut text = String::from_utf8(bytes)?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

/// Write one result into `dir`, returning the file path
pub fn export_result(result: &SimulationResult, dir: &Path) -> Result<PathBuf> {
    let path = dir.join(csv_file_name(&result.label));
    let text = to_csv_string(result)?;
    std::fs::write(&path, text).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

/// Write every result into `dir` (created if missing), in parallel.
///
/// Paths come back in the same order as `results`.
pub fn export_all(results: &[SimulationResult], dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;

    let paths = results
        .par_iter()
        .map(|result| export_result(result, dir))
        .collect::<Result<Vec<_>>>()?;

    info!("Exported {} paths to {:?}", paths.len(), dir);
    Ok(paths)
}
