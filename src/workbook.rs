//! Decoding of uploaded spreadsheet files into a raw cell grid.

use crate::sheet::{Cell, RawGrid};
use anyhow::Context;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

pub const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, thiserror::Error)]
#[error("unsupported workbook format: {extension}")]
pub struct UnsupportedFormat {
    pub extension: String,
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// First worksheet of a workbook, or the whole of a csv file.
pub fn decode_path(path: &Path) -> anyhow::Result<RawGrid> {
    let ext = extension_of(path);
    if ext == "csv" {
        return decode_csv(path);
    }
    if !SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        return Err(UnsupportedFormat { extension: ext }.into());
    }

    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.to_string_lossy()))?;
    let Some(first) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };
    let range = workbook
        .worksheet_range(&first)
        .with_context(|| format!("failed to read sheet {first}"))?;

    // The range starts at its first used cell; pad so indices match the sheet.
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));
    let mut grid: RawGrid = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; col_offset];
        cells.extend(row.iter().map(cell_from_data));
        grid.push(cells);
    }
    tracing::debug!(sheet = %first, rows = grid.len(), "workbook decoded");
    Ok(grid)
}

fn cell_from_data(d: &Data) -> Cell {
    match d {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Text(b.to_string()),
        other => Cell::Text(other.to_string()),
    }
}

fn decode_csv(path: &Path) -> anyhow::Result<RawGrid> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.to_string_lossy()))?;
    let mut grid = Vec::new();
    for record in rdr.records() {
        let record = record.context("failed to read csv record")?;
        grid.push(record.iter().map(cell_from_csv).collect());
    }
    Ok(grid)
}

fn cell_from_csv(field: &str) -> Cell {
    let t = field.trim();
    if t.is_empty() {
        return Cell::Empty;
    }
    match t.parse::<f64>() {
        Ok(n) if n.is_finite() => Cell::Number(n),
        _ => Cell::Text(field.to_string()),
    }
}
