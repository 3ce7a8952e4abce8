use crate::manual::{self, EntryNode, SheetStudent};
use crate::sheet::{Cell, RawGrid};
use crate::student::StudentReport;
use anyhow::{anyhow, Context};
use std::path::Path;

pub const VERIFIED_SHEET: &str = "Verified Data";
pub const LAYOUT_SHEET: &str = "Students";

fn ensure_parent(out_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    Ok(())
}

fn text_cell(s: &str) -> Cell {
    if s.is_empty() {
        Cell::Empty
    } else {
        Cell::text(s)
    }
}

/// Header and rows of the verified-data table. Subject columns follow the
/// first student; custom attribute columns are the union in first-seen order.
pub fn verified_rows(students: &[StudentReport]) -> (Vec<String>, Vec<Vec<Cell>>) {
    let subject_names: Vec<&str> = students
        .first()
        .map(|s| s.subjects.iter().map(|sub| sub.name.as_str()).collect())
        .unwrap_or_default();
    let mut attr_keys: Vec<&str> = Vec::new();
    for s in students {
        for k in s.custom_attributes.keys() {
            if !attr_keys.contains(&k.as_str()) {
                attr_keys.push(k);
            }
        }
    }

    let mut headers: Vec<String> = ["Roll No", "Student Name", "Father Name", "Class"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    headers.extend(attr_keys.iter().map(|k| k.to_string()));
    headers.extend(subject_names.iter().map(|n| format!("{n} %")));
    headers.push("Total Score %".to_string());
    headers.push("AI Remarks".to_string());

    let rows = students
        .iter()
        .map(|s| {
            let mut row = vec![
                text_cell(&s.roll_no),
                text_cell(&s.name),
                text_cell(s.father_name.as_deref().unwrap_or_default()),
                text_cell(s.class_name.as_deref().unwrap_or_default()),
            ];
            row.extend(attr_keys.iter().map(|k| {
                text_cell(s.custom_attributes.get(*k).map(String::as_str).unwrap_or_default())
            }));
            row.extend(subject_names.iter().map(|n| {
                s.subjects
                    .iter()
                    .find(|sub| sub.name == *n)
                    .map(|sub| Cell::Number(sub.score))
                    .unwrap_or(Cell::Empty)
            }));
            row.push(Cell::Number(s.total_score));
            row.push(text_cell(s.remarks.as_deref().unwrap_or_default()));
            row
        })
        .collect();
    (headers, rows)
}

fn verified_grid(students: &[StudentReport]) -> RawGrid {
    let (headers, rows) = verified_rows(students);
    std::iter::once(headers.iter().map(|h| text_cell(h)).collect())
        .chain(rows)
        .collect()
}

/// Writes `grid` as csv; returns the number of rows after the header.
fn write_csv(grid: &[Vec<Cell>], out_path: &Path) -> anyhow::Result<usize> {
    ensure_parent(out_path)?;
    let mut w = csv::WriterBuilder::new()
        .flexible(false)
        .from_path(out_path)
        .with_context(|| format!("failed to create {}", out_path.to_string_lossy()))?;
    for row in grid {
        w.write_record(row.iter().map(Cell::display))
            .context("failed to write csv row")?;
    }
    w.flush().context("failed to flush csv")?;
    Ok(grid.len().saturating_sub(1))
}

/// Writes `grid` as a single-sheet xlsx workbook. Numbers stay numeric; text
/// is stored as text even when it looks like a number.
fn write_xlsx(sheet_name: &str, grid: &[Vec<Cell>], out_path: &Path) -> anyhow::Result<usize> {
    ensure_parent(out_path)?;
    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    let ws = book
        .new_sheet(sheet_name)
        .map_err(|e| anyhow!("failed to add sheet {sheet_name}: {e}"))?;
    for (r, row) in grid.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            let coordinate = (c as u32 + 1, r as u32 + 1);
            match cell {
                Cell::Empty => {}
                Cell::Number(n) => {
                    ws.get_cell_mut(coordinate).set_value_number(*n);
                }
                Cell::Text(s) => {
                    ws.get_cell_mut(coordinate).set_value_string(s.as_str());
                }
            }
        }
    }
    umya_spreadsheet::writer::xlsx::write(&book, out_path)
        .map_err(|e| anyhow!("failed to write {}: {e}", out_path.to_string_lossy()))?;
    tracing::debug!(sheet = sheet_name, rows = grid.len(), "xlsx written");
    Ok(grid.len().saturating_sub(1))
}

pub fn export_verified_csv(students: &[StudentReport], out_path: &Path) -> anyhow::Result<usize> {
    write_csv(&verified_grid(students), out_path)
}

/// The "Verified Data" workbook the class report is handed over as.
pub fn export_verified_xlsx(students: &[StudentReport], out_path: &Path) -> anyhow::Result<usize> {
    write_xlsx(VERIFIED_SHEET, &verified_grid(students), out_path)
}

pub fn export_sheet_layout_csv(
    template: &[EntryNode],
    students: &[SheetStudent],
    out_path: &Path,
) -> anyhow::Result<usize> {
    write_csv(&manual::sheet_layout(template, students).to_grid(), out_path)
}

pub fn export_sheet_layout_xlsx(
    template: &[EntryNode],
    students: &[SheetStudent],
    out_path: &Path,
) -> anyhow::Result<usize> {
    write_xlsx(
        LAYOUT_SHEET,
        &manual::sheet_layout(template, students).to_grid(),
        out_path,
    )
}
