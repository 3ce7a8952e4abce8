use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Rows scanned when looking for the header row. Sheets with a deeper
/// preamble fall back to row 0.
pub const HEADER_SCAN_ROWS: usize = 10;

/// Separator placed between a super-header group label and the column header.
pub const GROUP_SEPARATOR: &str = " - ";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SheetError {
    #[error("file has no data")]
    EmptySheet,
}

impl SheetError {
    pub fn code(&self) -> &'static str {
        match self {
            SheetError::EmptySheet => "empty_sheet",
        }
    }
}

/// Largest magnitude at which every whole f64 is exactly representable.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// `n` as an integer when it has no fractional part, so `7.0` goes out as `7`.
pub fn whole_number(n: f64) -> Option<i64> {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_EXACT_INTEGER {
        Some(n as i64)
    } else {
        None
    }
}

/// One decoded spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    pub fn from_json(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Cell::Empty,
            serde_json::Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
            serde_json::Value::String(s) => Cell::Text(s.clone()),
            serde_json::Value::Bool(b) => Cell::Text(b.to_string()),
            other => Cell::Text(other.to_string()),
        }
    }

    /// String form used for header matching and blank checks.
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Number(_) => false,
            Cell::Text(s) => s.trim().is_empty(),
        }
    }

    /// Blank for group-label purposes: a numeric zero carries no label.
    pub fn is_blank_label(&self) -> bool {
        matches!(self, Cell::Number(n) if *n == 0.0) || self.is_blank()
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Empty => serde_json::Value::Null,
            Cell::Number(n) => match whole_number(*n) {
                Some(i) => serde_json::Value::from(i),
                None => serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
            },
            Cell::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Empty => serializer.serialize_none(),
            Cell::Number(n) => match whole_number(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            Cell::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = serde_json::Value::deserialize(deserializer)?;
        Ok(Cell::from_json(&v))
    }
}

pub type RawGrid = Vec<Vec<Cell>>;

/// Parses an inline grid (`[[cell, ...], ...]`). Non-array rows count as empty rows.
pub fn grid_from_json(v: &serde_json::Value) -> Option<RawGrid> {
    let rows = v.as_array()?;
    Some(
        rows.iter()
            .map(|row| {
                row.as_array()
                    .map(|cells| cells.iter().map(Cell::from_json).collect())
                    .unwrap_or_default()
            })
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderPlan {
    pub header_row_index: usize,
    /// False when no row in the scan window looked like a header.
    pub header_detected: bool,
    pub super_header_row_index: Option<usize>,
    /// Forward-filled group label per column; empty when there is no super-header.
    pub group_labels: Vec<String>,
    pub final_headers: Vec<String>,
}

/// A data row keyed by trimmed header, in column order.
///
/// Inserting a key that already exists replaces the value in place, so when
/// two columns share a header the rightmost non-empty cell wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRow {
    fields: Vec<(String, Cell)>,
}

impl NormalizedRow {
    pub fn insert(&mut self, key: impl Into<String>, value: Cell) -> bool {
        let key = key.into();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
            return true;
        }
        self.fields.push((key, value));
        false
    }

    pub fn get(&self, key: &str) -> Option<&Cell> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for NormalizedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconstructedSheet {
    #[serde(flatten)]
    pub plan: HeaderPlan,
    pub rows: Vec<NormalizedRow>,
    /// Trimmed headers used by more than one column.
    pub duplicate_headers: Vec<String>,
}

fn row_mentions_header(row: &[Cell]) -> bool {
    let joined = row
        .iter()
        .map(Cell::display)
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    joined.contains("name") || (joined.contains("roll") && joined.contains("no"))
}

/// Index of the first row in the scan window that looks like a header.
pub fn detect_header_row(grid: &[Vec<Cell>]) -> Option<usize> {
    grid.iter()
        .take(HEADER_SCAN_ROWS)
        .position(|row| row_mentions_header(row))
}

/// Forward-fills a super-header row across `width` columns.
pub fn forward_fill(super_row: &[Cell], width: usize) -> Vec<String> {
    let mut out = Vec::with_capacity(width);
    let mut last = String::new();
    for k in 0..width {
        if let Some(cell) = super_row.get(k) {
            if !cell.is_blank_label() {
                last = cell.display().trim().to_string();
            }
        }
        out.push(last.clone());
    }
    out
}

/// Prefixes `main` with its group label unless the column is an identity
/// column or already carries the label (case-sensitive substring).
pub fn merge_header(main: &str, group: &str) -> String {
    if group.is_empty() || main.trim().is_empty() {
        return main.to_string();
    }
    let lower = main.to_lowercase();
    if lower.contains("name") || lower.contains("roll") || main.contains(group) {
        return main.to_string();
    }
    format!("{group}{GROUP_SEPARATOR}{main}")
}

pub fn plan_headers(grid: &[Vec<Cell>]) -> Result<HeaderPlan, SheetError> {
    if grid.is_empty() {
        return Err(SheetError::EmptySheet);
    }

    let detected = detect_header_row(grid);
    let header_row_index = detected.unwrap_or(0);
    if detected.is_none() {
        tracing::warn!(
            scanned = grid.len().min(HEADER_SCAN_ROWS),
            "no header row recognised, using row 0"
        );
    }

    let main: Vec<String> = grid[header_row_index].iter().map(Cell::display).collect();

    let super_row = if header_row_index > 0 {
        grid.get(header_row_index - 1)
            .filter(|row| row.iter().any(|c| !c.is_blank_label()))
    } else {
        None
    };

    let Some(super_row) = super_row else {
        return Ok(HeaderPlan {
            header_row_index,
            header_detected: detected.is_some(),
            super_header_row_index: None,
            group_labels: Vec::new(),
            final_headers: main,
        });
    };

    let group_labels = forward_fill(super_row, main.len());
    let final_headers = main
        .iter()
        .zip(&group_labels)
        .map(|(h, g)| merge_header(h, g))
        .collect();

    Ok(HeaderPlan {
        header_row_index,
        header_detected: detected.is_some(),
        super_header_row_index: Some(header_row_index - 1),
        group_labels,
        final_headers,
    })
}

pub fn extract_rows(grid: &[Vec<Cell>], plan: &HeaderPlan) -> Vec<NormalizedRow> {
    let keys: Vec<&str> = plan.final_headers.iter().map(|h| h.trim()).collect();
    let mut out = Vec::new();
    for row in grid.iter().skip(plan.header_row_index + 1) {
        let mut normalized = NormalizedRow::default();
        for (key, cell) in keys.iter().zip(row.iter()) {
            if key.is_empty() || cell.is_blank() {
                continue;
            }
            normalized.insert(*key, cell.clone());
        }
        if !normalized.is_empty() {
            out.push(normalized);
        }
    }
    out
}

pub fn duplicate_headers(headers: &[String]) -> Vec<String> {
    let mut seen: Vec<&str> = Vec::new();
    let mut dups: Vec<String> = Vec::new();
    for h in headers.iter().map(|h| h.trim()).filter(|h| !h.is_empty()) {
        if seen.contains(&h) {
            if !dups.iter().any(|d| d == h) {
                dups.push(h.to_string());
            }
        } else {
            seen.push(h);
        }
    }
    dups
}

pub fn reconstruct(grid: &[Vec<Cell>]) -> Result<ReconstructedSheet, SheetError> {
    let plan = plan_headers(grid)?;
    let rows = extract_rows(grid, &plan);
    let duplicate_headers = duplicate_headers(&plan.final_headers);
    if !duplicate_headers.is_empty() {
        tracing::warn!(
            duplicates = ?duplicate_headers,
            "duplicate column headers, rightmost value wins"
        );
    }
    tracing::debug!(
        header_row_index = plan.header_row_index,
        columns = plan.final_headers.len(),
        rows = rows.len(),
        "sheet reconstructed"
    );
    Ok(ReconstructedSheet {
        plan,
        rows,
        duplicate_headers,
    })
}
