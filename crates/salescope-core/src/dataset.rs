use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use polars::prelude::*;
use tracing::warn;

use crate::error::{PipelineError, Result};

/// Date formats accepted for the `date` column, tried in order.
static DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d", "%d-%m-%Y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Float,
    Integer,
    Date,
    Text,
}

/// Columns of the transaction schema with a declared type. Anything not
/// listed here falls back to inference over the cell contents.
static DECLARED_COLUMNS: Lazy<HashMap<&'static str, ColumnKind>> = Lazy::new(|| {
    HashMap::from([
        ("unit_price", ColumnKind::Float),
        ("quantity", ColumnKind::Integer),
        ("tax", ColumnKind::Float),
        ("tax_5%", ColumnKind::Float),
        ("total", ColumnKind::Float),
        ("cogs", ColumnKind::Float),
        ("gross_margin_percentage", ColumnKind::Float),
        ("gross_income", ColumnKind::Float),
        ("rating", ColumnKind::Float),
        ("date", ColumnKind::Date),
    ])
});

/// Per-column counts of cells that failed numeric or date parsing and were
/// stored as nulls instead of aborting the load.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub coerced_cells: HashMap<String, usize>,
}

impl LoadReport {
    pub fn total_coerced(&self) -> usize {
        self.coerced_cells.values().sum()
    }
}

/// An in-memory table of transaction records plus the coercion report
/// produced while loading it.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub df: DataFrame,
    pub report: LoadReport,
}

/// Parses delimited text with a header row into a typed [`Dataset`].
///
/// Header names are trimmed, lower-cased, and spaces replaced with
/// underscores. Unparseable numeric/date cells become nulls and are counted
/// in the report; the rows stay in the frame.
pub fn parse_dataset(content: &str) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
    if headers.is_empty() || headers.iter().all(|name| name.is_empty()) {
        return Err(PipelineError::EmptyData);
    }

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (idx, column) in cells.iter_mut().enumerate() {
            column.push(record.get(idx).unwrap_or_default().to_string());
        }
    }

    let mut report = LoadReport::default();
    let mut columns: Vec<Column> = Vec::with_capacity(headers.len());
    for (name, raw) in headers.iter().zip(&cells) {
        let kind = column_kind(name, raw);
        let (column, coerced) = build_column(name, kind, raw)?;
        if coerced > 0 {
            warn!(
                column = name.as_str(),
                cells = coerced,
                "unparseable cells stored as nulls"
            );
            report.coerced_cells.insert(name.clone(), coerced);
        }
        columns.push(column);
    }

    let df = DataFrame::new(columns)?;
    Ok(Dataset { df, report })
}

/// Reads and parses the file at `path`.
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let content = fs::read_to_string(path).map_err(|source| PipelineError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    parse_dataset(&content)
}

/// Explicit load-once cache keyed by file path. Repeated fetches of the same
/// path return the same in-memory dataset without re-reading the file;
/// invalidation only happens on request.
#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: HashMap<PathBuf, Arc<Dataset>>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch(&mut self, path: &Path) -> Result<Arc<Dataset>> {
        if let Some(dataset) = self.entries.get(path) {
            return Ok(Arc::clone(dataset));
        }
        let dataset = Arc::new(load_dataset(path)?);
        self.entries
            .insert(path.to_path_buf(), Arc::clone(&dataset));
        Ok(dataset)
    }

    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn normalize_header(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

fn column_kind(name: &str, raw: &[String]) -> ColumnKind {
    if let Some(kind) = DECLARED_COLUMNS.get(name) {
        return *kind;
    }

    let mut saw_value = false;
    for cell in raw {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.parse::<f64>().is_err() {
            return ColumnKind::Text;
        }
        saw_value = true;
    }
    if saw_value {
        ColumnKind::Float
    } else {
        ColumnKind::Text
    }
}

fn build_column(name: &str, kind: ColumnKind, raw: &[String]) -> Result<(Column, usize)> {
    let mut coerced = 0usize;
    let column: Column = match kind {
        ColumnKind::Float => {
            let values: Vec<Option<f64>> = raw
                .iter()
                .map(|cell| parse_float_cell(cell, &mut coerced))
                .collect();
            Series::new(name.into(), values).into()
        }
        ColumnKind::Integer => {
            let values: Vec<Option<i64>> = raw
                .iter()
                .map(|cell| parse_integer_cell(cell, &mut coerced))
                .collect();
            Series::new(name.into(), values).into()
        }
        ColumnKind::Date => {
            let values: Vec<Option<i32>> = raw
                .iter()
                .map(|cell| parse_date_cell(cell, &mut coerced))
                .collect();
            Series::new(name.into(), values)
                .cast(&DataType::Date)?
                .into()
        }
        ColumnKind::Text => {
            let values: Vec<&str> = raw.iter().map(|cell| cell.as_str()).collect();
            Series::new(name.into(), values).into()
        }
    };
    Ok((column, coerced))
}

fn parse_float_cell(cell: &str, coerced: &mut usize) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(value) => Some(value),
        Err(_) => {
            *coerced += 1;
            None
        }
    }
}

fn parse_integer_cell(cell: &str, coerced: &mut usize) -> Option<i64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<i64>() {
        Ok(value) => Some(value),
        Err(_) => {
            *coerced += 1;
            None
        }
    }
}

fn parse_date_cell(cell: &str, coerced: &mut usize) -> Option<i32> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(days_since_epoch(date));
        }
    }
    *coerced += 1;
    None
}

pub(crate) fn days_since_epoch(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    (date - epoch).num_days() as i32
}

pub(crate) fn date_from_days(days: i32) -> NaiveDate {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    epoch + Duration::days(days as i64)
}

pub(crate) fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|col| col.as_str() == name)
}

/// The named column cast to `Float64`, so integer columns can feed the same
/// reductions as float ones.
pub(crate) fn numeric_f64(df: &DataFrame, name: &str) -> Result<Float64Chunked> {
    let column = df.column(name)?;
    let casted = column.cast(&DataType::Float64)?;
    Ok(casted.f64()?.clone())
}
