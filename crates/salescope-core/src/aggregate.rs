use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use polars::prelude::*;
use serde::Serialize;

use crate::dataset::{date_from_days, has_column, numeric_f64};
use crate::error::Result;

/// Number of most-recent rows summed for the short-term trend insight.
pub const TAIL_WINDOW_ROWS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    Mean,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOrder {
    /// Keys in the order they first appear in the frame (pie display).
    FirstSeen,
    /// Sorted ascending by the reduced value (bar display).
    ValueAscending,
    ValueDescending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedValue {
    pub key: String,
    pub value: f64,
}

/// Groups `group_col` and reduces `value_col` within each group.
///
/// Null values contribute nothing to sums and means but their rows still
/// count for `Reduction::Count`. Rows with a null key are dropped, matching
/// the usual dataframe group-by contract.
pub fn grouped_reduce(
    df: &DataFrame,
    group_col: &str,
    value_col: &str,
    reduction: Reduction,
    order: GroupOrder,
) -> Result<Vec<GroupedValue>> {
    let keys = df.column(group_col)?.str()?;
    let values = numeric_f64(df, value_col)?;

    struct Accumulator {
        sum: f64,
        observed: usize,
        rows: usize,
    }

    let mut first_seen: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Accumulator> = HashMap::new();

    for idx in 0..df.height() {
        let Some(key) = keys.get(idx) else {
            continue;
        };
        if !groups.contains_key(key) {
            first_seen.push(key.to_string());
        }
        let entry = groups.entry(key.to_string()).or_insert(Accumulator {
            sum: 0.0,
            observed: 0,
            rows: 0,
        });
        if let Some(value) = values.get(idx) {
            entry.sum += value;
            entry.observed += 1;
        }
        entry.rows += 1;
    }

    let mut grouped: Vec<GroupedValue> = first_seen
        .into_iter()
        .map(|key| {
            let acc = &groups[&key];
            let value = match reduction {
                Reduction::Sum => acc.sum,
                Reduction::Mean => {
                    if acc.observed == 0 {
                        0.0
                    } else {
                        acc.sum / acc.observed as f64
                    }
                }
                Reduction::Count => acc.rows as f64,
            };
            GroupedValue { key, value }
        })
        .collect();

    match order {
        GroupOrder::FirstSeen => {}
        GroupOrder::ValueAscending => grouped.sort_by(|a, b| a.value.total_cmp(&b.value)),
        GroupOrder::ValueDescending => grouped.sort_by(|a, b| b.value.total_cmp(&a.value)),
    }

    Ok(grouped)
}

/// Per-product-line totals, ascending by sum for the bar chart.
pub fn totals_by_product_line(df: &DataFrame) -> Result<Vec<GroupedValue>> {
    grouped_reduce(
        df,
        "product_line",
        "total",
        Reduction::Sum,
        GroupOrder::ValueAscending,
    )
}

pub fn totals_by_city(df: &DataFrame) -> Result<Vec<GroupedValue>> {
    grouped_reduce(df, "city", "total", Reduction::Sum, GroupOrder::FirstSeen)
}

pub fn totals_by_gender(df: &DataFrame) -> Result<Vec<GroupedValue>> {
    grouped_reduce(df, "gender", "total", Reduction::Sum, GroupOrder::FirstSeen)
}

pub fn totals_by_customer_type(df: &DataFrame) -> Result<Vec<GroupedValue>> {
    grouped_reduce(
        df,
        "customer_type",
        "total",
        Reduction::Sum,
        GroupOrder::FirstSeen,
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub total_sales: f64,
    pub average_rating: Option<f64>,
    pub transactions: usize,
}

pub fn kpis(df: &DataFrame) -> Result<Kpis> {
    Ok(Kpis {
        total_sales: total_sales(df)?,
        average_rating: mean_rating(df)?,
        transactions: df.height(),
    })
}

/// Sum of `total` over the frame; null cells contribute 0.
pub fn total_sales(df: &DataFrame) -> Result<f64> {
    Ok(numeric_f64(df, "total")?.sum().unwrap_or(0.0))
}

/// Mean of `rating`; `None` when there are no observations.
pub fn mean_rating(df: &DataFrame) -> Result<Option<f64>> {
    Ok(numeric_f64(df, "rating")?.mean())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Value frequencies of `payment`, descending by count. Ties keep the order
/// the values first appear so the mode is stable.
pub fn payment_counts(df: &DataFrame) -> Result<Vec<ValueCount>> {
    let values = df.column("payment")?.str()?;

    let mut first_seen: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for idx in 0..values.len() {
        let Some(value) = values.get(idx) else {
            continue;
        };
        if !counts.contains_key(value) {
            first_seen.push(value.to_string());
        }
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }

    let mut result: Vec<ValueCount> = first_seen
        .into_iter()
        .map(|value| {
            let count = counts[&value];
            ValueCount { value, count }
        })
        .collect();
    result.sort_by(|a, b| b.count.cmp(&a.count));
    Ok(result)
}

/// Pairwise Pearson coefficients over every numeric column.
///
/// `coefficients[i][j]` pairs `columns[i]` with `columns[j]`. Entries with
/// fewer than two complete observations or zero variance are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub coefficients: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

pub fn correlation_matrix(df: &DataFrame) -> Result<CorrelationMatrix> {
    let mut columns: Vec<String> = Vec::new();
    let mut series: Vec<Float64Chunked> = Vec::new();
    for column in df.get_columns() {
        if is_numeric_dtype(column.dtype()) {
            columns.push(column.name().to_string());
            series.push(column.cast(&DataType::Float64)?.f64()?.clone());
        }
    }

    let n = columns.len();
    let mut coefficients = vec![vec![None; n]; n];
    for i in 0..n {
        coefficients[i][i] = if has_variance(&series[i]) {
            Some(1.0)
        } else {
            None
        };
        for j in (i + 1)..n {
            let value = pearson(&series[i], &series[j]);
            coefficients[i][j] = value;
            coefficients[j][i] = value;
        }
    }

    Ok(CorrelationMatrix {
        columns,
        coefficients,
    })
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

fn complete_pairs(x: &Float64Chunked, y: &Float64Chunked) -> Vec<(f64, f64)> {
    let len = x.len().min(y.len());
    let mut pairs = Vec::with_capacity(len);
    for idx in 0..len {
        if let (Some(a), Some(b)) = (x.get(idx), y.get(idx)) {
            pairs.push((a, b));
        }
    }
    pairs
}

fn has_variance(x: &Float64Chunked) -> bool {
    let values: Vec<f64> = complete_pairs(x, x).into_iter().map(|(a, _)| a).collect();
    if values.len() < 2 {
        return false;
    }
    values.iter().any(|value| *value != values[0])
}

fn pearson(x: &Float64Chunked, y: &Float64Chunked) -> Option<f64> {
    let pairs = complete_pairs(x, y);
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance_x = 0.0;
    let mut variance_y = 0.0;
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        covariance += dx * dy;
        variance_x += dx * dx;
        variance_y += dy * dy;
    }

    if variance_x == 0.0 || variance_y == 0.0 {
        return None;
    }
    Some(covariance / (variance_x.sqrt() * variance_y.sqrt()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotal {
    pub month_end: NaiveDate,
    pub total: f64,
}

/// Sum of `total` bucketed by calendar month-end, chronological. Months with
/// no rows between the first and last bucket are emitted with a 0.0 sum.
/// Returns `None` when the frame has no `date` column.
pub fn monthly_totals(df: &DataFrame) -> Result<Option<Vec<MonthlyTotal>>> {
    if !has_column(df, "date") {
        return Ok(None);
    }

    let dates = df.column("date")?.date()?;
    let totals = numeric_f64(df, "total")?;

    let mut sums: HashMap<(i32, u32), f64> = HashMap::new();
    for idx in 0..df.height() {
        let Some(days) = dates.get(idx) else {
            continue;
        };
        let date = date_from_days(days);
        let entry = sums.entry((date.year(), date.month())).or_insert(0.0);
        if let Some(total) = totals.get(idx) {
            *entry += total;
        }
    }

    let (Some(&first), Some(&last)) = (sums.keys().min(), sums.keys().max()) else {
        return Ok(Some(Vec::new()));
    };

    let mut result = Vec::new();
    let (mut year, mut month) = first;
    loop {
        let total = sums.get(&(year, month)).copied().unwrap_or(0.0);
        result.push(MonthlyTotal {
            month_end: month_end(year, month),
            total,
        });
        if (year, month) == last {
            break;
        }
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    Ok(Some(result))
}

fn month_end(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1).unwrap() - Duration::days(1)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TailWindow {
    pub total: f64,
    pub rows: usize,
}

/// Sum of `total` over the `window` most recent rows by date descending,
/// ties broken by original row order. A frame smaller than the window sums
/// everything. Without a `date` column the trailing rows in frame order
/// stand in for the most recent ones.
pub fn tail_window_total(df: &DataFrame, window: usize) -> Result<TailWindow> {
    let totals = numeric_f64(df, "total")?;
    let height = df.height();

    let mut indices: Vec<usize> = (0..height).collect();
    if has_column(df, "date") {
        let dates = df.column("date")?.date()?;
        let keys: Vec<Option<i32>> = (0..height).map(|idx| dates.get(idx)).collect();
        indices.sort_by(|&a, &b| compare_dates_desc(keys[a], keys[b]));
    } else {
        indices.reverse();
    }

    let rows = height.min(window);
    let mut total = 0.0;
    for &idx in indices.iter().take(rows) {
        if let Some(value) = totals.get(idx) {
            total += value;
        }
    }
    Ok(TailWindow { total, rows })
}

fn compare_dates_desc(a: Option<i32>, b: Option<i32>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopProductLine {
    pub name: String,
    pub total: f64,
}

/// Top-1 extractions plus the tail-window total. Every field degrades to
/// `None` (or a zero-row window) on an empty frame instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickInsights {
    pub top_city: Option<String>,
    pub top_product_line: Option<TopProductLine>,
    pub top_payment: Option<String>,
    pub tail_window: TailWindow,
}

pub fn quick_insights(df: &DataFrame) -> Result<QuickInsights> {
    let cities = grouped_reduce(df, "city", "total", Reduction::Sum, GroupOrder::FirstSeen)?;
    let product_lines = grouped_reduce(
        df,
        "product_line",
        "total",
        Reduction::Sum,
        GroupOrder::FirstSeen,
    )?;
    let payments = payment_counts(df)?;

    Ok(QuickInsights {
        top_city: argmax(&cities).map(|group| group.key.clone()),
        top_product_line: argmax(&product_lines).map(|group| TopProductLine {
            name: group.key.clone(),
            total: group.value,
        }),
        top_payment: payments.first().map(|entry| entry.value.clone()),
        tail_window: tail_window_total(df, TAIL_WINDOW_ROWS)?,
    })
}

fn argmax(groups: &[GroupedValue]) -> Option<&GroupedValue> {
    groups.iter().reduce(|best, group| {
        if group.value > best.value {
            group
        } else {
            best
        }
    })
}

/// Earliest and latest non-null dates in the frame, for the preview line.
pub fn date_span(df: &DataFrame) -> Result<Option<(NaiveDate, NaiveDate)>> {
    if !has_column(df, "date") {
        return Ok(None);
    }

    let dates = df.column("date")?.date()?;
    let mut span: Option<(i32, i32)> = None;
    for idx in 0..dates.len() {
        let Some(days) = dates.get(idx) else {
            continue;
        };
        span = Some(match span {
            Some((lo, hi)) => (lo.min(days), hi.max(days)),
            None => (days, days),
        });
    }
    Ok(span.map(|(lo, hi)| (date_from_days(lo), date_from_days(hi))))
}
