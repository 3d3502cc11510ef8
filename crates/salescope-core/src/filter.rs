use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::dataset::{days_since_epoch, has_column};
use crate::error::{PipelineError, Result};

/// Inclusive calendar-date range. Invariant: `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(PipelineError::InvalidDateRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    fn contains_days(&self, days: i32) -> bool {
        days >= days_since_epoch(self.start) && days <= days_since_epoch(self.end)
    }
}

/// User-chosen constraints on which rows participate in aggregation.
///
/// `None` leaves a dimension unrestricted; an empty list selects nothing,
/// which yields an empty filtered frame rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSelection {
    pub cities: Option<Vec<String>>,
    pub product_lines: Option<Vec<String>>,
    pub genders: Option<Vec<String>>,
    pub date_range: Option<DateRange>,
}

impl FilterSelection {
    pub fn is_unrestricted(&self) -> bool {
        self.cities.is_none()
            && self.product_lines.is_none()
            && self.genders.is_none()
            && self.date_range.is_none()
    }
}

/// Returns the subset of rows satisfying every restriction in `selection`.
///
/// The input frame is left untouched and the surviving rows keep their
/// original relative order, so filtering twice with the same selection is a
/// no-op on the second pass. The date restriction only applies when the
/// frame has a `date` column; rows with a null date never match a range.
pub fn apply_filter(df: &DataFrame, selection: &FilterSelection) -> Result<DataFrame> {
    if let Some(range) = &selection.date_range {
        range.validate()?;
    }

    let mut mask = vec![true; df.height()];

    restrict_categorical(df, "city", selection.cities.as_deref(), &mut mask)?;
    restrict_categorical(
        df,
        "product_line",
        selection.product_lines.as_deref(),
        &mut mask,
    )?;
    restrict_categorical(df, "gender", selection.genders.as_deref(), &mut mask)?;

    if let Some(range) = &selection.date_range {
        if has_column(df, "date") {
            let dates = df.column("date")?.date()?;
            for (idx, flag) in mask.iter_mut().enumerate() {
                if !*flag {
                    continue;
                }
                *flag = dates
                    .get(idx)
                    .map(|days| range.contains_days(days))
                    .unwrap_or(false);
            }
        }
    }

    let mask = BooleanChunked::from_slice("mask".into(), &mask);
    Ok(df.filter(&mask)?)
}

fn restrict_categorical(
    df: &DataFrame,
    column: &str,
    allowed: Option<&[String]>,
    mask: &mut [bool],
) -> Result<()> {
    let Some(allowed) = allowed else {
        return Ok(());
    };

    let values = df.column(column)?.str()?;
    for (idx, flag) in mask.iter_mut().enumerate() {
        if !*flag {
            continue;
        }
        *flag = values
            .get(idx)
            .map(|value| allowed.iter().any(|candidate| candidate == value))
            .unwrap_or(false);
    }
    Ok(())
}
