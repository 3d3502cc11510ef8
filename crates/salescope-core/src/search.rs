use polars::prelude::*;
use serde::Serialize;

use crate::dataset::numeric_f64;
use crate::error::Result;

/// Result of a free-text lookup against a categorical column. A miss is an
/// ordinary value surfaced to the user, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LookupOutcome {
    Found {
        label: String,
        total: f64,
        rows: usize,
    },
    NotFound,
}

pub fn lookup_city(df: &DataFrame, term: &str) -> Result<LookupOutcome> {
    lookup_total(df, "city", term)
}

pub fn lookup_product_line(df: &DataFrame, term: &str) -> Result<LookupOutcome> {
    lookup_total(df, "product_line", term)
}

/// Title-cases both the search term and the column values, then sums `total`
/// over the exactly-matching rows.
pub fn lookup_total(df: &DataFrame, column: &str, term: &str) -> Result<LookupOutcome> {
    let needle = title_case(term);
    let values = df.column(column)?.str()?;
    let totals = numeric_f64(df, "total")?;

    let mut total = 0.0;
    let mut rows = 0usize;
    for idx in 0..values.len() {
        let Some(value) = values.get(idx) else {
            continue;
        };
        if title_case(value) == needle {
            rows += 1;
            if let Some(value) = totals.get(idx) {
                total += value;
            }
        }
    }

    if rows == 0 {
        return Ok(LookupOutcome::NotFound);
    }
    Ok(LookupOutcome::Found {
        label: needle,
        total,
        rows,
    })
}

/// Uppercases the first alphabetic character of each word and lowercases the
/// rest; any non-alphabetic character starts a new word.
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_alphabetic = false;
    for c in input.chars() {
        if c.is_alphabetic() {
            if prev_alphabetic {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alphabetic = true;
        } else {
            out.push(c);
            prev_alphabetic = false;
        }
    }
    out
}
