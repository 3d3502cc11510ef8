use std::io::Write;

use polars::prelude::*;

use crate::dataset::date_from_days;
use crate::error::Result;

/// Writes the frame as RFC-4180 CSV with a header row, keeping the input
/// column order. Nulls become empty cells; dates are `%Y-%m-%d`.
pub fn write_csv<W: Write>(df: &DataFrame, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);

    let names: Vec<&str> = df
        .get_columns()
        .iter()
        .map(|column| column.name().as_str())
        .collect();
    out.write_record(&names)?;

    let mut renderers: Vec<CellRenderer> = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        renderers.push(CellRenderer::for_column(column)?);
    }

    for idx in 0..df.height() {
        out.write_record(renderers.iter().map(|renderer| renderer.render(idx)))?;
    }

    out.flush()?;
    Ok(())
}

/// The frame serialized into an in-memory CSV byte stream.
pub fn export_csv(df: &DataFrame) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_csv(df, &mut buffer)?;
    Ok(buffer)
}

enum CellRenderer {
    Float(Float64Chunked),
    Integer(Int64Chunked),
    Date(DateChunked),
    Text(StringChunked),
    Other(Column),
}

impl CellRenderer {
    fn for_column(column: &Column) -> Result<Self> {
        Ok(match column.dtype() {
            DataType::Float64 => Self::Float(column.f64()?.clone()),
            DataType::Int64 => Self::Integer(column.i64()?.clone()),
            DataType::Date => Self::Date(column.date()?.clone()),
            DataType::String => Self::Text(column.str()?.clone()),
            _ => Self::Other(column.clone()),
        })
    }

    fn render(&self, idx: usize) -> String {
        match self {
            Self::Float(values) => values
                .get(idx)
                .map(|value| value.to_string())
                .unwrap_or_default(),
            Self::Integer(values) => values
                .get(idx)
                .map(|value| value.to_string())
                .unwrap_or_default(),
            Self::Date(values) => values
                .get(idx)
                .map(|days| date_from_days(days).format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            Self::Text(values) => values.get(idx).map(str::to_string).unwrap_or_default(),
            Self::Other(column) => column
                .get(idx)
                .map(|value| value.to_string())
                .unwrap_or_default(),
        }
    }
}
