use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::filter::FilterSelection;

/// Reads a saved filter selection from a TOML file.
///
/// ```toml
/// cities = ["Yangon", "Mandalay"]
/// product_lines = ["Health and beauty"]
///
/// [date_range]
/// start = "2019-01-01"
/// end = "2019-03-30"
/// ```
///
/// Omitted keys leave the corresponding dimension unrestricted.
pub fn selection_from_path(path: &Path) -> Result<FilterSelection> {
    let content = fs::read_to_string(path).map_err(|source| PipelineError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    selection_from_str(&content)
}

pub fn selection_from_str(content: &str) -> Result<FilterSelection> {
    let selection: FilterSelection = toml::from_str(content)?;
    if let Some(range) = &selection.date_range {
        range.validate()?;
    }
    Ok(selection)
}
