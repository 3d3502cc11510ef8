pub mod aggregate;
pub mod dataset;
pub mod error;
pub mod export;
pub mod filter;
pub mod search;
pub mod selection;

pub use dataset::{load_dataset, parse_dataset, Dataset, DatasetCache, LoadReport};
pub use error::{PipelineError, Result};
pub use filter::{apply_filter, DateRange, FilterSelection};
pub use search::LookupOutcome;
