use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
use commands::{
    handle_correlation, handle_export, handle_insights, handle_monthly, handle_search,
    handle_summary,
};
use salescope_core::{selection, DateRange, FilterSelection};

/// Exploration pipeline for retail transaction CSVs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// KPI row, grouped totals and payment mix for the filtered dataset
    Summary(ReportArgs),
    /// Pairwise correlation matrix over the numeric columns
    Correlation(ReportArgs),
    /// Month-by-month sales totals
    Monthly(ReportArgs),
    /// Top city / product line / payment method and the recent-sales window
    Insights(ReportArgs),
    /// Exact-match lookup of a city or product line by name
    Search(SearchArgs),
    /// Write the filtered dataset as CSV
    Export(ExportArgs),
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Path to the sales CSV
    pub file: PathBuf,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Path to the sales CSV
    pub file: PathBuf,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// City name to look up (title-cased exact match)
    #[arg(long)]
    pub city_name: Option<String>,

    /// Product line name to look up (title-cased exact match)
    #[arg(long)]
    pub product_line_name: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Path to the sales CSV
    pub file: PathBuf,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Destination path for the filtered CSV
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Keep only these cities (repeatable)
    #[arg(long = "city")]
    pub cities: Vec<String>,

    /// Keep only these product lines (repeatable)
    #[arg(long = "product-line")]
    pub product_lines: Vec<String>,

    /// Keep only these genders (repeatable)
    #[arg(long = "gender")]
    pub genders: Vec<String>,

    /// Inclusive start of the date range (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Inclusive end of the date range (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// TOML file with a saved filter selection; flags override its entries
    #[arg(long)]
    pub selection: Option<PathBuf>,
}

impl FilterArgs {
    pub fn to_selection(&self) -> Result<FilterSelection> {
        let mut selection = match &self.selection {
            Some(path) => selection::selection_from_path(path)
                .with_context(|| format!("failed to load selection from {}", path.display()))?,
            None => FilterSelection::default(),
        };

        if !self.cities.is_empty() {
            selection.cities = Some(self.cities.clone());
        }
        if !self.product_lines.is_empty() {
            selection.product_lines = Some(self.product_lines.clone());
        }
        if !self.genders.is_empty() {
            selection.genders = Some(self.genders.clone());
        }

        if self.start_date.is_some() || self.end_date.is_some() {
            let saved = selection.date_range;
            let Some(start) = self.start_date.or(saved.map(|range| range.start)) else {
                bail!("--end-date was given without --start-date or a saved range");
            };
            let Some(end) = self.end_date.or(saved.map(|range| range.end)) else {
                bail!("--start-date was given without --end-date or a saved range");
            };
            selection.date_range = Some(DateRange::new(start, end)?);
        }

        Ok(selection)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Summary(args) => handle_summary(args),
        Command::Correlation(args) => handle_correlation(args),
        Command::Monthly(args) => handle_monthly(args),
        Command::Insights(args) => handle_insights(args),
        Command::Search(args) => handle_search(args),
        Command::Export(args) => handle_export(args),
    }
}
