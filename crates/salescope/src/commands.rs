use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context, Result};
use comfy_table::{presets::UTF8_FULL, Table};
use polars::prelude::DataFrame;
use serde_json::json;
use tracing::{info, warn};

use salescope_core::aggregate::{self, GroupedValue, ValueCount};
use salescope_core::search::{lookup_city, lookup_product_line, LookupOutcome};
use salescope_core::{apply_filter, export, load_dataset};

use crate::{ExportArgs, FilterArgs, OutputFormat, ReportArgs, SearchArgs};

fn load_filtered(file: &Path, filters: &FilterArgs) -> Result<DataFrame> {
    let selection = filters.to_selection()?;
    let dataset = load_dataset(file)
        .with_context(|| format!("failed to load dataset from {}", file.display()))?;
    if dataset.report.total_coerced() > 0 {
        warn!(
            cells = dataset.report.total_coerced(),
            "cells failed to parse and were treated as missing"
        );
    }
    let filtered = apply_filter(&dataset.df, &selection)?;
    info!(rows = filtered.height(), "filter applied");
    Ok(filtered)
}

pub fn handle_summary(args: ReportArgs) -> Result<()> {
    let df = load_filtered(&args.file, &args.filters)?;

    let kpis = aggregate::kpis(&df)?;
    let span = aggregate::date_span(&df)?;
    let product_lines = aggregate::totals_by_product_line(&df)?;
    let cities = aggregate::totals_by_city(&df)?;
    let genders = aggregate::totals_by_gender(&df)?;
    let customer_types = aggregate::totals_by_customer_type(&df)?;
    let payments = aggregate::payment_counts(&df)?;

    match args.format {
        OutputFormat::Json => {
            let payload = json!({
                "kpis": kpis,
                "date_span": span.map(|(start, end)| json!({
                    "start": start.to_string(),
                    "end": end.to_string(),
                })),
                "sales_by_product_line": product_lines,
                "sales_by_city": cities,
                "sales_by_gender": genders,
                "sales_by_customer_type": customer_types,
                "payment_counts": payments,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        OutputFormat::Table => {
            if let Some((start, end)) = span {
                println!("Data from {start} to {end}");
            }
            println!("Transactions: {}", kpis.transactions);
            println!("Total sales: ${:.2}", kpis.total_sales);
            match kpis.average_rating {
                Some(rating) => println!("Average rating: {rating:.2}"),
                None => println!("Average rating: no data"),
            }
            println!();
            print_grouped("Product line", &product_lines);
            print_grouped("City", &cities);
            print_grouped("Gender", &genders);
            print_grouped("Customer type", &customer_types);
            print_counts("Payment", &payments);
        }
    }
    Ok(())
}

pub fn handle_correlation(args: ReportArgs) -> Result<()> {
    let df = load_filtered(&args.file, &args.filters)?;
    let matrix = aggregate::correlation_matrix(&df)?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&matrix)?),
        OutputFormat::Table => {
            if matrix.is_empty() {
                println!("No numeric columns to correlate.");
                return Ok(());
            }
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            let mut header = vec![String::new()];
            header.extend(matrix.columns.iter().cloned());
            table.set_header(header);
            for (name, row) in matrix.columns.iter().zip(&matrix.coefficients) {
                let mut cells = vec![name.clone()];
                cells.extend(row.iter().map(|coefficient| match coefficient {
                    Some(value) => format!("{value:.3}"),
                    None => String::new(),
                }));
                table.add_row(cells);
            }
            println!("{table}");
        }
    }
    Ok(())
}

pub fn handle_monthly(args: ReportArgs) -> Result<()> {
    let df = load_filtered(&args.file, &args.filters)?;
    let Some(monthly) = aggregate::monthly_totals(&df)? else {
        println!("Dataset has no date column; monthly trend skipped.");
        return Ok(());
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&monthly)?),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Month", "Total sales"]);
            for bucket in &monthly {
                table.add_row(vec![
                    bucket.month_end.format("%Y-%m").to_string(),
                    format!("{:.2}", bucket.total),
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

pub fn handle_insights(args: ReportArgs) -> Result<()> {
    let df = load_filtered(&args.file, &args.filters)?;
    let insights = aggregate::quick_insights(&df)?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&insights)?),
        OutputFormat::Table => {
            match &insights.top_city {
                Some(city) => println!("Highest sales city: {city}"),
                None => println!("Highest sales city: no data"),
            }
            match &insights.top_product_line {
                Some(top) => println!(
                    "Highest selling product line: {} (${:.2})",
                    top.name, top.total
                ),
                None => println!("Highest selling product line: no data"),
            }
            match &insights.top_payment {
                Some(payment) => println!("Most used payment method: {payment}"),
                None => println!("Most used payment method: no data"),
            }
            println!(
                "Sales in last {} records: ${:.2}",
                insights.tail_window.rows, insights.tail_window.total
            );
        }
    }
    Ok(())
}

pub fn handle_search(args: SearchArgs) -> Result<()> {
    if args.city_name.is_none() && args.product_line_name.is_none() {
        bail!("provide --city-name and/or --product-line-name");
    }

    let df = load_filtered(&args.file, &args.filters)?;
    let city = args
        .city_name
        .as_deref()
        .map(|term| lookup_city(&df, term))
        .transpose()?;
    let product_line = args
        .product_line_name
        .as_deref()
        .map(|term| lookup_product_line(&df, term))
        .transpose()?;

    match args.format {
        OutputFormat::Json => {
            let payload = json!({
                "city": city,
                "product_line": product_line,
            });
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        OutputFormat::Table => {
            if let Some(outcome) = &city {
                print_lookup("City", outcome);
            }
            if let Some(outcome) = &product_line {
                print_lookup("Product line", outcome);
            }
        }
    }
    Ok(())
}

pub fn handle_export(args: ExportArgs) -> Result<()> {
    let df = load_filtered(&args.file, &args.filters)?;
    let file = File::create(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    export::write_csv(&df, file)?;
    println!("Wrote {} rows to {}", df.height(), args.output.display());
    Ok(())
}

fn print_lookup(kind: &str, outcome: &LookupOutcome) {
    match outcome {
        LookupOutcome::Found { label, total, rows } => {
            let kind = kind.to_lowercase();
            println!(
                "Total sales for {kind} '{label}': ${total:.2} across {rows} transactions"
            );
        }
        LookupOutcome::NotFound => println!("{kind} not found."),
    }
}

fn print_grouped(label: &str, groups: &[GroupedValue]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![label.to_string(), "Total sales".to_string()]);
    for group in groups {
        table.add_row(vec![group.key.clone(), format!("{:.2}", group.value)]);
    }
    println!("{table}");
    println!();
}

fn print_counts(label: &str, counts: &[ValueCount]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![label.to_string(), "Transactions".to_string()]);
    for entry in counts {
        table.add_row(vec![entry.value.clone(), entry.count.to_string()]);
    }
    println!("{table}");
}
