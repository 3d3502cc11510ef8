use chrono::NaiveDate;
use polars::prelude::*;

use salescope_core::aggregate::{
    correlation_matrix, date_span, grouped_reduce, kpis, monthly_totals, payment_counts,
    quick_insights, tail_window_total, total_sales, totals_by_product_line, GroupOrder, Reduction,
};

fn date_column(dates: &[Option<(i32, u32, u32)>]) -> Column {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let days: Vec<Option<i32>> = dates
        .iter()
        .map(|date| {
            date.map(|(year, month, day)| {
                let date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
                (date - epoch).num_days() as i32
            })
        })
        .collect();
    Series::new("date".into(), days)
        .cast(&DataType::Date)
        .unwrap()
        .into()
}

fn sample_frame() -> DataFrame {
    DataFrame::new(vec![
        Series::new("city".into(), vec!["Yangon", "Mandalay", "Yangon"]).into(),
        Series::new("product_line".into(), vec!["Health", "Food", "Food"]).into(),
        Series::new("gender".into(), vec!["Female", "Male", "Male"]).into(),
        Series::new("payment".into(), vec!["Cash", "Ewallet", "Cash"]).into(),
        Series::new("total".into(), vec![100.0, 50.0, 25.0]).into(),
        Series::new("rating".into(), vec![8.0, 6.0, 7.0]).into(),
        date_column(&[
            Some((2019, 1, 5)),
            Some((2019, 1, 20)),
            Some((2019, 3, 2)),
        ]),
    ])
    .unwrap()
}

#[test]
fn grouped_city_sums_match_expected_totals() {
    let df = sample_frame();
    let by_city = grouped_reduce(&df, "city", "total", Reduction::Sum, GroupOrder::FirstSeen)
        .unwrap();

    assert_eq!(by_city.len(), 2);
    assert_eq!(by_city[0].key, "Yangon");
    assert_eq!(by_city[0].value, 125.0);
    assert_eq!(by_city[1].key, "Mandalay");
    assert_eq!(by_city[1].value, 50.0);
}

#[test]
fn value_ascending_sorts_groups_by_sum() {
    let df = sample_frame();
    let by_product = totals_by_product_line(&df).unwrap();

    assert_eq!(by_product[0].key, "Food");
    assert_eq!(by_product[0].value, 75.0);
    assert_eq!(by_product[1].key, "Health");
    assert_eq!(by_product[1].value, 100.0);
}

#[test]
fn grouped_sums_add_up_to_the_whole_set_total() {
    let df = sample_frame();
    let by_gender = grouped_reduce(&df, "gender", "total", Reduction::Sum, GroupOrder::FirstSeen)
        .unwrap();

    let grouped_sum: f64 = by_gender.iter().map(|group| group.value).sum();
    assert_eq!(grouped_sum, total_sales(&df).unwrap());
}

#[test]
fn mean_and_count_reductions() {
    let df = sample_frame();

    let mean_by_gender =
        grouped_reduce(&df, "gender", "total", Reduction::Mean, GroupOrder::FirstSeen).unwrap();
    assert_eq!(mean_by_gender[0].key, "Female");
    assert_eq!(mean_by_gender[0].value, 100.0);
    assert_eq!(mean_by_gender[1].key, "Male");
    assert_eq!(mean_by_gender[1].value, 37.5);

    let count_by_city =
        grouped_reduce(&df, "city", "total", Reduction::Count, GroupOrder::ValueDescending)
            .unwrap();
    assert_eq!(count_by_city[0].key, "Yangon");
    assert_eq!(count_by_city[0].value, 2.0);
}

#[test]
fn null_totals_contribute_zero_but_rows_still_count() {
    let df = DataFrame::new(vec![
        Series::new("city".into(), vec!["Yangon", "Yangon"]).into(),
        Series::new("total".into(), vec![Some(100.0), None]).into(),
    ])
    .unwrap();

    let sums = grouped_reduce(&df, "city", "total", Reduction::Sum, GroupOrder::FirstSeen)
        .unwrap();
    assert_eq!(sums[0].value, 100.0);

    let counts = grouped_reduce(&df, "city", "total", Reduction::Count, GroupOrder::FirstSeen)
        .unwrap();
    assert_eq!(counts[0].value, 2.0);

    assert_eq!(total_sales(&df).unwrap(), 100.0);
}

#[test]
fn kpis_degrade_to_no_data_on_an_empty_frame() {
    let df = DataFrame::new(vec![
        Series::new("city".into(), Vec::<&str>::new()).into(),
        Series::new("product_line".into(), Vec::<&str>::new()).into(),
        Series::new("payment".into(), Vec::<&str>::new()).into(),
        Series::new("total".into(), Vec::<f64>::new()).into(),
        Series::new("rating".into(), Vec::<f64>::new()).into(),
    ])
    .unwrap();

    let kpis = kpis(&df).unwrap();
    assert_eq!(kpis.total_sales, 0.0);
    assert_eq!(kpis.average_rating, None);
    assert_eq!(kpis.transactions, 0);

    let insights = quick_insights(&df).unwrap();
    assert!(insights.top_city.is_none());
    assert!(insights.top_product_line.is_none());
    assert!(insights.top_payment.is_none());
    assert_eq!(insights.tail_window.rows, 0);
    assert_eq!(insights.tail_window.total, 0.0);
}

#[test]
fn payment_counts_sort_descending_with_stable_ties() {
    let df = DataFrame::new(vec![Series::new(
        "payment".into(),
        vec!["Cash", "Ewallet", "Cash", "Card", "Ewallet"],
    )
    .into()])
    .unwrap();

    let counts = payment_counts(&df).unwrap();
    assert_eq!(counts.len(), 3);
    assert_eq!((counts[0].value.as_str(), counts[0].count), ("Cash", 2));
    assert_eq!((counts[1].value.as_str(), counts[1].count), ("Ewallet", 2));
    assert_eq!((counts[2].value.as_str(), counts[2].count), ("Card", 1));
}

#[test]
fn correlation_matrix_is_symmetric_with_unit_diagonal() {
    let df = DataFrame::new(vec![
        Series::new("x".into(), vec![1.0, 2.0, 3.0]).into(),
        Series::new("y".into(), vec![2.0, 4.0, 6.0]).into(),
        Series::new("w".into(), vec![3.0, 2.0, 1.0]).into(),
        Series::new("constant".into(), vec![5.0, 5.0, 5.0]).into(),
        Series::new("label".into(), vec!["a", "b", "c"]).into(),
    ])
    .unwrap();

    let matrix = correlation_matrix(&df).unwrap();
    assert_eq!(matrix.columns, vec!["x", "y", "w", "constant"]);

    assert_eq!(matrix.coefficients[0][0], Some(1.0));
    assert_eq!(matrix.coefficients[1][1], Some(1.0));
    assert_eq!(matrix.coefficients[3][3], None);

    let xy = matrix.coefficients[0][1].unwrap();
    assert!((xy - 1.0).abs() < 1e-9);
    let xw = matrix.coefficients[0][2].unwrap();
    assert!((xw + 1.0).abs() < 1e-9);

    for i in 0..matrix.columns.len() {
        for j in 0..matrix.columns.len() {
            assert_eq!(matrix.coefficients[i][j], matrix.coefficients[j][i]);
        }
    }

    assert_eq!(matrix.coefficients[0][3], None);
}

#[test]
fn correlation_uses_pairwise_complete_observations() {
    let df = DataFrame::new(vec![
        Series::new("x".into(), vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]).into(),
        Series::new("y".into(), vec![Some(2.0), None, Some(6.0), Some(8.0)]).into(),
    ])
    .unwrap();

    let matrix = correlation_matrix(&df).unwrap();
    let xy = matrix.coefficients[0][1].unwrap();
    assert!((xy - 1.0).abs() < 1e-9);
}

#[test]
fn correlation_over_no_numeric_columns_is_empty() {
    let df = DataFrame::new(vec![
        Series::new("label".into(), Vec::<&str>::new()).into(),
    ])
    .unwrap();

    let matrix = correlation_matrix(&df).unwrap();
    assert!(matrix.is_empty());
}

#[test]
fn monthly_totals_bucket_by_month_end_and_fill_gaps() {
    let df = sample_frame();
    let monthly = monthly_totals(&df).unwrap().unwrap();

    assert_eq!(monthly.len(), 3);
    assert_eq!(
        monthly[0].month_end,
        NaiveDate::from_ymd_opt(2019, 1, 31).unwrap()
    );
    assert_eq!(monthly[0].total, 150.0);
    assert_eq!(
        monthly[1].month_end,
        NaiveDate::from_ymd_opt(2019, 2, 28).unwrap()
    );
    assert_eq!(monthly[1].total, 0.0);
    assert_eq!(
        monthly[2].month_end,
        NaiveDate::from_ymd_opt(2019, 3, 31).unwrap()
    );
    assert_eq!(monthly[2].total, 25.0);
}

#[test]
fn monthly_totals_are_skipped_without_a_date_column() {
    let df = DataFrame::new(vec![
        Series::new("total".into(), vec![10.0]).into(),
    ])
    .unwrap();

    assert!(monthly_totals(&df).unwrap().is_none());
}

#[test]
fn tail_window_over_a_small_set_equals_the_full_sum() {
    let df = sample_frame();
    let window = tail_window_total(&df, 30).unwrap();
    assert_eq!(window.rows, 3);
    assert_eq!(window.total, total_sales(&df).unwrap());
}

#[test]
fn tail_window_picks_the_most_recent_rows_by_date() {
    let df = sample_frame();
    let window = tail_window_total(&df, 2).unwrap();
    assert_eq!(window.rows, 2);
    assert_eq!(window.total, 75.0);
}

#[test]
fn tail_window_breaks_date_ties_by_row_order() {
    let df = DataFrame::new(vec![
        Series::new("total".into(), vec![1.0, 2.0, 3.0, 4.0]).into(),
        date_column(&[
            Some((2019, 1, 1)),
            Some((2019, 2, 1)),
            Some((2019, 2, 1)),
            Some((2019, 2, 1)),
        ]),
    ])
    .unwrap();

    let window = tail_window_total(&df, 2).unwrap();
    assert_eq!(window.total, 5.0);
}

#[test]
fn tail_window_without_a_date_column_takes_trailing_rows() {
    let df = DataFrame::new(vec![
        Series::new("total".into(), vec![1.0, 2.0, 3.0]).into(),
    ])
    .unwrap();

    let window = tail_window_total(&df, 2).unwrap();
    assert_eq!(window.total, 5.0);
}

#[test]
fn quick_insights_extract_the_expected_top_values() {
    let df = sample_frame();
    let insights = quick_insights(&df).unwrap();

    assert_eq!(insights.top_city.as_deref(), Some("Yangon"));
    let top_product = insights.top_product_line.unwrap();
    assert_eq!(top_product.name, "Health");
    assert_eq!(top_product.total, 100.0);
    assert_eq!(insights.top_payment.as_deref(), Some("Cash"));
    assert_eq!(insights.tail_window.rows, 3);
}

#[test]
fn date_span_reports_min_and_max_dates() {
    let df = sample_frame();
    let (start, end) = date_span(&df).unwrap().unwrap();
    assert_eq!(start, NaiveDate::from_ymd_opt(2019, 1, 5).unwrap());
    assert_eq!(end, NaiveDate::from_ymd_opt(2019, 3, 2).unwrap());
}
