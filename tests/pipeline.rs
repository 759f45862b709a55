use tablekit::frame::{Cell, Column, Table};
use tablekit::jobs::parse_jobs;
use tablekit::pipeline::apply;

fn table(columns: Vec<Column>) -> Table {
    Table::from_columns(columns).unwrap()
}

#[test]
fn jobs_run_in_list_order_over_the_evolving_table() {
    let input = table(vec![Column::from_raw("v", &["0.25", "0.125", "x"])]);
    let jobs = parse_jobs(
        r#"[
            {"columns": ["v"], "kind": "cast-float", "decimals": 2},
            {"columns": ["v"], "kind": "scale", "operation": "mul", "factor": 4.0},
            {"columns": ["v"], "kind": "fill-missing", "strategy": "constant", "fill_value": -1}
        ]"#,
    )
    .unwrap();
    let out = apply(&input, &jobs).unwrap();
    // 0.125 rounds half-to-even to 0.12 before scaling.
    assert_eq!(out.cell(0, "v").unwrap().as_f64(), Some(1.0));
    assert_eq!(out.cell(1, "v").unwrap().as_f64(), Some(0.48));
    assert_eq!(out.cell(2, "v").unwrap().as_f64(), Some(-1.0));
}

#[test]
fn percent_and_date_formatting_compose() {
    let input = table(vec![
        Column::from_raw("rate", &["0.07", "bad", ""]),
        Column::from_raw("when", &["01/31/2024", "2024-02-29", "nope"]),
    ]);
    let jobs = parse_jobs(
        r#"[
            {"columns": ["rate"], "kind": "format-percent"},
            {"columns": ["when"], "kind": "format-date", "pattern": "DD-MM-YY"}
        ]"#,
    )
    .unwrap();
    let out = apply(&input, &jobs).unwrap();
    assert_eq!(out.cell(0, "rate"), Some(&Cell::Text("7%".to_string())));
    assert_eq!(out.cell(1, "rate"), Some(&Cell::Null));
    assert_eq!(out.cell(2, "rate"), Some(&Cell::Null));
    assert_eq!(out.cell(0, "when"), Some(&Cell::Text("31-01-24".to_string())));
    assert_eq!(out.cell(1, "when"), Some(&Cell::Text("29-02-24".to_string())));
    assert_eq!(out.cell(2, "when"), Some(&Cell::Null));
}

#[test]
fn outlier_replacement_with_median_preserves_inliers() {
    let input = table(vec![Column::from_raw(
        "v",
        &["10", "11", "12", "13", "14", "1000"],
    )]);
    let jobs = parse_jobs(
        r#"[{"columns": ["v"], "kind": "handle-outlier", "method": "iqr", "threshold": 1.5, "replace": "median"}]"#,
    )
    .unwrap();
    let out = apply(&input, &jobs).unwrap();
    assert_eq!(out.cell(0, "v").unwrap().as_f64(), Some(10.0));
    let replaced = out.cell(5, "v").unwrap().as_f64().unwrap();
    assert_eq!(replaced, 12.5);
}

#[test]
fn retype_pass_enables_numeric_diff_semantics_downstream() {
    let input = table(vec![Column::from_raw("v", &["01", "2"])]);
    let out = apply(&input, &[]).unwrap();
    assert_eq!(out.cell(0, "v"), Some(&Cell::Integer(1)));
    assert_eq!(out.cell(1, "v"), Some(&Cell::Integer(2)));
}

#[test]
fn mixed_column_stays_text_after_retype() {
    let input = table(vec![Column::from_raw("v", &["1", "2x"])]);
    let out = apply(&input, &[]).unwrap();
    assert_eq!(out.cell(0, "v"), Some(&Cell::Text("1".to_string())));
}

#[test]
fn an_unmodified_source_table_can_feed_multiple_runs() {
    let input = table(vec![Column::from_raw("v", &["1", "2", "NA"])]);
    let jobs_a = parse_jobs(r#"[{"columns": ["v"], "kind": "cast-integer"}]"#).unwrap();
    let jobs_b =
        parse_jobs(r#"[{"columns": ["v"], "kind": "fill-missing", "strategy": "mean"}]"#).unwrap();

    let first = apply(&input, &jobs_a).unwrap();
    let second = apply(&input, &jobs_b).unwrap();

    assert_eq!(first.cell(2, "v"), Some(&Cell::Null));
    assert_eq!(second.cell(2, "v").unwrap().as_f64(), Some(1.5));
    // The source still holds its original raw cells.
    assert_eq!(input.cell(0, "v"), Some(&Cell::Text("1".to_string())));
}
