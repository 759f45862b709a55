use proptest::prelude::*;

use tablekit::columns::{NameCase, normalize_names};
use tablekit::frame::{Cell, Column, Table};
use tablekit::jobs::parse_jobs;
use tablekit::pipeline::apply;

fn name_strategy() -> impl Strategy<Value = String> {
    // Headers as they arrive from real files: letters, digits, spaces,
    // and the occasional punctuation.
    proptest::string::string_regex("[ a-zA-Z0-9_()%#-]{0,12}").expect("regex strategy")
}

proptest! {
    #[test]
    fn column_name_normalization_is_idempotent(
        names in proptest::collection::vec(name_strategy(), 1..8)
    ) {
        let columns: Vec<Column> = names
            .iter()
            .enumerate()
            // Raw names may collide; let the table see them post-dedup.
            .map(|(idx, _)| Column::from_raw(format!("c{idx}"), &["1"]))
            .collect();
        let mut table = Table::from_columns(columns).unwrap();
        table = table_with_names(table, &names);

        let once = normalize_names(&table, NameCase::Upper, true);
        let twice = normalize_names(&once, NameCase::Upper, true);
        prop_assert_eq!(once.column_names(), twice.column_names());

        let unique: std::collections::HashSet<String> =
            once.column_names().into_iter().collect();
        prop_assert_eq!(unique.len(), once.n_cols());
    }

    #[test]
    fn constant_fill_eliminates_missing_cells(
        values in proptest::collection::vec(
            prop_oneof![
                Just("NA".to_string()),
                Just(String::new()),
                // No leading zeros so the final re-typing pass renders
                // values back identically.
                "[1-9][0-9]{0,3}".prop_map(|s| s),
            ],
            1..20
        )
    ) {
        let fields: Vec<&str> = values.iter().map(String::as_str).collect();
        let table = Table::from_columns(vec![Column::from_raw("v", &fields)]).unwrap();
        let jobs = parse_jobs(
            r#"[{"columns": ["v"], "kind": "fill-missing", "strategy": "constant", "fill_value": "filled"}]"#,
        )
        .unwrap();
        let out = apply(&table, &jobs).unwrap();

        let column = out.column("v").unwrap();
        prop_assert!(column.cells.iter().all(|cell| !cell.is_missing()));
        // Present values are untouched.
        for (cell, raw) in column.cells.iter().zip(&values) {
            if !Cell::from_raw(raw).is_missing() {
                prop_assert_eq!(cell.as_display(), raw.trim().to_string());
            }
        }
    }
}

fn table_with_names(table: Table, names: &[String]) -> Table {
    let columns = table
        .columns()
        .iter()
        .zip(names)
        .map(|(column, name)| Column::new(name.clone(), column.cells.clone()))
        .collect();
    // Raw headers may collide before normalization; bypass the uniqueness
    // check the same way the resolver's dedup path would.
    match Table::from_columns(columns) {
        Ok(table) => table,
        Err(_) => {
            let deduped: Vec<Column> = table
                .columns()
                .iter()
                .zip(tablekit::columns::dedupe_names(names.to_vec()))
                .map(|(column, name)| Column::new(name, column.cells.clone()))
                .collect();
            Table::from_columns(deduped).expect("deduped names are unique")
        }
    }
}
