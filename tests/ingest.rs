use tablekit::frame::Cell;
use tablekit::infer::{self, ColumnKind};
use tablekit::ingest::{ResolveOptions, Resolved, SpreadsheetSupport, resolve};

fn resolve_bytes(bytes: &[u8], filename: &str) -> Resolved {
    resolve(
        bytes,
        filename,
        &ResolveOptions::default(),
        &SpreadsheetSupport::default(),
    )
    .expect("resolve input")
}

#[test]
fn resolver_detects_comma_and_utf8_from_plain_bytes() {
    let resolved = resolve_bytes(b"A,B\n1,2\n3,x\n", "data.csv");
    assert_eq!(resolved.encoding, "utf-8");
    assert_eq!(resolved.separator, Some(b','));
    assert_eq!(resolved.table.column_names(), vec!["A", "B"]);
    assert_eq!(resolved.table.n_rows(), 2);
    assert_eq!(
        resolved.table.cell(1, "B"),
        Some(&Cell::Text("x".to_string()))
    );
}

#[test]
fn resolver_detects_semicolon_separated_input() {
    let resolved = resolve_bytes(b"a;b;c\n1;2;3\n4;5;6\n", "data.csv");
    assert_eq!(resolved.separator, Some(b';'));
    assert_eq!(resolved.table.n_cols(), 3);
}

#[test]
fn explicit_separator_overrides_detection() {
    let options = ResolveOptions {
        separator: Some(b'|'),
        ..ResolveOptions::default()
    };
    let resolved = resolve(
        b"a|b\n1|2\n",
        "data.csv",
        &options,
        &SpreadsheetSupport::default(),
    )
    .unwrap();
    assert_eq!(resolved.table.column_names(), vec!["a", "b"]);
}

#[test]
fn gbk_content_resolves_through_the_cascade() {
    let (bytes, _, _) = encoding_rs::GBK.encode("城市,人口\n北京,100\n上海,200\n");
    let resolved = resolve_bytes(&bytes, "cities.csv");
    assert_eq!(resolved.encoding, "gbk");
    assert_eq!(resolved.table.column_names(), vec!["城市", "人口"]);
    assert_eq!(
        resolved.table.cell(0, "城市"),
        Some(&Cell::Text("北京".to_string()))
    );
}

#[test]
fn resolver_never_fails_on_delimited_garbage() {
    // Every byte value, newline-separated; only the final byte-preserving
    // fallback can decode some of these sequences.
    let mut bytes = Vec::new();
    for b in 0u8..=255 {
        bytes.push(b);
        bytes.push(b',');
        bytes.push(b'1');
        bytes.push(b'\n');
    }
    let resolved = resolve(
        &bytes,
        "garbage.csv",
        &ResolveOptions::default(),
        &SpreadsheetSupport::default(),
    );
    assert!(resolved.is_ok());
}

#[test]
fn missing_markers_ingest_as_null() {
    let resolved = resolve_bytes(b"v\nNA\nnull\n-\nok\n", "data.csv");
    let column = resolved.table.column("v").unwrap();
    assert_eq!(column.cells[0], Cell::Null);
    assert_eq!(column.cells[1], Cell::Null);
    assert_eq!(column.cells[2], Cell::Null);
    assert_eq!(column.cells[3], Cell::Text("ok".to_string()));
}

#[test]
fn inference_is_advisory_over_resolved_tables() {
    let resolved = resolve_bytes(b"n,d,t,empty\n1,2024-01-05,abc,\n2,2024-02-05,def,\n", "x.csv");
    let kinds: Vec<ColumnKind> = infer::infer(&resolved.table)
        .into_iter()
        .map(|(_, kind)| kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            ColumnKind::Numeric,
            ColumnKind::Date,
            ColumnKind::Text,
            ColumnKind::Unknown
        ]
    );
    // Cells stay untyped text.
    assert_eq!(
        resolved.table.cell(0, "n"),
        Some(&Cell::Text("1".to_string()))
    );
}

#[test]
fn quoted_fields_keep_embedded_separators() {
    let resolved = resolve_bytes(b"a,b\n\"x,y\",2\n", "data.csv");
    assert_eq!(
        resolved.table.cell(0, "a"),
        Some(&Cell::Text("x,y".to_string()))
    );
}
