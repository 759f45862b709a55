mod common;

use assert_cmd::Command;
use common::TestWorkspace;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

fn tablekit() -> Command {
    Command::cargo_bin("tablekit").expect("binary present")
}

#[test]
fn probe_previews_the_first_rows() {
    let ws = TestWorkspace::new();
    let input = ws.write("orders.csv", "id,amount\n1,10\n2,20\n3,30\n");

    tablekit()
        .args(["probe", "-i", input.to_str().unwrap(), "--rows", "2"])
        .assert()
        .success()
        .stdout(contains("id").and(contains("10")).and(contains("30").not()));
}

#[test]
fn probe_summary_reports_types_and_missing_counts() {
    let ws = TestWorkspace::new();
    let input = ws.write("orders.csv", "id,city\n1,Austin\n2,NA\n");

    let output = tablekit()
        .args(["probe", "-i", input.to_str().unwrap(), "--summary"])
        .assert()
        .success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["rows"], 2);
    assert_eq!(summary["cols"], 2);
    assert_eq!(summary["dtypes"]["id"], "numeric");
    assert_eq!(summary["na_count"]["city"], 1);
    assert_eq!(summary["na_ratio"]["city"], 0.5);
}

#[test]
fn transform_applies_a_job_file_and_writes_csv() {
    let ws = TestWorkspace::new();
    let input = ws.write("input.csv", "name,score\n alice ,0.5\nbob,x\n");
    let jobs = ws.write(
        "jobs.json",
        r#"[
            {"columns": ["name"], "kind": "normalize-string"},
            {"columns": ["score"], "kind": "format-percent", "decimals": 0}
        ]"#,
    );
    let output = ws.target("out.csv");

    tablekit()
        .args([
            "transform",
            "-i",
            input.to_str().unwrap(),
            "-j",
            jobs.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();

    let bytes = std::fs::read(&output).unwrap();
    assert!(bytes.starts_with(&[0xEF, 0xBB, 0xBF]));
    let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
    assert!(text.contains("\"ALICE\""));
    assert!(text.contains("\"50%\""));
    // "x" fails the percent coercion and degrades to an empty cell.
    assert!(text.contains("\"BOB\",\"\""));
}

#[test]
fn transform_rejects_a_malformed_job_file() {
    let ws = TestWorkspace::new();
    let input = ws.write("input.csv", "a\n1\n");
    let jobs = ws.write("jobs.json", r#"[{"columns": ["a"], "kind": "frobnicate"}]"#);
    let output = ws.target("out.csv");

    tablekit()
        .args([
            "transform",
            "-i",
            input.to_str().unwrap(),
            "-j",
            jobs.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("configuration error"));
    assert!(!output.exists());
}

#[test]
fn clean_normalizes_names_and_removes_duplicates() {
    let ws = TestWorkspace::new();
    let input = ws.write(
        "input.csv",
        "order id,Amount ($)\n1,10\n1,10\n2,20\n",
    );
    let output = ws.target("clean.csv");

    tablekit()
        .args([
            "clean",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--dedup",
        ])
        .assert()
        .success();

    let bytes = std::fs::read(&output).unwrap();
    let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
    assert!(text.starts_with("\"ORDER_ID\",\"AMOUNT_\""));
    assert_eq!(text.lines().count(), 3);
}

#[test]
fn combine_merges_on_a_key_column() {
    let ws = TestWorkspace::new();
    let left = ws.write("left.csv", "ID\n1\n2\n");
    let right = ws.write("right.csv", "ID,V\n2,9\n3,8\n");
    let output = ws.target("merged.csv");

    tablekit()
        .args([
            "combine",
            "-i",
            left.to_str().unwrap(),
            "-i",
            right.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--method",
            "merge",
            "--on",
            "ID",
        ])
        .assert()
        .success();

    let bytes = std::fs::read(&output).unwrap();
    let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], "\"2\",\"9\"");
}

#[test]
fn combine_merge_without_keys_fails() {
    let ws = TestWorkspace::new();
    let left = ws.write("left.csv", "ID\n1\n");
    let right = ws.write("right.csv", "ID\n1\n");
    let output = ws.target("merged.csv");

    tablekit()
        .args([
            "combine",
            "-i",
            left.to_str().unwrap(),
            "-i",
            right.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--method",
            "merge",
        ])
        .assert()
        .failure()
        .stderr(contains("missing join keys"));
}

#[test]
fn diff_writes_a_workbook_per_mapping() {
    let ws = TestWorkspace::new();
    let left = ws.write("old.csv", "X\n1\n2\n");
    let right = ws.write("new.csv", "X\n1\n5\n");
    let artifact = ws.target("diff.xlsx");
    let mappings = ws.write(
        "mappings.json",
        &format!(
            r#"[{{"label_a": "Old", "label_b": "New", "output_path": {:?}}}]"#,
            artifact.to_str().unwrap()
        ),
    );

    tablekit()
        .args([
            "diff",
            "--left",
            left.to_str().unwrap(),
            "--right",
            right.to_str().unwrap(),
            "-m",
            mappings.to_str().unwrap(),
            "--mode",
            "report",
        ])
        .assert()
        .success();
    assert!(artifact.exists());
}

#[test]
fn export_converts_csv_to_json() {
    let ws = TestWorkspace::new();
    let input = ws.write("input.csv", "a,b\n1,x\n,y\n");
    let output = ws.target("out.json");

    tablekit()
        .args([
            "export",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();

    let text = std::fs::read_to_string(&output).unwrap();
    let rows: Vec<serde_json::Value> = serde_json::from_str(&text).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["a"], "1");
    assert_eq!(rows[1]["a"], serde_json::Value::Null);
}
