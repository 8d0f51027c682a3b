// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use serde_json::{Map, Value, json};
use sql_query_agent::{
    llm::CompletionRequest,
    orchestrator::{AttemptRecord, QueryResult, Stage},
    output::{OutputFormat, OutputOptions, format_prompts, format_query_result, format_rows_table},
    validator::TableValidator,
    warehouse::DatasetRef
};

fn plain(format: OutputFormat, verbose: bool) -> OutputOptions {
    OutputOptions {
        format,
        colored: false,
        verbose
    }
}

fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn success(rows: Vec<Map<String, Value>>) -> QueryResult {
    QueryResult::Success {
        sql:             String::from("SELECT name, total FROM `p.d.orders`"),
        row_count:       rows.len() as u64,
        bytes_processed: 512,
        rows,
        attempts:        Vec::new()
    }
}

fn failure_with_attempt() -> QueryResult {
    let validation = TableValidator::new(DatasetRef::new("p", "d"))
        .validate("SELECT * FROM orders", &[String::from("orders")]);
    QueryResult::Error {
        stage:    Stage::Validation,
        message:  format!("Failed after 0 attempts: {}", validation.error_message),
        last_sql: Some(String::from("SELECT * FROM orders")),
        attempts: vec![AttemptRecord {
            attempt: 0,
            sql: String::from("SELECT * FROM orders"),
            validation
        }]
    }
}

#[test]
fn test_output_options_default() {
    let opts = OutputOptions::default();
    assert!(matches!(opts.format, OutputFormat::Text));
    assert!(opts.colored);
    assert!(!opts.verbose);
}

#[test]
fn test_text_success_summary() {
    let result = success(vec![
        row(&[("name", json!("Ann")), ("total", json!(10.5))]),
        row(&[("name", json!("Bob")), ("total", json!(3))])
    ]);
    let output = format_query_result(&result, &plain(OutputFormat::Text, false));
    assert!(output.contains("SELECT name, total FROM `p.d.orders`"));
    assert!(output.contains("Query executed successfully. Returned 2 rows. Processed 512 bytes."));
    assert!(output.contains("Ann"));
    assert!(output.contains("10.5"));
}

#[test]
fn test_text_zero_rows() {
    let output = format_query_result(&success(Vec::new()), &plain(OutputFormat::Text, false));
    assert!(output.contains("Query executed successfully, but returned no rows."));
    assert!(!output.contains("Returned"));
}

#[test]
fn test_text_failure_shows_stage_and_last_sql() {
    let output = format_query_result(&failure_with_attempt(), &plain(OutputFormat::Text, false));
    assert!(output.contains("Failed at validation stage:"));
    assert!(output.contains("Table names should include full path"));
    assert!(output.contains("Last generated SQL:\nSELECT * FROM orders"));
    assert!(!output.contains("Attempt #1"));
}

#[test]
fn test_verbose_lists_attempts() {
    let output = format_query_result(&failure_with_attempt(), &plain(OutputFormat::Text, true));
    assert!(output.contains("Attempt #1 (invalid):"));
}

#[test]
fn test_plain_output_has_no_escape_codes() {
    let output = format_query_result(&failure_with_attempt(), &plain(OutputFormat::Text, true));
    assert!(!output.contains('\u{1b}'));
}

#[test]
fn test_json_output() {
    let output = format_query_result(
        &success(vec![row(&[("n", json!(1))])]),
        &plain(OutputFormat::Json, false)
    );
    let parsed: Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed["status"], "success");
    assert_eq!(parsed["row_count"], 1);
    assert_eq!(parsed["rows"][0]["n"], 1);
}

#[test]
fn test_yaml_output() {
    let output = format_query_result(&failure_with_attempt(), &plain(OutputFormat::Yaml, false));
    assert!(output.contains("status: error"));
    assert!(output.contains("stage: validation"));
}

#[test]
fn test_rows_table_alignment_and_missing_cells() {
    let rows = vec![
        row(&[("id", json!(1)), ("name", json!("Ann"))]),
        row(&[("id", json!(22)), ("city", Value::Null)])
    ];
    let table = format_rows_table(&rows);
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines[0], "id | name | city");
    assert_eq!(lines[1], "---+------+-----");
    assert_eq!(lines[2], "1  | Ann");
    assert_eq!(lines[3], "22 |      | NULL");
}

#[test]
fn test_rows_table_truncates_long_cells() {
    let long = "x".repeat(100);
    let table = format_rows_table(&[row(&[("v", json!(long))])]);
    assert!(table.contains("..."));
    assert!(!table.contains(&"x".repeat(61)));
}

#[test]
fn test_rows_table_empty() {
    assert!(format_rows_table(&[]).is_empty());
}

#[test]
fn test_format_prompts() {
    let request = CompletionRequest {
        system_prompt: String::from("system text"),
        user_prompt:   String::from("user text"),
        temperature:   0.0
    };
    let output = format_prompts(&request, &plain(OutputFormat::Text, false));
    assert!(output.contains("=== System prompt ===\nsystem text"));
    assert!(output.contains("=== User prompt ===\nuser text"));
    assert!(output.contains("Temperature: 0"));
}
