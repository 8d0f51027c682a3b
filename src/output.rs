use colored::Colorize;
use indexmap::IndexSet;
use serde_json::Value;

use crate::{
    llm::CompletionRequest,
    orchestrator::{AttemptRecord, QueryResult},
    warehouse::Row
};

/// Longest cell rendered in text tables before truncation
const MAX_CELL_WIDTH: usize = 60;

/// Output format for results
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml
}

/// Output options
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format:  OutputFormat,
    pub colored: bool,
    pub verbose: bool
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format:  OutputFormat::Text,
            colored: true,
            verbose: false
        }
    }
}

/// Format a question's outcome based on output options
pub fn format_query_result(result: &QueryResult, opts: &OutputOptions) -> String {
    match opts.format {
        OutputFormat::Json => serde_json::to_string_pretty(result).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(result).unwrap_or_default(),
        OutputFormat::Text => format_text_result(result, opts)
    }
}

/// Prompts that would be sent to the model, for dry runs
pub fn format_prompts(request: &CompletionRequest, opts: &OutputOptions) -> String {
    let mut output = String::new();
    let headers = ["=== System prompt ===", "=== User prompt ==="];
    let bodies = [&request.system_prompt, &request.user_prompt];
    for (header, body) in headers.iter().zip(bodies) {
        push_styled(&mut output, header, opts, |s| s.bold().to_string());
        output.push('\n');
        output.push_str(body);
        output.push_str("\n\n");
    }
    output.push_str(&format!("Temperature: {}\n", request.temperature));
    output
}

fn format_text_result(result: &QueryResult, opts: &OutputOptions) -> String {
    let mut output = String::new();
    if opts.verbose {
        output.push_str(&format_attempts(result.attempts(), opts));
    }
    match result {
        QueryResult::Success {
            sql,
            rows,
            row_count,
            bytes_processed,
            ..
        } => {
            push_styled(&mut output, "Executed query:", opts, |s| s.cyan().bold().to_string());
            output.push('\n');
            output.push_str(sql);
            output.push_str("\n\n");
            if rows.is_empty() {
                push_styled(
                    &mut output,
                    "Query executed successfully, but returned no rows.",
                    opts,
                    |s| s.yellow().to_string()
                );
                output.push('\n');
            } else {
                let summary = format!(
                    "Query executed successfully. Returned {} rows. Processed {} bytes.",
                    row_count, bytes_processed
                );
                push_styled(&mut output, &summary, opts, |s| s.green().to_string());
                output.push_str("\n\n");
                output.push_str(&format_rows_table(rows));
            }
        }
        QueryResult::Error {
            stage,
            message,
            last_sql,
            ..
        } => {
            let header = format!("Failed at {} stage:", stage);
            push_styled(&mut output, &header, opts, |s| s.red().bold().to_string());
            output.push(' ');
            output.push_str(message);
            output.push('\n');
            if let Some(sql) = last_sql {
                output.push_str("\nLast generated SQL:\n");
                output.push_str(sql);
                output.push('\n');
            }
        }
    }
    output
}

fn format_attempts(attempts: &[AttemptRecord], opts: &OutputOptions) -> String {
    let mut output = String::new();
    for record in attempts {
        let verdict = if record.validation.is_valid {
            if opts.colored { "valid".green().to_string() } else { "valid".to_string() }
        } else if opts.colored {
            "invalid".red().to_string()
        } else {
            "invalid".to_string()
        };
        output.push_str(&format!("Attempt #{} ({}):\n", record.attempt + 1, verdict));
        output.push_str(&format!("{}\n", record.sql));
        if !record.validation.is_valid {
            output.push_str(&format!("  {}\n", record.validation.error_message));
        }
        output.push('\n');
    }
    output
}

/// Render rows as an aligned plain-text table.
///
/// Columns appear in first-seen order across all rows; missing values render
/// as empty cells.
pub fn format_rows_table(rows: &[Row]) -> String {
    let columns: IndexSet<&str> = rows
        .iter()
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();
    if columns.is_empty() {
        return String::new();
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|col| row.get(*col).map(format_cell).unwrap_or_default())
                .collect()
        })
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(col.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut table = String::new();
    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(col, w)| format!("{:<w$}", col, w = *w))
        .collect();
    table.push_str(header.join(" | ").trim_end());
    table.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    table.push_str(&rule.join("-+-"));
    table.push('\n');
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = *w))
            .collect();
        table.push_str(line.join(" | ").trim_end());
        table.push('\n');
    }
    table
}

fn format_cell(value: &Value) -> String {
    let text = match value {
        Value::Null => String::from("NULL"),
        Value::String(s) => s.clone(),
        other => other.to_string()
    };
    if text.chars().count() > MAX_CELL_WIDTH {
        let head: String = text.chars().take(MAX_CELL_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        text
    }
}

fn push_styled<F>(output: &mut String, text: &str, opts: &OutputOptions, style: F)
where
    F: Fn(&str) -> String
{
    if opts.colored {
        output.push_str(&style(text));
    } else {
        output.push_str(text);
    }
}
