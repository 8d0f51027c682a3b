//! BigQuery over its REST API.
//!
//! Queries go through `jobs.query` and, while the job is still running,
//! `jobs.getQueryResults`. Results arrive as `{"f": [{"v": ...}]}` cells that
//! are decoded against the response schema into JSON values. Credentials are
//! a ready-made OAuth access token; obtaining one is left to the caller
//! (`gcloud auth print-access-token` works).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{DatasetRef, ExecutionOutput, MetadataRow, Row, Warehouse};
use crate::{
    config::WarehouseConfig,
    error::{AppResult, WarehouseError, config_error, format_job_error, warehouse_http_error}
};

/// Result polls before a still-running job is reported as timed out
const MAX_RESULT_POLLS: u32 = 20;

pub struct BigQueryClient {
    client:       reqwest::Client,
    base_url:     String,
    project:      String,
    access_token: Option<String>,
    location:     Option<String>,
    timeout_ms:   u64
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query:           &'a str,
    use_legacy_sql:  bool,
    use_query_cache: bool,
    timeout_ms:      u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    location:        Option<&'a str>
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete:          bool,
    job_reference:         Option<JobReference>,
    schema:                Option<TableSchema>,
    #[serde(default)]
    rows:                  Vec<TableRow>,
    total_rows:            Option<String>,
    total_bytes_processed: Option<String>,
    page_token:            Option<String>,
    #[serde(default)]
    errors:                Vec<ErrorProto>
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id:   String,
    location: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>
}

#[derive(Debug, Clone, Deserialize)]
struct FieldSchema {
    name:   String,
    #[serde(rename = "type")]
    kind:   String,
    mode:   Option<String>,
    #[serde(default)]
    fields: Vec<FieldSchema>
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<Cell>
}

#[derive(Debug, Deserialize)]
struct Cell {
    #[serde(default)]
    v: Value
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    message: String
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorProto
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableList {
    #[serde(default)]
    tables:          Vec<TableListEntry>,
    next_page_token: Option<String>
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableListEntry {
    table_reference: TableReference
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableReference {
    table_id: String
}

impl BigQueryClient {
    /// Build a client for the configured project.
    ///
    /// # Errors
    ///
    /// Returns a config error when no project is set.
    pub fn from_config(config: &WarehouseConfig) -> AppResult<Self> {
        let project = config
            .project_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| config_error("PROJECT_ID must be set (env or [warehouse] project_id)"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.query_timeout_ms) + Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
            access_token: config.access_token.clone().filter(|t| !t.trim().is_empty()),
            location: config.location.clone(),
            timeout_ms: config.query_timeout_ms
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder
        }
    }

    async fn send<T>(&self, builder: reqwest::RequestBuilder) -> Result<T, WarehouseError>
    where
        T: for<'de> Deserialize<'de>
    {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(warehouse_http_error)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(WarehouseError::Api {
                status:  status.as_u16(),
                message: format_job_error(&message)
            });
        }
        response
            .json()
            .await
            .map_err(|e| WarehouseError::Decode(e.to_string()))
    }

    /// Run `sql` to completion and collect every result page.
    async fn run_query(&self, sql: &str) -> Result<ExecutionOutput, WarehouseError> {
        let url = format!("{}/projects/{}/queries", self.base_url, self.project);
        let body = QueryRequest {
            query:           sql,
            use_legacy_sql:  false,
            use_query_cache: true,
            timeout_ms:      self.timeout_ms,
            location:        self.location.as_deref()
        };
        let mut response: QueryResponse = self.send(self.client.post(&url).json(&body)).await?;
        check_job_errors(&response)?;

        let mut bytes_processed = parse_count(response.total_bytes_processed.as_deref());
        let mut schema = response.schema.clone();
        let mut rows = Vec::new();
        let mut polls = 0;

        loop {
            if response.job_complete {
                if schema.is_none() {
                    schema = response.schema.clone();
                }
                let fields = schema.as_ref().map(|s| s.fields.as_slice()).unwrap_or_default();
                rows.extend(response.rows.iter().map(|row| decode_row(fields, row)));
                if response.page_token.is_none() {
                    break;
                }
            } else {
                polls += 1;
                if polls > MAX_RESULT_POLLS {
                    return Err(WarehouseError::JobFailed(String::from(
                        "Query did not complete in time"
                    )));
                }
                debug!(polls, "Query job still running");
            }
            response = self.fetch_results(&response).await?;
            check_job_errors(&response)?;
            bytes_processed =
                bytes_processed.max(parse_count(response.total_bytes_processed.as_deref()));
        }

        let row_count = parse_count(response.total_rows.as_deref()).max(rows.len() as u64);
        Ok(ExecutionOutput {
            row_count,
            bytes_processed,
            rows
        })
    }

    async fn fetch_results(&self, previous: &QueryResponse) -> Result<QueryResponse, WarehouseError> {
        let job = previous
            .job_reference
            .as_ref()
            .ok_or_else(|| WarehouseError::Decode(String::from("Response has no job reference")))?;
        let url = format!(
            "{}/projects/{}/queries/{}",
            self.base_url, self.project, job.job_id
        );
        let mut query: Vec<(&str, String)> = vec![("timeoutMs", self.timeout_ms.to_string())];
        if let Some(location) = job.location.as_ref().or(self.location.as_ref()) {
            query.push(("location", location.clone()));
        }
        if previous.job_complete
            && let Some(token) = &previous.page_token
        {
            query.push(("pageToken", token.clone()));
        }
        self.send(self.client.get(&url).query(&query)).await
    }
}

#[async_trait]
impl Warehouse for BigQueryClient {
    fn connection_id(&self) -> String {
        format!("{}/{}", self.base_url, self.project)
    }

    async fn fetch_metadata(&self, dataset: &DatasetRef) -> Result<Vec<MetadataRow>, WarehouseError> {
        let sql = format!(
            "SELECT table_name, column_name, data_type, is_nullable \
             FROM `{}.{}.INFORMATION_SCHEMA.COLUMNS` \
             ORDER BY table_name, ordinal_position",
            dataset.project, dataset.dataset
        );
        let output = self.run_query(&sql).await?;
        output
            .rows
            .into_iter()
            .map(|row| {
                serde_json::from_value(Value::Object(row))
                    .map_err(|e| WarehouseError::Decode(format!("metadata row: {}", e)))
            })
            .collect()
    }

    async fn list_tables(&self, dataset: &DatasetRef) -> Result<Vec<String>, WarehouseError> {
        let url = format!(
            "{}/projects/{}/datasets/{}/tables",
            self.base_url, dataset.project, dataset.dataset
        );
        let mut tables = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.client.get(&url);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: TableList = self.send(request).await?;
            tables.extend(page.tables.into_iter().map(|t| t.table_reference.table_id));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break
            }
        }
        Ok(tables)
    }

    async fn execute(&self, sql: &str) -> Result<ExecutionOutput, WarehouseError> {
        self.run_query(sql).await.inspect_err(|e| {
            warn!(error = %e, "BigQuery query failed");
        })
    }
}

fn check_job_errors(response: &QueryResponse) -> Result<(), WarehouseError> {
    match response.errors.first() {
        Some(err) => Err(WarehouseError::JobFailed(format_job_error(&err.message))),
        None => Ok(())
    }
}

fn parse_count(value: Option<&str>) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn decode_row(fields: &[FieldSchema], row: &TableRow) -> Row {
    let mut map = Map::new();
    for (i, cell) in row.f.iter().enumerate() {
        match fields.get(i) {
            Some(field) => {
                map.insert(field.name.clone(), decode_field(field, &cell.v));
            }
            None => {
                map.insert(format!("f{}", i), cell.v.clone());
            }
        }
    }
    map
}

fn decode_field(field: &FieldSchema, value: &Value) -> Value {
    if field.mode.as_deref() == Some("REPEATED") {
        return match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| decode_scalar(field, item.get("v").unwrap_or(&Value::Null)))
                    .collect()
            ),
            _ => Value::Array(Vec::new())
        };
    }
    decode_scalar(field, value)
}

fn decode_scalar(field: &FieldSchema, value: &Value) -> Value {
    match (field.kind.as_str(), value) {
        (_, Value::Null) => Value::Null,
        ("INTEGER" | "INT64", Value::String(s)) => {
            s.parse::<i64>().map(Value::from).unwrap_or_else(|_| value.clone())
        }
        ("FLOAT" | "FLOAT64", Value::String(s)) => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        ("BOOLEAN" | "BOOL", Value::String(s)) => Value::Bool(s.eq_ignore_ascii_case("true")),
        ("RECORD" | "STRUCT", Value::Object(_)) => {
            let nested = TableRow {
                f: value
                    .get("f")
                    .and_then(Value::as_array)
                    .map(|cells| {
                        cells
                            .iter()
                            .map(|c| Cell {
                                v: c.get("v").cloned().unwrap_or(Value::Null)
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            };
            Value::Object(decode_row(&field.fields, &nested))
        }
        _ => value.clone()
    }
}
