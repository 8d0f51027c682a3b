// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

//! In-memory LLM and warehouse doubles shared by the integration tests.

#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering}
    }
};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use sql_query_agent::{
    error::{GenerationError, WarehouseError},
    llm::{CompletionRequest, LlmBackend},
    warehouse::{DatasetRef, ExecutionOutput, MetadataRow, Warehouse}
};

pub fn dataset() -> DatasetRef {
    DatasetRef::new("proj", "ds")
}

pub fn orders_metadata() -> Vec<MetadataRow> {
    vec![
        MetadataRow::new("orders", "id", "INT64", false),
        MetadataRow::new("orders", "total", "FLOAT64", true)
    ]
}

/// Answers with a `{"query": ...}` object
pub fn query_json(sql: &str) -> Result<String, GenerationError> {
    Ok(json!({ "query": sql }).to_string())
}

/// Backend that replays scripted responses and records every request.
///
/// When the script runs out the last response is repeated.
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    last:      Mutex<Option<Result<String, GenerationError>>>,
    requests:  Mutex<Vec<CompletionRequest>>
}

impl ScriptedBackend {
    pub fn new(responses: Vec<Result<String, GenerationError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            last:      Mutex::new(None),
            requests:  Mutex::new(Vec::new())
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.responses.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(response) => {
                *last = Some(response.clone());
                response
            }
            None => last.clone().unwrap_or_else(|| {
                Err(GenerationError::Backend {
                    message:   String::from("no scripted response"),
                    transient: false
                })
            })
        }
    }
}

/// Warehouse with fixed metadata, table list and execution result.
pub struct FakeWarehouse {
    pub metadata:       Mutex<Result<Vec<MetadataRow>, WarehouseError>>,
    pub tables:         Result<Vec<String>, WarehouseError>,
    pub execution:      Result<ExecutionOutput, WarehouseError>,
    pub metadata_calls: AtomicUsize,
    pub list_calls:     AtomicUsize,
    pub executed:       Mutex<Vec<String>>
}

impl FakeWarehouse {
    pub fn new(metadata: Vec<MetadataRow>) -> Self {
        Self {
            metadata:       Mutex::new(Ok(metadata)),
            tables:         Ok(vec![String::from("orders")]),
            execution:      Ok(single_row_output()),
            metadata_calls: AtomicUsize::new(0),
            list_calls:     AtomicUsize::new(0),
            executed:       Mutex::new(Vec::new())
        }
    }

    pub fn with_execution(mut self, execution: Result<ExecutionOutput, WarehouseError>) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_tables(mut self, tables: Result<Vec<String>, WarehouseError>) -> Self {
        self.tables = tables;
        self
    }

    pub fn set_metadata(&self, metadata: Result<Vec<MetadataRow>, WarehouseError>) {
        *self.metadata.lock().unwrap() = metadata;
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Warehouse for FakeWarehouse {
    fn connection_id(&self) -> String {
        String::from("fake://warehouse")
    }

    async fn fetch_metadata(&self, _dataset: &DatasetRef) -> Result<Vec<MetadataRow>, WarehouseError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.metadata.lock().unwrap().clone()
    }

    async fn list_tables(&self, _dataset: &DatasetRef) -> Result<Vec<String>, WarehouseError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.tables.clone()
    }

    async fn execute(&self, sql: &str) -> Result<ExecutionOutput, WarehouseError> {
        self.executed.lock().unwrap().push(sql.to_string());
        self.execution.clone()
    }
}

pub fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn single_row_output() -> ExecutionOutput {
    ExecutionOutput {
        row_count:       1,
        bytes_processed: 2048,
        rows:            vec![row(&[("f0_", json!(1000))])]
    }
}
