//! Question-answering session.
//!
//! A [`Session`] is what a front end holds: it is started once (fetching the
//! schema, which must succeed) and then answers independent questions with
//! [`Session::ask`]. Nothing carries over from one question to the next
//! except the cached schema.

use std::sync::Arc;

use tracing::warn;

use crate::{
    cache::SchemaCache,
    catalog::SchemaCatalog,
    config::SessionSettings,
    error::SchemaFetchError,
    generator::QueryGenerator,
    llm::LlmBackend,
    orchestrator::{QueryOrchestrator, QueryResult},
    validator::TableValidator,
    warehouse::Warehouse
};

pub struct Session {
    catalog:      SchemaCatalog,
    orchestrator: QueryOrchestrator,
    /// Schema text seen at start, used if a later refresh fails
    snapshot:     String
}

impl Session {
    /// Start a session.
    ///
    /// # Errors
    ///
    /// Fails when the schema cannot be fetched or is empty; no question can
    /// be answered without it.
    pub async fn start(
        settings: &SessionSettings,
        backend: Arc<dyn LlmBackend>,
        warehouse: Arc<dyn Warehouse>,
        cache: Arc<SchemaCache>
    ) -> Result<Self, SchemaFetchError> {
        let catalog = SchemaCatalog::new(Arc::clone(&warehouse), settings.dataset.clone(), cache);
        let snapshot = catalog.schema_text().await?;
        let generator = QueryGenerator::new(backend, settings.dataset.clone(), settings.temperature);
        let validator = TableValidator::new(settings.dataset.clone());
        let orchestrator =
            QueryOrchestrator::new(generator, validator, warehouse, settings.max_regenerations);
        Ok(Self {
            catalog,
            orchestrator,
            snapshot
        })
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn orchestrator(&self) -> &QueryOrchestrator {
        &self.orchestrator
    }

    /// Current schema text, refreshed through the cache when expired
    pub async fn schema_text(&self) -> String {
        match self.catalog.schema_text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Schema refresh failed, using the schema from session start");
                self.snapshot.clone()
            }
        }
    }

    /// Answer one question
    pub async fn ask(&self, question: &str) -> QueryResult {
        let schema_text = self.schema_text().await;
        self.orchestrator.run(question, &schema_text).await
    }
}
