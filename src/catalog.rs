//! Schema catalog.
//!
//! Fetches a dataset's schema through the [`Warehouse`] and keeps it in the
//! shared [`SchemaCache`] so repeated sessions do not re-run the metadata
//! query until the TTL runs out.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    cache::{CacheKey, CachedSchema, SchemaCache},
    error::SchemaFetchError,
    schema::Schema,
    warehouse::{DatasetRef, Warehouse}
};

pub struct SchemaCatalog {
    warehouse: Arc<dyn Warehouse>,
    dataset:   DatasetRef,
    cache:     Arc<SchemaCache>
}

impl SchemaCatalog {
    pub fn new(warehouse: Arc<dyn Warehouse>, dataset: DatasetRef, cache: Arc<SchemaCache>) -> Self {
        Self {
            warehouse,
            dataset,
            cache
        }
    }

    pub fn dataset(&self) -> &DatasetRef {
        &self.dataset
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            connection: self.warehouse.connection_id(),
            project:    self.dataset.project.clone(),
            dataset:    self.dataset.dataset.clone()
        }
    }

    /// Query warehouse metadata, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Fails when the metadata call fails or returns no rows: an empty schema
    /// leaves nothing to generate against.
    pub async fn fetch_schema(&self) -> Result<Schema, SchemaFetchError> {
        info!(dataset = %self.dataset, "Fetching warehouse schema");
        let rows = self
            .warehouse
            .fetch_metadata(&self.dataset)
            .await
            .map_err(|source| SchemaFetchError::Metadata {
                dataset: self.dataset.dataset.clone(),
                source
            })?;
        let schema = Schema::from_rows(rows);
        if schema.is_empty() {
            return Err(SchemaFetchError::Empty {
                project: self.dataset.project.clone(),
                dataset: self.dataset.dataset.clone()
            });
        }
        debug!(tables = schema.tables.len(), "Schema fetched");
        Ok(schema)
    }

    /// Cached schema, fetching on miss or expiry
    pub async fn load(&self) -> Result<Arc<CachedSchema>, SchemaFetchError> {
        let key = self.cache_key();
        if let Some(cached) = self.cache.get(&key) {
            debug!(dataset = %self.dataset, "Schema cache hit");
            return Ok(cached);
        }
        let schema = self.fetch_schema().await?;
        Ok(self.cache.insert(key, schema))
    }

    /// Prompt-ready schema text
    pub async fn schema_text(&self) -> Result<String, SchemaFetchError> {
        Ok(self.load().await?.text.clone())
    }

    /// Table names in schema order
    pub async fn list_tables(&self) -> Result<Vec<String>, SchemaFetchError> {
        Ok(self.load().await?.schema.list_tables())
    }
}
