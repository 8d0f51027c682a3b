use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::{Duration, Instant}
};

use crate::schema::Schema;

/// Default schema time-to-live (one hour)
pub const DEFAULT_SCHEMA_TTL: Duration = Duration::from_secs(3600);

/// Identity of a cached schema: which connection and which dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub connection: String,
    pub project:    String,
    pub dataset:    String
}

/// A fetched schema together with its rendered prompt text.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSchema {
    pub schema: Schema,
    pub text:   String
}

struct Entry {
    value:     Arc<CachedSchema>,
    stored_at: Instant
}

/// Time-bounded schema cache shared by all sessions.
///
/// Reads take a shared lock. A refresh after expiry is a plain insert, so two
/// sessions refreshing at once both fetch and the last write wins.
pub struct SchemaCache {
    entries: RwLock<HashMap<CacheKey, Entry>>,
    ttl:     Duration
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA_TTL)
    }
}

impl SchemaCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for `key`, or None when missing or expired
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CachedSchema>> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;
        if entry.stored_at.elapsed() >= self.ttl {
            return None;
        }
        Some(Arc::clone(&entry.value))
    }

    /// Store a schema, rendering its text once
    pub fn insert(&self, key: CacheKey, schema: Schema) -> Arc<CachedSchema> {
        let text = schema.to_summary();
        let value = Arc::new(CachedSchema {
            schema,
            text
        });
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                key,
                Entry {
                    value:     Arc::clone(&value),
                    stored_at: Instant::now()
                }
            );
        }
        value
    }

    pub fn invalidate(&self, key: &CacheKey) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
