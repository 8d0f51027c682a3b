// SPDX-FileCopyrightText: 2025 RAprogramm
// SPDX-License-Identifier: MIT

use std::{sync::Arc, thread, time::Duration};

use sql_query_agent::{
    cache::{CacheKey, DEFAULT_SCHEMA_TTL, SchemaCache},
    schema::Schema,
    warehouse::MetadataRow
};

fn key(dataset: &str) -> CacheKey {
    CacheKey {
        connection: String::from("conn"),
        project:    String::from("proj"),
        dataset:    dataset.to_string()
    }
}

fn schema(table: &str) -> Schema {
    Schema::from_rows(vec![MetadataRow::new(table, "id", "INT64", false)])
}

#[test]
fn test_default_ttl_is_one_hour() {
    let cache = SchemaCache::default();
    assert_eq!(cache.ttl(), DEFAULT_SCHEMA_TTL);
    assert_eq!(DEFAULT_SCHEMA_TTL, Duration::from_secs(3600));
    assert!(cache.is_empty());
}

#[test]
fn test_insert_renders_text() {
    let cache = SchemaCache::default();
    let stored = cache.insert(key("ds"), schema("orders"));
    assert!(stored.text.contains("Table: orders"));
    assert_eq!(stored.text, stored.schema.to_summary());
}

#[test]
fn test_get_hit_and_miss() {
    let cache = SchemaCache::default();
    cache.insert(key("ds"), schema("orders"));
    assert!(cache.get(&key("ds")).is_some());
    assert!(cache.get(&key("other")).is_none());
}

#[test]
fn test_keys_include_connection() {
    let cache = SchemaCache::default();
    cache.insert(key("ds"), schema("orders"));
    let other_connection = CacheKey {
        connection: String::from("elsewhere"),
        ..key("ds")
    };
    assert!(cache.get(&other_connection).is_none());
}

#[test]
fn test_entry_expires() {
    let cache = SchemaCache::new(Duration::from_millis(20));
    cache.insert(key("ds"), schema("orders"));
    assert!(cache.get(&key("ds")).is_some());
    thread::sleep(Duration::from_millis(40));
    assert!(cache.get(&key("ds")).is_none());
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_last_writer_wins() {
    let cache = SchemaCache::default();
    cache.insert(key("ds"), schema("old"));
    cache.insert(key("ds"), schema("new"));
    let cached = cache.get(&key("ds")).unwrap();
    assert!(cached.schema.contains_table("new"));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_invalidate() {
    let cache = SchemaCache::default();
    cache.insert(key("ds"), schema("orders"));
    cache.invalidate(&key("ds"));
    assert!(cache.get(&key("ds")).is_none());
    assert!(cache.is_empty());
}

#[test]
fn test_concurrent_readers_and_writers() {
    let cache = Arc::new(SchemaCache::default());
    cache.insert(key("ds"), schema("orders"));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                if i % 2 == 0 {
                    cache.insert(key("ds"), schema("orders"));
                }
                cache.get(&key("ds")).is_some()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
}
