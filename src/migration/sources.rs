//! Where a collection's local data can come from.
//!
//! Readers are tried in order and the first one that yields records wins.
//! `Ok(None)` means the source does not exist at all, which the engine
//! reports differently from an existing but empty source.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::catalog::{self, LegacySource};
use crate::error::{Result, StorageError};
use crate::storage::local::run_blocking;
use crate::storage::{AdapterFactory, LocalStore, StorageAdapter};
use crate::types::Record;

#[async_trait]
pub trait SourceReader: Send + Sync {
    fn label(&self) -> &str;

    async fn read(&self) -> Result<Option<Vec<Record>>>;
}

/// The collection's table in the local document store.
pub struct PrimaryStoreReader {
    adapter: Arc<dyn StorageAdapter>,
}

impl PrimaryStoreReader {
    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl SourceReader for PrimaryStoreReader {
    fn label(&self) -> &str {
        "local store"
    }

    async fn read(&self) -> Result<Option<Vec<Record>>> {
        if !self.adapter.exists().await? {
            return Ok(None);
        }
        Ok(Some(self.adapter.get_all().await?))
    }
}

/// A JSON array under a flat key-value key, written by older installs.
pub struct LegacyKvReader {
    store: Arc<LocalStore>,
    source: LegacySource,
}

impl LegacyKvReader {
    pub fn new(store: Arc<LocalStore>, source: LegacySource) -> Self {
        Self { store, source }
    }

    fn is_placeholder(&self, record: &Record) -> bool {
        record
            .name()
            .is_some_and(|name| self.source.placeholders.contains(&name))
    }
}

#[async_trait]
impl SourceReader for LegacyKvReader {
    fn label(&self) -> &str {
        "legacy key-value store"
    }

    async fn read(&self) -> Result<Option<Vec<Record>>> {
        let store = Arc::clone(&self.store);
        let key = self.source.key;
        let Some(raw) = run_blocking(move || store.kv_get(key)).await? else {
            return Ok(None);
        };
        let items = match serde_json::from_str::<Value>(&raw)? {
            Value::Array(items) => items,
            _ => {
                return Err(StorageError::StorageUnavailable {
                    message: format!("legacy entry \"{}\" is not a JSON array", self.source.key),
                    source: None,
                })
            }
        };

        let mut records = Vec::with_capacity(items.len());
        let mut dropped = 0usize;
        for item in items {
            let record = Record::from_value(item)?;
            if self.is_placeholder(&record) {
                dropped += 1;
                continue;
            }
            records.push(record);
        }
        if dropped > 0 {
            tracing::debug!(key = self.source.key, dropped, "Dropped placeholder entries");
        }
        Ok(Some(records))
    }
}

/// Ordered readers for `collection`: legacy first where one exists.
pub fn readers_for(factory: &AdapterFactory, collection: &str) -> Vec<Box<dyn SourceReader>> {
    let mut readers: Vec<Box<dyn SourceReader>> = Vec::with_capacity(2);
    if let Some(source) = catalog::find(collection).and_then(|spec| spec.legacy) {
        readers.push(Box::new(LegacyKvReader::new(
            Arc::clone(factory.local_store()),
            source,
        )));
    }
    readers.push(Box::new(PrimaryStoreReader::new(
        factory.local_adapter(collection),
    )));
    readers
}

/// What the readers found for one collection.
#[derive(Debug, Default)]
pub struct SourceData {
    /// Label of the reader that supplied `records`.
    pub source: Option<String>,
    pub records: Vec<Record>,
    /// Whether any reader found its source at all.
    pub found: bool,
}

/// Walk `readers` in order; the first non-empty result wins.
pub async fn read_first_non_empty(readers: &[Box<dyn SourceReader>]) -> Result<SourceData> {
    let mut data = SourceData::default();
    for reader in readers {
        match reader.read().await? {
            Some(records) if !records.is_empty() => {
                return Ok(SourceData {
                    source: Some(reader.label().to_string()),
                    records,
                    found: true,
                });
            }
            Some(_) => data.found = true,
            None => {}
        }
    }
    Ok(data)
}
