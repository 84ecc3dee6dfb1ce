//! The storage adapter contract shared by every backend.
//!
//! Callers hold an `Arc<dyn StorageAdapter>` and stay oblivious to which
//! backend answers. Batched and upsert operations have correct (non-atomic)
//! default implementations built from the single-record calls; backends that
//! can do better override them.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Backend, Record};

#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Logical collection name as used by callers.
    fn collection(&self) -> &str;

    /// Backend that answers this adapter's calls.
    fn backend(&self) -> Backend;

    /// Whether the physical collection (local table / remote table) exists.
    async fn exists(&self) -> Result<bool>;

    /// Every record, ordered by identity ascending. Empty collections yield
    /// an empty vec, never an error.
    async fn get_all(&self) -> Result<Vec<Record>>;

    /// The record with identity `id`, or `None`.
    async fn get(&self, id: i64) -> Result<Option<Record>>;

    /// Insert `record`. Any caller-supplied identity is discarded; the
    /// returned record carries the backend-assigned one.
    async fn create(&self, record: Record) -> Result<Record>;

    /// Replace an existing record. Fails with `NotFound` when the identity
    /// does not exist.
    async fn update(&self, record: Record) -> Result<Record>;

    /// Remove the record; returns whether something was removed.
    async fn delete(&self, id: i64) -> Result<bool>;

    async fn bulk_create(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        let mut created = Vec::with_capacity(records.len());
        for record in records {
            created.push(self.create(record).await?);
        }
        Ok(created)
    }

    async fn bulk_update(&self, updates: Vec<(i64, Record)>) -> Result<Vec<Record>> {
        let mut updated = Vec::with_capacity(updates.len());
        for (id, record) in updates {
            updated.push(self.update(record.with_id(id)).await?);
        }
        Ok(updated)
    }

    /// Insert-or-update by identity. Costs at least one extra round-trip to
    /// probe existence; records without identity are always inserted.
    async fn upsert(&self, record: Record) -> Result<Record> {
        match record.id {
            Some(id) if self.get(id).await?.is_some() => self.update(record).await,
            _ => self.create(record).await,
        }
    }
}
