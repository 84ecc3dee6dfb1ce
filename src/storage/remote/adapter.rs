use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::catalog;
use crate::error::{Result, StorageError};
use crate::storage::traits::StorageAdapter;
use crate::types::{Backend, Record};

use super::codec::{FieldCodec, Row};
use super::retry::{with_retry, RetryLog, RetryPolicy};
use super::transport::{RestError, RestTransport, SelectQuery};

/// What `update` does when the identity is missing remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Fail with `NotFound`, same as the local backend.
    #[default]
    Strict,
    /// Insert the record under its identity instead.
    UpsertMissing,
}

/// [`StorageAdapter`] over a PostgREST table.
pub struct RemoteAdapter {
    codec: FieldCodec,
    transport: Arc<dyn RestTransport>,
    retry: RetryPolicy,
    update_mode: UpdateMode,
    last_retry_log: Mutex<RetryLog>,
}

impl RemoteAdapter {
    pub fn new(collection: &str, transport: Arc<dyn RestTransport>) -> Result<Self> {
        Ok(Self {
            codec: FieldCodec::for_collection(collection)?,
            transport,
            retry: RetryPolicy::default(),
            update_mode: UpdateMode::default(),
            last_retry_log: Mutex::new(RetryLog::default()),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_update_mode(mut self, mode: UpdateMode) -> Self {
        self.update_mode = mode;
        self
    }

    pub fn codec(&self) -> &FieldCodec {
        &self.codec
    }

    pub fn table(&self) -> &str {
        self.codec.table()
    }

    /// Attempt trail of the most recent retried call (`update` / `upsert`).
    pub fn last_retry_log(&self) -> RetryLog {
        self.last_retry_log.lock().clone()
    }

    /// Reachability of the remote endpoint.
    pub async fn ping(&self) -> Result<()> {
        self.transport
            .ping()
            .await
            .map_err(|e| StorageError::NetworkUnavailable(e.message))
    }

    /// Delete every row of the table.
    pub async fn clear(&self) -> Result<()> {
        self.transport
            .delete_all(self.table(), self.codec.primary_key())
            .await
            .map_err(|e| self.classify(e))?;
        tracing::info!(table = self.table(), "Cleared remote table");
        Ok(())
    }

    /// Drop the table and create it again from the catalog DDL.
    pub async fn recreate(&self) -> Result<()> {
        let spec = catalog::find(self.collection()).ok_or_else(|| {
            StorageError::InvalidConfig(format!(
                "no table definition for collection \"{}\"",
                self.collection()
            ))
        })?;
        for sql in [spec.drop_table_sql(), spec.create_table_sql()] {
            self.transport
                .execute_sql(&sql)
                .await
                .map_err(|e| self.classify(e))?;
        }
        tracing::warn!(table = self.table(), "Dropped and recreated remote table");
        Ok(())
    }

    fn classify(&self, err: RestError) -> StorageError {
        err.classify(self.table())
    }

    fn decode(&self, rows: Vec<Row>) -> Result<Vec<Record>> {
        rows.into_iter()
            .map(|row| self.codec.from_remote(row))
            .collect()
    }

    fn first(&self, rows: Vec<Row>, operation: &str) -> Result<Record> {
        match rows.into_iter().next() {
            Some(row) => self.codec.from_remote(row),
            None => Err(StorageError::Remote {
                status: None,
                message: format!("{operation} on \"{}\" returned no rows", self.table()),
            }),
        }
    }

    async fn find_row(&self, id: i64) -> Result<Option<Row>> {
        let query = SelectQuery::by_key(self.codec.primary_key(), id);
        let rows = self
            .transport
            .select(self.table(), &query)
            .await
            .map_err(|e| self.classify(e))?;
        Ok(rows.into_iter().next())
    }

    async fn insert_rows(&self, rows: Vec<Row>) -> Result<Vec<Row>> {
        self.transport
            .insert(self.table(), rows)
            .await
            .map_err(|e| self.classify(e))
    }

    /// One attempt of update-or-insert for an identified row.
    async fn write_identified(&self, id: i64, row: Row, insert_missing: bool) -> Result<Record> {
        self.ping().await?;
        if self.find_row(id).await?.is_none() {
            if !insert_missing {
                return Err(StorageError::NotFound {
                    collection: self.collection().to_string(),
                    id,
                });
            }
            let inserted = self.insert_rows(vec![row]).await?;
            return self.first(inserted, "insert");
        }

        let updated = self
            .transport
            .update(self.table(), self.codec.primary_key(), id, row)
            .await
            .map_err(|e| self.classify(e))?;
        match updated.into_iter().next() {
            Some(row) => self.codec.from_remote(row),
            // Deleted between the probe and the patch.
            None => Err(StorageError::NotFound {
                collection: self.collection().to_string(),
                id,
            }),
        }
    }

    async fn retried_write(
        &self,
        operation: &'static str,
        record: Record,
        insert_missing: bool,
    ) -> Result<Record> {
        let id = record.require_id(self.collection(), operation)?;
        // Translation problems are permanent; surface them before any I/O.
        let row = self.codec.to_remote(&record)?;

        let label = format!("{operation} {}/{id}", self.table());
        let (result, log) = with_retry(&label, &self.retry, |_| {
            let row = row.clone();
            async move { self.write_identified(id, row, insert_missing).await }
        })
        .await;
        *self.last_retry_log.lock() = log;
        result
    }
}

#[async_trait]
impl StorageAdapter for RemoteAdapter {
    fn collection(&self) -> &str {
        self.codec.collection()
    }

    fn backend(&self) -> Backend {
        Backend::Remote
    }

    async fn exists(&self) -> Result<bool> {
        match self.transport.select(self.table(), &SelectQuery::probe()).await {
            Ok(_) => Ok(true),
            Err(e) => match self.classify(e) {
                StorageError::TableNotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn get_all(&self) -> Result<Vec<Record>> {
        let query = SelectQuery::all_ordered(self.codec.primary_key());
        let rows = self
            .transport
            .select(self.table(), &query)
            .await
            .map_err(|e| self.classify(e))?;
        self.decode(rows)
    }

    async fn get(&self, id: i64) -> Result<Option<Record>> {
        self.find_row(id)
            .await?
            .map(|row| self.codec.from_remote(row))
            .transpose()
    }

    async fn create(&self, record: Record) -> Result<Record> {
        let row = self.codec.to_remote(&record.without_id())?;
        let inserted = self.insert_rows(vec![row]).await?;
        self.first(inserted, "insert")
    }

    async fn update(&self, record: Record) -> Result<Record> {
        let insert_missing = self.update_mode == UpdateMode::UpsertMissing;
        self.retried_write("update", record, insert_missing).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        self.transport
            .delete(self.table(), self.codec.primary_key(), id)
            .await
            .map_err(|e| self.classify(e))?;
        Ok(true)
    }

    async fn bulk_create(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let rows = records
            .into_iter()
            .map(|r| self.codec.to_remote(&r.without_id()))
            .collect::<Result<Vec<_>>>()?;
        let inserted = self.insert_rows(rows).await?;
        self.decode(inserted)
    }

    async fn upsert(&self, record: Record) -> Result<Record> {
        match record.id {
            Some(_) => self.retried_write("upsert", record, true).await,
            None => self.create(record).await,
        }
    }
}
