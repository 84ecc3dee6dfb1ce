//! Local backend: an embedded SQLite document store.
//!
//! Each logical collection lives in its own table (`doc_<collection>`) with
//! an auto-increment integer key and a JSON document column. Tables are
//! created lazily on first write; reads against a collection that was never
//! written return empty results. A separate `kv` table provides flat
//! key-value storage (backend selection, legacy collection blobs).
//!
//! Every operation runs inside its own transaction. The transaction is
//! committed on success and rolled back when dropped on any error path.
//! [`LocalStore`] is synchronous; [`LocalAdapter`] moves each call onto the
//! blocking pool so SQLite never stalls a runtime worker.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, OptionalExtension, Transaction};
use serde_json::{Map, Value};

use crate::error::{Result, StorageError};
use crate::types::{Backend, Record};

use super::traits::StorageAdapter;

/// Prefix for per-collection document tables.
const TABLE_PREFIX: &str = "doc_";

// ============================================================================
// Helpers
// ============================================================================

fn local_err(context: &'static str) -> impl Fn(rusqlite::Error) -> StorageError {
    move |e| StorageError::unavailable(context, e)
}

/// Quoted table identifier for a collection, rejecting names that could
/// escape the identifier.
fn table_ident(collection: &str) -> Result<String> {
    let valid = !collection.is_empty()
        && collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(StorageError::InvalidConfig(format!(
            "invalid collection name \"{collection}\""
        )));
    }
    Ok(format!("\"{TABLE_PREFIX}{collection}\""))
}

fn table_exists_tx(tx: &Transaction<'_>, collection: &str) -> Result<bool> {
    let name = format!("{TABLE_PREFIX}{collection}");
    let found: Option<i64> = tx
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()
        .map_err(local_err("inspect schema"))?;
    Ok(found.is_some())
}

fn ensure_table_tx(tx: &Transaction<'_>, collection: &str) -> Result<()> {
    let table = table_ident(collection)?;
    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id   INTEGER PRIMARY KEY AUTOINCREMENT,
            data TEXT NOT NULL DEFAULT '{{}}'
        );"
    ))
    .map_err(local_err("create collection"))
}

fn decode_row(collection: &str, id: i64, data: &str) -> Result<Record> {
    let fields: Map<String, Value> =
        serde_json::from_str(data).map_err(|e| StorageError::StorageUnavailable {
            message: format!("corrupt document {collection}/{id}"),
            source: Some(Box::new(e)),
        })?;
    Ok(Record {
        id: Some(id),
        fields,
    })
}

fn encode_fields(record: &Record) -> Result<String> {
    Ok(serde_json::to_string(&record.fields)?)
}

fn insert_tx(tx: &Transaction<'_>, collection: &str, record: Record) -> Result<Record> {
    let table = table_ident(collection)?;
    let data = encode_fields(&record)?;
    tx.execute(&format!("INSERT INTO {table} (data) VALUES (?1)"), params![data])
        .map_err(local_err("insert document"))?;
    Ok(Record {
        id: Some(tx.last_insert_rowid()),
        fields: record.fields,
    })
}

fn update_tx(tx: &Transaction<'_>, collection: &str, id: i64, record: Record) -> Result<Record> {
    let not_found = || StorageError::NotFound {
        collection: collection.to_string(),
        id,
    };
    if !table_exists_tx(tx, collection)? {
        return Err(not_found());
    }
    let table = table_ident(collection)?;
    let present: Option<i64> = tx
        .query_row(
            &format!("SELECT id FROM {table} WHERE id = ?1"),
            params![id],
            |row| row.get(0),
        )
        .optional()
        .map_err(local_err("probe document"))?;
    if present.is_none() {
        return Err(not_found());
    }
    let data = encode_fields(&record)?;
    tx.execute(
        &format!("UPDATE {table} SET data = ?1 WHERE id = ?2"),
        params![data, id],
    )
    .map_err(local_err("update document"))?;
    Ok(Record {
        id: Some(id),
        fields: record.fields,
    })
}

// ============================================================================
// LocalStore
// ============================================================================

/// Connection owner for the embedded store.
pub struct LocalStore {
    conn: Mutex<rusqlite::Connection>,
}

impl LocalStore {
    /// Open (or create) a file-backed store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = rusqlite::Connection::open(path.as_ref()).map_err(local_err("open store"))?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory().map_err(local_err("open store"))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: rusqlite::Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA busy_timeout=5000;
             CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
             );",
        )
        .map_err(local_err("initialize store"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` inside a fresh transaction, committing only if it succeeds.
    fn with_tx<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut guard = self.conn.lock();
        let tx = guard.transaction().map_err(local_err("begin transaction"))?;
        let out = f(&tx)?;
        tx.commit().map_err(local_err("commit transaction"))?;
        Ok(out)
    }

    pub fn collection_exists(&self, collection: &str) -> Result<bool> {
        self.with_tx(|tx| table_exists_tx(tx, collection))
    }

    /// Logical names of every collection that has a table.
    pub fn collections(&self) -> Result<Vec<String>> {
        self.with_tx(|tx| {
            let mut stmt = tx
                .prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'doc\\_%' ESCAPE '\\' ORDER BY name",
                )
                .map_err(local_err("list collections"))?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(local_err("list collections"))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(local_err("list collections"))?;
            Ok(names
                .into_iter()
                .map(|n| n[TABLE_PREFIX.len()..].to_string())
                .collect())
        })
    }

    pub fn all(&self, collection: &str) -> Result<Vec<Record>> {
        self.with_tx(|tx| {
            if !table_exists_tx(tx, collection)? {
                return Ok(Vec::new());
            }
            let table = table_ident(collection)?;
            let mut stmt = tx
                .prepare(&format!("SELECT id, data FROM {table} ORDER BY id ASC"))
                .map_err(local_err("scan collection"))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
                .map_err(local_err("scan collection"))?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(local_err("scan collection"))?;
            rows.iter()
                .map(|(id, data)| decode_row(collection, *id, data))
                .collect()
        })
    }

    pub fn get(&self, collection: &str, id: i64) -> Result<Option<Record>> {
        self.with_tx(|tx| {
            if !table_exists_tx(tx, collection)? {
                return Ok(None);
            }
            let table = table_ident(collection)?;
            let data: Option<String> = tx
                .query_row(
                    &format!("SELECT data FROM {table} WHERE id = ?1"),
                    params![id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(local_err("read document"))?;
            data.map(|d| decode_row(collection, id, &d)).transpose()
        })
    }

    pub fn insert(&self, collection: &str, record: Record) -> Result<Record> {
        self.with_tx(|tx| {
            ensure_table_tx(tx, collection)?;
            insert_tx(tx, collection, record.without_id())
        })
    }

    pub fn insert_many(&self, collection: &str, records: Vec<Record>) -> Result<Vec<Record>> {
        self.with_tx(|tx| {
            ensure_table_tx(tx, collection)?;
            records
                .into_iter()
                .map(|r| insert_tx(tx, collection, r.without_id()))
                .collect()
        })
    }

    pub fn replace(&self, collection: &str, id: i64, record: Record) -> Result<Record> {
        self.with_tx(|tx| update_tx(tx, collection, id, record))
    }

    pub fn replace_many(&self, collection: &str, updates: Vec<(i64, Record)>) -> Result<Vec<Record>> {
        self.with_tx(|tx| {
            updates
                .into_iter()
                .map(|(id, r)| update_tx(tx, collection, id, r))
                .collect()
        })
    }

    pub fn remove(&self, collection: &str, id: i64) -> Result<bool> {
        self.with_tx(|tx| {
            if !table_exists_tx(tx, collection)? {
                return Ok(false);
            }
            let table = table_ident(collection)?;
            let changed = tx
                .execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])
                .map_err(local_err("delete document"))?;
            Ok(changed > 0)
        })
    }

    // -----------------------------------------------------------------------
    // Flat key-value storage
    // -----------------------------------------------------------------------

    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        self.with_tx(|tx| {
            tx.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(local_err("read key"))
        })
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .map_err(local_err("write key"))?;
            Ok(())
        })
    }

    pub fn kv_remove(&self, key: &str) -> Result<bool> {
        self.with_tx(|tx| {
            let changed = tx
                .execute("DELETE FROM kv WHERE key = ?1", params![key])
                .map_err(local_err("delete key"))?;
            Ok(changed > 0)
        })
    }
}

// ============================================================================
// LocalAdapter
// ============================================================================

/// [`StorageAdapter`] over one collection of a [`LocalStore`].
pub struct LocalAdapter {
    store: Arc<LocalStore>,
    collection: String,
}

impl LocalAdapter {
    pub fn new(store: Arc<LocalStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&LocalStore, &str) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let collection = self.collection.clone();
        run_blocking(move || op(&store, &collection)).await
    }
}

/// Run a synchronous store call on tokio's blocking pool.
pub(crate) async fn run_blocking<T, F>(op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| StorageError::unavailable("local storage task failed", e))?
}

#[async_trait]
impl StorageAdapter for LocalAdapter {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn backend(&self) -> Backend {
        Backend::Local
    }

    async fn exists(&self) -> Result<bool> {
        self.blocking(|store, collection| store.collection_exists(collection))
            .await
    }

    async fn get_all(&self) -> Result<Vec<Record>> {
        self.blocking(|store, collection| store.all(collection)).await
    }

    async fn get(&self, id: i64) -> Result<Option<Record>> {
        self.blocking(move |store, collection| store.get(collection, id))
            .await
    }

    async fn create(&self, record: Record) -> Result<Record> {
        let created = self
            .blocking(move |store, collection| store.insert(collection, record))
            .await?;
        tracing::debug!(collection = %self.collection, id = ?created.id, "local create");
        Ok(created)
    }

    async fn update(&self, record: Record) -> Result<Record> {
        let id = record.require_id(&self.collection, "update")?;
        self.blocking(move |store, collection| store.replace(collection, id, record))
            .await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        self.blocking(move |store, collection| store.remove(collection, id))
            .await
    }

    async fn bulk_create(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        self.blocking(move |store, collection| store.insert_many(collection, records))
            .await
    }

    async fn bulk_update(&self, updates: Vec<(i64, Record)>) -> Result<Vec<Record>> {
        self.blocking(move |store, collection| store.replace_many(collection, updates))
            .await
    }
}
