//! Destructive remote maintenance: wipe every table, or rebuild one.

use crate::catalog;
use crate::error::{Result, StorageError};
use crate::types::{percent, ProgressFn};

use super::engine::{report_progress, MigrationEngine};
use super::report::{MigrationLog, Severity, WipeReport};

impl MigrationEngine {
    /// Delete every remote row of every collection. Missing tables are
    /// reported and skipped.
    pub async fn wipe_remote_data(&self, progress: Option<&ProgressFn>) -> WipeReport {
        let mut log = MigrationLog::new();
        let mut cleared = Vec::new();
        let mut failed = 0usize;
        let total = self.collections.len();

        log.warning(format!("Wiping remote data for {total} collections"));
        for (done, collection) in self.collections.iter().enumerate() {
            report_progress(progress, percent(done, total), &format!("Clearing {collection}"));
            let result = match self.factory.remote_adapter(collection) {
                Ok(remote) => remote.clear().await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => {
                    log.success(format!("{collection}: cleared"));
                    cleared.push(collection.clone());
                }
                Err(StorageError::TableNotFound(table)) => {
                    log.warning(format!(
                        "{collection}: remote table \"{table}\" does not exist; skipped"
                    ));
                }
                Err(e) => {
                    failed += 1;
                    log.error(format!("{collection}: {e}"));
                }
            }
        }
        report_progress(progress, 100, "Wipe finished");

        let success = failed == 0;
        let summary = if success {
            format!("Cleared {} of {total} remote tables", cleared.len())
        } else {
            format!("Wipe failed for {failed} of {total} remote tables")
        };
        let severity = if success {
            Severity::Success
        } else {
            Severity::Error
        };
        log.push(severity, summary.clone());

        WipeReport {
            success,
            summary,
            cleared,
            log: log.into_entries(),
        }
    }

    /// Drop `collection`'s remote table and create it empty from the
    /// catalog definition. All remote rows of that table are lost.
    pub async fn drop_and_recreate_table(&self, collection: &str) -> Result<()> {
        if catalog::find(collection).is_none() {
            return Err(StorageError::InvalidConfig(format!(
                "unknown collection \"{collection}\"; expected one of {}",
                catalog::collection_names().join(", ")
            )));
        }
        let remote = self.factory.remote_adapter(collection)?;
        tracing::warn!(collection, table = remote.table(), "Resetting remote table");
        remote.recreate().await
    }
}
