//! Local → remote copy with name-based dedup and conflict repair.
//!
//! Each collection goes through the same pipeline:
//! read the first non-empty local source, make sure the remote table is
//! there, drop records whose `name` already exists remotely, write the rest
//! in one batch, and fall back to record-by-record writes when the batch is
//! rejected. A unique-name collision during the fallback is retried once
//! under `<name>_backup_<epoch millis>`. A collection that cannot be set up
//! is reported as failed and the run moves on.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use crate::catalog;
use crate::storage::{AdapterFactory, RemoteAdapter, StorageAdapter};
use crate::types::{percent, ProgressFn, Record};

use super::report::{CollectionOutcome, MigrationLog, MigrationResult, Severity};
use super::sources::{read_first_non_empty, readers_for};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrateOptions {
    /// Leave out records whose name is already present remotely.
    pub skip_existing: bool,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            skip_existing: true,
        }
    }
}

pub(crate) fn report_progress(progress: Option<&ProgressFn>, pct: u8, message: &str) {
    if let Some(progress) = progress {
        progress(pct, message);
    }
}

/// Name a conflicting record is stored under on its second attempt.
pub fn backup_name(original: &str) -> String {
    format!("{original}_backup_{}", Utc::now().timestamp_millis())
}

pub struct MigrationEngine {
    pub(crate) factory: Arc<AdapterFactory>,
    pub(crate) collections: Vec<String>,
}

impl MigrationEngine {
    /// Engine over every catalog collection, in catalog order.
    pub fn new(factory: Arc<AdapterFactory>) -> Self {
        Self {
            factory,
            collections: catalog::collection_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn with_collections<I, S>(mut self, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collections = collections.into_iter().map(Into::into).collect();
        self
    }

    pub fn collections(&self) -> &[String] {
        &self.collections
    }

    pub async fn migrate(
        &self,
        options: MigrateOptions,
        progress: Option<&ProgressFn>,
    ) -> MigrationResult {
        let mut log = MigrationLog::new();
        let total = self.collections.len();
        log.info(format!(
            "Starting migration of {total} collections (skip existing: {})",
            options.skip_existing
        ));

        let mut outcomes = Vec::with_capacity(total);
        for (done, collection) in self.collections.iter().enumerate() {
            report_progress(progress, percent(done, total), &format!("Migrating {collection}"));
            outcomes.push(self.migrate_collection(collection, options, &mut log).await);
        }
        report_progress(progress, 100, "Migration finished");

        let result = MigrationResult::from_outcomes(outcomes, Vec::new());
        let severity = if result.success {
            Severity::Success
        } else {
            Severity::Error
        };
        log.push(severity, result.summary.clone());
        MigrationResult {
            log: log.into_entries(),
            ..result
        }
    }

    async fn migrate_collection(
        &self,
        collection: &str,
        options: MigrateOptions,
        log: &mut MigrationLog,
    ) -> CollectionOutcome {
        let fail = |log: &mut MigrationLog, message: String| {
            log.error(format!("{collection}: {message}"));
            CollectionOutcome::failed_setup(collection, message)
        };

        let readers = readers_for(&self.factory, collection);
        let data = match read_first_non_empty(&readers).await {
            Ok(data) => data,
            Err(e) => return fail(log, format!("cannot read local data: {e}")),
        };

        let mut outcome = CollectionOutcome::new(collection);
        if data.records.is_empty() {
            if data.found {
                log.info(format!("{collection}: local source is empty; nothing to migrate"));
            } else {
                log.info(format!("{collection}: no local data found; nothing to migrate"));
            }
            outcome.success = true;
            return outcome;
        }
        outcome.total = data.records.len();
        outcome.source = data.source.clone();
        log.info(format!(
            "{collection}: read {} records from {}",
            outcome.total,
            data.source.as_deref().unwrap_or("local storage")
        ));

        let remote = match self.factory.remote_adapter(collection) {
            Ok(remote) => remote,
            Err(e) => return fail(log, format!("remote storage unavailable: {e}")),
        };
        match remote.exists().await {
            Ok(true) => {}
            Ok(false) => {
                return fail(
                    log,
                    format!(
                        "remote table \"{}\" does not exist; create it with reset-table {collection}",
                        remote.table()
                    ),
                )
            }
            Err(e) => return fail(log, format!("cannot reach remote table: {e}")),
        }

        let existing: HashSet<String> = if options.skip_existing {
            match remote.get_all().await {
                Ok(rows) => rows
                    .iter()
                    .filter_map(|r| r.name().map(str::to_string))
                    .collect(),
                Err(e) => return fail(log, format!("cannot read remote records: {e}")),
            }
        } else {
            HashSet::new()
        };

        let mut pending = Vec::with_capacity(data.records.len());
        for record in data.records {
            if record.name().is_some_and(|n| existing.contains(n)) {
                outcome.skipped += 1;
                continue;
            }
            pending.push(record.without_id());
        }
        if outcome.skipped > 0 {
            log.info(format!(
                "{collection}: skipped {} records already present remotely",
                outcome.skipped
            ));
        }
        if pending.is_empty() {
            outcome.success = true;
            log.success(format!("{collection}: nothing new to migrate"));
            return outcome;
        }

        match remote.bulk_create(pending.clone()).await {
            Ok(created) => {
                outcome.migrated += created.len();
                log.success(format!("{collection}: migrated {} records", created.len()));
            }
            Err(e) => {
                log.warning(format!(
                    "{collection}: batch insert failed ({e}); writing records one by one"
                ));
                for record in pending {
                    write_one(&remote, collection, record, &mut outcome, log).await;
                }
                log.info(format!(
                    "{collection}: {} migrated ({} renamed), {} failed",
                    outcome.migrated, outcome.renamed, outcome.failed
                ));
            }
        }

        outcome.success = outcome.failed == 0;
        outcome
    }
}

async fn write_one(
    remote: &RemoteAdapter,
    collection: &str,
    record: Record,
    outcome: &mut CollectionOutcome,
    log: &mut MigrationLog,
) {
    let original = record.name().map(str::to_string);
    let label = original.as_deref().unwrap_or("<unnamed>").to_string();

    let err = match remote.create(record.clone()).await {
        Ok(_) => {
            outcome.migrated += 1;
            return;
        }
        Err(e) => e,
    };

    let Some(original) = original.filter(|_| err.is_unique_violation()) else {
        outcome.failed += 1;
        log.error(format!("{collection}: failed to migrate \"{label}\": {err}"));
        return;
    };

    let renamed = backup_name(&original);
    let mut retry = record;
    retry.set_name(renamed.clone());
    match remote.create(retry).await {
        Ok(_) => {
            outcome.migrated += 1;
            outcome.renamed += 1;
            log.warning(format!(
                "{collection}: \"{original}\" already exists remotely; stored as \"{renamed}\""
            ));
        }
        Err(e) => {
            outcome.failed += 1;
            log.error(format!(
                "{collection}: failed to migrate \"{original}\" even as \"{renamed}\": {e}"
            ));
        }
    }
}
