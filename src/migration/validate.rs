use crate::storage::StorageAdapter;

use super::engine::MigrationEngine;
use super::report::{CollectionCheck, MigrationLog, ValidationReport};
use super::sources::{read_first_non_empty, readers_for};

impl MigrationEngine {
    /// Compare record counts per collection. A collection fails when the
    /// remote side holds fewer records than the local side; collections
    /// without any local source are skipped.
    pub async fn validate(&self) -> ValidationReport {
        let mut log = MigrationLog::new();
        let mut checks = Vec::new();

        for collection in &self.collections {
            let readers = readers_for(&self.factory, collection);
            let data = match read_first_non_empty(&readers).await {
                Ok(data) => data,
                Err(e) => {
                    let message = format!("cannot read local data: {e}");
                    log.error(format!("{collection}: {message}"));
                    checks.push(CollectionCheck {
                        collection: collection.clone(),
                        local_count: 0,
                        remote_count: None,
                        passed: false,
                        message,
                    });
                    continue;
                }
            };
            if !data.found {
                log.info(format!("{collection}: no local data; skipped"));
                continue;
            }

            let local_count = data.records.len();
            let remote_count = match self.factory.remote_adapter(collection) {
                Ok(remote) => remote.get_all().await.map(|rows| rows.len()),
                Err(e) => Err(e),
            };

            let check = match remote_count {
                Ok(remote_count) if remote_count >= local_count => CollectionCheck {
                    collection: collection.clone(),
                    local_count,
                    remote_count: Some(remote_count),
                    passed: true,
                    message: format!("{local_count} local, {remote_count} remote"),
                },
                Ok(remote_count) => CollectionCheck {
                    collection: collection.clone(),
                    local_count,
                    remote_count: Some(remote_count),
                    passed: false,
                    message: format!(
                        "remote is missing {} records ({local_count} local, {remote_count} remote)",
                        local_count - remote_count
                    ),
                },
                Err(e) => CollectionCheck {
                    collection: collection.clone(),
                    local_count,
                    remote_count: None,
                    passed: false,
                    message: format!("cannot read remote records: {e}"),
                },
            };
            if check.passed {
                log.success(format!("{collection}: {}", check.message));
            } else {
                log.error(format!("{collection}: {}", check.message));
            }
            checks.push(check);
        }

        let failed = checks.iter().filter(|c| !c.passed).count();
        let success = !checks.is_empty() && failed == 0;
        let summary = if checks.is_empty() {
            "Nothing to validate: no local collections found".to_string()
        } else if success {
            format!("Validation passed for {} collections", checks.len())
        } else {
            format!("Validation failed for {failed} of {} collections", checks.len())
        };
        if success {
            log.success(summary.clone());
        } else {
            log.warning(summary.clone());
        }

        ValidationReport {
            success,
            summary,
            checks,
            log: log.into_entries(),
        }
    }
}
