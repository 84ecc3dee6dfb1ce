//! Moving configuration data from the local backend to the remote one.

mod engine;
mod reset;
mod report;
pub mod sources;
mod validate;

pub use engine::{backup_name, MigrateOptions, MigrationEngine};
pub use report::{
    CollectionCheck, CollectionOutcome, LogEntry, MigrationLog, MigrationResult, Severity,
    ValidationReport, WipeReport,
};
