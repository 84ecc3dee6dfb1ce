//! Migration log entries and per-run reports.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub severity: Severity,
}

/// Append-only, in-memory log. Every entry is mirrored to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct MigrationLog {
    entries: Vec<LogEntry>,
}

impl MigrationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info | Severity::Success => tracing::info!("{message}"),
            Severity::Warning => tracing::warn!("{message}"),
            Severity::Error => tracing::error!("{message}"),
        }
        self.entries.push(LogEntry {
            timestamp: Utc::now(),
            message,
            severity,
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(Severity::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }
}

// ============================================================================
// Migration
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionOutcome {
    pub collection: String,
    pub success: bool,
    /// Label of the source reader that supplied the records.
    pub source: Option<String>,
    pub total: usize,
    pub migrated: usize,
    /// Renamed on a unique conflict; also counted in `migrated`.
    pub renamed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub error: Option<String>,
}

impl CollectionOutcome {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            ..Self::default()
        }
    }

    pub fn failed_setup(collection: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(collection)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationResult {
    pub success: bool,
    pub summary: String,
    pub collections: Vec<CollectionOutcome>,
    pub log: Vec<LogEntry>,
}

impl MigrationResult {
    pub fn from_outcomes(collections: Vec<CollectionOutcome>, log: Vec<LogEntry>) -> Self {
        let succeeded = collections.iter().filter(|c| c.success).count();
        let total = collections.len();
        let migrated: usize = collections.iter().map(|c| c.migrated).sum();
        let skipped: usize = collections.iter().map(|c| c.skipped).sum();
        let failed: usize = collections.iter().map(|c| c.failed).sum();
        let counts = format!("{migrated} migrated, {skipped} skipped, {failed} failed");

        let success = succeeded == total;
        let summary = if success {
            format!("Migration completed: {counts} across {total} collections")
        } else if succeeded > 0 {
            format!("Migration partially succeeded ({succeeded}/{total} collections): {counts}")
        } else {
            format!("Migration failed: {counts}")
        };

        Self {
            success,
            summary,
            collections,
            log,
        }
    }

    pub fn outcome(&self, collection: &str) -> Option<&CollectionOutcome> {
        self.collections.iter().find(|c| c.collection == collection)
    }
}

// ============================================================================
// Validation
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CollectionCheck {
    pub collection: String,
    pub local_count: usize,
    pub remote_count: Option<usize>,
    pub passed: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub success: bool,
    pub summary: String,
    pub checks: Vec<CollectionCheck>,
    pub log: Vec<LogEntry>,
}

// ============================================================================
// Wipe
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct WipeReport {
    pub success: bool,
    pub summary: String,
    pub cleared: Vec<String>,
    pub log: Vec<LogEntry>,
}
