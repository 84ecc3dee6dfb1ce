use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ConstraintKind
// ---------------------------------------------------------------------------

/// Which relational constraint a remote write tripped over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    NotNull,
    Unique,
    ForeignKey,
    Check,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConstraintKind::NotNull => "not-null",
            ConstraintKind::Unique => "unique",
            ConstraintKind::ForeignKey => "foreign-key",
            ConstraintKind::Check => "check",
        };
        f.write_str(label)
    }
}

fn column_hint(column: &Option<String>) -> String {
    match column {
        Some(c) => format!(" on column \"{c}\""),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {collection}/{id}")]
    NotFound { collection: String, id: i64 },

    #[error("Record in \"{collection}\" has no identity; {operation} requires one")]
    MissingIdentity {
        collection: String,
        operation: &'static str,
    },

    #[error("Local storage unavailable: {message}")]
    StorageUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Remote table \"{0}\" does not exist")]
    TableNotFound(String),

    #[error("{kind} constraint violation in \"{table}\"{}: {message}", column_hint(.column))]
    ConstraintViolation {
        table: String,
        kind: ConstraintKind,
        column: Option<String>,
        message: String,
    },

    #[error("Ambiguous field translation for \"{field}\" in \"{collection}\": {detail}")]
    TranslationAmbiguous {
        collection: String,
        field: String,
        detail: String,
    },

    #[error("{operation} failed after {attempts} attempts: {}", .trail.join(" | "))]
    RetryExhausted {
        operation: String,
        attempts: u32,
        trail: Vec<String>,
        #[source]
        last: Box<StorageError>,
    },

    #[error("Remote error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Remote { status: Option<u16>, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Wrap a local-store failure, keeping the underlying error as source.
    pub fn unavailable(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StorageError::StorageUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Failures worth another attempt: connectivity, DNS, timeouts.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::NetworkUnavailable(_))
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            StorageError::ConstraintViolation {
                kind: ConstraintKind::Unique,
                ..
            }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Result alias defaulting to [`StorageError`].
pub type Result<T, E = StorageError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
