//! The REST transport seam and PostgREST error classification.
//!
//! `RestTransport` is the narrow set of calls the remote adapter needs. The
//! reqwest implementation talks to a real endpoint; the memory implementation
//! emulates one in-process.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ConstraintKind, StorageError};

use super::codec::Row;

/// Message fragments that indicate the request never reached the backend.
const NETWORK_MARKERS: &[&str] = &[
    "failed to fetch",
    "networkerror",
    "network error",
    "error sending request",
    "connection refused",
    "connection reset",
    "dns error",
    "timed out",
    "timeout",
    "internet_disconnected",
];

// ============================================================================
// SelectQuery
// ============================================================================

/// Parameters for a row select: optional equality filter on one column,
/// optional ascending order, optional limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectQuery {
    pub filter: Option<(String, i64)>,
    pub order_by: Option<String>,
    pub limit: Option<usize>,
}

impl SelectQuery {
    pub fn all_ordered(column: &str) -> Self {
        Self {
            order_by: Some(column.to_string()),
            ..Self::default()
        }
    }

    pub fn by_key(column: &str, id: i64) -> Self {
        Self {
            filter: Some((column.to_string(), id)),
            limit: Some(1),
            ..Self::default()
        }
    }

    pub fn probe() -> Self {
        Self {
            limit: Some(1),
            ..Self::default()
        }
    }
}

// ============================================================================
// RestError
// ============================================================================

/// A failed REST call before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestError {
    pub status: Option<u16>,
    pub code: Option<String>,
    pub message: String,
    pub details: Option<String>,
    /// The request never got an HTTP response.
    pub network: bool,
}

#[derive(Deserialize)]
struct PostgrestBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

impl RestError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
            details: None,
            network: true,
        }
    }

    pub fn postgres(status: u16, code: &str, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code: Some(code.to_string()),
            message: message.into(),
            details: None,
            network: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Build from a non-2xx response. PostgREST bodies are
    /// `{code, message, details, hint}`; anything else is kept verbatim.
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<PostgrestBody>(body) {
            Ok(parsed) => Self {
                status: Some(status),
                code: parsed.code,
                message: parsed.message.unwrap_or_else(|| body.to_string()),
                details: parsed.details,
                network: false,
            },
            Err(_) => Self {
                status: Some(status),
                code: None,
                message: body.to_string(),
                details: None,
                network: false,
            },
        }
    }

    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let network = err.is_connect() || err.is_timeout() || err.is_request();
        Self {
            status: err.status().map(|s| s.as_u16()),
            code: None,
            message: err.to_string(),
            details: None,
            network,
        }
    }

    fn looks_like_network(&self) -> bool {
        if self.network {
            return true;
        }
        if self.status.is_some() {
            return false;
        }
        let lower = self.message.to_lowercase();
        NETWORK_MARKERS.iter().any(|m| lower.contains(m))
    }

    /// Map onto the typed error taxonomy for `table`.
    pub fn classify(self, table: &str) -> StorageError {
        if self.looks_like_network() {
            return StorageError::NetworkUnavailable(self.message);
        }

        let code = self.code.as_deref().unwrap_or_default();
        let lower = self.message.to_lowercase();

        if code == "42P01"
            || code == "PGRST205"
            || (lower.contains("relation") && lower.contains("does not exist"))
            || lower.contains("could not find the table")
        {
            return StorageError::TableNotFound(table.to_string());
        }

        let kind = match code {
            "23505" => Some(ConstraintKind::Unique),
            "23502" => Some(ConstraintKind::NotNull),
            "23503" => Some(ConstraintKind::ForeignKey),
            "23514" => Some(ConstraintKind::Check),
            _ if lower.contains("duplicate key") => Some(ConstraintKind::Unique),
            _ if lower.contains("not-null constraint") => Some(ConstraintKind::NotNull),
            _ => None,
        };

        match kind {
            Some(kind) => {
                let column = match kind {
                    ConstraintKind::Unique => self
                        .details
                        .as_deref()
                        .and_then(|d| between(d, "Key (", ")")),
                    _ => between(&self.message, "column \"", "\"").or_else(|| {
                        self.details
                            .as_deref()
                            .and_then(|d| between(d, "column \"", "\""))
                    }),
                };
                StorageError::ConstraintViolation {
                    table: table.to_string(),
                    kind,
                    column,
                    message: self.message,
                }
            }
            None => StorageError::Remote {
                status: self.status,
                message: self.message,
            },
        }
    }
}

impl std::fmt::Display for RestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.status, &self.code) {
            (Some(status), Some(code)) => write!(f, "HTTP {status} [{code}]: {}", self.message),
            (Some(status), None) => write!(f, "HTTP {status}: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

fn between(haystack: &str, start: &str, end: &str) -> Option<String> {
    let from = haystack.find(start)? + start.len();
    let len = haystack[from..].find(end)?;
    let value = &haystack[from..from + len];
    (!value.is_empty()).then(|| value.to_string())
}

// ============================================================================
// RestTransport
// ============================================================================

#[async_trait]
pub trait RestTransport: Send + Sync {
    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Row>, RestError>;

    /// Insert every row in one request; returns the stored rows in input
    /// order. The batch is all-or-nothing.
    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, RestError>;

    /// Patch the row whose `key` column equals `id`; returns the matched rows
    /// after the change (empty when nothing matched).
    async fn update(&self, table: &str, key: &str, id: i64, row: Row)
        -> Result<Vec<Row>, RestError>;

    async fn delete(&self, table: &str, key: &str, id: i64) -> Result<(), RestError>;

    /// Delete every row of `table`.
    async fn delete_all(&self, table: &str, key: &str) -> Result<(), RestError>;

    /// Run raw SQL through the `exec_sql` RPC.
    async fn execute_sql(&self, sql: &str) -> Result<(), RestError>;

    /// Cheap reachability check against the REST root.
    async fn ping(&self) -> Result<(), RestError>;
}
