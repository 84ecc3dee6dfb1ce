use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, StorageError};

/// Field that carries the human-meaningful name used for cross-backend dedup.
pub const NAME_FIELD: &str = "name";

/// Caller-side identity field.
pub const ID_FIELD: &str = "id";

// ============================================================================
// Record
// ============================================================================

/// A persisted configuration object (chain, API, alert, pipeline node).
///
/// `id` is backend-relative: it is assigned by whichever backend stored the
/// record and is never a durable key across backends. `fields` uses the
/// caller's camelCase naming regardless of backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a JSON object. An `id` key becomes the identity.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_value(&self) -> Value {
        let mut obj = self.fields.clone();
        if let Some(id) = self.id {
            obj.insert(ID_FIELD.to_string(), Value::from(id));
        }
        Value::Object(obj)
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Same record with the identity cleared, ready for `create`.
    pub fn without_id(mut self) -> Self {
        self.id = None;
        self
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Store a date/time instant as epoch milliseconds.
    pub fn set_instant(&mut self, field: impl Into<String>, at: DateTime<Utc>) {
        self.set(field, at.timestamp_millis());
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get(NAME_FIELD).and_then(Value::as_str)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.set(NAME_FIELD, Value::String(name.into()));
    }

    /// Identity or `MissingIdentity` for operations that need one.
    pub fn require_id(&self, collection: &str, operation: &'static str) -> Result<i64> {
        self.id.ok_or_else(|| StorageError::MissingIdentity {
            collection: collection.to_string(),
            operation,
        })
    }
}

// ============================================================================
// Backend
// ============================================================================

/// Which backend answers adapter calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Local,
    Remote,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Local => "local",
            Backend::Remote => "remote",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "indexeddb" => Ok(Backend::Local),
            "remote" | "supabase" => Ok(Backend::Remote),
            other => Err(StorageError::InvalidConfig(format!(
                "unknown storage backend \"{other}\""
            ))),
        }
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Progress callback for long-running operations: `(percent 0..=100, message)`.
pub type ProgressFn = dyn Fn(u8, &str) + Send + Sync;

/// Integer percentage of `done` out of `total`, clamped to 100.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}
