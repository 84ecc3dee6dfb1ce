//! Bidirectional translation between caller records and remote
//! rows.
//!
//! Known fields go through an explicit table; everything else uses the
//! camelCase ↔ snake_case transform, which is a true inverse for names made
//! of ASCII alphanumerics (no `_`, not starting with a digit). Columns the
//! transform cannot invert (`address_1`) travel verbatim in both directions.
//! Other names outside that shape, and names that would collide with a table
//! entry, are rejected with `TranslationAmbiguous` instead of being silently
//! merged.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, SecondsFormat};
use serde_json::{Map, Value};

use crate::catalog::{self, COMMON_FIELDS, CREATED_AT_FIELD};
use crate::error::{Result, StorageError};
use crate::types::Record;

/// A backend row as it travels over the wire.
pub type Row = Map<String, Value>;

const INSTANT_SUFFIXES: &[&str] = &["At", "Timestamp"];

// ============================================================================
// Case transforms
// ============================================================================

/// `chainId` → `chain_id`. Every uppercase ASCII letter becomes `_` plus its
/// lowercase form.
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// `chain_id` → `chainId`. `_` followed by a lowercase ASCII letter becomes
/// the uppercase letter; any other `_` is kept.
pub fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '_' {
            if let Some(next) = chars.peek().copied().filter(char::is_ascii_lowercase) {
                chars.next();
                out.push(next.to_ascii_uppercase());
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// Whether `snake_to_camel(camel_to_snake(name)) == name` is guaranteed.
pub fn is_translatable(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric())
}

/// Whether `column` comes back from [`snake_to_camel`] as a translatable
/// name that maps onto it again.
fn decodes_cleanly(column: &str) -> bool {
    let field = snake_to_camel(column);
    is_translatable(&field) && camel_to_snake(&field) == column
}

/// Lowercase snake_case with no camelCase counterpart, kept as-is.
fn is_verbatim_column(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_lower = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    starts_lower
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !decodes_cleanly(name)
}

fn is_instant_field(field: &str) -> bool {
    INSTANT_SUFFIXES
        .iter()
        .any(|suffix| field.len() > suffix.len() && field.ends_with(suffix))
}

/// Epoch milliseconds → RFC 3339 string; other values pass through.
fn normalize_instant(value: &Value) -> Value {
    let millis = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    };
    match millis.and_then(DateTime::from_timestamp_millis) {
        Some(at) => Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => value.clone(),
    }
}

// ============================================================================
// FieldCodec
// ============================================================================

#[derive(Debug, Clone)]
pub struct FieldCodec {
    collection: String,
    table: String,
    primary_key: String,
    to_column: HashMap<String, String>,
    to_field: HashMap<String, String>,
    ignore: HashSet<String>,
    defaults: Vec<(String, Value)>,
}

impl FieldCodec {
    /// Codec for a logical collection: catalog entry when known, otherwise
    /// the common field table and a folded table name.
    pub fn for_collection(collection: &str) -> Result<Self> {
        match catalog::find(collection) {
            Some(spec) => Self::new(
                collection,
                spec.table,
                spec.primary_key,
                COMMON_FIELDS.iter().chain(spec.fields.iter()).copied(),
                spec.ignore.iter().copied(),
                spec.defaults
                    .iter()
                    .map(|(column, default)| (column.to_string(), default.to_value())),
            ),
            None => Self::new(
                collection,
                &catalog::remote_table_name(collection),
                "id",
                COMMON_FIELDS.iter().copied(),
                std::iter::empty(),
                std::iter::empty(),
            ),
        }
    }

    /// Build a codec from explicit pairs. Later pairs override earlier ones
    /// for the same caller field; two caller fields sharing a column is an
    /// error.
    pub fn new<'a>(
        collection: &str,
        table: &str,
        primary_key: &str,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
        ignore: impl IntoIterator<Item = &'a str>,
        defaults: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<Self> {
        let ambiguous = |field: &str, detail: String| StorageError::TranslationAmbiguous {
            collection: collection.to_string(),
            field: field.to_string(),
            detail,
        };

        let mut to_column: HashMap<String, String> = HashMap::new();
        for (field, column) in pairs {
            to_column.insert(field.to_string(), column.to_string());
        }

        let mut to_field: HashMap<String, String> = HashMap::with_capacity(to_column.len());
        for (field, column) in &to_column {
            if column == primary_key {
                return Err(ambiguous(
                    field,
                    format!("maps onto primary key column \"{primary_key}\""),
                ));
            }
            if let Some(other) = to_field.insert(column.clone(), field.clone()) {
                return Err(ambiguous(
                    field,
                    format!("shares column \"{column}\" with \"{other}\""),
                ));
            }
        }

        Ok(Self {
            collection: collection.to_string(),
            table: table.to_string(),
            primary_key: primary_key.to_string(),
            to_column,
            to_field,
            ignore: ignore.into_iter().map(str::to_string).collect(),
            defaults: defaults.into_iter().collect(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn is_ignored(&self, field: &str) -> bool {
        self.ignore.contains(field)
    }

    fn ambiguous(&self, field: &str, detail: impl Into<String>) -> StorageError {
        StorageError::TranslationAmbiguous {
            collection: self.collection.clone(),
            field: field.to_string(),
            detail: detail.into(),
        }
    }

    /// Remote column for a caller field.
    pub fn column_for(&self, field: &str) -> Result<String> {
        if let Some(column) = self.to_column.get(field) {
            return Ok(column.clone());
        }
        let column = if is_translatable(field) {
            camel_to_snake(field)
        } else if is_verbatim_column(field) {
            field.to_string()
        } else {
            return Err(self.ambiguous(field, "name cannot be translated reversibly"));
        };
        if column == self.primary_key {
            return Err(self.ambiguous(field, "collides with the primary key column"));
        }
        if let Some(owner) = self.to_field.get(&column) {
            return Err(self.ambiguous(
                field,
                format!("column \"{column}\" already belongs to \"{owner}\""),
            ));
        }
        Ok(column)
    }

    /// Caller field for a remote column.
    pub fn field_for(&self, column: &str) -> Result<String> {
        if let Some(field) = self.to_field.get(column) {
            return Ok(field.clone());
        }
        let field = if decodes_cleanly(column) {
            snake_to_camel(column)
        } else {
            column.to_string()
        };
        if self.to_column.contains_key(&field) {
            return Err(self.ambiguous(
                &field,
                format!("column \"{column}\" would shadow a mapped field"),
            ));
        }
        Ok(field)
    }

    /// Caller record → remote row.
    ///
    /// Drops ignored fields and the creation instant, converts epoch-millis
    /// instants (caller suffix `At`/`Timestamp` or an `_at` column) to
    /// RFC 3339, copies the identity into the primary key when set, and
    /// fills required-column defaults.
    pub fn to_remote(&self, record: &Record) -> Result<Row> {
        let mut row = Row::new();
        for (field, value) in &record.fields {
            if self.is_ignored(field) || field == CREATED_AT_FIELD {
                continue;
            }
            let column = self.column_for(field)?;
            let value = if is_instant_field(field) || column.ends_with("_at") {
                normalize_instant(value)
            } else {
                value.clone()
            };
            row.insert(column, value);
        }
        if let Some(id) = record.id {
            row.insert(self.primary_key.clone(), Value::from(id));
        }
        for (column, default) in &self.defaults {
            let missing = row.get(column).map_or(true, Value::is_null);
            if missing {
                row.insert(column.clone(), default.clone());
            }
        }
        Ok(row)
    }

    /// Remote row → caller record. The primary key becomes the identity and
    /// is not kept among the fields.
    pub fn from_remote(&self, row: Row) -> Result<Record> {
        let mut record = Record::new();
        for (column, value) in row {
            if column == self.primary_key {
                record.id = match &value {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.parse().ok(),
                    _ => None,
                };
                continue;
            }
            let field = self.field_for(&column)?;
            record.fields.insert(field, value);
        }
        Ok(record)
    }
}
