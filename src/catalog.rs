//! Static catalog of the console's collections.
//!
//! Each entry ties a logical collection name to its remote table, the fields
//! that never leave the client, the not-null defaults the remote schema
//! needs, the DDL used by destructive resets, and (for two collections) the
//! legacy flat-storage location older installations still write to.

use serde_json::{json, Value};

/// Field-name pairs shared by every collection: `(caller, column)`.
pub const COMMON_FIELDS: &[(&str, &str)] = &[
    ("rpcUrl", "rpc_endpoint"),
    ("explorerUrl", "block_explorer_url"),
    ("chainId", "chain_id"),
    ("isActive", "is_active"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
    ("lastTriggered", "last_triggered_at"),
];

/// Caller field holding the creation instant; dropped on remote writes.
pub const CREATED_AT_FIELD: &str = "createdAt";

#[derive(Debug, Clone, Copy)]
pub enum DefaultValue {
    Text(&'static str),
    Bool(bool),
    EmptyObject,
    EmptyArray,
}

impl DefaultValue {
    pub fn to_value(self) -> Value {
        match self {
            DefaultValue::Text(s) => Value::String(s.to_string()),
            DefaultValue::Bool(b) => Value::Bool(b),
            DefaultValue::EmptyObject => json!({}),
            DefaultValue::EmptyArray => json!([]),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub not_null: bool,
    pub unique: bool,
    pub default_sql: Option<&'static str>,
}

const fn col(name: &'static str, sql_type: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        sql_type,
        not_null: false,
        unique: false,
        default_sql: None,
    }
}

const fn required(name: &'static str, sql_type: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        sql_type,
        not_null: true,
        unique: false,
        default_sql: None,
    }
}

const NAME_COLUMN: ColumnDef = ColumnDef {
    name: "name",
    sql_type: "TEXT",
    not_null: true,
    unique: true,
    default_sql: None,
};

const IS_ACTIVE_COLUMN: ColumnDef = ColumnDef {
    name: "is_active",
    sql_type: "BOOLEAN",
    not_null: true,
    unique: false,
    default_sql: Some("true"),
};

const CREATED_AT_COLUMN: ColumnDef = ColumnDef {
    name: "created_at",
    sql_type: "TIMESTAMPTZ",
    not_null: true,
    unique: false,
    default_sql: Some("now()"),
};

const UPDATED_AT_COLUMN: ColumnDef = col("updated_at", "TIMESTAMPTZ");

/// Where an older install kept a collection outside the primary store.
#[derive(Debug, Clone, Copy)]
pub struct LegacySource {
    /// Flat key-value key holding a JSON array of records.
    pub key: &'static str,
    /// Seed/test entries to discard, matched by exact name.
    pub placeholders: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct CollectionSpec {
    pub name: &'static str,
    pub table: &'static str,
    pub primary_key: &'static str,
    /// Collection-specific `(caller, column)` pairs, on top of [`COMMON_FIELDS`].
    pub fields: &'static [(&'static str, &'static str)],
    /// Caller fields never sent to the remote backend.
    pub ignore: &'static [&'static str],
    /// Not-null columns filled in when the caller leaves them empty.
    pub defaults: &'static [(&'static str, DefaultValue)],
    pub columns: &'static [ColumnDef],
    pub legacy: Option<LegacySource>,
}

impl CollectionSpec {
    pub fn create_table_sql(&self) -> String {
        let mut parts = vec![format!("{} BIGSERIAL PRIMARY KEY", self.primary_key)];
        for c in self.columns {
            let mut def = format!("{} {}", c.name, c.sql_type);
            if c.not_null {
                def.push_str(" NOT NULL");
            }
            if c.unique {
                def.push_str(" UNIQUE");
            }
            if let Some(d) = c.default_sql {
                def.push_str(" DEFAULT ");
                def.push_str(d);
            }
            parts.push(def);
        }
        format!(
            "CREATE TABLE IF NOT EXISTS public.{} ({})",
            self.table,
            parts.join(", ")
        )
    }

    pub fn drop_table_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS public.{} CASCADE", self.table)
    }
}

pub const COLLECTIONS: &[CollectionSpec] = &[
    CollectionSpec {
        name: "ChainConfig",
        table: "chain_configs",
        primary_key: "id",
        fields: &[],
        ignore: &["status", "latency"],
        defaults: &[("is_active", DefaultValue::Bool(true))],
        columns: &[
            NAME_COLUMN,
            required("chain_id", "BIGINT"),
            required("rpc_endpoint", "TEXT"),
            col("block_explorer_url", "TEXT"),
            col("native_currency", "JSONB"),
            IS_ACTIVE_COLUMN,
            CREATED_AT_COLUMN,
            UPDATED_AT_COLUMN,
        ],
        legacy: None,
    },
    CollectionSpec {
        name: "ApiConfig",
        table: "api_configs",
        primary_key: "id",
        fields: &[],
        ignore: &["lastResponse", "testResult"],
        defaults: &[
            ("method", DefaultValue::Text("GET")),
            ("headers", DefaultValue::EmptyObject),
            ("is_active", DefaultValue::Bool(true)),
        ],
        columns: &[
            NAME_COLUMN,
            required("url", "TEXT"),
            ColumnDef {
                name: "method",
                sql_type: "TEXT",
                not_null: true,
                unique: false,
                default_sql: Some("'GET'"),
            },
            required("headers", "JSONB"),
            col("params", "JSONB"),
            col("response_path", "TEXT"),
            col("chain_id", "BIGINT"),
            IS_ACTIVE_COLUMN,
            CREATED_AT_COLUMN,
            UPDATED_AT_COLUMN,
        ],
        legacy: Some(LegacySource {
            key: "legacy:ApiConfig",
            placeholders: &["Test API", "Example API"],
        }),
    },
    CollectionSpec {
        name: "AlertConfig",
        table: "alert_configs",
        primary_key: "id",
        fields: &[("type", "alert_type")],
        ignore: &["lastError"],
        defaults: &[
            ("alert_type", DefaultValue::Text("price")),
            ("conditions", DefaultValue::EmptyArray),
            ("is_active", DefaultValue::Bool(true)),
        ],
        columns: &[
            NAME_COLUMN,
            required("alert_type", "TEXT"),
            col("channel", "TEXT"),
            col("webhook_url", "TEXT"),
            required("conditions", "JSONB"),
            col("cooldown_minutes", "INTEGER"),
            col("last_triggered_at", "TIMESTAMPTZ"),
            IS_ACTIVE_COLUMN,
            CREATED_AT_COLUMN,
            UPDATED_AT_COLUMN,
        ],
        legacy: Some(LegacySource {
            key: "legacy:AlertConfig",
            placeholders: &["Test Alert", "Example Alert"],
        }),
    },
    CollectionSpec {
        name: "DataCollectionNode",
        table: "data_collection_nodes",
        primary_key: "id",
        fields: &[("type", "node_type")],
        ignore: &["runtimeState"],
        defaults: &[
            ("node_type", DefaultValue::Text("api")),
            ("is_active", DefaultValue::Bool(true)),
        ],
        columns: &[
            NAME_COLUMN,
            required("node_type", "TEXT"),
            col("chain_id", "BIGINT"),
            col("api_id", "BIGINT"),
            col("config", "JSONB"),
            col("schedule", "TEXT"),
            IS_ACTIVE_COLUMN,
            CREATED_AT_COLUMN,
            UPDATED_AT_COLUMN,
        ],
        legacy: None,
    },
    CollectionSpec {
        name: "DataProcessingNode",
        table: "data_processing_nodes",
        primary_key: "id",
        fields: &[("type", "node_type"), ("inputs", "input_node_ids")],
        ignore: &["preview"],
        defaults: &[
            ("node_type", DefaultValue::Text("transform")),
            ("input_node_ids", DefaultValue::EmptyArray),
            ("is_active", DefaultValue::Bool(true)),
        ],
        columns: &[
            NAME_COLUMN,
            required("node_type", "TEXT"),
            required("input_node_ids", "JSONB"),
            col("script", "TEXT"),
            col("config", "JSONB"),
            col("output_format", "TEXT"),
            IS_ACTIVE_COLUMN,
            CREATED_AT_COLUMN,
            UPDATED_AT_COLUMN,
        ],
        legacy: None,
    },
];

pub fn find(name: &str) -> Option<&'static CollectionSpec> {
    COLLECTIONS.iter().find(|c| c.name == name)
}

/// Logical names of every known collection, in migration order.
pub fn collection_names() -> Vec<&'static str> {
    COLLECTIONS.iter().map(|c| c.name).collect()
}

/// Remote table for a logical collection name.
///
/// Catalog entries use their fixed table; anything else is folded to
/// snake_case (`PriceSnapshot` → `price_snapshot`).
pub fn remote_table_name(name: &str) -> String {
    match find(name) {
        Some(spec) => spec.table.to_string(),
        None => fold_table_name(name),
    }
}

fn fold_table_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    out
}
