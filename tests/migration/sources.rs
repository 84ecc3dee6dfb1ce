use chainwatch_store::migration::MigrateOptions;
use serde_json::json;

use super::support::{api, record, Setup};

#[tokio::test]
async fn legacy_entries_win_and_placeholders_are_dropped() {
    let s = Setup::new();
    s.seed_legacy(
        "legacy:ApiConfig",
        json!([api("Test API"), api("prices"), api("Example API"), api("gas")]),
    );
    s.seed_local("ApiConfig", vec![record(api("from-primary"))]).await;

    let result = s
        .engine_for(&["ApiConfig"])
        .migrate(MigrateOptions::default(), None)
        .await;

    assert!(result.success, "{}", result.summary);
    let outcome = result.outcome("ApiConfig").unwrap();
    assert_eq!(outcome.source.as_deref(), Some("legacy key-value store"));
    assert_eq!((outcome.total, outcome.migrated), (2, 2));
    assert_eq!(s.remote_names("api_configs"), vec!["prices", "gas"]);

    let row = &s.transport.rows("api_configs")[0];
    assert_eq!(row["method"], json!("GET"));
    assert_eq!(row["headers"], json!({}));
}

#[tokio::test]
async fn placeholder_only_legacy_data_falls_through_to_primary_store() {
    let s = Setup::new();
    s.seed_legacy("legacy:ApiConfig", json!([api("Test API")]));
    s.seed_local("ApiConfig", vec![record(api("from-primary"))]).await;

    let result = s
        .engine_for(&["ApiConfig"])
        .migrate(MigrateOptions::default(), None)
        .await;

    let outcome = result.outcome("ApiConfig").unwrap();
    assert_eq!(outcome.source.as_deref(), Some("local store"));
    assert_eq!(s.remote_names("api_configs"), vec!["from-primary"]);
}

#[tokio::test]
async fn legacy_alert_type_is_translated() {
    let s = Setup::new();
    s.seed_legacy(
        "legacy:AlertConfig",
        json!([
            { "name": "Example Alert", "type": "price" },
            { "name": "gas spike", "type": "gas", "lastTriggered": 1_700_000_000_000_i64 }
        ]),
    );

    let result = s
        .engine_for(&["AlertConfig"])
        .migrate(MigrateOptions::default(), None)
        .await;

    assert!(result.success, "{}", result.summary);
    let rows = s.transport.rows("alert_configs");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["alert_type"], json!("gas"));
    assert_eq!(rows[0]["conditions"], json!([]));
    assert_eq!(rows[0]["last_triggered_at"], json!("2023-11-14T22:13:20.000Z"));
}

#[tokio::test]
async fn malformed_legacy_entry_fails_the_collection() {
    let s = Setup::new();
    s.local
        .kv_set("legacy:AlertConfig", "{\"not\": \"an array\"}")
        .unwrap();

    let result = s
        .engine_for(&["AlertConfig"])
        .migrate(MigrateOptions::default(), None)
        .await;

    let outcome = result.outcome("AlertConfig").unwrap();
    assert!(!outcome.success);
    assert!(outcome.error.as_deref().unwrap().contains("not a JSON array"));
}

#[tokio::test]
async fn empty_sources_are_reported_as_nothing_to_migrate() {
    let s = Setup::new();
    s.seed_legacy("legacy:ApiConfig", json!([]));

    let result = s
        .engine_for(&["ApiConfig", "ChainConfig"])
        .migrate(MigrateOptions::default(), None)
        .await;

    assert!(result.success);
    assert!(result
        .log
        .iter()
        .any(|e| e.message == "ApiConfig: local source is empty; nothing to migrate"));
    assert!(result
        .log
        .iter()
        .any(|e| e.message == "ChainConfig: no local data found; nothing to migrate"));
}
