use std::sync::Arc;

use chainwatch_store::migration::{MigrateOptions, Severity};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use super::support::{chain, Setup};

fn row(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("row literal must be an object"),
    }
}

#[tokio::test]
async fn copies_local_records_to_remote() {
    let s = Setup::new();
    s.seed_local(
        "ChainConfig",
        vec![chain("A", 1), chain("B", 56), chain("C", 137)],
    )
    .await;

    let result = s.engine().migrate(MigrateOptions::default(), None).await;

    assert!(result.success, "{}", result.summary);
    assert_eq!(
        result.summary,
        "Migration completed: 3 migrated, 0 skipped, 0 failed across 5 collections"
    );
    let outcome = result.outcome("ChainConfig").unwrap();
    assert_eq!(
        (outcome.total, outcome.migrated, outcome.skipped, outcome.failed),
        (3, 3, 0, 0)
    );
    assert_eq!(outcome.source.as_deref(), Some("local store"));

    assert_eq!(s.remote_names("chain_configs"), vec!["A", "B", "C"]);
    let rows = s.transport.rows("chain_configs");
    assert_eq!(rows[2]["chain_id"], json!(137));
    assert!(!rows[0].contains_key("status"));

    // Collections with no local data still count as successful.
    assert!(result.outcome("DataProcessingNode").unwrap().success);
}

#[tokio::test]
async fn second_run_skips_everything() {
    let s = Setup::new();
    s.seed_local("ChainConfig", vec![chain("eth", 1), chain("bsc", 56)]).await;
    let engine = s.engine_for(&["ChainConfig"]);

    engine.migrate(MigrateOptions::default(), None).await;
    let again = engine.migrate(MigrateOptions::default(), None).await;

    assert!(again.success);
    let outcome = again.outcome("ChainConfig").unwrap();
    assert_eq!((outcome.migrated, outcome.skipped), (0, 2));
    assert_eq!(s.transport.rows("chain_configs").len(), 2);
}

#[tokio::test]
async fn records_already_remote_are_skipped_by_name() {
    let s = Setup::new();
    s.transport
        .seed(
            "chain_configs",
            vec![row(json!({ "name": "eth", "chain_id": 1, "rpc_endpoint": "https://old" }))],
        )
        .unwrap();
    s.seed_local("ChainConfig", vec![chain("eth", 1), chain("bsc", 56)]).await;

    let result = s
        .engine_for(&["ChainConfig"])
        .migrate(MigrateOptions::default(), None)
        .await;

    let outcome = result.outcome("ChainConfig").unwrap();
    assert_eq!((outcome.migrated, outcome.skipped), (1, 1));
    assert_eq!(s.remote_names("chain_configs"), vec!["eth", "bsc"]);
    // The remote copy is left untouched.
    assert_eq!(s.transport.rows("chain_configs")[0]["rpc_endpoint"], json!("https://old"));
}

#[tokio::test]
async fn name_conflict_is_stored_under_a_backup_name() {
    let s = Setup::new();
    s.transport
        .seed(
            "chain_configs",
            vec![row(json!({ "name": "eth", "chain_id": 1, "rpc_endpoint": "https://old" }))],
        )
        .unwrap();
    s.seed_local("ChainConfig", vec![chain("eth", 1), chain("bsc", 56)]).await;

    let result = s
        .engine_for(&["ChainConfig"])
        .migrate(MigrateOptions { skip_existing: false }, None)
        .await;

    assert!(result.success, "{}", result.summary);
    let outcome = result.outcome("ChainConfig").unwrap();
    assert_eq!((outcome.migrated, outcome.renamed, outcome.failed), (2, 1, 0));

    let names = s.remote_names("chain_configs");
    assert_eq!(names.len(), 3);
    assert!(names.iter().any(|n| n.starts_with("eth_backup_")));
    assert!(names.contains(&"bsc".to_string()));
    assert!(result
        .log
        .iter()
        .any(|e| e.severity == Severity::Warning && e.message.contains("eth_backup_")));
}

#[tokio::test]
async fn rejected_record_fails_only_its_collection() {
    let s = Setup::new();
    // chain_id is required remotely.
    s.seed_local(
        "ChainConfig",
        vec![
            chain("eth", 1),
            super::support::record(json!({ "name": "broken", "rpcUrl": "https://rpc" })),
        ],
    )
    .await;

    let result = s
        .engine_for(&["ChainConfig"])
        .migrate(MigrateOptions::default(), None)
        .await;

    assert!(!result.success);
    assert!(result.summary.starts_with("Migration failed"));
    let outcome = result.outcome("ChainConfig").unwrap();
    assert_eq!((outcome.migrated, outcome.failed), (1, 1));
    assert_eq!(s.remote_names("chain_configs"), vec!["eth"]);
}

#[tokio::test]
async fn missing_remote_table_fails_that_collection_and_continues() {
    let s = Setup::new();
    s.transport.drop_table("api_configs");
    s.seed_local("ChainConfig", vec![chain("eth", 1)]).await;
    s.seed_local(
        "ApiConfig",
        vec![super::support::record(super::support::api("prices"))],
    )
    .await;

    let result = s
        .engine_for(&["ApiConfig", "ChainConfig"])
        .migrate(MigrateOptions::default(), None)
        .await;

    assert!(!result.success);
    assert!(result.summary.starts_with("Migration partially succeeded (1/2"));
    let api = result.outcome("ApiConfig").unwrap();
    assert!(!api.success);
    assert!(api.error.as_deref().unwrap().contains("reset-table ApiConfig"));
    assert!(result.outcome("ChainConfig").unwrap().success);
    assert_eq!(s.transport.rows("chain_configs").len(), 1);
}

#[tokio::test]
async fn unreachable_remote_fails_every_collection_with_data() {
    let s = Setup::new();
    s.seed_local("ChainConfig", vec![chain("eth", 1)]).await;
    s.transport.set_online(false);

    let result = s
        .engine_for(&["ChainConfig"])
        .migrate(MigrateOptions::default(), None)
        .await;

    assert!(!result.success);
    assert!(result.outcome("ChainConfig").unwrap().error.is_some());
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_100() {
    let s = Setup::new();
    s.seed_local("ChainConfig", vec![chain("eth", 1)]).await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let progress = move |pct: u8, message: &str| sink.lock().push((pct, message.to_string()));
    s.engine().migrate(MigrateOptions::default(), Some(&progress)).await;

    let seen = seen.lock();
    assert_eq!(seen.len(), 6);
    assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
    assert_eq!(seen.last().unwrap().0, 100);
    assert_eq!(seen[0], (0, "Migrating ChainConfig".to_string()));
}
