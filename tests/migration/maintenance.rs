use std::sync::Arc;

use assert_matches::assert_matches;
use chainwatch_store::migration::MigrateOptions;
use chainwatch_store::StorageError;
use parking_lot::Mutex;

use super::support::{api, chain, record, Setup};

// ============================================================================
// validate
// ============================================================================

#[tokio::test]
async fn validation_passes_after_migration() {
    let s = Setup::new();
    s.seed_local("ChainConfig", vec![chain("eth", 1), chain("bsc", 56)]).await;
    let engine = s.engine();
    engine.migrate(MigrateOptions::default(), None).await;

    let report = engine.validate().await;

    assert!(report.success, "{}", report.summary);
    assert_eq!(report.checks.len(), 1);
    assert_eq!(report.checks[0].collection, "ChainConfig");
    assert_eq!(report.checks[0].remote_count, Some(2));
    assert_eq!(report.summary, "Validation passed for 1 collections");
}

#[tokio::test]
async fn validation_fails_when_remote_is_short() {
    let s = Setup::new();
    s.seed_local("ChainConfig", vec![chain("eth", 1), chain("bsc", 56)]).await;
    s.seed_local("ApiConfig", vec![record(api("prices"))]).await;
    s.engine_for(&["ApiConfig"])
        .migrate(MigrateOptions::default(), None)
        .await;

    let report = s.engine_for(&["ChainConfig", "ApiConfig"]).validate().await;

    assert!(!report.success);
    assert_eq!(report.summary, "Validation failed for 1 of 2 collections");
    let chains = &report.checks[0];
    assert!(!chains.passed);
    assert_eq!((chains.local_count, chains.remote_count), (2, Some(0)));
    assert!(chains.message.contains("missing 2 records"));
    assert!(report.checks[1].passed);
}

#[tokio::test]
async fn validation_with_no_local_data_is_not_a_pass() {
    let s = Setup::new();
    let report = s.engine().validate().await;

    assert!(!report.success);
    assert!(report.checks.is_empty());
    assert!(report.summary.starts_with("Nothing to validate"));
}

#[tokio::test]
async fn validation_reports_unreadable_remote() {
    let s = Setup::new();
    s.seed_local("ChainConfig", vec![chain("eth", 1)]).await;
    s.transport.drop_table("chain_configs");

    let report = s.engine_for(&["ChainConfig"]).validate().await;

    assert!(!report.success);
    assert_eq!(report.checks[0].remote_count, None);
    assert!(report.checks[0].message.starts_with("cannot read remote records"));
}

// ============================================================================
// wipe
// ============================================================================

#[tokio::test]
async fn wipe_clears_every_table_and_skips_missing_ones() {
    let s = Setup::new();
    s.seed_local("ChainConfig", vec![chain("eth", 1)]).await;
    s.engine().migrate(MigrateOptions::default(), None).await;
    s.transport.drop_table("data_processing_nodes");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let progress = move |pct: u8, _: &str| sink.lock().push(pct);
    let report = s.engine().wipe_remote_data(Some(&progress)).await;

    assert!(report.success, "{}", report.summary);
    assert_eq!(report.cleared.len(), 4);
    assert!(!report.cleared.contains(&"DataProcessingNode".to_string()));
    assert_eq!(report.summary, "Cleared 4 of 5 remote tables");
    assert!(s.transport.rows("chain_configs").is_empty());
    assert_eq!(seen.lock().last(), Some(&100));
}

#[tokio::test]
async fn wipe_reports_network_failures() {
    let s = Setup::new();
    s.transport.set_online(false);

    let report = s.engine_for(&["ChainConfig"]).wipe_remote_data(None).await;

    assert!(!report.success);
    assert!(report.cleared.is_empty());
    assert_eq!(report.summary, "Wipe failed for 1 of 1 remote tables");
}

// ============================================================================
// reset
// ============================================================================

#[tokio::test]
async fn reset_recreates_an_empty_table() {
    let s = Setup::new();
    s.seed_local("ChainConfig", vec![chain("eth", 1)]).await;
    s.engine().migrate(MigrateOptions::default(), None).await;
    assert_eq!(s.transport.rows("chain_configs").len(), 1);

    s.engine().drop_and_recreate_table("ChainConfig").await.unwrap();

    assert!(s.transport.has_table("chain_configs"));
    assert!(s.transport.rows("chain_configs").is_empty());
    let sql = s.transport.executed_sql();
    assert!(sql[0].starts_with("DROP TABLE IF EXISTS public.chain_configs"));
    assert!(sql[1].starts_with("CREATE TABLE IF NOT EXISTS public.chain_configs"));
}

#[tokio::test]
async fn reset_restores_a_missing_table_so_migration_can_proceed() {
    let s = Setup::new();
    s.transport.drop_table("api_configs");
    s.seed_local("ApiConfig", vec![record(api("prices"))]).await;
    let engine = s.engine_for(&["ApiConfig"]);

    assert!(!engine.migrate(MigrateOptions::default(), None).await.success);
    engine.drop_and_recreate_table("ApiConfig").await.unwrap();
    assert!(engine.migrate(MigrateOptions::default(), None).await.success);
    assert_eq!(s.remote_names("api_configs"), vec!["prices"]);
}

#[tokio::test]
async fn reset_rejects_unknown_collections() {
    let s = Setup::new();
    let err = s.engine().drop_and_recreate_table("Nope").await.unwrap_err();
    assert_matches!(err, StorageError::InvalidConfig(ref m) if m.contains("ChainConfig"));
    assert!(s.transport.executed_sql().is_empty());
}
