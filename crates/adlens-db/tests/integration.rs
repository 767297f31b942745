//! Offline tests for adlens-db pool configuration and row types.
//! These tests do not require a live database connection.

use adlens_core::{AppConfig, Environment};
use adlens_db::{CollectionRunRow, NewDimensionRow, PoolConfig};
use rust_decimal::Decimal;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        clients_path: PathBuf::from("./config/clients.yaml"),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        ads_api_base_url: "https://graph.example.test/v19.0/".to_string(),
        ads_access_token: None,
        ads_request_timeout_secs: 30,
        ads_max_retries: 3,
        ads_retry_backoff_base_ms: 2000,
        refresh_delay_ms: 500,
        recorder_capacity: 256,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn collection_run_row_has_expected_fields() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = CollectionRunRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        run_type: "collection".to_string(),
        trigger_source: "scheduler".to_string(),
        status: "queued".to_string(),
        started_at: None,
        completed_at: None,
        records_processed: 0_i32,
        error_message: None,
        created_at: Utc::now(),
    };

    assert_eq!(row.run_type, "collection");
    assert_eq!(row.trigger_source, "scheduler");
    assert!(row.started_at.is_none());
    assert!(row.error_message.is_none());
}

#[tokio::test]
async fn connect_pool_rejects_blank_url() {
    let err = adlens_db::connect_pool("  ", PoolConfig::default())
        .await
        .expect_err("blank url must fail");
    assert!(matches!(err, adlens_db::DbError::MissingDatabaseUrl));
}

#[test]
fn new_dimension_row_carries_decimal_spend() {
    let row = NewDimensionRow {
        dimension: "campaigns".to_string(),
        natural_key: "c1".to_string(),
        attributes: serde_json::json!({"campaign_name": "Spring"}),
        spend: Decimal::new(12_345, 2),
        impressions: 1000,
        clicks: 10,
        reach: 800,
        ctr: Some(1.0),
        cpc: None,
        cpm: None,
        actions_total: 3.0,
    };
    assert_eq!(row.spend.to_string(), "123.45");
}
