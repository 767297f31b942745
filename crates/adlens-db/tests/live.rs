//! Live integration tests for adlens-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database from the sqlx
//! test harness. `"../../migrations"` is relative to `crates/adlens-db/`.

use adlens_core::ClientConfig;
use adlens_db::{
    complete_collection_run, count_dimension_rows, create_collection_run, fail_collection_run,
    get_analytics_cache, get_client_by_id, get_client_by_slug, get_collection_run,
    get_latest_raw_collection, list_active_clients, list_client_ids_with_collections,
    list_collection_run_clients, record_collection_run_client, replace_dimension_rows,
    seed_clients, start_collection_run, store_collection_with_rows, upsert_analytics_cache,
    upsert_raw_collection, DbError, NewDimensionRow, NewRawCollection,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn client(name: &str, account: Option<&str>, is_active: bool) -> ClientConfig {
    ClientConfig {
        name: name.to_string(),
        ad_account_id: account.map(str::to_string),
        is_active,
        notes: None,
    }
}

async fn seeded_client_id(pool: &sqlx::PgPool, name: &str) -> i64 {
    seed_clients(pool, &[client(name, Some("act_111"), true)])
        .await
        .unwrap_or_else(|e| panic!("seed_clients failed for '{name}': {e}"));
    let slug = client(name, None, true).slug();
    get_client_by_slug(pool, &slug)
        .await
        .expect("get_client_by_slug failed")
        .unwrap_or_else(|| panic!("client '{slug}' missing after seed"))
        .id
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

async fn store_raw(
    pool: &sqlx::PgPool,
    client_id: i64,
    month_year: &str,
    scraped_at: DateTime<Utc>,
    marker: &str,
) -> i64 {
    let payload = json!({ "marker": marker });
    upsert_raw_collection(
        pool,
        client_id,
        &NewRawCollection {
            month_year,
            account_id: "111",
            scraped_at,
            date_since: date(1),
            date_until: date(31),
            total_records: 4,
            payload: &payload,
        },
    )
    .await
    .expect("upsert_raw_collection failed")
}

fn dimension_row(dimension: &str, key: &str, spend_cents: i64) -> NewDimensionRow {
    NewDimensionRow {
        dimension: dimension.to_string(),
        natural_key: key.to_string(),
        attributes: json!({}),
        spend: Decimal::new(spend_cents, 2),
        impressions: 100,
        clicks: 5,
        reach: 80,
        ctr: Some(5.0),
        cpc: None,
        cpm: None,
        actions_total: 0.0,
    }
}

// ---------------------------------------------------------------------------
// Clients and seeding
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn seed_clients_is_idempotent_and_strips_prefix(pool: sqlx::PgPool) {
    let roster = vec![
        client("Northwind Dental", Some("act_100200300"), true),
        client("Juniper Bakery", None, false),
    ];
    assert_eq!(seed_clients(&pool, &roster).await.unwrap(), 2);
    assert_eq!(seed_clients(&pool, &roster).await.unwrap(), 2);

    let northwind = get_client_by_slug(&pool, "northwind-dental")
        .await
        .unwrap()
        .expect("northwind should exist");
    assert_eq!(northwind.ad_account_id.as_deref(), Some("100200300"));

    let active = list_active_clients(&pool).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].slug, "northwind-dental");
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_client_by_id_returns_none_for_unknown(pool: sqlx::PgPool) {
    assert!(get_client_by_id(&pool, 9_999).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Raw collections
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn latest_raw_collection_is_by_scraped_at(pool: sqlx::PgPool) {
    let client_id = seeded_client_id(&pool, "Harbor Fitness").await;
    store_raw(&pool, client_id, "2025-02", at(20, 9), "feb").await;
    store_raw(&pool, client_id, "2025-03", at(10, 9), "mar").await;

    let latest = get_latest_raw_collection(&pool, client_id)
        .await
        .unwrap()
        .expect("a snapshot should exist");
    assert_eq!(latest.month_year, "2025-02");
    assert_eq!(latest.payload["marker"], "feb");
}

#[sqlx::test(migrations = "../../migrations")]
async fn recollecting_a_month_replaces_the_snapshot(pool: sqlx::PgPool) {
    let client_id = seeded_client_id(&pool, "Harbor Fitness").await;
    let first = store_raw(&pool, client_id, "2025-03", at(5, 9), "first").await;
    let second = store_raw(&pool, client_id, "2025-03", at(6, 9), "second").await;
    assert_eq!(first, second);

    let latest = get_latest_raw_collection(&pool, client_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.payload["marker"], "second");
    assert_eq!(latest.scraped_at, at(6, 9));
}

#[sqlx::test(migrations = "../../migrations")]
async fn client_ids_with_collections_are_distinct(pool: sqlx::PgPool) {
    let a = seeded_client_id(&pool, "Alpha").await;
    seed_clients(&pool, &[client("Beta", Some("222"), true)])
        .await
        .unwrap();
    store_raw(&pool, a, "2025-02", at(1, 1), "x").await;
    store_raw(&pool, a, "2025-03", at(2, 1), "y").await;

    let ids = list_client_ids_with_collections(&pool).await.unwrap();
    assert_eq!(ids, vec![a]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn raw_collection_rejects_malformed_month(pool: sqlx::PgPool) {
    let client_id = seeded_client_id(&pool, "Harbor Fitness").await;
    let payload = json!({});
    let result = upsert_raw_collection(
        &pool,
        client_id,
        &NewRawCollection {
            month_year: "2025-3",
            account_id: "111",
            scraped_at: at(1, 0),
            date_since: date(1),
            date_until: date(2),
            total_records: 0,
            payload: &payload,
        },
    )
    .await;
    assert!(matches!(result, Err(DbError::Sqlx(_))));
}

// ---------------------------------------------------------------------------
// Dimension rows
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn replace_dimension_rows_upserts_and_prunes(pool: sqlx::PgPool) {
    let client_id = seeded_client_id(&pool, "Harbor Fitness").await;
    let source = store_raw(&pool, client_id, "2025-03", at(5, 9), "m").await;

    let first = vec![
        dimension_row("campaigns", "c1", 1_000),
        dimension_row("campaigns", "c2", 2_000),
        dimension_row("regional", "Texas", 500),
    ];
    let (upserted, removed) = replace_dimension_rows(&pool, client_id, "2025-03", source, &first)
        .await
        .unwrap();
    assert_eq!((upserted, removed), (3, 0));

    let second = vec![
        dimension_row("campaigns", "c1", 1_500),
        dimension_row("regional", "Texas", 500),
    ];
    let (upserted, removed) = replace_dimension_rows(&pool, client_id, "2025-03", source, &second)
        .await
        .unwrap();
    assert_eq!((upserted, removed), (2, 1));

    let counts = count_dimension_rows(&pool, client_id, "2025-03").await.unwrap();
    assert_eq!(
        counts,
        vec![("campaigns".to_string(), 1), ("regional".to_string(), 1)]
    );

    let spend: Decimal = sqlx::query_scalar(
        "SELECT spend FROM dimension_rows WHERE client_id = $1 AND natural_key = 'c1'",
    )
    .bind(client_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(spend, Decimal::new(1_500, 2));
}

#[sqlx::test(migrations = "../../migrations")]
async fn replace_dimension_rows_with_empty_set_clears_month(pool: sqlx::PgPool) {
    let client_id = seeded_client_id(&pool, "Harbor Fitness").await;
    let source = store_raw(&pool, client_id, "2025-03", at(5, 9), "m").await;
    replace_dimension_rows(
        &pool,
        client_id,
        "2025-03",
        source,
        &[dimension_row("devices", "mobile_app", 100)],
    )
    .await
    .unwrap();

    let (_, removed) = replace_dimension_rows(&pool, client_id, "2025-03", source, &[])
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(count_dimension_rows(&pool, client_id, "2025-03")
        .await
        .unwrap()
        .is_empty());
}

fn snapshot<'a>(payload: &'a serde_json::Value, scraped_at: DateTime<Utc>) -> NewRawCollection<'a> {
    NewRawCollection {
        month_year: "2025-03",
        account_id: "111",
        scraped_at,
        date_since: date(1),
        date_until: date(31),
        total_records: 2,
        payload,
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn snapshot_and_rows_are_stored_together(pool: sqlx::PgPool) {
    let client_id = seeded_client_id(&pool, "Harbor Fitness").await;
    let payload = json!({ "marker": "first" });
    let stored = store_collection_with_rows(
        &pool,
        client_id,
        &snapshot(&payload, at(5, 9)),
        &[
            dimension_row("campaigns", "c1", 1_000),
            dimension_row("regional", "Texas", 500),
        ],
    )
    .await
    .unwrap();
    assert_eq!((stored.rows_written, stored.rows_removed), (2, 0));

    let latest = get_latest_raw_collection(&pool, client_id).await.unwrap().unwrap();
    assert_eq!(latest.id, stored.raw_collection_id);
    let source: Option<i64> = sqlx::query_scalar(
        "SELECT source_collection_id FROM dimension_rows WHERE natural_key = 'c1'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(source, Some(stored.raw_collection_id));
}

#[sqlx::test(migrations = "../../migrations")]
async fn rejected_row_rolls_back_the_snapshot(pool: sqlx::PgPool) {
    let client_id = seeded_client_id(&pool, "Harbor Fitness").await;
    let first = json!({ "marker": "first" });
    store_collection_with_rows(
        &pool,
        client_id,
        &snapshot(&first, at(5, 9)),
        &[dimension_row("campaigns", "c1", 1_000)],
    )
    .await
    .unwrap();

    // 10^13 does not fit NUMERIC(14, 2).
    let second = json!({ "marker": "second" });
    let result = store_collection_with_rows(
        &pool,
        client_id,
        &snapshot(&second, at(6, 9)),
        &[
            dimension_row("campaigns", "c2", 2_000),
            dimension_row("campaigns", "c3", 1_000_000_000_000_000),
        ],
    )
    .await;
    assert!(matches!(result, Err(DbError::Sqlx(_))));

    let latest = get_latest_raw_collection(&pool, client_id).await.unwrap().unwrap();
    assert_eq!(latest.payload["marker"], "first");
    assert_eq!(latest.scraped_at, at(5, 9));
    assert_eq!(
        count_dimension_rows(&pool, client_id, "2025-03").await.unwrap(),
        vec![("campaigns".to_string(), 1)]
    );
}

// ---------------------------------------------------------------------------
// Analytics cache
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn analytics_cache_keeps_one_row_per_client(pool: sqlx::PgPool) {
    let client_id = seeded_client_id(&pool, "Harbor Fitness").await;
    assert!(get_analytics_cache(&pool, client_id).await.unwrap().is_none());

    upsert_analytics_cache(&pool, client_id, "2025-02", at(1, 0), 1, &json!({"v": 1}))
        .await
        .unwrap();
    upsert_analytics_cache(&pool, client_id, "2025-03", at(2, 0), 2, &json!({"v": 2}))
        .await
        .unwrap();

    let row = get_analytics_cache(&pool, client_id).await.unwrap().unwrap();
    assert_eq!(row.month_year, "2025-03");
    assert_eq!(row.source_data_id, 2);
    assert_eq!(row.document["v"], 2);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analytics_cache")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

// ---------------------------------------------------------------------------
// Collection run lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn collection_run_lifecycle_queued_to_succeeded(pool: sqlx::PgPool) {
    let run = create_collection_run(&pool, "collection", "cli")
        .await
        .expect("create_collection_run failed");
    assert_eq!(run.status, "queued");
    assert!(run.started_at.is_none());

    start_collection_run(&pool, run.id).await.unwrap();
    complete_collection_run(&pool, run.id, 12).await.unwrap();

    let fetched = get_collection_run(&pool, run.id).await.unwrap();
    assert_eq!(fetched.status, "succeeded");
    assert!(fetched.started_at.is_some());
    assert!(fetched.completed_at.is_some());
    assert_eq!(fetched.records_processed, 12);
}

#[sqlx::test(migrations = "../../migrations")]
async fn collection_run_lifecycle_queued_to_failed(pool: sqlx::PgPool) {
    let run = create_collection_run(&pool, "batch_refresh", "scheduler")
        .await
        .unwrap();
    start_collection_run(&pool, run.id).await.unwrap();
    fail_collection_run(&pool, run.id, "ads api unavailable")
        .await
        .unwrap();

    let fetched = get_collection_run(&pool, run.id).await.unwrap();
    assert_eq!(fetched.status, "failed");
    assert_eq!(fetched.error_message.as_deref(), Some("ads api unavailable"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn collection_run_cannot_complete_directly_from_queued(pool: sqlx::PgPool) {
    let run = create_collection_run(&pool, "refresh", "api").await.unwrap();
    let err = complete_collection_run(&pool, run.id, 1)
        .await
        .expect_err("completing a queued run must fail");
    assert!(matches!(
        err,
        DbError::InvalidCollectionRunTransition {
            expected_status: "running",
            ..
        }
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn collection_run_rejects_unknown_run_type(pool: sqlx::PgPool) {
    let result = create_collection_run(&pool, "products", "cli").await;
    assert!(matches!(result, Err(DbError::Sqlx(_))));
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_collection_run_not_found(pool: sqlx::PgPool) {
    let err = get_collection_run(&pool, 404).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn collection_run_client_outcome_overwrites_on_conflict(pool: sqlx::PgPool) {
    let client_id = seeded_client_id(&pool, "Harbor Fitness").await;
    let run = create_collection_run(&pool, "collection", "cli").await.unwrap();

    record_collection_run_client(&pool, run.id, client_id, "failed", 0, Some("timeout"))
        .await
        .unwrap();
    record_collection_run_client(&pool, run.id, client_id, "succeeded", 42, None)
        .await
        .unwrap();

    let rows = list_collection_run_clients(&pool, run.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, "succeeded");
    assert_eq!(rows[0].records_processed, 42);
    assert!(rows[0].error_message.is_none());
}
