use adlens_core::ClientConfig;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Upsert clients from the roster file into the database, keyed by slug.
///
/// Returns the number of clients processed. All upserts share one
/// transaction, so a failure leaves the table untouched.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_clients(pool: &PgPool, clients: &[ClientConfig]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for client in clients {
        sqlx::query(
            "INSERT INTO clients (public_id, name, slug, ad_account_id, notes, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (slug) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 ad_account_id = EXCLUDED.ad_account_id, \
                 notes = EXCLUDED.notes, \
                 is_active = EXCLUDED.is_active, \
                 updated_at = NOW()",
        )
        .bind(Uuid::new_v4())
        .bind(&client.name)
        .bind(client.slug())
        .bind(client.normalized_account_id())
        .bind(&client.notes)
        .bind(client.is_active)
        .execute(&mut *tx)
        .await?;

        count += 1;
    }

    tx.commit().await?;
    Ok(count)
}
