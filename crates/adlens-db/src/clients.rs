//! Read access to the `clients` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const CLIENT_COLUMNS: &str = "id, public_id, name, slug, ad_account_id, notes, is_active, \
                              created_at, updated_at";

/// A row from the `clients` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClientRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub slug: String,
    /// Stored without the `act_` prefix.
    pub ad_account_id: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// All active clients ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_clients(pool: &PgPool) -> Result<Vec<ClientRow>, DbError> {
    let rows = sqlx::query_as::<_, ClientRow>(&format!(
        "SELECT {CLIENT_COLUMNS} FROM clients WHERE is_active = true ORDER BY name"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Every client, active or not, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_clients(pool: &PgPool) -> Result<Vec<ClientRow>, DbError> {
    let rows = sqlx::query_as::<_, ClientRow>(&format!(
        "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY name"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_client_by_slug(pool: &PgPool, slug: &str) -> Result<Option<ClientRow>, DbError> {
    let row = sqlx::query_as::<_, ClientRow>(&format!(
        "SELECT {CLIENT_COLUMNS} FROM clients WHERE slug = $1"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_client_by_id(pool: &PgPool, id: i64) -> Result<Option<ClientRow>, DbError> {
    let row = sqlx::query_as::<_, ClientRow>(&format!(
        "SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
