use adlens_core::{current_month, parse_month};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::middleware::{Principal, RequestId};
use crate::pipeline::{self, CollectionReport, Trigger};

use super::{map_db_error, map_pipeline_error, require_admin, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CollectionQuery {
    /// `YYYY-MM`; defaults to the current month.
    pub month: Option<String>,
    /// Rebuild the cached document afterwards. Defaults to true.
    pub refresh: Option<bool>,
}

pub(super) async fn trigger_collection(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Path(client_id): Path<i64>,
    Query(query): Query<CollectionQuery>,
) -> Result<Json<ApiResponse<CollectionReport>>, ApiError> {
    require_admin(&req_id.0, principal)?;

    let month_year = query.month.unwrap_or_else(|| current_month(Utc::now()));
    if let Err(e) = parse_month(&month_year) {
        return Err(ApiError::new(req_id.0, "validation_error", e.to_string()));
    }

    let client = adlens_db::get_client_by_id(&state.pool, client_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("client {client_id} not found"),
            )
        })?;

    let report = pipeline::collect_client(
        &state,
        &client,
        &month_year,
        Trigger::Api,
        query.refresh.unwrap_or(true),
    )
    .await
    .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(req_id.0, report))
}
