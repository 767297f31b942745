use adlens_analytics::AnalyticsDocument;
use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::middleware::{Principal, RequestId};
use crate::pipeline::{self, BatchRefreshReport, RefreshReport, Trigger};

use super::{
    map_analytics_error, map_pipeline_error, require_admin, ApiError, ApiResponse, AppState,
};

/// The cached document. A client with nothing cached yet gets 404, never an
/// empty document.
pub(super) async fn get_analytics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Path(client_id): Path<i64>,
) -> Result<Json<ApiResponse<AnalyticsDocument>>, ApiError> {
    if !principal.can_read(client_id) {
        return Err(ApiError::new(
            req_id.0,
            "forbidden",
            "token is not valid for this client",
        ));
    }

    let document = state
        .cache
        .get(client_id)
        .await
        .map_err(|e| map_analytics_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(req_id.0, document))
}

pub(super) async fn refresh_client_analytics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
    Path(client_id): Path<i64>,
) -> Result<Json<ApiResponse<RefreshReport>>, ApiError> {
    require_admin(&req_id.0, principal)?;

    let report = pipeline::refresh_client(&state, client_id, Trigger::Api)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(req_id.0, report))
}

pub(super) async fn refresh_all_analytics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<BatchRefreshReport>>, ApiError> {
    require_admin(&req_id.0, principal)?;

    let report = pipeline::refresh_all(&state, Trigger::Api)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(req_id.0, report))
}
