use adlens_analytics::RecorderSnapshot;
use axum::{extract::State, Extension, Json};

use crate::middleware::{Principal, RequestId};

use super::{require_admin, ApiError, ApiResponse, AppState};

/// Recent stage timings and failures held by the pipeline recorder.
pub(super) async fn get_pipeline_events(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<RecorderSnapshot>>, ApiError> {
    require_admin(&req_id.0, principal)?;
    Ok(ApiResponse::new(req_id.0, state.cache.recorder().snapshot()))
}
