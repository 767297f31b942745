mod analytics;
mod collection_runs;
mod collections;
mod pipeline_events;

use std::sync::Arc;
use std::time::Duration;

use adlens_analytics::{AnalyticsError, CacheManager, PgStore, PipelineRecorder};
use adlens_source::AdsClient;
use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, Principal, RateLimitState,
    RequestId,
};
use crate::pipeline::PipelineError;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub cache: Arc<CacheManager<PgStore>>,
    /// `None` when no ads API token is configured; collection is then refused.
    pub source: Option<Arc<AdsClient>>,
}

impl AppState {
    #[must_use]
    pub fn new(
        pool: PgPool,
        source: Option<AdsClient>,
        recorder: Arc<PipelineRecorder>,
        refresh_delay: Duration,
    ) -> Self {
        let cache = CacheManager::new(PgStore::new(pool.clone()), recorder, refresh_delay);
        Self {
            pool,
            cache: Arc::new(cache),
            source: source.map(Arc::new),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(request_id: String, data: T) -> Json<Self> {
        Json(Self {
            data,
            meta: ResponseMeta::new(request_id),
        })
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            "unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_db_error(request_id: String, error: &adlens_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

pub(super) fn map_analytics_error(request_id: String, error: &AnalyticsError) -> ApiError {
    match error {
        AnalyticsError::CacheMiss { .. } | AnalyticsError::NoCollection { .. } => {
            ApiError::new(request_id, "not_found", error.to_string())
        }
        AnalyticsError::Validation { .. } => {
            ApiError::new(request_id, "upstream_error", error.to_string())
        }
        AnalyticsError::Encode(_) => {
            tracing::error!(error = %error, "record encoding failed");
            ApiError::new(request_id, "internal_error", "record encoding failed")
        }
        AnalyticsError::Storage(db) => map_db_error(request_id, db),
    }
}

pub(super) fn map_pipeline_error(request_id: String, error: &PipelineError) -> ApiError {
    match error {
        PipelineError::SourceNotConfigured => {
            ApiError::new(request_id, "unavailable", error.to_string())
        }
        PipelineError::ClientNotFound { .. } => {
            ApiError::new(request_id, "not_found", error.to_string())
        }
        PipelineError::NoAdAccount { .. } => ApiError::new(request_id, "conflict", error.to_string()),
        PipelineError::Source(_) => ApiError::new(request_id, "upstream_error", error.to_string()),
        PipelineError::Analytics(e) => map_analytics_error(request_id, e),
        PipelineError::Db(e) => map_db_error(request_id, e),
    }
}

pub(super) fn require_admin(request_id: &str, principal: Principal) -> Result<(), ApiError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(ApiError::new(
            request_id,
            "forbidden",
            "this operation requires an admin token",
        ))
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/clients/{client_id}/analytics",
            get(analytics::get_analytics),
        )
        .route(
            "/api/v1/clients/{client_id}/analytics/refresh",
            post(analytics::refresh_client_analytics),
        )
        .route("/api/v1/analytics/refresh", post(analytics::refresh_all_analytics))
        .route(
            "/api/v1/clients/{client_id}/collections",
            post(collections::trigger_collection),
        )
        .route(
            "/api/v1/collection-runs",
            get(collection_runs::list_collection_runs),
        )
        .route(
            "/api/v1/pipeline/events",
            get(pipeline_events::get_pipeline_events),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match adlens_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
