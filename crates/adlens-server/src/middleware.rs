use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

const API_KEYS_VAR: &str = "ADLENS_API_KEYS";

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Who a bearer token belongs to. Stored as a request extension by
/// [`require_bearer_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Admin,
    Client(i64),
}

impl Principal {
    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Principal::Admin)
    }

    /// Admins read every client; a client token reads only its own data.
    #[must_use]
    pub fn can_read(self, client_id: i64) -> bool {
        match self {
            Principal::Admin => true,
            Principal::Client(own) => own == client_id,
        }
    }
}

#[derive(Debug, Clone)]
struct ApiKey {
    token: String,
    principal: Principal,
}

/// API key auth settings used by middleware.
#[derive(Debug, Clone)]
pub struct AuthState {
    keys: Arc<Vec<ApiKey>>,
    pub enabled: bool,
}

impl AuthState {
    /// Builds auth config from `ADLENS_API_KEYS`.
    ///
    /// In development, empty/missing keys disable auth for local iteration.
    /// In non-development envs, empty/missing keys fail startup.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var(API_KEYS_VAR).unwrap_or_default();
        Self::from_keys(&raw, is_development)
    }

    /// Parse comma-separated `admin:<token>` and `client-<id>:<token>` entries.
    pub fn from_keys(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let mut keys = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let Some((role, token)) = entry.split_once(':') else {
                anyhow::bail!("{API_KEYS_VAR} entry must look like <role>:<token>");
            };
            let token = token.trim();
            if token.is_empty() {
                anyhow::bail!("{API_KEYS_VAR} entry for '{role}' has an empty token");
            }
            let principal = match role.trim() {
                "admin" => Principal::Admin,
                other => {
                    let id = other
                        .strip_prefix("client-")
                        .and_then(|id| id.parse::<i64>().ok())
                        .ok_or_else(|| {
                            anyhow::anyhow!(
                                "{API_KEYS_VAR} role '{other}' must be 'admin' or 'client-<id>'"
                            )
                        })?;
                    Principal::Client(id)
                }
            };
            keys.push(ApiKey {
                token: token.to_owned(),
                principal,
            });
        }

        if keys.is_empty() {
            if is_development {
                tracing::warn!(
                    "ADLENS_API_KEYS not set; bearer auth disabled in development environment"
                );
                return Ok(Self {
                    keys: Arc::new(Vec::new()),
                    enabled: false,
                });
            }

            anyhow::bail!(
                "ADLENS_API_KEYS is required outside development; provide comma-separated role:token pairs"
            );
        }

        Ok(Self {
            keys: Arc::new(keys),
            enabled: true,
        })
    }

    /// Compares against every key without short-circuiting.
    fn resolve(&self, token: &str) -> Option<Principal> {
        let mut found = None;
        for key in self.keys.iter() {
            if bool::from(key.token.as_bytes().ct_eq(token.as_bytes())) && found.is_none() {
                found = Some(key.principal);
            }
        }
        found
    }
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Sliding fixed-window limiter for simple API protection.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }
}

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    error: MiddlewareError,
}

#[derive(Debug, Serialize)]
struct MiddlewareError {
    code: &'static str,
    message: &'static str,
}

fn middleware_error(status: StatusCode, code: &'static str, message: &'static str) -> Response {
    (
        status,
        Json(MiddlewareErrorBody {
            error: MiddlewareError { code, message },
        }),
    )
        .into_response()
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware enforcing Bearer token auth when enabled.
///
/// Inserts the resolved [`Principal`]; with auth disabled every request acts
/// as [`Principal::Admin`].
pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    if !auth.enabled {
        req.extensions_mut().insert(Principal::Admin);
        return next.run(req).await;
    }

    let principal = extract_bearer_token(req.headers().get(AUTHORIZATION))
        .and_then(|token| auth.resolve(token));

    match principal {
        Some(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        None => middleware_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid bearer token",
        ),
    }
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        return middleware_error(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "rate limit exceeded",
        );
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_bearer_token_accepts_valid_header() {
        let header = HeaderValue::from_static("Bearer test-token");
        assert_eq!(extract_bearer_token(Some(&header)), Some("test-token"));
    }

    #[test]
    fn extract_bearer_token_rejects_non_bearer_header() {
        let header = HeaderValue::from_static("Basic abc123");
        assert_eq!(extract_bearer_token(Some(&header)), None);
    }

    #[test]
    fn empty_keys_disable_auth_in_development() {
        let state = AuthState::from_keys("", true).expect("dev should allow missing keys");
        assert!(!state.enabled);
    }

    #[test]
    fn empty_keys_fail_outside_development() {
        assert!(AuthState::from_keys(" , ", false).is_err());
    }

    #[test]
    fn keys_resolve_to_principals() {
        let state = AuthState::from_keys("admin:root-token, client-7:seven", false).unwrap();
        assert!(state.enabled);
        assert_eq!(state.resolve("root-token"), Some(Principal::Admin));
        assert_eq!(state.resolve("seven"), Some(Principal::Client(7)));
        assert_eq!(state.resolve("seve"), None);
        assert_eq!(state.resolve(""), None);
    }

    #[test]
    fn malformed_entries_are_rejected() {
        assert!(AuthState::from_keys("no-colon", false).is_err());
        assert!(AuthState::from_keys("client-x:abc", false).is_err());
        assert!(AuthState::from_keys("guest:abc", false).is_err());
        assert!(AuthState::from_keys("admin:", false).is_err());
    }

    #[test]
    fn client_principal_reads_only_itself() {
        assert!(Principal::Client(3).can_read(3));
        assert!(!Principal::Client(3).can_read(4));
        assert!(Principal::Admin.can_read(4));
        assert!(!Principal::Client(3).is_admin());
    }
}
