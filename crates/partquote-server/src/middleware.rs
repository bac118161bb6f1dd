use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use partquote_core::Actor;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;

const ADMIN_KEYS_VAR: &str = "PARTQUOTE_ADMIN_API_KEYS";
const CLIENT_KEYS_VAR: &str = "PARTQUOTE_CLIENT_API_KEYS";

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Bearer keys per actor. A key identifies who is calling; the route group
/// decides which actor it must be.
#[derive(Debug, Clone)]
pub struct AuthState {
    admin_keys: Arc<HashSet<String>>,
    client_keys: Arc<HashSet<String>>,
    pub enabled: bool,
}

impl AuthState {
    /// Builds auth config from `PARTQUOTE_ADMIN_API_KEYS` and
    /// `PARTQUOTE_CLIENT_API_KEYS` (comma-separated bearer tokens).
    ///
    /// In development, both lists empty disables auth for local iteration.
    /// Outside development, either list empty fails startup.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let admin = parse_keys(&std::env::var(ADMIN_KEYS_VAR).unwrap_or_default());
        let client = parse_keys(&std::env::var(CLIENT_KEYS_VAR).unwrap_or_default());

        if admin.is_empty() && client.is_empty() && is_development {
            tracing::warn!(
                "{ADMIN_KEYS_VAR} and {CLIENT_KEYS_VAR} not set; bearer auth disabled in development environment"
            );
            return Ok(Self::disabled());
        }

        if !is_development {
            if admin.is_empty() {
                anyhow::bail!("{ADMIN_KEYS_VAR} is required outside development");
            }
            if client.is_empty() {
                anyhow::bail!("{CLIENT_KEYS_VAR} is required outside development");
            }
        }

        Ok(Self::from_keys(admin, client))
    }

    #[must_use]
    pub fn from_keys(admin: HashSet<String>, client: HashSet<String>) -> Self {
        Self {
            admin_keys: Arc::new(admin),
            client_keys: Arc::new(client),
            enabled: true,
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            admin_keys: Arc::new(HashSet::new()),
            client_keys: Arc::new(HashSet::new()),
            enabled: false,
        }
    }

    fn actor_for(&self, token: &str) -> Option<Actor> {
        if self.admin_keys.contains(token) {
            Some(Actor::Admin)
        } else if self.client_keys.contains(token) {
            Some(Actor::Client)
        } else {
            None
        }
    }
}

/// Auth settings for one route group: which actors may call it.
#[derive(Debug, Clone)]
pub struct RouteAuth {
    pub auth: AuthState,
    pub allowed: &'static [Actor],
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter for simple API protection.
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

/// Rejects in the same envelope the handlers use; the status follows the
/// error code.
fn middleware_error(req: &Request, code: &'static str, message: &'static str) -> Response {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    ApiError::new(request_id, code, message).into_response()
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

/// Middleware enforcing Bearer token auth for one route group.
///
/// Unknown or missing tokens get 401; a valid token of the wrong actor
/// gets 403.
pub async fn require_actor(
    State(route): State<RouteAuth>,
    req: Request,
    next: Next,
) -> Response {
    if !route.auth.enabled {
        return next.run(req).await;
    }

    let actor = extract_bearer_token(req.headers().get(AUTHORIZATION))
        .and_then(|token| route.auth.actor_for(token));

    match actor {
        Some(actor) if route.allowed.contains(&actor) => next.run(req).await,
        Some(_) => middleware_error(
            &req,
            "forbidden",
            "this key may not call this endpoint",
        ),
        None => middleware_error(
            &req,
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
            &req,
            "rate_limited",
            "rate limit exceeded",
        );
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}

fn parse_keys(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}
