mod extract;
mod offers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use partquote_core::{Actor, LineValidationError, SelectionError, TransitionError, VatRate};
use partquote_db::DbError;
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{
    enforce_rate_limit, request_id, require_actor, AuthState, RateLimitState, RequestId,
    RouteAuth,
};
use crate::notify::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub notifier: Arc<dyn Notifier>,
    pub vat_rate: VatRate,
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
            "conflict" | "invalid_transition" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_db_error(request_id: &str, error: &DbError) -> ApiError {
    match error {
        DbError::NotFound => ApiError::new(request_id, "not_found", "offer not found"),
        DbError::StaleOfferStatus { .. } => {
            tracing::warn!(error = %error, "guarded offer write lost a race");
            ApiError::new(request_id, "conflict", error.to_string())
        }
        _ => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

pub(super) fn map_transition_error(request_id: &str, error: &TransitionError) -> ApiError {
    let code = match error {
        TransitionError::Forbidden { .. } => "forbidden",
        _ => "invalid_transition",
    };
    ApiError::new(request_id, code, error.to_string())
}

pub(super) fn map_selection_error(request_id: &str, error: &SelectionError) -> ApiError {
    ApiError::new(request_id, "validation_error", error.to_string())
}

pub(super) fn map_line_error(request_id: &str, error: &LineValidationError) -> ApiError {
    ApiError::new(request_id, "validation_error", error.to_string())
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn guarded(
    router: Router<AppState>,
    auth: &AuthState,
    allowed: &'static [Actor],
) -> Router<AppState> {
    router.route_layer(axum::middleware::from_fn_with_state(
        RouteAuth {
            auth: auth.clone(),
            allowed,
        },
        require_actor,
    ))
}

fn protected_router(auth: &AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    let admin = Router::new()
        .route(
            "/offer/admin",
            get(offers::list_offers).post(offers::create_offer),
        )
        .route("/offer/admin/{id}/send", patch(offers::send_offer))
        .route("/offer/admin/{id}/delivery", patch(offers::update_delivery))
        .route(
            "/offer/admin/{id}/update-products",
            put(offers::update_products),
        )
        .route("/offer/admin/{id}/add-products", post(offers::add_products));

    let client = Router::new()
        .route(
            "/offer/{id}/selected-parts",
            patch(offers::submit_selected_parts),
        )
        .route("/offer/{id}/accept", patch(offers::accept_offer))
        .route("/offer/{id}/reject", patch(offers::reject_offer));

    let shared = Router::new().route("/offer/{id}", get(offers::get_offer));

    Router::new()
        .merge(guarded(admin, auth, &[Actor::Admin]))
        .merge(guarded(client, auth, &[Actor::Client]))
        .merge(guarded(shared, auth, &[Actor::Admin, Actor::Client]))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ))
}

pub fn build_app(state: AppState, auth: &AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
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

    match partquote_db::health_check(&state.pool).await {
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
