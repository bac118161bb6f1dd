//! Admin-side offer handlers: list, create, send, part-line edits and
//! delivery-status updates.

use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use partquote_core::{Actor, NewPartLine, Offer, OfferAction, OfferStatus};
use partquote_db::OfferFilter;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::super::extract::{ApiJson, ApiPath, ApiQuery};
use super::super::{map_db_error, map_line_error, ApiError, ApiResponse, AppState};
use super::{commit, load_offer, map_offer_error, ok, run_action, OfferView};

const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 100;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct ListOffersQuery {
    pub status: Option<String>,
    pub order_id: Option<Uuid>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct CreateOfferRequest {
    pub order_id: Uuid,
    #[serde(default)]
    pub parts: Vec<NewPartLine>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct PartLinesRequest {
    pub parts: Vec<NewPartLine>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct DeliveryRequest {
    pub delivery_status: String,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct OfferPage {
    pub items: Vec<OfferView>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(in crate::api) fn normalize_page(page: Option<i64>) -> i64 {
    page.unwrap_or(1).max(1)
}

pub(in crate::api) fn normalize_per_page(per_page: Option<i64>) -> i64 {
    per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
}

/// Maps a requested delivery status onto the admin action that reaches it.
pub(in crate::api) fn delivery_action(status: OfferStatus) -> Option<OfferAction> {
    match status {
        OfferStatus::DeliveryProcessing => Some(OfferAction::StartDelivery),
        OfferStatus::Delivered => Some(OfferAction::MarkDelivered),
        OfferStatus::Cancelled => Some(OfferAction::Cancel),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /offer/admin: paginated offer list, newest first.
pub(in crate::api) async fn list_offers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<ListOffersQuery>,
) -> Result<Json<ApiResponse<OfferPage>>, ApiError> {
    let rid = &req_id.0;

    let status = query
        .status
        .as_deref()
        .map(str::parse::<OfferStatus>)
        .transpose()
        .map_err(|e| ApiError::new(rid, "validation_error", e))?;
    let page = normalize_page(query.page);
    let per_page = normalize_per_page(query.per_page);

    let filter = OfferFilter {
        status,
        order_id: query.order_id,
        limit: per_page,
        offset: (page - 1).saturating_mul(per_page),
    };
    let offers = partquote_db::list_offers(&state.pool, &filter)
        .await
        .map_err(|e| map_db_error(rid, &e))?;
    let total = partquote_db::count_offers(&state.pool, &filter)
        .await
        .map_err(|e| map_db_error(rid, &e))?;

    let items = offers
        .into_iter()
        .map(|offer| OfferView::new(offer, state.vat_rate))
        .collect();
    Ok(ok(
        req_id,
        OfferPage {
            items,
            total,
            page,
            per_page,
        },
    ))
}

/// POST /offer/admin: create a `proiect` offer for an order.
pub(in crate::api) async fn create_offer(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiJson(body): ApiJson<CreateOfferRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OfferView>>), ApiError> {
    let rid = &req_id.0;

    let offer = Offer::new(body.order_id, body.parts).map_err(|e| map_line_error(rid, &e))?;
    let stored = partquote_db::insert_offer(&state.pool, &offer)
        .await
        .map_err(|e| match e {
            partquote_db::DbError::NotFound => ApiError::new(
                rid,
                "not_found",
                format!("order {} not found", body.order_id),
            ),
            other => map_db_error(rid, &other),
        })?;

    tracing::info!(
        offer_id = %stored.id,
        order_id = %stored.order_id,
        parts = stored.parts.len(),
        "offer created"
    );
    let view = OfferView::new(stored, state.vat_rate);
    Ok((StatusCode::CREATED, ok(req_id, view)))
}

/// PATCH /offer/admin/:id/send: `proiect` → `trimisa`.
pub(in crate::api) async fn send_offer(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<OfferView>>, ApiError> {
    let offer = run_action(&state, id, OfferAction::Send, Actor::Admin, &req_id.0).await?;
    Ok(ok(req_id, OfferView::new(offer, state.vat_rate)))
}

/// PATCH /offer/admin/:id/delivery: delivery progress or cancellation.
pub(in crate::api) async fn update_delivery(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<DeliveryRequest>,
) -> Result<Json<ApiResponse<OfferView>>, ApiError> {
    let rid = &req_id.0;

    let action = body
        .delivery_status
        .parse::<OfferStatus>()
        .ok()
        .and_then(delivery_action)
        .ok_or_else(|| {
            ApiError::new(
                rid,
                "validation_error",
                format!(
                    "deliveryStatus must be one of livrare_in_procesare, livrata, anulata; got '{}'",
                    body.delivery_status
                ),
            )
        })?;

    let offer = run_action(&state, id, action, Actor::Admin, rid).await?;
    Ok(ok(req_id, OfferView::new(offer, state.vat_rate)))
}

/// PUT /offer/admin/:id/update-products: replace all part lines.
pub(in crate::api) async fn update_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<PartLinesRequest>,
) -> Result<Json<ApiResponse<OfferView>>, ApiError> {
    let rid = &req_id.0;

    let mut offer = load_offer(&state, id, rid).await?;
    let expected = offer.status;
    offer
        .replace_parts(body.parts)
        .map_err(|e| map_offer_error(rid, &e))?;
    let saved = commit(&state, &offer, expected, None, rid).await?;
    Ok(ok(req_id, OfferView::new(saved, state.vat_rate)))
}

/// POST /offer/admin/:id/add-products: append part lines.
pub(in crate::api) async fn add_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<PartLinesRequest>,
) -> Result<Json<ApiResponse<OfferView>>, ApiError> {
    let rid = &req_id.0;

    let mut offer = load_offer(&state, id, rid).await?;
    let expected = offer.status;
    offer
        .add_parts(body.parts)
        .map_err(|e| map_offer_error(rid, &e))?;
    let saved = commit(&state, &offer, expected, None, rid).await?;
    Ok(ok(req_id, OfferView::new(saved, state.vat_rate)))
}
