//! Offer API handlers.
//!
//! Admin routes (`/offer/admin...`) build and ship offers; client routes
//! (`/offer/:id/...`) pick options and decide. Every status change goes
//! through `partquote_core` and is persisted with a guarded write.

mod admin;
mod client;

pub(super) use admin::{
    add_products, create_offer, list_offers, send_offer, update_delivery, update_products,
};
pub(super) use client::{accept_offer, get_offer, reject_offer, submit_selected_parts};

#[cfg(test)]
pub(super) use admin::{delivery_action, normalize_page, normalize_per_page};

use axum::Json;
use chrono::{DateTime, Utc};
use partquote_core::{
    Actor, Address, Offer, OfferAction, OfferError, OfferPart, OfferStatus, SelectedPart, Totals,
    Transition, VatRate,
};
use partquote_db::OrderRow;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::{
    map_db_error, map_line_error, map_selection_error, map_transition_error, ApiError,
    ApiResponse, AppState, ResponseMeta,
};
use crate::middleware::RequestId;
use crate::notify::OfferEvent;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct OrderSummary {
    pub id: Uuid,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub vehicle: Option<String>,
}

impl From<OrderRow> for OrderSummary {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.public_id,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            customer_phone: row.customer_phone,
            vehicle: row.vehicle,
        }
    }
}

/// `orderId` is a bare id except on the single-offer read, where the order
/// is embedded.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(in crate::api) enum OrderRef {
    Id(Uuid),
    Populated(OrderSummary),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct OfferView {
    pub id: Uuid,
    pub order_id: OrderRef,
    pub status: OfferStatus,
    pub parts: Vec<OfferPart>,
    pub selected_parts: Vec<SelectedPart>,
    pub billing_address: Option<Address>,
    pub delivery_address: Option<Address>,
    pub pickup_at_central: bool,
    pub total: Decimal,
    pub totals: Totals,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OfferView {
    pub(in crate::api) fn new(offer: Offer, vat_rate: VatRate) -> Self {
        let totals = offer.totals(vat_rate).rounded();
        Self {
            id: offer.id,
            order_id: OrderRef::Id(offer.order_id),
            status: offer.status,
            parts: offer.parts,
            selected_parts: offer.selected_parts,
            billing_address: offer.billing_address,
            delivery_address: offer.delivery_address,
            pickup_at_central: offer.pickup_at_central,
            total: offer.total,
            totals,
            created_at: offer.created_at,
            updated_at: offer.updated_at,
        }
    }

    pub(in crate::api) fn with_order(mut self, order: OrderRow) -> Self {
        self.order_id = OrderRef::Populated(order.into());
        self
    }
}

fn ok<T: Serialize>(req_id: RequestId, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    })
}

fn map_offer_error(rid: &str, error: &OfferError) -> ApiError {
    match error {
        OfferError::Transition(e) => {
            tracing::warn!(error = %e, request_id = rid, "offer transition rejected");
            map_transition_error(rid, e)
        }
        OfferError::Selection(e) => map_selection_error(rid, e),
        OfferError::Line(e) => map_line_error(rid, e),
    }
}

async fn load_offer(state: &AppState, id: Uuid, rid: &str) -> Result<Offer, ApiError> {
    partquote_db::get_offer(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid, &e))
}

/// Writes `offer` if the stored status is still `expected`, then logs the
/// transition and fires any counter-party notification.
async fn commit(
    state: &AppState,
    offer: &Offer,
    expected: OfferStatus,
    transition: Option<Transition>,
    rid: &str,
) -> Result<Offer, ApiError> {
    let saved = partquote_db::save_offer(&state.pool, offer, expected)
        .await
        .map_err(|e| map_db_error(rid, &e))?;

    if let Some(transition) = transition {
        tracing::info!(
            offer_id = %saved.id,
            action = %transition.action,
            from = %transition.from,
            to = %transition.to,
            request_id = rid,
            "offer status changed"
        );
        if let Some(event) = OfferEvent::for_transition(&saved, &transition) {
            state.notifier.notify(event);
        }
    }

    Ok(saved)
}

/// Loads, applies a status-only action, and commits.
async fn run_action(
    state: &AppState,
    id: Uuid,
    action: OfferAction,
    actor: Actor,
    rid: &str,
) -> Result<Offer, ApiError> {
    let mut offer = load_offer(state, id, rid).await?;
    let expected = offer.status;
    let transition = offer.apply(action, actor).map_err(|e| {
        tracing::warn!(
            offer_id = %id,
            from = %expected,
            action = %action,
            request_id = rid,
            error = %e,
            "offer transition rejected"
        );
        map_transition_error(rid, &e)
    })?;
    commit(state, &offer, expected, Some(transition), rid).await
}
