//! Client-side offer handlers: read, submit selection, accept, reject.

use axum::{
    extract::State,
    Extension, Json,
};
use partquote_core::{Actor, OfferAction, SelectionRequest, SelectionSubmission};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::super::extract::{ApiJson, ApiPath};
use super::super::{map_db_error, map_selection_error, ApiError, ApiResponse, AppState};
use super::{commit, load_offer, map_offer_error, ok, run_action, OfferView};

/// GET /offer/:offerId: one offer with its order embedded.
pub(in crate::api) async fn get_offer(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<OfferView>>, ApiError> {
    let (offer, order) = partquote_db::get_offer_with_order(&state.pool, id)
        .await
        .map_err(|e| map_db_error(&req_id.0, &e))?;
    Ok(ok(
        req_id,
        OfferView::new(offer, state.vat_rate).with_order(order),
    ))
}

/// PATCH /offer/:id/selected-parts: store the selection, billing address
/// and delivery choice; moves the offer to `comanda_spre_finalizare`.
pub(in crate::api) async fn submit_selected_parts(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<SelectionRequest>,
) -> Result<Json<ApiResponse<OfferView>>, ApiError> {
    let rid = &req_id.0;

    let submission =
        SelectionSubmission::try_from(body).map_err(|e| map_selection_error(rid, &e))?;
    let mut offer = load_offer(&state, id, rid).await?;
    let expected = offer.status;
    let transition = offer
        .submit_selection(submission, Actor::Client)
        .map_err(|e| map_offer_error(rid, &e))?;
    let saved = commit(&state, &offer, expected, Some(transition), rid).await?;
    Ok(ok(req_id, OfferView::new(saved, state.vat_rate)))
}

/// PATCH /offer/:id/accept: requires a stored selection.
pub(in crate::api) async fn accept_offer(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<OfferView>>, ApiError> {
    let offer = run_action(&state, id, OfferAction::Accept, Actor::Client, &req_id.0).await?;
    Ok(ok(req_id, OfferView::new(offer, state.vat_rate)))
}

/// PATCH /offer/:id/reject
pub(in crate::api) async fn reject_offer(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<OfferView>>, ApiError> {
    let offer = run_action(&state, id, OfferAction::Reject, Actor::Client, &req_id.0).await?;
    Ok(ok(req_id, OfferView::new(offer, state.vat_rate)))
}
