//! Database operations for `offers`.
//!
//! Part lines, selections and addresses live in JSONB columns and are
//! decoded straight into the `partquote-core` types. Status writes are
//! guarded by the status the caller read, see [`save_offer`].

use chrono::{DateTime, Utc};
use partquote_core::{Address, Offer, OfferPart, OfferStatus, SelectedPart};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::orders::{get_order, OrderRow};
use crate::DbError;

macro_rules! offer_columns {
    () => {
        "f.id, f.public_id, o.public_id AS order_public_id, f.status, f.parts, \
         f.selected_parts, f.billing_address, f.delivery_address, f.pickup_at_central, \
         f.total, f.created_at, f.updated_at"
    };
}

macro_rules! offer_select {
    () => {
        concat!(
            "SELECT ",
            offer_columns!(),
            " FROM offers f JOIN orders o ON o.id = f.order_id"
        )
    };
}

const LIST_FILTER: &str = "($1::text IS NULL OR f.status = $1) \
     AND ($2::uuid IS NULL OR o.public_id = $2)";

/// A row from the `offers` table joined with its order's public id.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OfferRow {
    pub id: i64,
    pub public_id: Uuid,
    pub order_public_id: Uuid,
    pub status: String,
    pub parts: Json<Vec<OfferPart>>,
    pub selected_parts: Json<Vec<SelectedPart>>,
    pub billing_address: Option<Json<Address>>,
    pub delivery_address: Option<Json<Address>>,
    pub pickup_at_central: bool,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OfferRow> for Offer {
    type Error = DbError;

    fn try_from(row: OfferRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<OfferStatus>().map_err(DbError::Decode)?;
        Ok(Offer {
            id: row.public_id,
            order_id: row.order_public_id,
            status,
            parts: row.parts.0,
            selected_parts: row.selected_parts.0,
            billing_address: row.billing_address.map(|a| a.0),
            delivery_address: row.delivery_address.map(|a| a.0),
            pickup_at_central: row.pickup_at_central,
            total: row.total,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Filters for [`list_offers`] and [`count_offers`].
#[derive(Debug, Clone, Copy)]
pub struct OfferFilter {
    pub status: Option<OfferStatus>,
    pub order_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for OfferFilter {
    fn default() -> Self {
        Self {
            status: None,
            order_id: None,
            limit: 20,
            offset: 0,
        }
    }
}

/// Persists a newly built offer under the order it references.
///
/// Returns the offer as stored.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if `offer.order_id` matches no order, or
/// [`DbError::Sqlx`] if the insert fails.
pub async fn insert_offer(pool: &PgPool, offer: &Offer) -> Result<Offer, DbError> {
    let inserted = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO offers (public_id, order_id, status, parts, selected_parts, \
                             billing_address, delivery_address, pickup_at_central, total, \
                             created_at, updated_at) \
         SELECT $1, o.id, $3, $4, $5, $6, $7, $8, $9, $10, $10 \
         FROM orders o \
         WHERE o.public_id = $2 \
         RETURNING public_id",
    )
    .bind(offer.id)
    .bind(offer.order_id)
    .bind(offer.status.as_str())
    .bind(Json(&offer.parts))
    .bind(Json(&offer.selected_parts))
    .bind(offer.billing_address.as_ref().map(Json))
    .bind(offer.delivery_address.as_ref().map(Json))
    .bind(offer.pickup_at_central)
    .bind(offer.total)
    .bind(offer.created_at)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    get_offer(pool, inserted).await
}

/// Fetches one offer by its public id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no offer has that id, [`DbError::Decode`]
/// for a row that does not map onto [`Offer`], or [`DbError::Sqlx`].
pub async fn get_offer(pool: &PgPool, public_id: Uuid) -> Result<Offer, DbError> {
    let row = sqlx::query_as::<_, OfferRow>(concat!(offer_select!(), " WHERE f.public_id = $1"))
        .bind(public_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    Offer::try_from(row)
}

/// Fetches one offer together with the order it belongs to.
///
/// # Errors
///
/// Same as [`get_offer`].
pub async fn get_offer_with_order(
    pool: &PgPool,
    public_id: Uuid,
) -> Result<(Offer, OrderRow), DbError> {
    let offer = get_offer(pool, public_id).await?;
    let order = get_order(pool, offer.order_id).await?;
    Ok((offer, order))
}

/// Lists offers newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::Decode`] for
/// an undecodable row.
pub async fn list_offers(pool: &PgPool, filter: &OfferFilter) -> Result<Vec<Offer>, DbError> {
    let sql = format!(
        "{} WHERE {LIST_FILTER} ORDER BY f.created_at DESC, f.id DESC LIMIT $3 OFFSET $4",
        offer_select!()
    );
    let rows = sqlx::query_as::<_, OfferRow>(&sql)
        .bind(filter.status.map(OfferStatus::as_str))
        .bind(filter.order_id)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(Offer::try_from).collect()
}

/// Counts offers matching `filter`, ignoring its limit and offset.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_offers(pool: &PgPool, filter: &OfferFilter) -> Result<i64, DbError> {
    let sql = format!(
        "SELECT COUNT(*) FROM offers f JOIN orders o ON o.id = f.order_id WHERE {LIST_FILTER}"
    );
    let count = sqlx::query_scalar::<_, i64>(&sql)
        .bind(filter.status.map(OfferStatus::as_str))
        .bind(filter.order_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// Writes every mutable field of `offer`, but only if the stored status is
/// still `expected`.
///
/// Returns the offer as stored.
///
/// # Errors
///
/// - [`DbError::NotFound`] if the offer does not exist.
/// - [`DbError::StaleOfferStatus`] if its status changed since it was read;
///   the stored offer is left as it was.
/// - [`DbError::Sqlx`] if the update fails.
pub async fn save_offer(
    pool: &PgPool,
    offer: &Offer,
    expected: OfferStatus,
) -> Result<Offer, DbError> {
    let row = sqlx::query_as::<_, OfferRow>(concat!(
        "UPDATE offers f \
         SET status = $3, parts = $4, selected_parts = $5, billing_address = $6, \
             delivery_address = $7, pickup_at_central = $8, total = $9, updated_at = NOW() \
         FROM orders o \
         WHERE o.id = f.order_id AND f.public_id = $1 AND f.status = $2 \
         RETURNING ",
        offer_columns!()
    ))
    .bind(offer.id)
    .bind(expected.as_str())
    .bind(offer.status.as_str())
    .bind(Json(&offer.parts))
    .bind(Json(&offer.selected_parts))
    .bind(offer.billing_address.as_ref().map(Json))
    .bind(offer.delivery_address.as_ref().map(Json))
    .bind(offer.pickup_at_central)
    .bind(offer.total)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Offer::try_from(row),
        None => {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM offers WHERE public_id = $1)",
            )
            .bind(offer.id)
            .fetch_one(pool)
            .await?;
            if exists {
                Err(DbError::StaleOfferStatus {
                    id: offer.id,
                    expected,
                })
            } else {
                Err(DbError::NotFound)
            }
        }
    }
}
