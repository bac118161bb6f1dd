//! Database operations for `orders`.
//!
//! Orders come from the storefront; offers only need enough of them to
//! attach to and to show who the offer is for.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub public_id: Uuid,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub vehicle: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewOrder<'a> {
    pub customer_name: &'a str,
    pub customer_email: Option<&'a str>,
    pub customer_phone: Option<&'a str>,
    pub vehicle: Option<&'a str>,
}

/// Inserts an order and returns the new row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_order(pool: &PgPool, order: &NewOrder<'_>) -> Result<OrderRow, DbError> {
    let row = sqlx::query_as::<_, OrderRow>(
        "INSERT INTO orders (public_id, customer_name, customer_email, customer_phone, vehicle) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, public_id, customer_name, customer_email, customer_phone, vehicle, \
                   created_at",
    )
    .bind(Uuid::new_v4())
    .bind(order.customer_name)
    .bind(order.customer_email)
    .bind(order.customer_phone)
    .bind(order.vehicle)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches an order by its public id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no order has that id, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_order(pool: &PgPool, public_id: Uuid) -> Result<OrderRow, DbError> {
    sqlx::query_as::<_, OrderRow>(
        "SELECT id, public_id, customer_name, customer_email, customer_phone, vehicle, \
                created_at \
         FROM orders \
         WHERE public_id = $1",
    )
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}
