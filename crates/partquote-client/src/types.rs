//! Response and query types for the offer API.

use chrono::{DateTime, Utc};
use partquote_core::{Address, Offer, OfferPart, OfferStatus, SelectedPart, Totals};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Success envelope: `{ "data": ..., "meta": ... }`.
#[derive(Debug, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: Uuid,
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub vehicle: Option<String>,
}

/// `orderId` as returned by the API: a bare id, or the embedded order on a
/// single-offer read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderRef {
    Id(Uuid),
    Populated(OrderSummary),
}

impl OrderRef {
    #[must_use]
    pub fn id(&self) -> Uuid {
        match self {
            OrderRef::Id(id) => *id,
            OrderRef::Populated(order) => order.id,
        }
    }

    #[must_use]
    pub fn summary(&self) -> Option<&OrderSummary> {
        match self {
            OrderRef::Id(_) => None,
            OrderRef::Populated(order) => Some(order),
        }
    }
}

/// An offer as served by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferDocument {
    pub id: Uuid,
    pub order_id: OrderRef,
    pub status: OfferStatus,
    pub parts: Vec<OfferPart>,
    #[serde(default)]
    pub selected_parts: Vec<SelectedPart>,
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub delivery_address: Option<Address>,
    #[serde(default)]
    pub pickup_at_central: bool,
    pub total: Decimal,
    pub totals: Totals,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OfferDocument {
    /// The domain view of this document, without the computed totals or the
    /// embedded order.
    #[must_use]
    pub fn to_offer(&self) -> Offer {
        Offer {
            id: self.id,
            order_id: self.order_id.id(),
            status: self.status,
            parts: self.parts.clone(),
            selected_parts: self.selected_parts.clone(),
            billing_address: self.billing_address.clone(),
            delivery_address: self.delivery_address.clone(),
            pickup_at_central: self.pickup_at_central,
            total: self.total,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferPage {
    pub items: Vec<OfferDocument>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Filters for `GET /offer/admin`. Unset fields use the server defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferQuery {
    pub status: Option<OfferStatus>,
    pub order_id: Option<Uuid>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl OfferQuery {
    pub(crate) fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_owned()));
        }
        if let Some(order_id) = self.order_id {
            pairs.push(("orderId", order_id.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(per_page) = self.per_page {
            pairs.push(("perPage", per_page.to_string()));
        }
        pairs
    }
}
