//! The offer document and the mutations each lifecycle stage allows.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::lines::{LineValidationError, NewPartLine};
use crate::pricing::{checked_sum, line_total, Totals, VatRate, MAX_AMOUNT};
use crate::selection::SelectionError;
use crate::status::{next_status, Actor, OfferAction, OfferStatus, Transition, TransitionError};

/// Postal address used for billing and delivery.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub full_name: String,
    #[serde(default)]
    pub company: Option<String>,
    /// Company fiscal code (CUI), when billing a company.
    #[serde(default)]
    pub tax_id: Option<String>,
    pub street: String,
    pub city: String,
    pub county: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

fn default_country() -> String {
    "Romania".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address field '{0}' is required")]
    Missing(&'static str),
}

impl Address {
    /// # Errors
    ///
    /// Returns the first required field that is blank.
    pub fn validate(&self) -> Result<(), AddressError> {
        for (name, value) in [
            ("fullName", &self.full_name),
            ("street", &self.street),
            ("city", &self.city),
            ("county", &self.county),
        ] {
            if value.trim().is_empty() {
                return Err(AddressError::Missing(name));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartOption {
    pub option_id: Uuid,
    pub manufacturer: String,
    pub unit_price: Decimal,
}

/// A requested part and the manufacturer options quoted for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferPart {
    pub part_code: String,
    pub part_type: String,
    pub quantity: u32,
    pub delivery_term: String,
    pub options: Vec<PartOption>,
}

impl OfferPart {
    fn from_new(line: NewPartLine) -> Self {
        Self {
            part_code: line.part_code.trim().to_owned(),
            part_type: line.part_type.trim().to_owned(),
            quantity: line.quantity,
            delivery_term: line.delivery_term.trim().to_owned(),
            options: line
                .options
                .into_iter()
                .map(|o| PartOption {
                    option_id: o.option_id.unwrap_or_else(Uuid::new_v4),
                    manufacturer: o.manufacturer.trim().to_owned(),
                    unit_price: o.unit_price,
                })
                .collect(),
        }
    }
}

/// One chosen option, as finalized by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedPart {
    pub part_type: String,
    pub selected_option_id: Uuid,
    #[serde(default)]
    pub part_code: String,
    pub manufacturer: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub delivery_term: String,
    /// Net; always `unit_price * quantity`.
    pub line_total: Decimal,
}

/// Either ship to an address or collect from the central warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryChoice {
    Deliver(Address),
    PickupAtCentral,
}

/// Body of `PATCH /offer/:id/selected-parts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRequest {
    pub selected_parts: Vec<SelectedPart>,
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub delivery_address: Option<Address>,
    #[serde(default)]
    pub pickup_at_central: bool,
}

/// A selection with its addresses checked and its delivery choice resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSubmission {
    pub selected_parts: Vec<SelectedPart>,
    pub billing_address: Address,
    pub delivery: DeliveryChoice,
}

impl From<SelectionSubmission> for SelectionRequest {
    fn from(submission: SelectionSubmission) -> Self {
        let (delivery_address, pickup_at_central) = match submission.delivery {
            DeliveryChoice::Deliver(address) => (Some(address), false),
            DeliveryChoice::PickupAtCentral => (None, true),
        };
        Self {
            selected_parts: submission.selected_parts,
            billing_address: Some(submission.billing_address),
            delivery_address,
            pickup_at_central,
        }
    }
}

impl TryFrom<SelectionRequest> for SelectionSubmission {
    type Error = SelectionError;

    fn try_from(request: SelectionRequest) -> Result<Self, Self::Error> {
        if request.selected_parts.is_empty() {
            return Err(SelectionError::EmptySelection);
        }
        let billing_address = request
            .billing_address
            .ok_or(SelectionError::MissingBillingAddress)?;
        billing_address.validate()?;

        let delivery = match (request.delivery_address, request.pickup_at_central) {
            (Some(_), true) => return Err(SelectionError::AmbiguousDelivery),
            (None, false) => return Err(SelectionError::MissingDelivery),
            (Some(address), false) => {
                address.validate()?;
                DeliveryChoice::Deliver(address)
            }
            (None, true) => DeliveryChoice::PickupAtCentral,
        };

        Ok(Self {
            selected_parts: request.selected_parts,
            billing_address,
            delivery,
        })
    }
}

/// Net total of a selection, bounded by [`MAX_AMOUNT`].
///
/// # Errors
///
/// [`SelectionError::TotalTooLarge`] on overflow or above the bound.
pub fn selection_total(selected_parts: &[SelectedPart]) -> Result<Decimal, SelectionError> {
    checked_sum(selected_parts.iter().map(|p| p.line_total))
        .filter(|total| *total <= MAX_AMOUNT)
        .ok_or(SelectionError::TotalTooLarge)
}

/// Option ids must be unique within a part type, or a selection could
/// match more than one option.
fn ensure_unique_options(parts: &[OfferPart]) -> Result<(), LineValidationError> {
    let mut seen = HashSet::new();
    for part in parts {
        for option in &part.options {
            if !seen.insert((part.part_type.as_str(), option.option_id)) {
                return Err(LineValidationError::DuplicateOption(option.option_id));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OfferError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Line(#[from] LineValidationError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: Uuid,
    pub order_id: Uuid,
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
    /// Net sum of `selected_parts`.
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    /// Creates a `proiect` offer for `order_id`.
    ///
    /// # Errors
    ///
    /// Returns the first invalid part line.
    pub fn new(order_id: Uuid, lines: Vec<NewPartLine>) -> Result<Self, LineValidationError> {
        for line in &lines {
            line.validate()?;
        }
        let parts: Vec<OfferPart> = lines.into_iter().map(OfferPart::from_new).collect();
        ensure_unique_options(&parts)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            order_id,
            status: OfferStatus::Draft,
            parts,
            selected_parts: Vec::new(),
            billing_address: None,
            delivery_address: None,
            pickup_at_central: false,
            total: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        })
    }

    #[must_use]
    pub fn totals(&self, vat_rate: VatRate) -> Totals {
        Totals::from_net(self.total, vat_rate)
    }

    fn ensure_parts_editable(&self) -> Result<(), TransitionError> {
        if self.status.allows_part_edits() {
            Ok(())
        } else {
            Err(TransitionError::PartsLocked(self.status))
        }
    }

    /// Appends part lines (`POST /offer/admin/:id/add-products`).
    ///
    /// # Errors
    ///
    /// [`TransitionError::PartsLocked`] outside `proiect`/`trimisa`, or the
    /// first invalid line. Nothing is appended on error.
    pub fn add_parts(&mut self, lines: Vec<NewPartLine>) -> Result<(), OfferError> {
        self.ensure_parts_editable()?;
        for line in &lines {
            line.validate()?;
        }
        let mut parts = self.parts.clone();
        parts.extend(lines.into_iter().map(OfferPart::from_new));
        ensure_unique_options(&parts)?;
        self.parts = parts;
        self.touch();
        Ok(())
    }

    /// Replaces all part lines (`PUT /offer/admin/:id/update-products`).
    ///
    /// # Errors
    ///
    /// Same as [`Offer::add_parts`].
    pub fn replace_parts(&mut self, lines: Vec<NewPartLine>) -> Result<(), OfferError> {
        self.ensure_parts_editable()?;
        for line in &lines {
            line.validate()?;
        }
        let parts: Vec<OfferPart> = lines.into_iter().map(OfferPart::from_new).collect();
        ensure_unique_options(&parts)?;
        self.parts = parts;
        self.touch();
        Ok(())
    }

    /// Finds the option `option_id` among parts of type `part_type`.
    #[must_use]
    pub fn find_option(
        &self,
        part_type: &str,
        option_id: Uuid,
    ) -> Option<(&OfferPart, &PartOption)> {
        self.parts
            .iter()
            .filter(|part| part.part_type == part_type)
            .find_map(|part| {
                part.options
                    .iter()
                    .find(|o| o.option_id == option_id)
                    .map(|o| (part, o))
            })
    }

    /// Rebuilds client-submitted lines from the stored options.
    ///
    /// Only `partType`, `selectedOptionId` and `quantity` are taken from the
    /// client; manufacturer, price and delivery term come from the offer and
    /// `lineTotal` is recomputed.
    ///
    /// # Errors
    ///
    /// Empty selections, duplicate part types, unknown options, quantities
    /// below one and line totals above [`MAX_AMOUNT`] are rejected.
    pub fn reconcile_selection(
        &self,
        submitted: &[SelectedPart],
    ) -> Result<Vec<SelectedPart>, SelectionError> {
        if submitted.is_empty() {
            return Err(SelectionError::EmptySelection);
        }
        let mut seen = HashSet::new();
        submitted
            .iter()
            .map(|entry| {
                if !seen.insert(entry.part_type.as_str()) {
                    return Err(SelectionError::DuplicatePartType(entry.part_type.clone()));
                }
                if entry.quantity < 1 {
                    return Err(SelectionError::QuantityBelowMinimum {
                        part_type: entry.part_type.clone(),
                        option_id: entry.selected_option_id,
                    });
                }
                let (part, option) = self
                    .find_option(&entry.part_type, entry.selected_option_id)
                    .ok_or_else(|| SelectionError::UnknownOption {
                        part_type: entry.part_type.clone(),
                        option_id: entry.selected_option_id,
                    })?;
                Ok(SelectedPart {
                    part_type: part.part_type.clone(),
                    selected_option_id: option.option_id,
                    part_code: part.part_code.clone(),
                    manufacturer: option.manufacturer.clone(),
                    unit_price: option.unit_price,
                    quantity: entry.quantity,
                    delivery_term: part.delivery_term.clone(),
                    line_total: line_total(option.unit_price, entry.quantity)
                        .filter(|total| *total <= MAX_AMOUNT)
                        .ok_or_else(|| SelectionError::AmountTooLarge(part.part_type.clone()))?,
                })
            })
            .collect()
    }

    /// Client submits the selection with billing and delivery details,
    /// moving the offer to `comanda_spre_finalizare`.
    ///
    /// # Errors
    ///
    /// Transition or selection errors; the offer is untouched on error.
    pub fn submit_selection(
        &mut self,
        submission: SelectionSubmission,
        actor: Actor,
    ) -> Result<Transition, OfferError> {
        let from = self.status;
        let to = next_status(from, OfferAction::SubmitSelection, actor)?;
        let selected_parts = self.reconcile_selection(&submission.selected_parts)?;
        let total = selection_total(&selected_parts)?;

        self.total = total;
        self.selected_parts = selected_parts;
        self.billing_address = Some(submission.billing_address);
        match submission.delivery {
            DeliveryChoice::Deliver(address) => {
                self.delivery_address = Some(address);
                self.pickup_at_central = false;
            }
            DeliveryChoice::PickupAtCentral => {
                self.delivery_address = None;
                self.pickup_at_central = true;
            }
        }
        self.status = to;
        self.touch();

        Ok(Transition {
            from,
            to,
            action: OfferAction::SubmitSelection,
        })
    }

    /// Applies a status-only action (everything except selection submit).
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] and leaves the offer unchanged when the
    /// edge does not exist, the actor is wrong, or a guard fails.
    pub fn apply(
        &mut self,
        action: OfferAction,
        actor: Actor,
    ) -> Result<Transition, TransitionError> {
        let from = self.status;
        let to = next_status(from, action, actor)?;

        match action {
            OfferAction::SubmitSelection => {
                return Err(TransitionError::GuardFailed {
                    action,
                    reason: "a selection payload is required",
                });
            }
            OfferAction::Send if self.parts.is_empty() => {
                return Err(TransitionError::GuardFailed {
                    action,
                    reason: "the offer has no part lines",
                });
            }
            OfferAction::Accept if self.selected_parts.is_empty() => {
                return Err(TransitionError::GuardFailed {
                    action,
                    reason: "no parts have been selected",
                });
            }
            _ => {}
        }

        self.status = to;
        self.touch();
        Ok(Transition { from, to, action })
    }

    /// Lists broken document invariants; empty when the offer is consistent.
    #[must_use]
    pub fn invariant_violations(&self) -> Vec<&'static str> {
        let mut violations = Vec::new();

        if !self.selected_parts.is_empty() && self.status.allows_part_edits() {
            violations.push("selected parts present before selection was submitted");
        }
        if self.status == OfferStatus::AwaitingFinalization
            && self.delivery_address.is_some() == self.pickup_at_central
        {
            violations.push("exactly one of delivery address or central pickup must be set");
        }
        if self
            .selected_parts
            .iter()
            .any(|p| self.find_option(&p.part_type, p.selected_option_id).is_none())
        {
            violations.push("selected part references an unknown option");
        }
        if self
            .selected_parts
            .iter()
            .any(|p| line_total(p.unit_price, p.quantity) != Some(p.line_total))
        {
            violations.push("line total differs from unit price times quantity");
        }
        let sum = checked_sum(self.selected_parts.iter().map(|p| p.line_total));
        if sum != Some(self.total) {
            violations.push("total differs from the sum of selected lines");
        }

        violations
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
#[path = "offer_test.rs"]
mod tests;
