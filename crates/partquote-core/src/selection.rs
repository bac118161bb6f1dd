//! Turns an offer's part lines into a one-choice-per-part-type board the
//! client picks from, and keeps quantities and running totals.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::offer::{
    selection_total, Address, AddressError, DeliveryChoice, Offer, OfferPart, SelectedPart,
    SelectionSubmission,
};
use crate::pricing::{line_total, Totals, VatRate, MAX_AMOUNT};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no option selected")]
    EmptySelection,

    #[error("unknown part type '{0}'")]
    UnknownPartType(String),

    #[error("option {option_id} does not exist for part type '{part_type}'")]
    UnknownOption { part_type: String, option_id: Uuid },

    #[error("part type '{0}' selected more than once")]
    DuplicatePartType(String),

    #[error("quantity for option {option_id} of '{part_type}' must be at least 1")]
    QuantityBelowMinimum { part_type: String, option_id: Uuid },

    #[error("line total for '{0}' exceeds the maximum offer amount")]
    AmountTooLarge(String),

    #[error("selection total exceeds the maximum offer amount")]
    TotalTooLarge,

    #[error("billing address is required")]
    MissingBillingAddress,

    #[error("choose a delivery address or pickup at central")]
    MissingDelivery,

    #[error("delivery address and pickup at central are mutually exclusive")]
    AmbiguousDelivery,

    #[error(transparent)]
    InvalidAddress(#[from] AddressError),
}

/// One manufacturer option offered for a part type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub option_id: Uuid,
    pub part_code: String,
    pub manufacturer: String,
    pub delivery_term: String,
    /// Quantity originally requested on the part line.
    pub base_quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartTypeGroup {
    pub part_type: String,
    pub candidates: Vec<Candidate>,
}

/// Client-side state of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionEntry {
    pub include: bool,
    pub quantity: u32,
    pub price_per_unit: Decimal,
}

impl SelectionEntry {
    /// `price_per_unit * quantity` when included, else zero. Saturates at
    /// `Decimal::MAX`; [`SelectionBoard::finalize`] refuses anything above
    /// [`MAX_AMOUNT`].
    #[must_use]
    pub fn total(&self) -> Decimal {
        if self.include {
            line_total(self.price_per_unit, self.quantity).unwrap_or(Decimal::MAX)
        } else {
            Decimal::ZERO
        }
    }
}

type EntryKey = (String, Uuid);

/// Grouped candidates plus one [`SelectionEntry`] per `(partType, optionId)`.
///
/// At most one entry per part type has `include == true` at any time.
#[derive(Debug, Clone)]
pub struct SelectionBoard {
    groups: Vec<PartTypeGroup>,
    entries: HashMap<EntryKey, SelectionEntry>,
}

impl SelectionBoard {
    /// Groups `parts` by part type, flattening options of every part that
    /// shares a type. Groups and candidates keep their first-seen order.
    #[must_use]
    pub fn from_parts(parts: &[OfferPart]) -> Self {
        let mut groups: Vec<PartTypeGroup> = Vec::new();
        let mut entries = HashMap::new();

        for part in parts {
            let idx = match groups.iter().position(|g| g.part_type == part.part_type) {
                Some(idx) => idx,
                None => {
                    groups.push(PartTypeGroup {
                        part_type: part.part_type.clone(),
                        candidates: Vec::new(),
                    });
                    groups.len() - 1
                }
            };
            for option in &part.options {
                groups[idx].candidates.push(Candidate {
                    option_id: option.option_id,
                    part_code: part.part_code.clone(),
                    manufacturer: option.manufacturer.clone(),
                    delivery_term: part.delivery_term.clone(),
                    base_quantity: part.quantity,
                    unit_price: option.unit_price,
                });
                entries.insert(
                    (part.part_type.clone(), option.option_id),
                    SelectionEntry {
                        include: false,
                        quantity: part.quantity.max(1),
                        price_per_unit: option.unit_price,
                    },
                );
            }
        }

        Self { groups, entries }
    }

    /// Like [`SelectionBoard::from_parts`], then re-applies any selection
    /// already stored on the offer so an interrupted client can continue.
    #[must_use]
    pub fn from_offer(offer: &Offer) -> Self {
        let mut board = Self::from_parts(&offer.parts);
        for chosen in &offer.selected_parts {
            let key = (chosen.part_type.clone(), chosen.selected_option_id);
            if let Some(entry) = board.entries.get_mut(&key) {
                entry.include = true;
                entry.quantity = chosen.quantity.max(1);
            }
        }
        board
    }

    #[must_use]
    pub fn groups(&self) -> &[PartTypeGroup] {
        &self.groups
    }

    #[must_use]
    pub fn entry(&self, part_type: &str, option_id: Uuid) -> Option<&SelectionEntry> {
        self.entries.get(&(part_type.to_owned(), option_id))
    }

    fn group(&self, part_type: &str) -> Result<&PartTypeGroup, SelectionError> {
        self.groups
            .iter()
            .find(|g| g.part_type == part_type)
            .ok_or_else(|| SelectionError::UnknownPartType(part_type.to_owned()))
    }

    fn entry_mut(
        &mut self,
        part_type: &str,
        option_id: Uuid,
    ) -> Result<&mut SelectionEntry, SelectionError> {
        self.group(part_type)?;
        self.entries
            .get_mut(&(part_type.to_owned(), option_id))
            .ok_or_else(|| SelectionError::UnknownOption {
                part_type: part_type.to_owned(),
                option_id,
            })
    }

    /// Chooses `option_id` for `part_type`, deselecting every sibling.
    ///
    /// # Errors
    ///
    /// Unknown part type or option; the board is unchanged on error.
    pub fn select(&mut self, part_type: &str, option_id: Uuid) -> Result<(), SelectionError> {
        self.entry_mut(part_type, option_id)?;
        let siblings: Vec<Uuid> = self
            .group(part_type)?
            .candidates
            .iter()
            .map(|c| c.option_id)
            .collect();
        for sibling in siblings {
            if let Some(entry) = self.entries.get_mut(&(part_type.to_owned(), sibling)) {
                entry.include = sibling == option_id;
            }
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Unknown part type or option.
    pub fn deselect(&mut self, part_type: &str, option_id: Uuid) -> Result<(), SelectionError> {
        self.entry_mut(part_type, option_id)?.include = false;
        Ok(())
    }

    /// Selects the option, or deselects it if it was already chosen.
    ///
    /// # Errors
    ///
    /// Unknown part type or option.
    pub fn toggle(&mut self, part_type: &str, option_id: Uuid) -> Result<(), SelectionError> {
        if self.entry_mut(part_type, option_id)?.include {
            self.deselect(part_type, option_id)
        } else {
            self.select(part_type, option_id)
        }
    }

    /// Sets the quantity of one candidate, included or not.
    ///
    /// # Errors
    ///
    /// [`SelectionError::QuantityBelowMinimum`] for zero, or unknown
    /// part type / option.
    pub fn set_quantity(
        &mut self,
        part_type: &str,
        option_id: Uuid,
        quantity: u32,
    ) -> Result<(), SelectionError> {
        let entry = self.entry_mut(part_type, option_id)?;
        if quantity < 1 {
            return Err(SelectionError::QuantityBelowMinimum {
                part_type: part_type.to_owned(),
                option_id,
            });
        }
        entry.quantity = quantity;
        Ok(())
    }

    /// The chosen candidate of `part_type`, if any.
    #[must_use]
    pub fn chosen(&self, part_type: &str) -> Option<&Candidate> {
        let group = self.groups.iter().find(|g| g.part_type == part_type)?;
        group.candidates.iter().find(|c| {
            self.entry(part_type, c.option_id)
                .is_some_and(|e| e.include)
        })
    }

    #[must_use]
    pub fn has_selection(&self) -> bool {
        self.entries.values().any(|e| e.include)
    }

    /// Net total (`totalSelectie`).
    #[must_use]
    pub fn net_total(&self) -> Decimal {
        self.entries
            .values()
            .map(SelectionEntry::total)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    #[must_use]
    pub fn totals(&self, vat_rate: VatRate) -> Totals {
        Totals::from_net(self.net_total(), vat_rate)
    }

    /// Included lines in group order.
    #[must_use]
    pub fn selected_parts(&self) -> Vec<SelectedPart> {
        self.groups
            .iter()
            .filter_map(|group| {
                let candidate = self.chosen(&group.part_type)?;
                let entry = self.entry(&group.part_type, candidate.option_id)?;
                Some(SelectedPart {
                    part_type: group.part_type.clone(),
                    selected_option_id: candidate.option_id,
                    part_code: candidate.part_code.clone(),
                    manufacturer: candidate.manufacturer.clone(),
                    unit_price: entry.price_per_unit,
                    quantity: entry.quantity,
                    delivery_term: candidate.delivery_term.clone(),
                    line_total: entry.total(),
                })
            })
            .collect()
    }

    /// Builds the atomic selection update.
    ///
    /// # Errors
    ///
    /// [`SelectionError::EmptySelection`] when nothing is included, an
    /// amount above [`MAX_AMOUNT`], or an invalid address.
    pub fn finalize(
        &self,
        billing_address: Address,
        delivery: DeliveryChoice,
    ) -> Result<SelectionSubmission, SelectionError> {
        if !self.has_selection() {
            return Err(SelectionError::EmptySelection);
        }
        let selected_parts = self.selected_parts();
        if let Some(line) = selected_parts.iter().find(|p| p.line_total > MAX_AMOUNT) {
            return Err(SelectionError::AmountTooLarge(line.part_type.clone()));
        }
        selection_total(&selected_parts)?;
        billing_address.validate()?;
        if let DeliveryChoice::Deliver(address) = &delivery {
            address.validate()?;
        }
        Ok(SelectionSubmission {
            selected_parts,
            billing_address,
            delivery,
        })
    }
}

#[cfg(test)]
#[path = "selection_test.rs"]
mod tests;
