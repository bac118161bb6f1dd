//! Part lines as the admin composes them, before they become offer parts.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::pricing::{has_bani_precision, MAX_UNIT_PRICE};

/// One manufacturer quote for one requested part, as typed into the
/// compose form. Several lines for the same part become options of a
/// single [`NewPartLine`] via [`group_draft_lines`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartLineDraft {
    pub part_code: String,
    pub part_type: String,
    pub manufacturer: String,
    pub delivery_term: String,
    pub price_per_unit: Decimal,
    pub quantity: u32,
}

/// Admin-supplied part line with its manufacturer options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPartLine {
    pub part_code: String,
    pub part_type: String,
    pub quantity: u32,
    pub delivery_term: String,
    pub options: Vec<NewPartOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPartOption {
    /// Kept when editing existing lines so prior ids stay stable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_id: Option<Uuid>,
    pub manufacturer: String,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LineField {
    PartCode,
    PartType,
    Manufacturer,
    DeliveryTerm,
    PricePerUnit,
    Quantity,
    Options,
}

impl fmt::Display for LineField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LineField::PartCode => "partCode",
            LineField::PartType => "partType",
            LineField::Manufacturer => "manufacturer",
            LineField::DeliveryTerm => "deliveryTerm",
            LineField::PricePerUnit => "pricePerUnit",
            LineField::Quantity => "quantity",
            LineField::Options => "options",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineValidationError {
    #[error("{0} is required")]
    Missing(LineField),

    #[error("{0} must be greater than zero")]
    NotPositive(LineField),

    #[error("{0} may have at most two decimals")]
    TooPrecise(LineField),

    #[error("{0} must not exceed 1000000 RON")]
    TooLarge(LineField),

    #[error("option id {0} is used more than once for the same part type")]
    DuplicateOption(Uuid),
}

impl LineValidationError {
    #[must_use]
    pub fn field(&self) -> LineField {
        match self {
            LineValidationError::Missing(field)
            | LineValidationError::NotPositive(field)
            | LineValidationError::TooPrecise(field)
            | LineValidationError::TooLarge(field) => *field,
            LineValidationError::DuplicateOption(_) => LineField::Options,
        }
    }

    /// Romanian message shown next to the compose form.
    #[must_use]
    pub fn localized(&self) -> String {
        let label = match self.field() {
            LineField::PartCode => "Codul piesei",
            LineField::PartType => "Tipul piesei",
            LineField::Manufacturer => "Producătorul",
            LineField::DeliveryTerm => "Termenul de livrare",
            LineField::PricePerUnit => "Prețul unitar",
            LineField::Quantity => "Cantitatea",
            LineField::Options => "Opțiunile",
        };
        match self {
            LineValidationError::Missing(_) => format!("{label} este obligatoriu."),
            LineValidationError::NotPositive(_) => {
                format!("{label} trebuie să fie mai mare decât zero.")
            }
            LineValidationError::TooPrecise(_) => {
                format!("{label} poate avea cel mult două zecimale.")
            }
            LineValidationError::TooLarge(_) => {
                format!("{label} nu poate depăși {MAX_UNIT_PRICE} RON.")
            }
            LineValidationError::DuplicateOption(_) => {
                format!("{label} conțin un identificator duplicat.")
            }
        }
    }
}

fn check_price(price: Decimal) -> Result<(), LineValidationError> {
    if price <= Decimal::ZERO {
        return Err(LineValidationError::NotPositive(LineField::PricePerUnit));
    }
    if !has_bani_precision(price) {
        return Err(LineValidationError::TooPrecise(LineField::PricePerUnit));
    }
    if price > MAX_UNIT_PRICE {
        return Err(LineValidationError::TooLarge(LineField::PricePerUnit));
    }
    Ok(())
}

fn require_text(value: &str, field: LineField) -> Result<(), LineValidationError> {
    if value.trim().is_empty() {
        Err(LineValidationError::Missing(field))
    } else {
        Ok(())
    }
}

/// Checks a compose-form line before it is added.
///
/// # Errors
///
/// Returns the first failing field, in form order.
pub fn validate_draft_line(line: &PartLineDraft) -> Result<(), LineValidationError> {
    require_text(&line.part_code, LineField::PartCode)?;
    require_text(&line.part_type, LineField::PartType)?;
    require_text(&line.manufacturer, LineField::Manufacturer)?;
    require_text(&line.delivery_term, LineField::DeliveryTerm)?;
    check_price(line.price_per_unit)?;
    if line.quantity == 0 {
        return Err(LineValidationError::NotPositive(LineField::Quantity));
    }
    Ok(())
}

impl NewPartLine {
    /// Same rules as [`validate_draft_line`], applied to every option.
    ///
    /// # Errors
    ///
    /// Returns the first failing field.
    pub fn validate(&self) -> Result<(), LineValidationError> {
        require_text(&self.part_code, LineField::PartCode)?;
        require_text(&self.part_type, LineField::PartType)?;
        require_text(&self.delivery_term, LineField::DeliveryTerm)?;
        if self.quantity == 0 {
            return Err(LineValidationError::NotPositive(LineField::Quantity));
        }
        if self.options.is_empty() {
            return Err(LineValidationError::Missing(LineField::Options));
        }
        for option in &self.options {
            require_text(&option.manufacturer, LineField::Manufacturer)?;
            check_price(option.unit_price)?;
        }
        Ok(())
    }
}

/// Folds compose lines into part lines.
///
/// Lines sharing `(partCode, partType, quantity, deliveryTerm)` become
/// options of one part; parts keep the order in which they first appear.
#[must_use]
pub fn group_draft_lines(lines: &[PartLineDraft]) -> Vec<NewPartLine> {
    let mut grouped: Vec<NewPartLine> = Vec::new();
    for line in lines {
        let option = NewPartOption {
            option_id: None,
            manufacturer: line.manufacturer.trim().to_owned(),
            unit_price: line.price_per_unit,
        };
        let existing = grouped.iter_mut().find(|part| {
            part.part_code == line.part_code.trim()
                && part.part_type == line.part_type.trim()
                && part.quantity == line.quantity
                && part.delivery_term == line.delivery_term.trim()
        });
        match existing {
            Some(part) => part.options.push(option),
            None => grouped.push(NewPartLine {
                part_code: line.part_code.trim().to_owned(),
                part_type: line.part_type.trim().to_owned(),
                quantity: line.quantity,
                delivery_term: line.delivery_term.trim().to_owned(),
                options: vec![option],
            }),
        }
    }
    grouped
}
