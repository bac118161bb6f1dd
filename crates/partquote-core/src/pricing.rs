//! Net/VAT/gross arithmetic for offer selections.
//!
//! All amounts are RON as [`Decimal`]. Nothing here rounds implicitly:
//! `gross == net * (1 + rate)` holds exactly, and [`Totals::rounded`] is
//! only applied at display time.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A VAT rate expressed as a fraction (`0.21` for 21 %).
///
/// Two rates are in circulation for the same totals: [`VatRate::STANDARD`]
/// and [`VatRate::LEGACY`]. Which one applies is configuration
/// (`PARTQUOTE_VAT_RATE`) pending product clarification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VatRate(Decimal);

impl VatRate {
    /// 21 %.
    pub const STANDARD: VatRate = VatRate(Decimal::from_parts(21, 0, 0, false, 2));
    /// 19 %.
    pub const LEGACY: VatRate = VatRate(Decimal::from_parts(19, 0, 0, false, 2));

    /// Builds a rate from a fraction in `[0, 1)`.
    ///
    /// # Errors
    ///
    /// Returns a description of the violated bound.
    pub fn new(fraction: Decimal) -> Result<Self, String> {
        if fraction.is_sign_negative() || fraction >= Decimal::ONE {
            return Err(format!("VAT rate must be in [0, 1), got {fraction}"));
        }
        Ok(Self(fraction))
    }

    #[must_use]
    pub fn fraction(self) -> Decimal {
        self.0
    }

    /// `1 + rate`.
    #[must_use]
    pub fn multiplier(self) -> Decimal {
        Decimal::ONE + self.0
    }
}

impl Default for VatRate {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl fmt::Display for VatRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VatRate {
    type Err = String;

    /// Accepts a fraction (`"0.19"`) or a percentage (`"19%"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let fraction = if let Some(pct) = trimmed.strip_suffix('%') {
            let pct = Decimal::from_str(pct.trim()).map_err(|e| e.to_string())?;
            pct / Decimal::ONE_HUNDRED
        } else {
            Decimal::from_str(trimmed).map_err(|e| e.to_string())?
        };
        Self::new(fraction)
    }
}

/// Largest amount an offer can hold: the `NUMERIC(12, 2)` money column.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Largest unit price accepted on a part option.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Amounts are kept in bani: at most two decimals.
#[must_use]
pub fn has_bani_precision(amount: Decimal) -> bool {
    amount.normalize().scale() <= 2
}

/// Net price of `quantity` units, `None` on overflow.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: u32) -> Option<Decimal> {
    unit_price.checked_mul(Decimal::from(quantity))
}

/// Sum of `amounts`, `None` on overflow.
#[must_use]
pub fn checked_sum(amounts: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
}

/// Net, VAT and gross amounts for one selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub net: Decimal,
    pub vat: Decimal,
    pub gross: Decimal,
    pub vat_rate: VatRate,
}

impl Totals {
    #[must_use]
    pub fn from_net(net: Decimal, vat_rate: VatRate) -> Self {
        let gross = net * vat_rate.multiplier();
        Self {
            net,
            vat: gross - net,
            gross,
            vat_rate,
        }
    }

    /// Rounds every amount to bani (two decimals, half away from zero).
    #[must_use]
    pub fn rounded(self) -> Self {
        let round = |d: Decimal| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Self {
            net: round(self.net),
            vat: round(self.vat),
            gross: round(self.gross),
            vat_rate: self.vat_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_rates_have_expected_fractions() {
        assert_eq!(VatRate::STANDARD.fraction(), Decimal::new(21, 2));
        assert_eq!(VatRate::LEGACY.fraction(), Decimal::new(19, 2));
    }

    #[test]
    fn parses_fraction_and_percentage() {
        assert_eq!("0.19".parse::<VatRate>().unwrap(), VatRate::LEGACY);
        assert_eq!("21%".parse::<VatRate>().unwrap(), VatRate::STANDARD);
        assert_eq!(" 21 % ".parse::<VatRate>().unwrap(), VatRate::STANDARD);
    }

    #[test]
    fn rejects_out_of_range_rates() {
        assert!("1".parse::<VatRate>().is_err());
        assert!("-0.1".parse::<VatRate>().is_err());
        assert!("abc".parse::<VatRate>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        let rendered = VatRate::STANDARD.to_string();
        assert_eq!(rendered.parse::<VatRate>().unwrap(), VatRate::STANDARD);
    }

    #[test]
    fn line_total_multiplies_by_quantity() {
        assert_eq!(line_total(Decimal::new(12, 0), 2), Some(Decimal::new(24, 0)));
        assert_eq!(line_total(Decimal::new(1999, 2), 3), Some(Decimal::new(5997, 2)));
    }

    #[test]
    fn line_total_reports_overflow() {
        assert_eq!(line_total(Decimal::MAX, 2), None);
        assert_eq!(checked_sum([Decimal::MAX, Decimal::ONE]), None);
        assert_eq!(
            checked_sum([Decimal::new(24, 0), Decimal::new(50, 0)]),
            Some(Decimal::new(74, 0))
        );
    }

    #[test]
    fn max_amount_matches_the_money_column() {
        assert_eq!(MAX_AMOUNT.to_string(), "9999999999.99");
        assert_eq!(MAX_UNIT_PRICE, Decimal::new(1_000_000, 0));
    }

    #[test]
    fn bani_precision_ignores_trailing_zeros() {
        assert!(has_bani_precision(Decimal::new(1005, 2)));
        assert!(has_bani_precision(Decimal::new(10_500, 3)));
        assert!(!has_bani_precision(Decimal::new(10_005, 3)));
    }

    #[test]
    fn gross_is_net_times_one_plus_rate() {
        let net = Decimal::new(74, 0);
        for rate in [VatRate::STANDARD, VatRate::LEGACY] {
            let totals = Totals::from_net(net, rate);
            assert_eq!(totals.gross, net * (Decimal::ONE + rate.fraction()));
            assert_eq!(totals.net + totals.vat, totals.gross);
        }
        assert_eq!(
            Totals::from_net(net, VatRate::LEGACY).gross,
            Decimal::new(8806, 2)
        );
    }

    #[test]
    fn rounded_keeps_two_decimals() {
        let totals = Totals::from_net(Decimal::new(3333, 3), VatRate::STANDARD).rounded();
        assert_eq!(totals.net, Decimal::new(333, 2));
        assert_eq!(totals.gross, Decimal::new(403, 2));
    }
}
