//! Exact-decimal helpers shared by every price-producing operation.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept on every final money amount.
pub const MONEY_PLACES: u32 = 2;

/// Rounds a final money amount to cents using banker's rounding.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_PLACES, RoundingStrategy::MidpointNearestEven)
}

/// Rounds to whole units, used for document-level price rounding.
pub fn round_whole(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
}

/// Division that clamps to the decimal bounds instead of overflowing.
/// `divisor` must not be zero.
pub fn saturating_div(value: Decimal, divisor: Decimal) -> Decimal {
    match value.checked_div(divisor) {
        Some(quotient) => quotient,
        None if value.is_sign_negative() != divisor.is_sign_negative() => Decimal::MIN,
        None => Decimal::MAX,
    }
}

/// Parses user input into a decimal, accepting a comma as decimal separator.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = trimmed.replace(',', ".");
    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .ok()
}

/// Result of a fail-soft edit: either the new value was taken or the old one kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Edit {
    Applied,
    Unchanged,
}

impl Edit {
    pub fn is_applied(self) -> bool {
        matches!(self, Edit::Applied)
    }

    /// Stores `parsed` into `slot` when present.
    pub(crate) fn apply<T>(slot: &mut T, parsed: Option<T>) -> Edit {
        match parsed {
            Some(value) => {
                *slot = value;
                Edit::Applied
            }
            None => Edit::Unchanged,
        }
    }
}
