//! Mollie amount representation.

use crate::error::{PaymentError, Result};
use kassa_core::Money;
use serde::{Deserialize, Serialize};

/// An amount as the Mollie API expects it: a currency code and a decimal
/// string with exactly two decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MollieAmount {
    /// ISO 4217 currency code. Always `EUR` on Kassa.
    pub currency: String,
    /// Decimal value, e.g. `"12.34"`
    pub value: String,
}

impl MollieAmount {
    /// Express a euro amount.
    #[must_use]
    pub fn eur(money: Money) -> Self {
        Self {
            currency: "EUR".to_string(),
            value: money.to_decimal_string(),
        }
    }

    /// Parse the amount back into cents.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::InvalidAmount`] for non-EUR currencies or a
    /// value that is not a non-negative decimal with at most two decimals.
    pub fn to_money(&self) -> Result<Money> {
        if self.currency != "EUR" {
            return Err(PaymentError::InvalidAmount(format!(
                "unsupported currency {}",
                self.currency
            )));
        }
        let invalid = || PaymentError::InvalidAmount(self.value.clone());
        let (whole, fraction) = self.value.split_once('.').unwrap_or((&self.value, ""));
        if whole.is_empty() || fraction.len() > 2 {
            return Err(invalid());
        }
        if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let euros: u64 = whole.parse().map_err(|_| invalid())?;
        let cents: u64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };
        euros
            .checked_mul(100)
            .and_then(|c| c.checked_add(cents))
            .map(Money::from_cents)
            .ok_or_else(invalid)
    }
}

impl From<Money> for MollieAmount {
    fn from(money: Money) -> Self {
        Self::eur(money)
    }
}
