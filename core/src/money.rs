//! Money value object.
//!
//! All amounts are non-negative integer euro cents. Fractional results only
//! ever appear inside [`Money::mul_ratio_round`], which rounds half up to the
//! nearest cent.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero euros.
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole euros with overflow checking
    #[must_use]
    pub const fn checked_from_euros(euros: u64) -> Option<Self> {
        match euros.checked_mul(100) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns the whole-euro part of the amount
    #[must_use]
    pub const fn euros(&self) -> u64 {
        self.0 / 100
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Subtracts two money amounts (returns None if result would be negative)
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        if self.0 >= other.0 {
            Some(Self(self.0 - other.0))
        } else {
            None
        }
    }

    /// Subtracts, clamping at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiplies money by a quantity with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Computes `self * numerator / denominator`, rounded half up to the cent.
    ///
    /// Intermediate products are computed in 128 bits. Returns `None` when
    /// `denominator` is zero or the result does not fit in `u64`.
    ///
    /// # Examples
    ///
    /// ```
    /// use kassa_core::Money;
    ///
    /// // 2% of €0.25 is half a cent, which rounds up
    /// assert_eq!(Money::from_cents(25).mul_ratio_round(200, 10_000), Some(Money::from_cents(1)));
    /// // 2% of €0.24 is 0.48 cents, which rounds down
    /// assert_eq!(Money::from_cents(24).mul_ratio_round(200, 10_000), Some(Money::ZERO));
    /// ```
    #[must_use]
    pub fn mul_ratio_round(self, numerator: u64, denominator: u64) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let product = u128::from(self.0) * u128::from(numerator);
        let denominator = u128::from(denominator);
        let rounded = (product * 2 + denominator) / (denominator * 2);
        u64::try_from(rounded).ok().map(Self)
    }

    /// Formats the amount as a plain decimal string (`"12.34"`).
    #[must_use]
    pub fn to_decimal_string(&self) -> String {
        format!("{}.{:02}", self.euros(), self.0 % 100)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "€{}", self.to_decimal_string())
    }
}

impl Sum for Money {
    /// Sums amounts, saturating at `u64::MAX` cents.
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.fold(0u64, |acc, m| acc.saturating_add(m.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_uses_euro_sign_and_two_decimals() {
        assert_eq!(Money::from_cents(1234).to_string(), "€12.34");
        assert_eq!(Money::from_cents(5).to_string(), "€0.05");
        assert_eq!(Money::ZERO.to_string(), "€0.00");
    }

    #[test]
    fn checked_sub_refuses_negative_results() {
        assert_eq!(Money::from_cents(5).checked_sub(Money::from_cents(6)), None);
        assert_eq!(
            Money::from_cents(6).checked_sub(Money::from_cents(5)),
            Some(Money::from_cents(1))
        );
    }

    #[test]
    fn mul_ratio_round_rejects_zero_denominator() {
        assert_eq!(Money::from_cents(100).mul_ratio_round(1, 0), None);
    }

    #[test]
    fn mul_ratio_round_rounds_half_up() {
        // 21/121 of €1.00 = 17.355 cents
        assert_eq!(
            Money::from_cents(100).mul_ratio_round(2100, 12_100),
            Some(Money::from_cents(17))
        );
        // 9/109 of €10.90 = exactly 90 cents
        assert_eq!(
            Money::from_cents(1090).mul_ratio_round(900, 10_900),
            Some(Money::from_cents(90))
        );
        // 50% of 1 cent = 0.5 which rounds up
        assert_eq!(Money::from_cents(1).mul_ratio_round(1, 2), Some(Money::from_cents(1)));
    }

    #[test]
    fn sum_adds_all_amounts() {
        let total: Money = [1, 2, 3].into_iter().map(Money::from_cents).sum();
        assert_eq!(total, Money::from_cents(6));
    }

    proptest! {
        #[test]
        fn mul_ratio_round_stays_within_half_a_cent(
            cents in 0u64..10_000_000,
            num in 0u64..20_000,
            den in 1u64..20_000,
        ) {
            let rounded = Money::from_cents(cents).mul_ratio_round(num, den).unwrap_or_default();
            let exact_twice = u128::from(cents) * u128::from(num) * 2;
            let lower = u128::from(rounded.cents()) * 2 * u128::from(den);
            // -0.5 < rounded - exact <= 0.5, scaled by 2*den
            prop_assert!(lower + u128::from(den) > exact_twice);
            prop_assert!(exact_twice + u128::from(den) >= lower);
        }
    }
}
