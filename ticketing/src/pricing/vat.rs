//! Dutch VAT.
//!
//! Ticket prices are VAT-inclusive, fee components are VAT-exclusive. Both
//! directions round half up to the cent, and `excl + vat == incl` holds for
//! every breakdown.

use kassa_core::Money;
use serde::{Deserialize, Serialize};
use std::fmt;

/// VAT rates applicable in the Netherlands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VatRate {
    /// 21%, the general rate. Applies to platform and processor fees.
    #[serde(rename = "STANDARD_21")]
    Standard21,
    /// 9%, the reduced rate for admission to cultural events.
    #[default]
    #[serde(rename = "REDUCED_9")]
    Reduced9,
    /// 0%, exempt admissions.
    #[serde(rename = "EXEMPT")]
    Exempt,
}

impl VatRate {
    /// Rate in basis points (2100 = 21%).
    #[must_use]
    pub const fn basis_points(self) -> u64 {
        match self {
            Self::Standard21 => 2100,
            Self::Reduced9 => 900,
            Self::Exempt => 0,
        }
    }
}

impl fmt::Display for VatRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard21 => write!(f, "21%"),
            Self::Reduced9 => write!(f, "9%"),
            Self::Exempt => write!(f, "0%"),
        }
    }
}

/// An amount split into its VAT-exclusive part and its VAT.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatBreakdown {
    /// Amount without VAT
    pub excl: Money,
    /// VAT
    pub vat: Money,
    /// Amount with VAT
    pub incl: Money,
    /// Rate applied
    pub rate: VatRate,
}

/// Split a VAT-inclusive amount.
///
/// `vat = round_half_up(incl * rate / (1 + rate))`, `excl = incl - vat`.
///
/// # Examples
///
/// ```
/// use kassa_core::Money;
/// use ticketing::pricing::{vat_from_inclusive, VatRate};
///
/// let b = vat_from_inclusive(Money::from_cents(1000), VatRate::Standard21);
/// assert_eq!(b.vat, Money::from_cents(174));
/// assert_eq!(b.excl, Money::from_cents(826));
/// ```
#[must_use]
pub fn vat_from_inclusive(incl: Money, rate: VatRate) -> VatBreakdown {
    let bp = rate.basis_points();
    // The ratio is below one and the denominator positive, so this never fails.
    let vat = incl.mul_ratio_round(bp, 10_000 + bp).unwrap_or(Money::ZERO);
    VatBreakdown {
        excl: incl.saturating_sub(vat),
        vat,
        incl,
        rate,
    }
}

/// Add VAT to a VAT-exclusive amount.
///
/// `vat = round_half_up(excl * rate)`, `incl = excl + vat`. Returns `None`
/// only if the inclusive amount overflows.
///
/// # Examples
///
/// ```
/// use kassa_core::Money;
/// use ticketing::pricing::{vat_from_exclusive, VatRate};
///
/// let b = vat_from_exclusive(Money::from_cents(29), VatRate::Standard21).unwrap();
/// assert_eq!(b.vat, Money::from_cents(6));
/// assert_eq!(b.incl, Money::from_cents(35));
/// ```
#[must_use]
pub fn vat_from_exclusive(excl: Money, rate: VatRate) -> Option<VatBreakdown> {
    let vat = excl.mul_ratio_round(rate.basis_points(), 10_000)?;
    Some(VatBreakdown {
        excl,
        vat,
        incl: excl.checked_add(vat)?,
        rate,
    })
}
