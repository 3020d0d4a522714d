//! Fees.
//!
//! Two kinds of fee exist:
//!
//! - the **service fee**, paid by the buyer on top of the tickets: a fixed
//!   platform component plus a percentage of the ticket total, and a fixed
//!   payment-processor component. Each component is grossed up with 21% VAT
//!   on its own and the two are summed.
//! - **organizer charges**, deducted from the organizer's payout: a
//!   basis-point platform fee on the ticket total and a per-ticket overage
//!   fee for tickets beyond the plan's monthly allowance.

use super::vat::{VatBreakdown, VatRate, vat_from_exclusive, vat_from_inclusive};
use crate::types::{FeeOverride, Plan};
use kassa_core::Money;
use serde::{Deserialize, Serialize};

/// Basis points in one whole.
pub const BASIS_POINTS: u64 = 10_000;

// ============================================================================
// Service fee (buyer side)
// ============================================================================

/// Service fee components, VAT excluded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFeeConfig {
    /// Fixed platform component per order
    pub platform_fixed: Money,
    /// Percentage of the ticket total, in basis points (200 = 2%)
    pub platform_percentage_bp: u32,
    /// Fixed payment processor component per order
    pub processor_fixed: Money,
}

impl Default for ServiceFeeConfig {
    fn default() -> Self {
        Self {
            platform_fixed: Money::from_cents(35),
            platform_percentage_bp: 200,
            processor_fixed: Money::from_cents(29),
        }
    }
}

/// Service fee with both components itemized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFeeBreakdown {
    /// Platform component
    pub platform: VatBreakdown,
    /// Payment processor component
    pub processor: VatBreakdown,
    /// `platform.incl + processor.incl`
    pub total: Money,
}

impl ServiceFeeBreakdown {
    /// VAT contained in the fee.
    #[must_use]
    pub const fn vat(&self) -> Money {
        Money::from_cents(self.platform.vat.cents().saturating_add(self.processor.vat.cents()))
    }
}

/// Service fee for an order with the given ticket total.
///
/// Free orders carry no service fee. Returns `None` on overflow.
///
/// # Examples
///
/// ```
/// use kassa_core::Money;
/// use ticketing::pricing::{service_fee, ServiceFeeConfig};
///
/// // €50.00 of tickets: platform 0.35 + 1.00 = 1.35 → 1.63 incl.; processor 0.29 → 0.35 incl.
/// let fee = service_fee(Money::from_cents(5000), &ServiceFeeConfig::default()).unwrap();
/// assert_eq!(fee.total, Money::from_cents(198));
/// ```
#[must_use]
pub fn service_fee(ticket_total: Money, config: &ServiceFeeConfig) -> Option<ServiceFeeBreakdown> {
    if ticket_total.is_zero() {
        return Some(ServiceFeeBreakdown {
            platform: vat_from_inclusive(Money::ZERO, VatRate::Standard21),
            processor: vat_from_inclusive(Money::ZERO, VatRate::Standard21),
            total: Money::ZERO,
        });
    }
    let percentage =
        ticket_total.mul_ratio_round(u64::from(config.platform_percentage_bp), BASIS_POINTS)?;
    let platform = vat_from_exclusive(
        config.platform_fixed.checked_add(percentage)?,
        VatRate::Standard21,
    )?;
    let processor = vat_from_exclusive(config.processor_fixed, VatRate::Standard21)?;
    Some(ServiceFeeBreakdown {
        total: platform.incl.checked_add(processor.incl)?,
        platform,
        processor,
    })
}

// ============================================================================
// Organizer charges (payout side)
// ============================================================================

/// What a plan costs and charges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTerms {
    /// Subscription price per month, VAT excluded
    pub monthly_price: Money,
    /// Platform fee on the ticket total, in basis points
    pub platform_fee_bp: u32,
    /// Tickets per calendar month without overage fee
    pub included_tickets: u32,
    /// Fee per ticket beyond the allowance
    pub overage_fee_per_ticket: Money,
}

impl Plan {
    /// Terms of the plan.
    #[must_use]
    pub const fn terms(self) -> PlanTerms {
        match self {
            Self::Free => PlanTerms {
                monthly_price: Money::ZERO,
                platform_fee_bp: 200,
                included_tickets: 100,
                overage_fee_per_ticket: Money::from_cents(50),
            },
            Self::Pro => PlanTerms {
                monthly_price: Money::from_cents(4_900),
                platform_fee_bp: 100,
                included_tickets: 1_000,
                overage_fee_per_ticket: Money::from_cents(25),
            },
            Self::Business => PlanTerms {
                monthly_price: Money::from_cents(14_900),
                platform_fee_bp: 50,
                included_tickets: 5_000,
                overage_fee_per_ticket: Money::from_cents(10),
            },
        }
    }
}

/// Fee terms in force for one event: the plan's, with any override applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTerms {
    /// Platform fee in basis points
    pub platform_fee_bp: u32,
    /// Monthly allowance before overage applies
    pub included_tickets: u32,
    /// Fee per ticket beyond the allowance
    pub overage_fee_per_ticket: Money,
    /// Whether an event override changed anything
    pub overridden: bool,
}

impl FeeTerms {
    /// Combine a plan with an event's override, field by field.
    #[must_use]
    pub fn resolve(plan: Plan, fee_override: Option<&FeeOverride>) -> Self {
        let terms = plan.terms();
        let mut resolved = Self {
            platform_fee_bp: terms.platform_fee_bp,
            included_tickets: terms.included_tickets,
            overage_fee_per_ticket: terms.overage_fee_per_ticket,
            overridden: false,
        };
        if let Some(o) = fee_override {
            if let Some(bp) = o.platform_fee_bp {
                resolved.platform_fee_bp = bp;
                resolved.overridden = true;
            }
            if let Some(fee) = o.overage_fee_per_ticket {
                resolved.overage_fee_per_ticket = fee;
                resolved.overridden = true;
            }
        }
        resolved
    }
}

/// Charges deducted from the organizer's payout for one order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizerCharges {
    /// Basis-point platform fee
    pub platform_fee: Money,
    /// Tickets of this order beyond the monthly allowance
    pub overage_tickets: u32,
    /// Overage fee for those tickets
    pub overage_fee: Money,
    /// What the organizer keeps of the ticket total
    pub payout: Money,
}

/// Organizer charges for an order.
///
/// `tickets_sold_this_month` counts tickets in the organization's orders
/// already paid this calendar month. Charges never exceed the ticket total.
#[must_use]
pub fn organizer_charges(
    ticket_total: Money,
    tickets_in_order: u32,
    tickets_sold_this_month: u32,
    terms: &FeeTerms,
) -> OrganizerCharges {
    let platform_fee = ticket_total
        .mul_ratio_round(u64::from(terms.platform_fee_bp), BASIS_POINTS)
        .map_or(ticket_total, |fee| fee.min(ticket_total));

    let allowance_left = terms.included_tickets.saturating_sub(tickets_sold_this_month);
    let overage_tickets = tickets_in_order.saturating_sub(allowance_left);
    let after_platform = ticket_total.saturating_sub(platform_fee);
    let overage_fee = terms
        .overage_fee_per_ticket
        .checked_multiply(overage_tickets)
        .map_or(after_platform, |fee| fee.min(after_platform));

    OrganizerCharges {
        platform_fee,
        overage_tickets,
        overage_fee,
        payout: after_platform.saturating_sub(overage_fee),
    }
}

// ============================================================================
// Quotes
// ============================================================================

/// One line of a prospective order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuoteLine {
    /// Price per ticket, VAT included
    pub unit_price: Money,
    /// Number of tickets
    pub quantity: u32,
    /// VAT rate in the price
    pub vat_rate: VatRate,
}

/// Everything money-related about a prospective order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Sum of lines, VAT included
    pub ticket_total: Money,
    /// VAT contained in the ticket total
    pub ticket_vat: Money,
    /// Service fee
    pub service_fee: ServiceFeeBreakdown,
    /// What the buyer pays
    pub total: Money,
    /// Organizer-side charges
    pub charges: OrganizerCharges,
    /// Amount routed to the platform on payment:
    /// service fee + platform fee + overage fee
    pub application_fee: Money,
}

/// Price a prospective order. Returns `None` on overflow.
#[must_use]
pub fn quote(
    lines: &[QuoteLine],
    tickets_sold_this_month: u32,
    terms: &FeeTerms,
    service: &ServiceFeeConfig,
) -> Option<PriceQuote> {
    let mut ticket_total = Money::ZERO;
    let mut ticket_vat = Money::ZERO;
    let mut tickets: u32 = 0;
    for line in lines {
        let line_total = line.unit_price.checked_multiply(line.quantity)?;
        ticket_total = ticket_total.checked_add(line_total)?;
        ticket_vat = ticket_vat.checked_add(vat_from_inclusive(line_total, line.vat_rate).vat)?;
        tickets = tickets.checked_add(line.quantity)?;
    }

    let service_fee = service_fee(ticket_total, service)?;
    let charges = organizer_charges(ticket_total, tickets, tickets_sold_this_month, terms);
    let application_fee = service_fee
        .total
        .checked_add(charges.platform_fee)?
        .checked_add(charges.overage_fee)?;

    Some(PriceQuote {
        ticket_total,
        ticket_vat,
        total: ticket_total.checked_add(service_fee.total)?,
        service_fee,
        charges,
        application_fee,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::UserId;
    use chrono::Utc;
    use proptest::prelude::*;

    fn cents(c: u64) -> Money {
        Money::from_cents(c)
    }

    fn free_terms() -> FeeTerms {
        FeeTerms::resolve(Plan::Free, None)
    }

    #[test]
    fn service_fee_components_are_grossed_up_separately() {
        // €25.00: platform 35 + 50 = 85 → 85 * 1.21 = 102.85 → 103
        //         processor 29 → 35.09 → 35
        let fee = service_fee(cents(2500), &ServiceFeeConfig::default()).unwrap();
        assert_eq!(fee.platform.excl, cents(85));
        assert_eq!(fee.platform.incl, cents(103));
        assert_eq!(fee.processor.incl, cents(35));
        assert_eq!(fee.total, cents(138));
        assert_eq!(fee.vat(), cents(24));
    }

    #[test]
    fn percentage_rounds_half_up() {
        // 2% of €0.25 = 0.5 cent → 1
        let fee = service_fee(cents(25), &ServiceFeeConfig::default()).unwrap();
        assert_eq!(fee.platform.excl, cents(36));
    }

    #[test]
    fn free_orders_have_no_service_fee() {
        let fee = service_fee(Money::ZERO, &ServiceFeeConfig::default()).unwrap();
        assert_eq!(fee.total, Money::ZERO);
    }

    #[test]
    fn override_replaces_fields_independently() {
        let o = FeeOverride {
            platform_fee_bp: Some(0),
            overage_fee_per_ticket: None,
            set_by: UserId::new(),
            set_at: Utc::now(),
        };
        let terms = FeeTerms::resolve(Plan::Pro, Some(&o));
        assert_eq!(terms.platform_fee_bp, 0);
        assert_eq!(terms.overage_fee_per_ticket, Plan::Pro.terms().overage_fee_per_ticket);
        assert!(terms.overridden);
        assert!(!FeeTerms::resolve(Plan::Pro, None).overridden);
    }

    #[test]
    fn overage_only_counts_tickets_beyond_allowance() {
        // Free plan: 100 included, 98 already sold, 5 in this order → 3 over
        let charges = organizer_charges(cents(5_000), 5, 98, &free_terms());
        assert_eq!(charges.platform_fee, cents(100));
        assert_eq!(charges.overage_tickets, 3);
        assert_eq!(charges.overage_fee, cents(150));
        assert_eq!(charges.payout, cents(4_750));
    }

    #[test]
    fn charges_are_capped_at_ticket_total() {
        // A €1.00 ticket, far over the allowance, 50c overage each
        let charges = organizer_charges(cents(100), 4, 1_000, &free_terms());
        assert_eq!(charges.platform_fee, cents(2));
        assert_eq!(charges.overage_fee, cents(98));
        assert_eq!(charges.payout, Money::ZERO);

        let free = organizer_charges(Money::ZERO, 4, 1_000, &free_terms());
        assert_eq!(free, OrganizerCharges { overage_tickets: 4, ..OrganizerCharges::default() });
    }

    #[test]
    fn quote_sums_everything() {
        let lines = [
            QuoteLine { unit_price: cents(2_500), quantity: 2, vat_rate: VatRate::Reduced9 },
            QuoteLine { unit_price: cents(1_000), quantity: 1, vat_rate: VatRate::Standard21 },
        ];
        let q = quote(&lines, 0, &free_terms(), &ServiceFeeConfig::default()).unwrap();
        assert_eq!(q.ticket_total, cents(6_000));
        // 5000 * 9/109 = 412.84 → 413; 1000 * 21/121 = 173.55 → 174
        assert_eq!(q.ticket_vat, cents(587));
        // platform 35 + 120 = 155 → 187.55 → 188; processor 35
        assert_eq!(q.service_fee.total, cents(223));
        assert_eq!(q.total, cents(6_223));
        assert_eq!(q.charges.platform_fee, cents(120));
        assert_eq!(q.application_fee, cents(343));
    }

    proptest! {
        #[test]
        fn charges_never_exceed_ticket_total(
            total in 0u64..10_000_000,
            tickets in 0u32..500,
            sold in 0u32..10_000,
            bp in 0u32..20_000,
            overage in 0u64..10_000,
        ) {
            let terms = FeeTerms {
                platform_fee_bp: bp,
                included_tickets: 100,
                overage_fee_per_ticket: cents(overage),
                overridden: true,
            };
            let c = organizer_charges(cents(total), tickets, sold, &terms);
            prop_assert_eq!(
                c.platform_fee.cents() + c.overage_fee.cents() + c.payout.cents(),
                total
            );
        }

        #[test]
        fn application_fee_fits_in_the_payment(
            price in 0u64..100_000,
            qty in 1u32..20,
            sold in 0u32..200,
        ) {
            let lines = [QuoteLine { unit_price: cents(price), quantity: qty, vat_rate: VatRate::Reduced9 }];
            let q = quote(&lines, sold, &free_terms(), &ServiceFeeConfig::default()).unwrap();
            prop_assert!(q.application_fee <= q.total);
            prop_assert_eq!(q.total.cents(), q.ticket_total.cents() + q.service_fee.total.cents());
        }
    }
}
