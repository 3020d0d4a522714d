//! Pricing: VAT, service fees and organizer charges.
//!
//! Pure integer-cent arithmetic. Every rounding step rounds half up to the
//! nearest cent.

pub mod fees;
pub mod vat;

pub use fees::{
    FeeTerms, OrganizerCharges, PlanTerms, PriceQuote, QuoteLine, ServiceFeeBreakdown,
    ServiceFeeConfig, organizer_charges, quote, service_fee,
};
pub use vat::{VatBreakdown, VatRate, vat_from_exclusive, vat_from_inclusive};
