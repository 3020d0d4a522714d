//! Fee terms and quotes for live orders.

use crate::error::{Result, TicketingError};
use crate::pricing::{FeeTerms, PriceQuote, QuoteLine, ServiceFeeConfig, quote};
use crate::repository::OrderRepository;
use crate::types::{Event, Organization, OrganizationId};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use std::sync::Arc;

/// `[first instant of the month, first instant of the next month)` in UTC.
///
/// Returns `None` for an invalid month.
#[must_use]
pub fn month_range(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((
        Utc.from_utc_datetime(&start.and_hms_opt(0, 0, 0)?),
        Utc.from_utc_datetime(&end.and_hms_opt(0, 0, 0)?),
    ))
}

/// Plan and override resolution plus month-to-date usage.
#[derive(Clone)]
pub struct FeeService {
    orders: Arc<dyn OrderRepository>,
    service_fees: ServiceFeeConfig,
}

impl FeeService {
    /// Creates a new `FeeService`
    #[must_use]
    pub fn new(orders: Arc<dyn OrderRepository>, service_fees: ServiceFeeConfig) -> Self {
        Self { orders, service_fees }
    }

    /// Buyer-side fee components in force.
    #[must_use]
    pub const fn service_fees(&self) -> &ServiceFeeConfig {
        &self.service_fees
    }

    /// Terms for orders of `event`: the organization's plan with the
    /// event's override applied.
    #[must_use]
    pub fn terms(organization: &Organization, event: &Event) -> FeeTerms {
        FeeTerms::resolve(organization.plan, event.fee_override.as_ref())
    }

    /// Tickets the organization sold in the calendar month containing `now`.
    ///
    /// # Errors
    ///
    /// Returns error if storage fails.
    pub async fn tickets_sold_this_month(
        &self,
        organization_id: OrganizationId,
        now: DateTime<Utc>,
    ) -> Result<u32> {
        let (from, to) = month_range(now.year(), now.month())
            .ok_or_else(|| TicketingError::Internal(format!("no calendar month for {now}")))?;
        self.orders.count_tickets_sold_between(organization_id, from, to).await
    }

    /// Price a prospective order for `event` as of `now`.
    ///
    /// # Errors
    ///
    /// `Validation` if the amounts overflow.
    pub async fn quote(
        &self,
        organization: &Organization,
        event: &Event,
        lines: &[QuoteLine],
        now: DateTime<Utc>,
    ) -> Result<PriceQuote> {
        let terms = Self::terms(organization, event);
        let sold = self.tickets_sold_this_month(organization.id, now).await?;
        let priced = quote(lines, sold, &terms, &self.service_fees)
            .ok_or_else(|| TicketingError::Validation("Order total too large".to_string()))?;
        tracing::debug!(
            organization_id = %organization.id,
            event_id = %event.id,
            sold_this_month = sold,
            platform_fee_bp = terms.platform_fee_bp,
            overridden = terms.overridden,
            ticket_total_cents = priced.ticket_total.cents(),
            total_cents = priced.total.cents(),
            application_fee_cents = priced.application_fee.cents(),
            "Order quoted"
        );
        Ok(priced)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn month_ranges() {
        let (from, to) = month_range(2025, 2).unwrap();
        assert_eq!(from.to_rfc3339(), "2025-02-01T00:00:00+00:00");
        assert_eq!(to.to_rfc3339(), "2025-03-01T00:00:00+00:00");

        let (_, to) = month_range(2024, 12).unwrap();
        assert_eq!(to.to_rfc3339(), "2025-01-01T00:00:00+00:00");

        assert!(month_range(2025, 13).is_none());
        assert!(month_range(2025, 0).is_none());
    }
}
