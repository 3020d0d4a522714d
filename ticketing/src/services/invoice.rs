//! Monthly platform invoices.
//!
//! An invoice bills an organization for one calendar month:
//!
//! - the plan subscription, if the plan has a monthly price;
//! - platform fees withheld on orders paid that month;
//! - overage fees for tickets beyond the plan allowance.
//!
//! Amounts are VAT-exclusive; 21% VAT is added on the subtotal. Orders
//! cancelled after payment were refunded and are not billed.

use super::authorization::{Authorizer, Permission};
use super::fee::month_range;
use crate::error::{Result, TicketingError};
use crate::pricing::{VatRate, vat_from_exclusive};
use crate::repository::{InvoiceRepository, OrderRepository, OrganizationRepository};
use crate::types::{Invoice, InvoiceId, InvoiceLine, Money, Order, Organization, OrganizationId, UserId};
use kassa_core::environment::Clock;
use std::sync::Arc;

/// Invoice generation and listing.
#[derive(Clone)]
pub struct InvoiceService {
    organizations: Arc<dyn OrganizationRepository>,
    orders: Arc<dyn OrderRepository>,
    invoices: Arc<dyn InvoiceRepository>,
    authorizer: Authorizer,
    clock: Arc<dyn Clock>,
}

impl InvoiceService {
    /// Creates a new `InvoiceService`
    #[must_use]
    pub fn new(
        organizations: Arc<dyn OrganizationRepository>,
        orders: Arc<dyn OrderRepository>,
        invoices: Arc<dyn InvoiceRepository>,
        authorizer: Authorizer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            organizations,
            orders,
            invoices,
            authorizer,
            clock,
        }
    }

    /// Invoice one organization for a finished month. Platform admins only.
    ///
    /// # Errors
    ///
    /// - `Forbidden` for anyone but platform admins
    /// - `Validation` for an invalid or unfinished month
    /// - `Conflict` if the organization was already invoiced for it
    pub async fn generate_monthly(
        &self,
        admin_id: UserId,
        organization_id: OrganizationId,
        year: i32,
        month: u32,
    ) -> Result<Invoice> {
        self.authorizer.require_platform_admin(admin_id).await?;
        let organization = self
            .organizations
            .get_organization(organization_id)
            .await?
            .ok_or_else(|| TicketingError::not_found("organization", organization_id))?;
        self.check_period(year, month)?;
        if self
            .invoices
            .find_invoice_for_period(organization_id, year, month)
            .await?
            .is_some()
        {
            return Err(TicketingError::Conflict(format!(
                "Organization {organization_id} already has an invoice for {year}-{month:02}"
            )));
        }
        let (lines, subtotal) = self.lines(&organization, year, month).await?;
        self.issue(&organization, year, month, lines, subtotal).await
    }

    /// Invoice every organization for a finished month, skipping those
    /// already invoiced and those that owe nothing. Platform admins only.
    ///
    /// # Errors
    ///
    /// As [`InvoiceService::generate_monthly`], minus the `Conflict`.
    pub async fn generate_all_monthly(&self, admin_id: UserId, year: i32, month: u32) -> Result<Vec<Invoice>> {
        self.authorizer.require_platform_admin(admin_id).await?;
        self.check_period(year, month)?;
        let mut issued = Vec::new();
        for organization in self.organizations.list_organizations().await? {
            if self
                .invoices
                .find_invoice_for_period(organization.id, year, month)
                .await?
                .is_some()
            {
                continue;
            }
            let (lines, subtotal) = self.lines(&organization, year, month).await?;
            if subtotal.is_zero() {
                tracing::debug!(organization_id = %organization.id, "Nothing to invoice");
                continue;
            }
            issued.push(self.issue(&organization, year, month, lines, subtotal).await?);
        }
        tracing::info!(year, month, count = issued.len(), "Monthly invoices generated");
        Ok(issued)
    }

    /// The organization's invoices, newest first. ADMIN only.
    ///
    /// # Errors
    ///
    /// `NotFound`/`Forbidden` unless the caller is an ADMIN.
    pub async fn list_invoices(&self, user_id: UserId, organization_id: OrganizationId) -> Result<Vec<Invoice>> {
        self.authorizer
            .require(user_id, organization_id, Permission::ManageOrganization)
            .await?;
        self.invoices.list_invoices_for_organization(organization_id).await
    }

    fn check_period(&self, year: i32, month: u32) -> Result<()> {
        let (_, end) = month_range(year, month)
            .ok_or_else(|| TicketingError::Validation(format!("Invalid period {year}-{month}")))?;
        if end > self.clock.now() {
            return Err(TicketingError::Validation(format!(
                "{year}-{month:02} has not ended yet"
            )));
        }
        Ok(())
    }

    async fn lines(&self, organization: &Organization, year: i32, month: u32) -> Result<(Vec<InvoiceLine>, Money)> {
        let (from, to) = month_range(year, month)
            .ok_or_else(|| TicketingError::Validation(format!("Invalid period {year}-{month}")))?;
        let paid = self
            .orders
            .list_paid_orders_for_organization_between(organization.id, from, to)
            .await?;
        let lines = invoice_lines(organization, year, month, &paid)?;
        let subtotal = lines
            .iter()
            .try_fold(Money::ZERO, |sum, line| sum.checked_add(line.amount))
            .ok_or_else(overflow)?;
        Ok((lines, subtotal))
    }

    async fn issue(
        &self,
        organization: &Organization,
        year: i32,
        month: u32,
        lines: Vec<InvoiceLine>,
        subtotal: Money,
    ) -> Result<Invoice> {
        let vat = vat_from_exclusive(subtotal, VatRate::Standard21).ok_or_else(overflow)?;
        let draft = Invoice {
            id: InvoiceId::new(),
            organization_id: organization.id,
            number: String::new(),
            year,
            month,
            lines,
            subtotal,
            vat: vat.vat,
            total: vat.incl,
            issued_at: self.clock.now(),
        };
        let invoice = self.invoices.insert_invoice(&draft).await?;
        tracing::info!(
            organization_id = %organization.id,
            number = %invoice.number,
            total_cents = invoice.total.cents(),
            "Invoice issued"
        );
        Ok(invoice)
    }
}

fn invoice_lines(organization: &Organization, year: i32, month: u32, paid: &[Order]) -> Result<Vec<InvoiceLine>> {
    let mut lines = Vec::with_capacity(3);
    let plan = organization.plan.terms();
    if !plan.monthly_price.is_zero() {
        lines.push(InvoiceLine {
            description: format!("{} plan, {year:04}-{month:02}", organization.plan.label()),
            quantity: 1,
            amount: plan.monthly_price,
        });
    }

    let platform_fees = paid
        .iter()
        .try_fold(Money::ZERO, |sum, o| sum.checked_add(o.platform_fee))
        .ok_or_else(overflow)?;
    if !platform_fees.is_zero() {
        lines.push(InvoiceLine {
            description: "Platform fees".to_string(),
            quantity: u32::try_from(paid.len()).map_err(|_| overflow())?,
            amount: platform_fees,
        });
    }

    let overage_tickets = paid
        .iter()
        .fold(0u32, |sum, o| sum.saturating_add(o.overage_tickets));
    let overage_fees = paid
        .iter()
        .try_fold(Money::ZERO, |sum, o| sum.checked_add(o.overage_fee))
        .ok_or_else(overflow)?;
    if !overage_fees.is_zero() {
        lines.push(InvoiceLine {
            description: "Tickets beyond the monthly allowance".to_string(),
            quantity: overage_tickets,
            amount: overage_fees,
        });
    }
    Ok(lines)
}

fn overflow() -> TicketingError {
    TicketingError::Internal("invoice amount overflow".to_string())
}
