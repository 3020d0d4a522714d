//! Application coordinator.

use crate::config::Config;
use crate::error::Result;
use crate::repository::Repositories;
use crate::services::{
    Authorizer, EventService, FeeService, InvoiceService, OrderService, OrganizationService,
    PaymentConnections, TicketService, TicketTypeService, UserService,
};
use crate::signing::QrSigner;
use kassa_core::environment::Clock;
use kassa_payments::providers::{MollieApiClient, MollieOAuthClient};
use kassa_payments::stores::{InMemoryConnectStateStore, InMemoryConnectionStore};
use kassa_payments::{MollieConnectService, TokenCipher};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// What one maintenance pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    /// PENDING orders cancelled because their reservation lapsed
    pub expired_orders: usize,
    /// LIVE events moved to ENDED
    pub ended_events: usize,
}

/// The ticketing platform, fully wired.
///
/// Cloning is cheap; every service shares the same repositories.
#[derive(Clone)]
pub struct TicketingApp {
    /// Accounts
    pub users: UserService,
    /// Organizations and memberships
    pub organizations: OrganizationService,
    /// Events
    pub events: EventService,
    /// Ticket types
    pub ticket_types: TicketTypeService,
    /// Checkout and orders
    pub orders: OrderService,
    /// Tickets and scanning
    pub tickets: TicketService,
    /// Fee terms and quotes
    pub fees: FeeService,
    /// Monthly invoices
    pub invoices: InvoiceService,
    /// Mollie account connections
    pub payments: PaymentConnections,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl TicketingApp {
    /// Wire every service.
    ///
    /// # Errors
    ///
    /// Returns error if the QR signing secret is empty.
    pub fn new(
        config: Config,
        repositories: Repositories,
        mollie: Arc<MollieConnectService>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let Repositories {
            users,
            organizations,
            events,
            ticket_types,
            orders,
            tickets,
            invoices,
        } = repositories;

        let authorizer = Authorizer::new(users.clone(), organizations.clone());
        let signer = QrSigner::new(config.tickets.qr_signing_secret.as_bytes())?;
        let fees = FeeService::new(orders.clone(), config.pricing.service_fee_config());

        let ticket_service = TicketService::new(
            events.clone(),
            ticket_types.clone(),
            orders.clone(),
            tickets,
            authorizer.clone(),
            signer,
            clock.clone(),
        );
        let ticket_type_service = TicketTypeService::new(
            events.clone(),
            ticket_types.clone(),
            authorizer.clone(),
            clock.clone(),
        );
        let payments = PaymentConnections::new(mollie.clone(), authorizer.clone());
        let order_service = OrderService::new(
            events.clone(),
            organizations.clone(),
            ticket_types.clone(),
            orders.clone(),
            fees.clone(),
            ticket_service.clone(),
            mollie,
            authorizer.clone(),
            clock.clone(),
            config.pricing.order_ttl(),
            config.server.public_base_url.clone(),
        );
        let event_service = EventService::new(
            events,
            organizations.clone(),
            ticket_types,
            orders.clone(),
            order_service.clone(),
            ticket_type_service.clone(),
            payments.clone(),
            authorizer.clone(),
            clock.clone(),
        );

        tracing::info!(
            public_base_url = %config.server.public_base_url,
            order_ttl_minutes = config.pricing.order_ttl_minutes,
            testmode = config.mollie.testmode,
            "Ticketing application wired"
        );

        Ok(Self {
            users: UserService::new(users.clone(), clock.clone()),
            organizations: OrganizationService::new(
                users,
                organizations.clone(),
                authorizer.clone(),
                clock.clone(),
            ),
            events: event_service,
            ticket_types: ticket_type_service,
            orders: order_service,
            tickets: ticket_service,
            invoices: InvoiceService::new(organizations, orders, invoices, authorizer, clock.clone()),
            fees,
            payments,
            clock,
            config,
        })
    }

    /// Everything in memory, with the given Mollie clients. Connections are
    /// stored encrypted with the configured token key.
    ///
    /// # Errors
    ///
    /// Returns error if the token key or QR signing secret is unusable.
    pub fn in_memory(
        config: Config,
        oauth: Arc<dyn MollieOAuthClient>,
        api: Arc<dyn MollieApiClient>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Self::with_repositories(config, Repositories::in_memory(), oauth, api, clock)
    }

    /// Like [`in_memory`](Self::in_memory), but over the given repositories.
    ///
    /// # Errors
    ///
    /// Returns error if the token key or QR signing secret is unusable.
    pub fn with_repositories(
        config: Config,
        repositories: Repositories,
        oauth: Arc<dyn MollieOAuthClient>,
        api: Arc<dyn MollieApiClient>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let cipher = TokenCipher::new(&config.mollie.encryption_key_bytes()?)?;
        let mollie = Arc::new(MollieConnectService::new(
            config.mollie.clone(),
            oauth,
            api,
            Arc::new(InMemoryConnectionStore::new(cipher)),
            Arc::new(InMemoryConnectStateStore::new()),
            clock.clone(),
        ));
        Self::new(config, repositories, mollie, clock)
    }

    /// Expire lapsed orders and end past events, as of now.
    ///
    /// # Errors
    ///
    /// Returns error if a sweep cannot list its candidates.
    pub async fn run_maintenance(&self) -> Result<MaintenanceReport> {
        let now = self.clock.now();
        let report = MaintenanceReport {
            expired_orders: self.orders.expire_stale_orders(now).await?,
            ended_events: self.events.end_past_events(now).await?,
        };
        tracing::debug!(
            expired_orders = report.expired_orders,
            ended_events = report.ended_events,
            "Maintenance pass finished"
        );
        Ok(report)
    }

    /// Run [`run_maintenance`](Self::run_maintenance) every `period` until
    /// the task is aborted.
    #[must_use]
    pub fn spawn_maintenance(&self, period: Duration) -> JoinHandle<()> {
        let app = self.clone();
        tokio::spawn(async move {
            tracing::info!(period_secs = period.as_secs(), "Maintenance task started");
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = app.run_maintenance().await {
                    tracing::error!(error = %e, "Maintenance pass failed");
                }
            }
        })
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }
}
