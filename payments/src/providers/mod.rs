//! Provider traits for the Mollie integration.
//!
//! Vendor HTTP calls and storage are abstracted behind these traits so the
//! connect service can be driven by mocks in tests and by real clients in
//! production.

pub mod api;
pub mod connection_store;
pub mod oauth;
pub mod state_store;

pub use api::{
    ApplicationFee, CreatePaymentRequest, MollieApiClient, Onboarding, OnboardingState, Payment,
    PaymentStatus, Refund,
};
pub use connection_store::{ConnectionStatus, ConnectionStore, MollieConnection};
pub use oauth::{ClientLink, ClientLinkOwner, ClientLinkRequest, MollieOAuthClient, TokenResponse};
pub use state_store::{ConnectState, ConnectStateStore};
