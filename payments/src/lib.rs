//! # Kassa Payments
//!
//! Mollie Connect integration for organizations selling tickets on Kassa.
//!
//! Every organization links its own Mollie account through OAuth. Payments
//! are then created on the organization's account, and the platform's share
//! travels along as an application fee.
//!
//! ## Connect Flow
//!
//! ```text
//! start()                    complete(code, state)          access_token()
//! ┌──────────────────┐       ┌──────────────────────┐       ┌──────────────────────┐
//! │ CSRF state saved │──────▶│ state consumed once  │──────▶│ refresh if expiring  │
//! │ authorize URL    │       │ code → token pair    │       │ rotate + persist     │
//! └──────────────────┘       │ tokens encrypted     │       │ invalid_grant →      │
//!                            └──────────────────────┘       │   needs reauth       │
//!                                                           └──────────────────────┘
//! ```
//!
//! ## Architecture
//!
//! Vendor calls sit behind [`providers::MollieOAuthClient`] and
//! [`providers::MollieApiClient`]. Storage sits behind
//! [`providers::ConnectionStore`] and [`providers::ConnectStateStore`].
//! [`MollieConnectService`] is the only place that decides when a token is
//! refreshed.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod amount;
pub mod config;
pub mod connect;
pub mod crypto;
pub mod error;
pub mod providers;
pub mod stores;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use amount::MollieAmount;
pub use config::MollieConfig;
pub use connect::{ConnectStart, ConnectionOverview, MollieConnectService};
pub use crypto::TokenCipher;
pub use error::{PaymentError, Result};
pub use providers::{
    ApplicationFee, ClientLinkOwner, ClientLinkRequest, ConnectState, ConnectionStatus,
    CreatePaymentRequest, MollieConnection, Onboarding, OnboardingState, Payment, PaymentStatus, Refund,
};
