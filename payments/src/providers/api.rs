//! Mollie API client trait and resource types.

use crate::amount::MollieAmount;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Mollie REST calls made on behalf of a connected organization.
///
/// Every call takes the organization's OAuth access token. Obtaining a
/// valid token is the caller's job (see
/// [`MollieConnectService::access_token`](crate::MollieConnectService::access_token)).
#[async_trait]
pub trait MollieApiClient: Send + Sync {
    /// Onboarding status of the connected account.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the token is rejected.
    async fn onboarding(&self, access_token: &str) -> Result<Onboarding>;

    /// Create a payment.
    ///
    /// # Errors
    ///
    /// Returns error if Mollie rejects the payment.
    async fn create_payment(
        &self,
        access_token: &str,
        request: &CreatePaymentRequest,
    ) -> Result<Payment>;

    /// Fetch a payment by id.
    ///
    /// # Errors
    ///
    /// Returns error if the payment does not exist or the request fails.
    async fn get_payment(&self, access_token: &str, payment_id: &str) -> Result<Payment>;

    /// Refund (part of) a payment.
    ///
    /// # Errors
    ///
    /// Returns error if the payment cannot be refunded.
    async fn create_refund(
        &self,
        access_token: &str,
        payment_id: &str,
        amount: &MollieAmount,
    ) -> Result<Refund>;
}

/// Onboarding progress of a connected account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnboardingState {
    /// Mollie still needs information from the organizer
    NeedsData,
    /// Mollie is reviewing the account
    InReview,
    /// Onboarding finished
    Completed,
}

/// Onboarding status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Onboarding {
    /// Current state
    pub status: OnboardingState,
    /// Whether payments can be accepted
    pub can_receive_payments: bool,
    /// Whether settlements are paid out
    pub can_receive_settlements: bool,
}

/// Platform share of a payment, routed to the platform's own account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationFee {
    /// Fee amount
    pub amount: MollieAmount,
    /// Description shown on the organizer's settlement
    pub description: String,
}

/// Request body for creating a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    /// Amount charged to the buyer
    pub amount: MollieAmount,
    /// Description shown to the buyer
    pub description: String,
    /// Where the buyer returns after checkout
    pub redirect_url: String,
    /// Where Mollie posts status changes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Free-form metadata echoed back on the payment
    pub metadata: serde_json::Value,
    /// Platform fee routed to the platform account
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_fee: Option<ApplicationFee>,
    /// Create the payment in test mode
    pub testmode: bool,
}

/// Payment status as reported by Mollie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Created, buyer has not finished checkout
    Open,
    /// Checkout finished, awaiting the method's confirmation
    Pending,
    /// Authorized, not yet captured
    Authorized,
    /// Money received
    Paid,
    /// Buyer canceled
    Canceled,
    /// Buyer never completed checkout
    Expired,
    /// Payment method declined
    Failed,
}

impl PaymentStatus {
    /// Whether Mollie will never change this status again.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Canceled | Self::Expired | Self::Failed
        )
    }
}

/// A Mollie payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Mollie id (`tr_...`)
    pub id: String,
    /// Current status
    pub status: PaymentStatus,
    /// Charged amount
    pub amount: MollieAmount,
    /// Hosted checkout page, present while the payment is open
    pub checkout_url: Option<String>,
    /// Metadata given at creation
    pub metadata: serde_json::Value,
}

/// A Mollie refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    /// Mollie id (`re_...`)
    pub id: String,
    /// Refunded payment
    pub payment_id: String,
    /// Refunded amount
    pub amount: MollieAmount,
}
