//! Mock Mollie client.

use crate::amount::MollieAmount;
use crate::error::{PaymentError, Result};
use crate::providers::{
    ClientLink, ClientLinkRequest, CreatePaymentRequest, MollieApiClient, MollieOAuthClient,
    Onboarding, OnboardingState, Payment, PaymentStatus, Refund, TokenResponse,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct MockState {
    counter: u64,
    access_tokens: HashSet<String>,
    refresh_tokens: HashSet<String>,
    revoked: Vec<String>,
    refresh_calls: usize,
    reject_refresh: bool,
    fail_revoke: bool,
    fail_payments: bool,
    can_receive_payments: bool,
    expires_in: i64,
    payments: HashMap<String, Payment>,
    payment_requests: Vec<CreatePaymentRequest>,
    refunds: Vec<Refund>,
    client_links: Vec<ClientLinkRequest>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            counter: 0,
            access_tokens: HashSet::new(),
            refresh_tokens: HashSet::new(),
            revoked: Vec::new(),
            refresh_calls: 0,
            reject_refresh: false,
            fail_revoke: false,
            fail_payments: false,
            can_receive_payments: true,
            expires_in: 3600,
            payments: HashMap::new(),
            payment_requests: Vec::new(),
            refunds: Vec::new(),
            client_links: Vec::new(),
        }
    }
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{prefix}_mock{}", self.counter)
    }

    fn issue_tokens(&mut self) -> TokenResponse {
        let access_token = self.next_id("access");
        let refresh_token = self.next_id("refresh");
        self.access_tokens.insert(access_token.clone());
        self.refresh_tokens.insert(refresh_token.clone());
        TokenResponse {
            access_token,
            refresh_token: Some(refresh_token),
            expires_in: self.expires_in,
            scope: "payments.read payments.write refunds.write onboarding.read".to_string(),
        }
    }

    fn authorize(&self, access_token: &str) -> Result<()> {
        if self.access_tokens.contains(access_token) {
            Ok(())
        } else {
            Err(PaymentError::Api {
                status: 401,
                message: "Missing or invalid authentication".to_string(),
            })
        }
    }
}

/// In-memory Mollie implementing both the OAuth and the API trait.
///
/// Tokens it issues are tracked, so API calls made with a token it never
/// issued (or one that was revoked) fail with a 401 like the real API.
/// Refresh tokens rotate on every refresh.
#[derive(Debug, Clone, Default)]
pub struct MockMollieClient {
    state: Arc<Mutex<MockState>>,
}

impl MockMollieClient {
    /// Create a mock whose accounts can receive payments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every refresh fail with `invalid_grant`.
    pub fn reject_refreshes(&self, reject: bool) {
        self.lock().reject_refresh = reject;
    }

    /// Make token revocation fail.
    pub fn fail_revocations(&self, fail: bool) {
        self.lock().fail_revoke = fail;
    }

    /// Make payment creation fail with a 422.
    pub fn fail_payments(&self, fail: bool) {
        self.lock().fail_payments = fail;
    }

    /// Set the onboarding answer for every account.
    pub fn set_can_receive_payments(&self, can: bool) {
        self.lock().can_receive_payments = can;
    }

    /// Lifetime of tokens issued from now on.
    pub fn set_token_lifetime(&self, seconds: i64) {
        self.lock().expires_in = seconds;
    }

    /// Simulate the buyer finishing (or abandoning) checkout.
    ///
    /// # Errors
    ///
    /// Returns a 404 API error for unknown payments.
    pub fn set_payment_status(&self, payment_id: &str, status: PaymentStatus) -> Result<()> {
        let mut state = self.lock();
        let payment = state.payments.get_mut(payment_id).ok_or_else(|| PaymentError::Api {
            status: 404,
            message: format!("No payment exists with token {payment_id}"),
        })?;
        payment.status = status;
        if status.is_final() {
            payment.checkout_url = None;
        }
        Ok(())
    }

    /// Make Mollie report a different amount for a payment.
    ///
    /// # Errors
    ///
    /// Returns a 404 API error for unknown payments.
    pub fn set_payment_amount(&self, payment_id: &str, amount: MollieAmount) -> Result<()> {
        let mut state = self.lock();
        let payment = state.payments.get_mut(payment_id).ok_or_else(|| PaymentError::Api {
            status: 404,
            message: format!("No payment exists with token {payment_id}"),
        })?;
        payment.amount = amount;
        Ok(())
    }

    /// Payment creation requests received, in order.
    #[must_use]
    pub fn payment_requests(&self) -> Vec<CreatePaymentRequest> {
        self.lock().payment_requests.clone()
    }

    /// Refunds created, in order.
    #[must_use]
    pub fn refunds(&self) -> Vec<Refund> {
        self.lock().refunds.clone()
    }

    /// Tokens revoked, in order.
    #[must_use]
    pub fn revoked_tokens(&self) -> Vec<String> {
        self.lock().revoked.clone()
    }

    /// Number of refresh calls received.
    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.lock().refresh_calls
    }

    /// Client link requests received.
    #[must_use]
    pub fn client_link_requests(&self) -> Vec<ClientLinkRequest> {
        self.lock().client_links.clone()
    }
}

#[async_trait]
impl MollieOAuthClient for MockMollieClient {
    async fn exchange_code(&self, code: &str, _redirect_uri: &str) -> Result<TokenResponse> {
        if code.is_empty() || code == "invalid" {
            return Err(PaymentError::OAuth {
                reason: "The authorization code is invalid".to_string(),
            });
        }
        Ok(self.lock().issue_tokens())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let mut state = self.lock();
        state.refresh_calls += 1;
        if state.reject_refresh || !state.refresh_tokens.remove(refresh_token) {
            return Err(PaymentError::InvalidGrant);
        }
        Ok(state.issue_tokens())
    }

    async fn revoke(&self, token: &str) -> Result<()> {
        let mut state = self.lock();
        if state.fail_revoke {
            return Err(PaymentError::Api {
                status: 503,
                message: "Service unavailable".to_string(),
            });
        }
        state.refresh_tokens.remove(token);
        state.access_tokens.remove(token);
        state.revoked.push(token.to_string());
        Ok(())
    }

    async fn create_client_link(&self, request: &ClientLinkRequest) -> Result<ClientLink> {
        let mut state = self.lock();
        state.client_links.push(request.clone());
        let id = state.next_id("cl");
        Ok(ClientLink {
            url: format!("https://my.mollie.com/dashboard/client-link/{id}"),
            id,
        })
    }
}

#[async_trait]
impl MollieApiClient for MockMollieClient {
    async fn onboarding(&self, access_token: &str) -> Result<Onboarding> {
        let state = self.lock();
        state.authorize(access_token)?;
        Ok(if state.can_receive_payments {
            Onboarding {
                status: OnboardingState::Completed,
                can_receive_payments: true,
                can_receive_settlements: true,
            }
        } else {
            Onboarding {
                status: OnboardingState::NeedsData,
                can_receive_payments: false,
                can_receive_settlements: false,
            }
        })
    }

    async fn create_payment(
        &self,
        access_token: &str,
        request: &CreatePaymentRequest,
    ) -> Result<Payment> {
        let mut state = self.lock();
        state.authorize(access_token)?;
        if state.fail_payments {
            return Err(PaymentError::Api {
                status: 422,
                message: "The amount is lower than the minimum".to_string(),
            });
        }
        state.payment_requests.push(request.clone());
        let id = state.next_id("tr");
        let payment = Payment {
            checkout_url: Some(format!("https://www.mollie.com/checkout/select-method/{id}")),
            id: id.clone(),
            status: PaymentStatus::Open,
            amount: request.amount.clone(),
            metadata: request.metadata.clone(),
        };
        state.payments.insert(id, payment.clone());
        Ok(payment)
    }

    async fn get_payment(&self, access_token: &str, payment_id: &str) -> Result<Payment> {
        let state = self.lock();
        state.authorize(access_token)?;
        state
            .payments
            .get(payment_id)
            .cloned()
            .ok_or_else(|| PaymentError::Api {
                status: 404,
                message: format!("No payment exists with token {payment_id}"),
            })
    }

    async fn create_refund(
        &self,
        access_token: &str,
        payment_id: &str,
        amount: &MollieAmount,
    ) -> Result<Refund> {
        let mut state = self.lock();
        state.authorize(access_token)?;
        let paid = state
            .payments
            .get(payment_id)
            .is_some_and(|p| p.status == PaymentStatus::Paid);
        if !paid {
            return Err(PaymentError::Api {
                status: 422,
                message: format!("Payment {payment_id} cannot be refunded"),
            });
        }
        let refund = Refund {
            id: state.next_id("re"),
            payment_id: payment_id.to_string(),
            amount: amount.clone(),
        };
        state.refunds.push(refund.clone());
        Ok(refund)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use kassa_core::Money;

    #[tokio::test]
    async fn refresh_tokens_rotate() {
        let mock = MockMollieClient::new();
        let first = mock.exchange_code("auth_code", "https://cb").await.unwrap();
        let old_refresh = first.refresh_token.unwrap();

        let second = mock.refresh(&old_refresh).await.unwrap();
        assert_ne!(second.access_token, first.access_token);
        assert!(matches!(
            mock.refresh(&old_refresh).await,
            Err(PaymentError::InvalidGrant)
        ));
        assert_eq!(mock.refresh_calls(), 2);
    }

    #[tokio::test]
    async fn api_rejects_unknown_tokens() {
        let mock = MockMollieClient::new();
        let err = mock.onboarding("access_forged").await.unwrap_err();
        assert_eq!(err, PaymentError::Api { status: 401, message: "Missing or invalid authentication".into() });
    }

    #[tokio::test]
    async fn refunds_require_a_paid_payment() {
        let mock = MockMollieClient::new();
        let token = mock.exchange_code("c", "https://cb").await.unwrap().access_token;
        let request = CreatePaymentRequest {
            amount: MollieAmount::eur(Money::from_cents(1000)),
            description: "Order".into(),
            redirect_url: "https://kassa.test".into(),
            webhook_url: None,
            metadata: serde_json::Value::Null,
            application_fee: None,
            testmode: true,
        };
        let payment = mock.create_payment(&token, &request).await.unwrap();
        let amount = MollieAmount::eur(Money::from_cents(1000));
        assert!(mock.create_refund(&token, &payment.id, &amount).await.is_err());

        mock.set_payment_status(&payment.id, PaymentStatus::Paid).unwrap();
        let refund = mock.create_refund(&token, &payment.id, &amount).await.unwrap();
        assert_eq!(refund.payment_id, payment.id);
        assert_eq!(mock.refunds().len(), 1);
    }
}
