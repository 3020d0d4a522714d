//! Mollie Connect service.
//!
//! Owns the OAuth connect flow and every token refresh decision. Callers
//! never touch tokens directly: they ask for an organization's payments to
//! be created, fetched or refunded, and the service makes sure a valid
//! access token is used.

use crate::amount::MollieAmount;
use crate::config::MollieConfig;
use crate::error::{PaymentError, Result};
use crate::providers::{
    ClientLinkRequest, ConnectState, ConnectStateStore, ConnectionStatus, ConnectionStore,
    CreatePaymentRequest, MollieApiClient, MollieConnection, MollieOAuthClient, Onboarding,
    Payment, Refund, TokenResponse,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use kassa_core::environment::Clock;
use kassa_core::{OrganizationId, UserId};
use rand::RngCore;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Where to send an organizer to connect their account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectStart {
    /// URL to redirect the organizer to
    pub authorize_url: String,
    /// CSRF state embedded in the URL
    pub state: String,
}

/// Token-free view of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionOverview {
    /// Owning organization
    pub organization_id: OrganizationId,
    /// Connection health
    pub status: ConnectionStatus,
    /// Granted scopes
    pub scope: String,
    /// When the account was connected
    pub connected_at: DateTime<Utc>,
    /// Admin who connected it
    pub connected_by: UserId,
}

impl From<&MollieConnection> for ConnectionOverview {
    fn from(connection: &MollieConnection) -> Self {
        Self {
            organization_id: connection.organization_id,
            status: connection.status,
            scope: connection.scope.clone(),
            connected_at: connection.connected_at,
            connected_by: connection.connected_by,
        }
    }
}

/// Mollie Connect glue: connect, refresh, disconnect and token-scoped API calls.
#[derive(Clone)]
pub struct MollieConnectService {
    config: MollieConfig,
    oauth: Arc<dyn MollieOAuthClient>,
    api: Arc<dyn MollieApiClient>,
    connections: Arc<dyn ConnectionStore>,
    states: Arc<dyn ConnectStateStore>,
    clock: Arc<dyn Clock>,
    /// Serializes refreshes so a rotated refresh token is never used twice.
    refresh_lock: Arc<Mutex<()>>,
}

impl MollieConnectService {
    /// Wire the service.
    #[must_use]
    pub fn new(
        config: MollieConfig,
        oauth: Arc<dyn MollieOAuthClient>,
        api: Arc<dyn MollieApiClient>,
        connections: Arc<dyn ConnectionStore>,
        states: Arc<dyn ConnectStateStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            oauth,
            api,
            connections,
            states,
            clock,
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &MollieConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════
    // Connect flow
    // ═══════════════════════════════════════════════════════════

    /// Begin connecting an existing Mollie account.
    ///
    /// # Errors
    ///
    /// Returns error if the state cannot be stored.
    pub async fn start(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<ConnectStart> {
        let state = self.remember_state(organization_id, user_id).await?;
        let authorize_url = format!(
            "{}?{}",
            self.config.authorize_url,
            self.oauth_query(&state, false)
        );
        tracing::info!(organization_id = %organization_id, user_id = %user_id, "Mollie connect started");
        Ok(ConnectStart { authorize_url, state })
    }

    /// Begin connecting by signing the organizer up for a new Mollie account.
    ///
    /// The client link URL gets the same OAuth parameters as [`start`](Self::start),
    /// plus `approval_prompt=force` so the consent screen is always shown.
    ///
    /// # Errors
    ///
    /// Returns error if Mollie rejects the client link or the state cannot be stored.
    pub async fn start_with_client_link(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        request: &ClientLinkRequest,
    ) -> Result<ConnectStart> {
        let link = self.oauth.create_client_link(request).await?;
        let state = self.remember_state(organization_id, user_id).await?;
        let separator = if link.url.contains('?') { '&' } else { '?' };
        let authorize_url = format!("{}{separator}{}", link.url, self.oauth_query(&state, true));
        tracing::info!(
            organization_id = %organization_id,
            client_link_id = %link.id,
            "Mollie client link created"
        );
        Ok(ConnectStart { authorize_url, state })
    }

    /// Finish the connect flow from the OAuth callback.
    ///
    /// Shorthand for [`claim_state`](Self::claim_state) followed by
    /// [`connect`](Self::connect), for callers with nothing to check in
    /// between.
    ///
    /// # Errors
    ///
    /// As [`claim_state`](Self::claim_state) and [`connect`](Self::connect).
    pub async fn complete(&self, code: &str, state: &str) -> Result<ConnectionOverview> {
        let pending = self.claim_state(state).await?;
        self.connect(&pending, code).await
    }

    /// Consume a callback's state and return the attempt it belongs to.
    ///
    /// Nothing is exchanged or stored yet, so the caller can check who
    /// started the attempt before an existing connection is replaced.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::InvalidState`] if the state is unknown or already used
    /// - [`PaymentError::StateExpired`] if the state outlived its TTL
    pub async fn claim_state(&self, state: &str) -> Result<ConnectState> {
        let pending = self
            .states
            .take(state)
            .await?
            .ok_or(PaymentError::InvalidState)?;
        if self.clock.now() - pending.created_at > self.config.state_ttl() {
            tracing::warn!(organization_id = %pending.organization_id, "Mollie connect state expired");
            return Err(PaymentError::StateExpired);
        }
        Ok(pending)
    }

    /// Exchange the callback code and store the connection for the claimed
    /// attempt, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Provider errors if the code exchange fails, store errors otherwise.
    pub async fn connect(&self, pending: &ConnectState, code: &str) -> Result<ConnectionOverview> {
        let tokens = self
            .oauth
            .exchange_code(code, &self.config.redirect_uri)
            .await?;
        let refresh_token = tokens.refresh_token.clone().ok_or_else(|| PaymentError::OAuth {
            reason: "token response has no refresh token".to_string(),
        })?;

        let now = self.clock.now();
        let connection = MollieConnection {
            organization_id: pending.organization_id,
            access_token: tokens.access_token,
            refresh_token,
            expires_at: now + Duration::seconds(tokens.expires_in),
            scope: tokens.scope,
            status: ConnectionStatus::Active,
            connected_by: pending.user_id,
            connected_at: now,
            updated_at: now,
        };
        self.connections.save(&connection).await?;

        tracing::info!(
            organization_id = %connection.organization_id,
            user_id = %connection.connected_by,
            "Mollie account connected"
        );
        Ok(ConnectionOverview::from(&connection))
    }

    /// Connection details without tokens, if connected.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn status(&self, organization_id: OrganizationId) -> Result<Option<ConnectionOverview>> {
        Ok(self
            .connections
            .get(organization_id)
            .await?
            .as_ref()
            .map(ConnectionOverview::from))
    }

    /// Disconnect the organization's account.
    ///
    /// Token revocation is best effort; the local connection is removed
    /// regardless.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn disconnect(&self, organization_id: OrganizationId) -> Result<()> {
        if let Some(connection) = self.connections.get(organization_id).await? {
            if let Err(e) = self.oauth.revoke(&connection.refresh_token).await {
                tracing::warn!(
                    organization_id = %organization_id,
                    error = %e,
                    "Mollie token revocation failed; removing connection anyway"
                );
            }
        }
        self.connections.delete(organization_id).await?;
        tracing::info!(organization_id = %organization_id, "Mollie account disconnected");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Tokens
    // ═══════════════════════════════════════════════════════════

    /// A usable access token, refreshed first if it expires within the
    /// configured margin.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::NotConnected`] without a connection
    /// - [`PaymentError::NeedsReauthorization`] once the refresh token was rejected
    /// - Provider or store errors otherwise
    pub async fn access_token(&self, organization_id: OrganizationId) -> Result<String> {
        let connection = self.load_active(organization_id).await?;
        if !connection.expires_within(self.clock.now(), self.config.refresh_margin()) {
            return Ok(connection.access_token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        let connection = self.load_active(organization_id).await?;
        let now = self.clock.now();
        if !connection.expires_within(now, self.config.refresh_margin()) {
            return Ok(connection.access_token);
        }

        match self.oauth.refresh(&connection.refresh_token).await {
            Ok(tokens) => {
                let refreshed = rotate(connection, tokens, now);
                self.connections.save(&refreshed).await?;
                tracing::debug!(
                    organization_id = %organization_id,
                    expires_at = %refreshed.expires_at,
                    "Mollie access token refreshed"
                );
                Ok(refreshed.access_token)
            }
            Err(PaymentError::InvalidGrant) => {
                let flagged = MollieConnection {
                    status: ConnectionStatus::NeedsReauthorization,
                    updated_at: now,
                    ..connection
                };
                self.connections.save(&flagged).await?;
                tracing::warn!(
                    organization_id = %organization_id,
                    "Mollie refresh token rejected; connection needs reauthorization"
                );
                Err(PaymentError::NeedsReauthorization { organization_id })
            }
            Err(e) => {
                tracing::error!(organization_id = %organization_id, error = %e, "Mollie token refresh failed");
                Err(e)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════
    // Organization-scoped API calls
    // ═══════════════════════════════════════════════════════════

    /// Onboarding status of the connected account.
    ///
    /// # Errors
    ///
    /// Returns error if not connected or the call fails.
    pub async fn onboarding(&self, organization_id: OrganizationId) -> Result<Onboarding> {
        let token = self.access_token(organization_id).await?;
        self.api.onboarding(&token).await
    }

    /// Whether the organization can accept payments right now.
    ///
    /// A missing or broken connection means `false`, not an error.
    ///
    /// # Errors
    ///
    /// Returns error only for store failures and transient API failures.
    pub async fn can_receive_payments(&self, organization_id: OrganizationId) -> Result<bool> {
        match self.onboarding(organization_id).await {
            Ok(onboarding) => Ok(onboarding.can_receive_payments),
            Err(PaymentError::NotConnected { .. } | PaymentError::NeedsReauthorization { .. }) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Create a payment on the organization's account.
    ///
    /// # Errors
    ///
    /// Returns error if not connected or Mollie rejects the payment.
    pub async fn create_payment(
        &self,
        organization_id: OrganizationId,
        request: &CreatePaymentRequest,
    ) -> Result<Payment> {
        let token = self.access_token(organization_id).await?;
        let payment = self.api.create_payment(&token, request).await?;
        tracing::info!(
            organization_id = %organization_id,
            payment_id = %payment.id,
            amount = %payment.amount.value,
            "Mollie payment created"
        );
        Ok(payment)
    }

    /// Fetch a payment from the organization's account.
    ///
    /// # Errors
    ///
    /// Returns error if not connected or the payment is unknown.
    pub async fn get_payment(
        &self,
        organization_id: OrganizationId,
        payment_id: &str,
    ) -> Result<Payment> {
        let token = self.access_token(organization_id).await?;
        self.api.get_payment(&token, payment_id).await
    }

    /// Refund a payment on the organization's account.
    ///
    /// # Errors
    ///
    /// Returns error if not connected or the refund is rejected.
    pub async fn create_refund(
        &self,
        organization_id: OrganizationId,
        payment_id: &str,
        amount: &MollieAmount,
    ) -> Result<Refund> {
        let token = self.access_token(organization_id).await?;
        let refund = self.api.create_refund(&token, payment_id, amount).await?;
        tracing::info!(
            organization_id = %organization_id,
            payment_id = %payment_id,
            refund_id = %refund.id,
            "Mollie refund created"
        );
        Ok(refund)
    }

    // ═══════════════════════════════════════════════════════════
    // Helpers
    // ═══════════════════════════════════════════════════════════

    async fn remember_state(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<String> {
        let state = generate_state();
        self.states
            .put(ConnectState {
                state: state.clone(),
                organization_id,
                user_id,
                created_at: self.clock.now(),
            })
            .await?;
        Ok(state)
    }

    fn oauth_query(&self, state: &str, force_approval: bool) -> String {
        let mut query = format!(
            "client_id={}&redirect_uri={}&state={}&scope={}&response_type=code",
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(&self.config.scope_param()),
        );
        if force_approval {
            query.push_str("&approval_prompt=force");
        }
        query
    }

    async fn load_active(&self, organization_id: OrganizationId) -> Result<MollieConnection> {
        let connection = self
            .connections
            .get(organization_id)
            .await?
            .ok_or(PaymentError::NotConnected { organization_id })?;
        if connection.status == ConnectionStatus::NeedsReauthorization {
            return Err(PaymentError::NeedsReauthorization { organization_id });
        }
        Ok(connection)
    }
}

impl std::fmt::Debug for MollieConnectService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MollieConnectService")
            .field("client_id", &self.config.client_id)
            .finish_non_exhaustive()
    }
}

/// 256-bit random state, URL safe.
fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn rotate(connection: MollieConnection, tokens: TokenResponse, now: DateTime<Utc>) -> MollieConnection {
    MollieConnection {
        refresh_token: tokens.refresh_token.unwrap_or(connection.refresh_token),
        access_token: tokens.access_token,
        expires_at: now + Duration::seconds(tokens.expires_in),
        scope: if tokens.scope.is_empty() { connection.scope } else { tokens.scope },
        updated_at: now,
        ..connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_unique_and_url_safe() {
        let a = generate_state();
        let b = generate_state();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.bytes().all(|c| c.is_ascii_alphanumeric() || c == b'-' || c == b'_'));
    }

    #[test]
    fn rotation_keeps_old_refresh_token_when_none_is_returned() {
        let now = Utc::now();
        let connection = MollieConnection {
            organization_id: OrganizationId::new(),
            access_token: "old_access".into(),
            refresh_token: "old_refresh".into(),
            expires_at: now,
            scope: "payments.read".into(),
            status: ConnectionStatus::Active,
            connected_by: UserId::new(),
            connected_at: now,
            updated_at: now,
        };
        let rotated = rotate(
            connection,
            TokenResponse {
                access_token: "new_access".into(),
                refresh_token: None,
                expires_in: 3600,
                scope: String::new(),
            },
            now,
        );
        assert_eq!(rotated.access_token, "new_access");
        assert_eq!(rotated.refresh_token, "old_refresh");
        assert_eq!(rotated.scope, "payments.read");
        assert_eq!(rotated.expires_at, now + Duration::hours(1));
    }
}
